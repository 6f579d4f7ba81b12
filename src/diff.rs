//! Golden-versus-actual differencing
//!
//! Both differs are pure functions of their inputs: they only report
//! regressions relative to the golden snapshot, never additions.

pub mod symbols;
pub mod vtables;

pub use symbols::diff_symbols;
pub use vtables::{diff_vtables, ActualOffsets, VtableMismatch};
