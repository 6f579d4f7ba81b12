//! abiguard - golden ABI compatibility checker
//!
//! Verifies that shared libraries still export every dynamic symbol and keep
//! every vtable slot recorded in golden dumps captured at a prior release.
//! Libraries are matched to dumps across prioritized search directories, for
//! the 32-bit and 64-bit variants of a target.

pub mod binary;
pub mod cli;
pub mod diff;
pub mod dump;
pub mod error;
pub mod scan;

// Re-export main types for convenience
pub use binary::{BinaryInfo, BinaryIntrospector, ElfIntrospector};
pub use cli::{Args, CliApp, OutputFormat};
pub use diff::{diff_symbols, diff_vtables, ActualOffsets, VtableMismatch};
pub use dump::{read_symbol_dump, read_vtable_dump, SymbolDump, VtableEntry, VtableLayout};
pub use error::{Error, Result};
pub use scan::{
    check_compatibility, resolve_libraries, CheckConfig, CheckReport, LibraryDiff, ScanOutcome,
    Scanner,
};
