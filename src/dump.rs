//! Golden dump reading module
//!
//! Golden dumps are text snapshots captured at a prior release. Two kinds exist
//! side by side in a dump directory: `<lib>_symbol.dump` lists exported dynamic
//! symbols and `<lib>_vtable.dump` describes vtable layouts.

pub mod symbol;
pub mod vtable;

pub use symbol::{read_symbol_dump, SymbolDump};
pub use vtable::{read_vtable_dump, read_vtable_layout, VtableDumpParser, VtableEntry, VtableLayout};

use serde::Serialize;

/// File name suffix of golden symbol dumps
pub const SYMBOL_DUMP_SUFFIX: &str = "_symbol.dump";
/// File name suffix of golden vtable dumps
pub const VTABLE_DUMP_SUFFIX: &str = "_vtable.dump";

/// Kind of golden dump, determined by file name suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum DumpKind {
    Symbol,
    Vtable,
}

impl DumpKind {
    pub fn suffix(self) -> &'static str {
        match self {
            DumpKind::Symbol => SYMBOL_DUMP_SUFFIX,
            DumpKind::Vtable => VTABLE_DUMP_SUFFIX,
        }
    }

    /// Split a dump file name into its kind and library base name.
    ///
    /// Returns `None` for names matching neither suffix, and for a bare suffix
    /// with no library name in front of it.
    pub fn classify(file_name: &str) -> Option<(DumpKind, &str)> {
        [DumpKind::Symbol, DumpKind::Vtable]
            .into_iter()
            .find_map(|kind| {
                file_name
                    .strip_suffix(kind.suffix())
                    .filter(|lib_name| !lib_name.is_empty())
                    .map(|lib_name| (kind, lib_name))
            })
    }
}

impl std::fmt::Display for DumpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DumpKind::Symbol => write!(f, "symbol"),
            DumpKind::Vtable => write!(f, "vtable"),
        }
    }
}
