//! Common types and traits for binary introspection

use crate::dump::VtableLayout;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// A dynamic symbol found in a binary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicSymbol {
    /// The name of the symbol
    pub name: String,
    /// Whether the symbol is defined in this binary
    pub is_defined: bool,
    pub binding: SymbolBinding,
    pub visibility: SymbolVisibility,
}

impl DynamicSymbol {
    /// Whether a consumer linking against the library can bind to this symbol
    pub fn is_exported(&self) -> bool {
        self.is_defined
            && self.binding.is_global()
            && matches!(
                self.visibility,
                SymbolVisibility::Default | SymbolVisibility::Protected
            )
    }
}

/// Types of symbols found in binaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolType {
    Function,
    Object,
    Section,
    File,
    Unknown,
}

/// ELF symbol binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolBinding {
    Local,
    Global,
    Weak,
    Unique,
    Unknown,
}

impl SymbolBinding {
    /// Global, weak and GNU unique symbols are all visible to the dynamic linker
    pub fn is_global(self) -> bool {
        matches!(
            self,
            SymbolBinding::Global | SymbolBinding::Weak | SymbolBinding::Unique
        )
    }
}

/// ELF symbol visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolVisibility {
    Default,
    Internal,
    Hidden,
    Protected,
}

/// Information about a binary file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinaryInfo {
    /// The file path of the binary
    pub path: String,
    /// The format of the binary
    pub format: BinaryFormat,
    /// The architecture of the binary
    pub architecture: String,
    /// Whether the binary is 32-bit or 64-bit
    pub bitness: u8,
    /// DT_SONAME, if present
    pub soname: Option<String>,
    /// List of shared libraries this binary depends on
    pub dependencies: Vec<String>,
}

/// Supported binary formats
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryFormat {
    ELF,
}

impl std::fmt::Display for BinaryFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinaryFormat::ELF => write!(f, "ELF"),
        }
    }
}

/// Capability interface for extracting ABI surface from a library file.
///
/// The scanner only talks to libraries through this trait, so tests can swap in
/// canned symbol sets and layouts.
pub trait BinaryIntrospector {
    /// Names of the globally visible dynamic symbols the library defines
    fn global_dynamic_symbols(&self, path: &Path) -> Result<HashSet<String>>;

    /// Vtables compiled into the library, keyed by mangled vtable name
    fn vtables(&self, path: &Path) -> Result<VtableLayout>;

    /// Basic facts about the binary, when the provider can tell
    fn binary_info(&self, _path: &Path) -> Result<Option<BinaryInfo>> {
        Ok(None)
    }

    /// Get the name of this provider
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(binding: SymbolBinding, visibility: SymbolVisibility, defined: bool) -> DynamicSymbol {
        DynamicSymbol {
            name: "_ZN7android6Parcel4readEPvj".to_string(),
            is_defined: defined,
            binding,
            visibility,
        }
    }

    #[test]
    fn test_is_exported() {
        assert!(symbol(SymbolBinding::Global, SymbolVisibility::Default, true).is_exported());
        assert!(symbol(SymbolBinding::Weak, SymbolVisibility::Protected, true).is_exported());
        assert!(symbol(SymbolBinding::Unique, SymbolVisibility::Default, true).is_exported());
        assert!(!symbol(SymbolBinding::Global, SymbolVisibility::Hidden, true).is_exported());
        assert!(!symbol(SymbolBinding::Local, SymbolVisibility::Default, true).is_exported());
        assert!(!symbol(SymbolBinding::Global, SymbolVisibility::Default, false).is_exported());
    }

    #[test]
    fn test_binary_format_display() {
        assert_eq!(BinaryFormat::ELF.to_string(), "ELF");
    }
}
