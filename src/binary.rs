//! Binary introspection module
//!
//! This module answers the two questions the scanner asks of a library: which
//! dynamic symbols does it export, and what do its vtables look like. The
//! [`BinaryIntrospector`] trait is the seam; [`ElfIntrospector`] implements it
//! for ELF shared objects with goblin.

pub mod common;
pub mod elf;

pub use common::{
    BinaryFormat, BinaryInfo, BinaryIntrospector, DynamicSymbol, SymbolBinding, SymbolType,
    SymbolVisibility,
};
pub use elf::ElfIntrospector;

/// Detect the format of binary data from its magic number
pub fn detect_format(data: &[u8]) -> Option<BinaryFormat> {
    if ElfIntrospector::can_parse(data) {
        Some(BinaryFormat::ELF)
    } else {
        None
    }
}
