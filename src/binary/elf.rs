//! ELF introspection implementation

use super::common::{
    BinaryFormat, BinaryInfo, BinaryIntrospector, DynamicSymbol, SymbolBinding, SymbolType,
    SymbolVisibility,
};
use crate::dump::{VtableEntry, VtableLayout};
use crate::error::{Error, Result};
use goblin::elf::program_header::PT_LOAD;
use goblin::elf::section_header::SHN_UNDEF;
use goblin::elf::sym::Sym;
use goblin::elf::Elf;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Mangled-name prefix of C++ vtable symbols
const VTABLE_PREFIX: &str = "_ZTV";

/// ELF introspection provider backed by goblin
pub struct ElfIntrospector;

impl ElfIntrospector {
    pub fn new() -> Self {
        Self
    }

    /// Check for the ELF magic number
    pub fn can_parse(data: &[u8]) -> bool {
        data.len() >= 4 && &data[0..4] == b"\x7fELF"
    }

    /// Read a library into memory, rejecting anything that is not ELF
    fn load(path: &Path) -> Result<Vec<u8>> {
        let data = fs::read(path)
            .map_err(|e| Error::introspection(path, format!("failed to read file: {}", e)))?;
        if !Self::can_parse(&data) {
            return Err(Error::introspection(path, "not an ELF image"));
        }
        Ok(data)
    }

    /// Extract architecture information from ELF header
    fn get_architecture(elf: &Elf) -> String {
        match elf.header.e_machine {
            goblin::elf::header::EM_X86_64 => "x86_64".to_string(),
            goblin::elf::header::EM_386 => "i386".to_string(),
            goblin::elf::header::EM_ARM => "ARM".to_string(),
            goblin::elf::header::EM_AARCH64 => "AArch64".to_string(),
            goblin::elf::header::EM_RISCV => "RISC-V".to_string(),
            goblin::elf::header::EM_MIPS => "MIPS".to_string(),
            _ => format!("Unknown ({})", elf.header.e_machine),
        }
    }

    fn get_bitness(elf: &Elf) -> u8 {
        if elf.is_64 {
            64
        } else {
            32
        }
    }

    fn convert_symbol_type(st_type: u8) -> SymbolType {
        match st_type {
            goblin::elf::sym::STT_FUNC | goblin::elf::sym::STT_GNU_IFUNC => SymbolType::Function,
            goblin::elf::sym::STT_OBJECT => SymbolType::Object,
            goblin::elf::sym::STT_SECTION => SymbolType::Section,
            goblin::elf::sym::STT_FILE => SymbolType::File,
            _ => SymbolType::Unknown,
        }
    }

    fn convert_binding(st_bind: u8) -> SymbolBinding {
        match st_bind {
            goblin::elf::sym::STB_LOCAL => SymbolBinding::Local,
            goblin::elf::sym::STB_GLOBAL => SymbolBinding::Global,
            goblin::elf::sym::STB_WEAK => SymbolBinding::Weak,
            goblin::elf::sym::STB_GNU_UNIQUE => SymbolBinding::Unique,
            _ => SymbolBinding::Unknown,
        }
    }

    fn convert_visibility(st_visibility: u8) -> SymbolVisibility {
        match st_visibility {
            goblin::elf::sym::STV_INTERNAL => SymbolVisibility::Internal,
            goblin::elf::sym::STV_HIDDEN => SymbolVisibility::Hidden,
            goblin::elf::sym::STV_PROTECTED => SymbolVisibility::Protected,
            _ => SymbolVisibility::Default,
        }
    }

    fn is_defined(sym: &Sym) -> bool {
        sym.st_shndx != SHN_UNDEF as usize
    }

    /// All named entries of the dynamic symbol table
    pub fn dynamic_symbols(elf: &Elf) -> Vec<DynamicSymbol> {
        elf.dynsyms
            .iter()
            .filter_map(|sym| {
                let name = elf.dynstrtab.get_at(sym.st_name)?;
                if name.is_empty() {
                    return None;
                }
                Some(DynamicSymbol {
                    name: name.to_string(),
                    is_defined: Self::is_defined(&sym),
                    binding: Self::convert_binding(sym.st_bind()),
                    visibility: Self::convert_visibility(sym.st_visibility()),
                })
            })
            .collect()
    }

    /// Defined `_ZTV*` symbols from both symbol tables, as name -> (address, size)
    fn vtable_symbols<'a>(elf: &Elf<'a>) -> BTreeMap<&'a str, (u64, u64)> {
        let mut vtables = BTreeMap::new();
        let tables = [(&elf.dynsyms, &elf.dynstrtab), (&elf.syms, &elf.strtab)];

        for (symtab, strtab) in tables {
            for sym in symtab.iter() {
                if !Self::is_defined(&sym) || sym.st_size == 0 {
                    continue;
                }
                if let Some(name) = strtab.get_at(sym.st_name) {
                    if name.starts_with(VTABLE_PREFIX) {
                        vtables.entry(name).or_insert((sym.st_value, sym.st_size));
                    }
                }
            }
        }

        vtables
    }

    /// Read every vtable slot. A vtable whose extent is not backed by the
    /// file contents of a loadable segment makes the image malformed.
    fn extract_vtables(path: &Path, elf: &Elf, data: &[u8]) -> Result<VtableLayout> {
        let resolver = SlotResolver::new(elf, data);
        let word_size = resolver.word_size as u64;
        let mut layout = VtableLayout::new();

        for (name, (address, size)) in Self::vtable_symbols(elf) {
            if resolver.file_offset(address, size).is_none() {
                return Err(Error::introspection(
                    path,
                    format!(
                        "vtable {} at {:#x} ({} bytes) is outside the loaded file contents",
                        name, address, size
                    ),
                ));
            }
            let entries = (0..size / word_size)
                .filter_map(|slot| {
                    let offset = slot * word_size;
                    let symbol = resolver.resolve(address.checked_add(offset)?);
                    Some(VtableEntry::new(offset, symbol))
                })
                .collect();
            layout.insert(name, entries);
        }

        Ok(layout)
    }
}

impl Default for ElfIntrospector {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryIntrospector for ElfIntrospector {
    fn global_dynamic_symbols(&self, path: &Path) -> Result<HashSet<String>> {
        let data = Self::load(path)?;
        let elf = Elf::parse(&data)?;

        let exported: HashSet<String> = Self::dynamic_symbols(&elf)
            .into_iter()
            .filter(DynamicSymbol::is_exported)
            .map(|sym| sym.name)
            .collect();
        debug!(
            "{}: {} exported dynamic symbols",
            path.display(),
            exported.len()
        );
        Ok(exported)
    }

    fn vtables(&self, path: &Path) -> Result<VtableLayout> {
        let data = Self::load(path)?;
        let elf = Elf::parse(&data)?;

        let layout = Self::extract_vtables(path, &elf, &data)?;
        debug!(
            "{}: {} vtables, {} slots",
            path.display(),
            layout.len(),
            layout.entry_count()
        );
        Ok(layout)
    }

    fn binary_info(&self, path: &Path) -> Result<Option<BinaryInfo>> {
        let data = Self::load(path)?;
        let elf = Elf::parse(&data)?;

        Ok(Some(BinaryInfo {
            path: path.to_string_lossy().to_string(),
            format: BinaryFormat::ELF,
            architecture: Self::get_architecture(&elf),
            bitness: Self::get_bitness(&elf),
            soname: elf.soname.map(str::to_string),
            dependencies: elf.libraries.iter().map(|lib| lib.to_string()).collect(),
        }))
    }

    fn name(&self) -> &'static str {
        "ELF Introspector"
    }
}

/// Dynamic relocation target of one word in the image
#[derive(Debug, Clone, Copy)]
struct RelocTarget {
    sym: usize,
    addend: Option<i64>,
}

/// Turns a vtable slot address into the name of the symbol it points at
struct SlotResolver<'e, 'a> {
    elf: &'e Elf<'a>,
    data: &'a [u8],
    word_size: usize,
    relocs: HashMap<u64, RelocTarget>,
    by_address: HashMap<u64, &'a str>,
}

impl<'e, 'a> SlotResolver<'e, 'a> {
    fn new(elf: &'e Elf<'a>, data: &'a [u8]) -> Self {
        let word_size = if elf.is_64 { 8 } else { 4 };

        let mut relocs = HashMap::new();
        for reloc in elf
            .dynrelas
            .iter()
            .chain(elf.dynrels.iter())
            .chain(elf.pltrelocs.iter())
        {
            relocs.entry(reloc.r_offset).or_insert(RelocTarget {
                sym: reloc.r_sym,
                addend: reloc.r_addend,
            });
        }

        // Dynamic names win over static ones; among aliases the smallest name
        // is kept so the result does not depend on table order.
        let mut by_address: HashMap<u64, &'a str> = HashMap::new();
        let tables = [(&elf.dynsyms, &elf.dynstrtab), (&elf.syms, &elf.strtab)];
        for (symtab, strtab) in tables {
            let mut table_names: HashMap<u64, &'a str> = HashMap::new();
            for sym in symtab.iter() {
                if !ElfIntrospector::is_defined(&sym) || sym.st_value == 0 {
                    continue;
                }
                if !matches!(
                    ElfIntrospector::convert_symbol_type(sym.st_type()),
                    SymbolType::Function | SymbolType::Object
                ) {
                    continue;
                }
                let Some(name) = strtab.get_at(sym.st_name).filter(|n| !n.is_empty()) else {
                    continue;
                };
                table_names
                    .entry(sym.st_value)
                    .and_modify(|existing| {
                        if name < *existing {
                            *existing = name;
                        }
                    })
                    .or_insert(name);
            }
            for (address, name) in table_names {
                by_address.entry(address).or_insert(name);
            }
        }

        Self {
            elf,
            data,
            word_size,
            relocs,
            by_address,
        }
    }

    /// Name of the symbol the slot at `vaddr` binds to
    fn resolve(&self, vaddr: u64) -> String {
        let target = match self.relocs.get(&vaddr) {
            Some(reloc) if reloc.sym != 0 => {
                if let Some(name) = self.dynsym_name(reloc.sym) {
                    return name.to_string();
                }
                self.read_word(vaddr).unwrap_or(0)
            }
            Some(reloc) => match reloc.addend {
                Some(addend) => addend as u64,
                None => self.read_word(vaddr).unwrap_or(0),
            },
            None => self.read_word(vaddr).unwrap_or(0),
        };

        match self.by_address.get(&target) {
            Some(name) => name.to_string(),
            None => render_word(target, self.word_size),
        }
    }

    fn dynsym_name(&self, index: usize) -> Option<&'a str> {
        let sym = self.elf.dynsyms.get(index)?;
        self.elf
            .dynstrtab
            .get_at(sym.st_name)
            .filter(|name| !name.is_empty())
    }

    /// File offset of `len` bytes mapped at `vaddr`, if all of them are file
    /// backed by one loadable segment and present in the image
    fn file_offset(&self, vaddr: u64, len: u64) -> Option<usize> {
        let end = vaddr.checked_add(len)?;
        let segment = self.elf.program_headers.iter().find(|ph| {
            ph.p_type == PT_LOAD
                && vaddr >= ph.p_vaddr
                && ph
                    .p_vaddr
                    .checked_add(ph.p_filesz)
                    .is_some_and(|segment_end| end <= segment_end)
        })?;

        let start = segment.p_offset.checked_add(vaddr - segment.p_vaddr)?;
        let start = usize::try_from(start).ok()?;
        let stop = start.checked_add(usize::try_from(len).ok()?)?;
        (stop <= self.data.len()).then_some(start)
    }

    /// Read the file-backed word mapped at `vaddr`
    fn read_word(&self, vaddr: u64) -> Option<u64> {
        let start = self.file_offset(vaddr, self.word_size as u64)?;
        let bytes = self.data.get(start..start + self.word_size)?;
        Some(decode_word(bytes, self.elf.little_endian))
    }
}

fn decode_word(bytes: &[u8], little_endian: bool) -> u64 {
    let mut buf = [0u8; 8];
    if little_endian {
        buf[..bytes.len()].copy_from_slice(bytes);
        u64::from_le_bytes(buf)
    } else {
        buf[8 - bytes.len()..].copy_from_slice(bytes);
        u64::from_be_bytes(buf)
    }
}

/// Signed decimal rendering of an unresolved slot value
fn render_word(value: u64, word_size: usize) -> String {
    if word_size == 4 {
        (value as u32 as i32).to_string()
    } else {
        (value as i64).to_string()
    }
}
