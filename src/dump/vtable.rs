//! Golden vtable dump reader
//!
//! A vtable dump holds one block per vtable:
//!
//! ```text
//! _ZTVN7android7RefBaseE: 6 entries
//! 0     (int (*)(...)) 0
//! 8     (int (*)(...)) (& _ZTIN7android7RefBaseE)
//! 16    (int (*)(...)) _ZN7android7RefBaseD1Ev
//! ...
//! ```
//!
//! Blocks are separated by blank lines and `#` starts a comment line. The cast
//! prefix and the `(& ...)` wrapper written by the dumper are optional and are
//! stripped, so every entry reduces to a bare `(offset, symbol)` pair.

use crate::error::{Error, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// One dispatch slot binding in a vtable
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct VtableEntry {
    /// Byte offset of the slot from the start of the vtable symbol
    pub offset: u64,
    /// Symbol bound to the slot
    pub symbol: String,
}

impl VtableEntry {
    pub fn new(offset: u64, symbol: impl Into<String>) -> Self {
        Self {
            offset,
            symbol: symbol.into(),
        }
    }
}

/// Vtable id to ordered slot bindings
///
/// Entry order is the order the slots appear in the binary. Vtable ids iterate
/// in lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VtableLayout {
    vtables: BTreeMap<String, Vec<VtableEntry>>,
}

impl VtableLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a whole vtable, returning the entries it replaced
    pub fn insert(
        &mut self,
        vtable: impl Into<String>,
        entries: Vec<VtableEntry>,
    ) -> Option<Vec<VtableEntry>> {
        self.vtables.insert(vtable.into(), entries)
    }

    /// Append one entry to a vtable, creating the vtable if needed
    pub fn push(&mut self, vtable: &str, entry: VtableEntry) {
        self.vtables
            .entry(vtable.to_string())
            .or_default()
            .push(entry);
    }

    pub fn get(&self, vtable: &str) -> Option<&[VtableEntry]> {
        self.vtables.get(vtable).map(Vec::as_slice)
    }

    pub fn contains(&self, vtable: &str) -> bool {
        self.vtables.contains_key(vtable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[VtableEntry])> {
        self.vtables
            .iter()
            .map(|(name, entries)| (name.as_str(), entries.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.vtables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vtables.is_empty()
    }

    /// Total number of slot bindings over all vtables
    pub fn entry_count(&self) -> usize {
        self.vtables.values().map(Vec::len).sum()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<VtableEntry>)> for VtableLayout {
    fn from_iter<I: IntoIterator<Item = (S, Vec<VtableEntry>)>>(iter: I) -> Self {
        Self {
            vtables: iter
                .into_iter()
                .map(|(name, entries)| (name.into(), entries))
                .collect(),
        }
    }
}

/// Vtable block currently being filled by the parser
struct OpenBlock {
    name: String,
    declared: usize,
    header_line: usize,
    entries: Vec<VtableEntry>,
}

/// Parser for the golden vtable dump grammar
pub struct VtableDumpParser {
    header_regex: Regex,
    entry_regex: Regex,
}

impl VtableDumpParser {
    const CAST_PREFIX: &'static str = "(int (*)(...))";

    pub fn new() -> Result<Self> {
        let header_regex = Regex::new(r"^(\S+):\s+(\d+)\s+entr(?:y|ies)$")?;
        let entry_regex = Regex::new(r"^\s*(\S+)\s+(.*)$")?;

        Ok(Self {
            header_regex,
            entry_regex,
        })
    }

    /// Parse dump text into a layout
    pub fn parse(&self, text: &str) -> Result<VtableLayout> {
        let mut layout = VtableLayout::new();
        let mut open: Option<OpenBlock> = None;

        for (index, raw_line) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw_line.trim_end();

            if line.trim_start().is_empty() {
                Self::close_block(&mut layout, open.take())?;
                continue;
            }
            if line.trim_start().starts_with('#') {
                continue;
            }

            if let Some(captures) = self.header_regex.captures(line) {
                Self::close_block(&mut layout, open.take())?;

                let name = captures[1].to_string();
                let declared = captures[2]
                    .parse()
                    .map_err(|_| Error::vtable_format(line_no, "entry count out of range"))?;
                if layout.contains(&name) {
                    return Err(Error::vtable_format(
                        line_no,
                        format!("duplicate vtable '{}'", name),
                    ));
                }

                open = Some(OpenBlock {
                    name,
                    declared,
                    header_line: line_no,
                    entries: Vec::new(),
                });
                continue;
            }

            let Some(block) = open.as_mut() else {
                return Err(Error::vtable_format(
                    line_no,
                    format!("entry outside of a vtable block: '{}'", line.trim()),
                ));
            };
            block.entries.push(self.parse_entry(line, line_no)?);
        }

        Self::close_block(&mut layout, open.take())?;
        Ok(layout)
    }

    fn parse_entry(&self, line: &str, line_no: usize) -> Result<VtableEntry> {
        let captures = self.entry_regex.captures(line).ok_or_else(|| {
            Error::vtable_format(line_no, format!("expected '<offset> <symbol>': '{}'", line))
        })?;

        let offset = captures[1].parse::<u64>().map_err(|_| {
            Error::vtable_format(line_no, format!("invalid offset '{}'", &captures[1]))
        })?;

        let symbol = Self::clean_symbol(&captures[2]);
        if symbol.is_empty() {
            return Err(Error::vtable_format(line_no, "missing symbol"));
        }

        Ok(VtableEntry::new(offset, symbol))
    }

    /// Strip the dumper's cast prefix and address-of wrapper
    fn clean_symbol(raw: &str) -> &str {
        let mut symbol = raw.trim();
        if let Some(rest) = symbol.strip_prefix(Self::CAST_PREFIX) {
            symbol = rest.trim();
        }
        if let Some(inner) = symbol
            .strip_prefix("(&")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            symbol = inner.trim();
        }
        symbol
    }

    fn close_block(layout: &mut VtableLayout, block: Option<OpenBlock>) -> Result<()> {
        let Some(block) = block else {
            return Ok(());
        };

        if block.entries.len() != block.declared {
            return Err(Error::vtable_format(
                block.header_line,
                format!(
                    "vtable '{}' declares {} entries but lists {}",
                    block.name,
                    block.declared,
                    block.entries.len()
                ),
            ));
        }

        layout.insert(block.name, block.entries);
        Ok(())
    }
}

/// Parse vtable dump text into a layout
pub fn read_vtable_layout(text: &str) -> Result<VtableLayout> {
    VtableDumpParser::new()?.parse(text)
}

/// Read and parse a golden vtable dump from disk
pub fn read_vtable_dump<P: AsRef<Path>>(path: P) -> Result<VtableLayout> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| Error::DumpRead {
        path: path.to_path_buf(),
        source,
    })?;
    read_vtable_layout(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
_ZTVN7android7RefBaseE: 4 entries
0     (int (*)(...)) 0
8     (int (*)(...)) (& _ZTIN7android7RefBaseE)
16    (int (*)(...)) _ZN7android7RefBaseD1Ev
24    (int (*)(...)) _ZN7android7RefBaseD0Ev

# plain entries are accepted too
_ZTV3Foo: 2 entries
0 _ZN3Foo3barEv
8 _ZN3Foo3bazEv
";

    #[test]
    fn test_parse_sample_dump() {
        let layout = read_vtable_layout(SAMPLE).unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.entry_count(), 6);

        let refbase = layout.get("_ZTVN7android7RefBaseE").unwrap();
        assert_eq!(refbase[0], VtableEntry::new(0, "0"));
        assert_eq!(refbase[1], VtableEntry::new(8, "_ZTIN7android7RefBaseE"));
        assert_eq!(refbase[3], VtableEntry::new(24, "_ZN7android7RefBaseD0Ev"));

        let foo = layout.get("_ZTV3Foo").unwrap();
        assert_eq!(
            foo,
            &[
                VtableEntry::new(0, "_ZN3Foo3barEv"),
                VtableEntry::new(8, "_ZN3Foo3bazEv")
            ]
        );
    }

    #[test]
    fn test_entry_order_and_duplicates_preserved() {
        let text = "_ZTV1A: 3 entries\n0 f\n8 g\n16 f\n";
        let layout = read_vtable_layout(text).unwrap();
        let offsets: Vec<(u64, &str)> = layout
            .get("_ZTV1A")
            .unwrap()
            .iter()
            .map(|e| (e.offset, e.symbol.as_str()))
            .collect();
        assert_eq!(offsets, vec![(0, "f"), (8, "g"), (16, "f")]);
    }

    #[test]
    fn test_empty_input_is_empty_layout() {
        assert!(read_vtable_layout("").unwrap().is_empty());
        assert!(read_vtable_layout("\n\n# nothing\n").unwrap().is_empty());
    }

    #[test]
    fn test_entry_before_header_is_rejected() {
        match read_vtable_layout("0 _ZN3Foo3barEv\n") {
            Err(Error::VtableFormat { line, .. }) => assert_eq!(line, 1),
            other => panic!("Expected VtableFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_offset_is_rejected() {
        match read_vtable_layout("_ZTV1A: 1 entries\n0x10 f\n") {
            Err(Error::VtableFormat { line, message }) => {
                assert_eq!(line, 2);
                assert!(message.contains("0x10"));
            }
            other => panic!("Expected VtableFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_symbol_is_rejected() {
        let result = read_vtable_layout("_ZTV1A: 1 entries\n8    (int (*)(...))\n");
        assert!(matches!(result, Err(Error::VtableFormat { line: 2, .. })));
    }

    #[test]
    fn test_entry_count_mismatch_is_rejected() {
        let result = read_vtable_layout("_ZTV1A: 3 entries\n0 f\n8 g\n\n_ZTV1B: 1 entries\n0 h\n");
        match result {
            Err(Error::VtableFormat { line, message }) => {
                assert_eq!(line, 1);
                assert!(message.contains("_ZTV1A"));
            }
            other => panic!("Expected VtableFormat error, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_vtable_is_rejected() {
        let result = read_vtable_layout("_ZTV1A: 1 entries\n0 f\n\n_ZTV1A: 1 entries\n0 f\n");
        assert!(matches!(result, Err(Error::VtableFormat { line: 4, .. })));
    }

    #[test]
    fn test_read_vtable_dump_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_vtable_dump(dir.path().join("libx.so_vtable.dump"));
        assert!(matches!(result, Err(Error::DumpRead { .. })));
    }
}
