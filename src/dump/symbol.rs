//! Golden symbol dump reader

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Set of symbol names a library exported when the golden snapshot was taken
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolDump {
    symbols: BTreeSet<String>,
}

impl SymbolDump {
    /// Parse dump text: one symbol per line, surrounding whitespace trimmed,
    /// blank lines ignored, duplicates collapsed.
    pub fn parse(text: &str) -> Self {
        text.lines().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains(name)
    }

    /// Symbols in ascending order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for SymbolDump {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let symbols = iter
            .into_iter()
            .filter_map(|line| {
                let trimmed = line.as_ref().trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .collect();
        Self { symbols }
    }
}

/// Read a golden symbol dump from disk
pub fn read_symbol_dump<P: AsRef<Path>>(path: P) -> Result<SymbolDump> {
    let path = path.as_ref();
    let dump_read = |source| Error::DumpRead {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(dump_read)?;
    let lines = BufReader::new(file)
        .lines()
        .collect::<std::io::Result<Vec<String>>>()
        .map_err(dump_read)?;

    Ok(lines.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_trims_and_skips_blank_lines() {
        let dump = SymbolDump::parse("  foo\n\nbar  \n   \n\tbaz\n");
        assert_eq!(dump.len(), 3);
        assert!(dump.contains("foo"));
        assert!(dump.contains("bar"));
        assert!(dump.contains("baz"));
        assert!(!dump.contains(""));
    }

    #[test]
    fn test_duplicates_collapse() {
        let dump = SymbolDump::parse("foo\nfoo\n foo \nbar\n");
        assert_eq!(dump.iter().collect::<Vec<_>>(), vec!["bar", "foo"]);
    }

    #[test]
    fn test_read_symbol_dump_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "_ZN7android6Parcel5writeEPKvj").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "android_log_print").unwrap();

        let dump = read_symbol_dump(file.path()).unwrap();
        assert_eq!(dump.len(), 2);
        assert!(dump.contains("android_log_print"));
    }

    #[test]
    fn test_read_missing_dump_is_dump_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("libnope.so_symbol.dump");

        match read_symbol_dump(&missing) {
            Err(Error::DumpRead { path, .. }) => assert_eq!(path, missing),
            other => panic!("Expected DumpRead error, got {:?}", other),
        }
    }
}
