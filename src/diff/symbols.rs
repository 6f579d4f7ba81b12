//! Exported symbol set differencing

use crate::dump::SymbolDump;
use std::collections::HashSet;

/// Golden symbols the library no longer exports.
///
/// The result is sorted ascending and free of duplicates. Matching is exact
/// string equality; an empty result means the library still exports every
/// golden symbol.
pub fn diff_symbols(golden: &SymbolDump, actual: &HashSet<String>) -> Vec<String> {
    // SymbolDump iterates in sorted order already.
    golden
        .iter()
        .filter(|symbol| !actual.contains(*symbol))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actual(names: &[&str]) -> HashSet<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_missing_symbol_reported() {
        let golden = SymbolDump::parse("foo\nbar\n");
        let missing = diff_symbols(&golden, &actual(&["foo"]));
        assert_eq!(missing, vec!["bar".to_string()]);
    }

    #[test]
    fn test_superset_is_compatible() {
        let golden = SymbolDump::parse("foo\nbar\n");
        let missing = diff_symbols(&golden, &actual(&["foo", "bar", "baz"]));
        assert!(missing.is_empty());
    }

    #[test]
    fn test_result_sorted_without_duplicates() {
        let golden = SymbolDump::parse("zeta\nalpha\nmid\nalpha\n");
        let missing = diff_symbols(&golden, &HashSet::new());
        assert_eq!(missing, vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn test_exact_match_only() {
        let golden = SymbolDump::parse("malloc\n");
        let missing = diff_symbols(&golden, &actual(&["malloc@@LIBC", "_malloc"]));
        assert_eq!(missing, vec!["malloc"]);
    }

    #[test]
    fn test_diff_is_idempotent() {
        let golden = SymbolDump::parse("a\nb\nc\n");
        let lib = actual(&["b"]);
        assert_eq!(diff_symbols(&golden, &lib), diff_symbols(&golden, &lib));
    }
}
