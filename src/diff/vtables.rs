//! Vtable layout differencing

use crate::dump::VtableLayout;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;

/// Where a golden vtable symbol actually sits in the library
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActualOffsets {
    /// The symbol does not appear in the library's vtable at all
    Missing,
    /// Every offset the symbol occupies, in slot order
    At(Vec<u64>),
}

impl fmt::Display for ActualOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActualOffsets::Missing => write!(f, "missing"),
            ActualOffsets::At(offsets) => {
                let joined: Vec<String> = offsets.iter().map(u64::to_string).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

impl Serialize for ActualOffsets {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A golden vtable slot that is missing or moved in the library
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VtableMismatch {
    pub vtable: String,
    pub symbol: String,
    pub expected_offset: u64,
    pub actual: ActualOffsets,
}

impl VtableMismatch {
    /// Report row: vtable, symbol, expected offset, actual offsets
    pub fn to_row(&self) -> [String; 4] {
        [
            self.vtable.clone(),
            self.symbol.clone(),
            self.expected_offset.to_string(),
            self.actual.to_string(),
        ]
    }
}

impl fmt::Display for VtableMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_row().join(" "))
    }
}

/// Compare every golden vtable slot against the library's layout.
///
/// A golden `(offset, symbol)` pair matches when the symbol occupies that exact
/// offset anywhere in the same-named library vtable; a symbol bound to several
/// slots matches any one of them. Vtables only present in `actual` are ignored.
pub fn diff_vtables(golden: &VtableLayout, actual: &VtableLayout) -> Vec<VtableMismatch> {
    let mut diff = Vec::new();

    for (vtable, expected_entries) in golden.iter() {
        let mut inverse: HashMap<&str, Vec<u64>> = HashMap::new();
        for entry in actual.get(vtable).unwrap_or_default() {
            inverse
                .entry(entry.symbol.as_str())
                .or_default()
                .push(entry.offset);
        }

        for expected in expected_entries {
            let found = match inverse.get(expected.symbol.as_str()) {
                None => ActualOffsets::Missing,
                Some(offsets) if !offsets.contains(&expected.offset) => {
                    ActualOffsets::At(offsets.clone())
                }
                Some(_) => continue,
            };

            diff.push(VtableMismatch {
                vtable: vtable.to_string(),
                symbol: expected.symbol.clone(),
                expected_offset: expected.offset,
                actual: found,
            });
        }
    }

    diff
}
