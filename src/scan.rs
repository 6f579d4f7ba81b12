//! Compatibility scanning module
//!
//! A scan pass compares one golden dump directory against one prioritized list
//! of library search directories. [`check_compatibility`] runs one pass per
//! required ABI width and sums the results.

pub mod check;
pub mod resolver;

pub use check::{
    check_compatibility, AbiFamily, AbiWidth, CheckConfig, CheckReport, WidthReport,
};
pub use resolver::{iterate_files, resolve_libraries, LibraryRecord, ResolvedLibraries};

use crate::binary::BinaryIntrospector;
use crate::diff::{diff_symbols, diff_vtables, VtableMismatch};
use crate::dump::{read_symbol_dump, read_vtable_dump, DumpKind};
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Comparison result for one library
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryDiff {
    /// Library file name
    pub name: String,
    /// Library path used for reporting
    pub relative_path: String,
    /// Golden symbols the library no longer exports, sorted
    pub missing_symbols: Vec<String>,
    /// Golden vtable slots that are missing or moved
    pub vtable_diff: Vec<VtableMismatch>,
    /// Dumps or binary that could not be read or parsed
    pub failures: Vec<String>,
}

impl LibraryDiff {
    /// Whether a dump or the library could not be processed
    pub fn has_failure(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn is_compatible(&self) -> bool {
        self.missing_symbols.is_empty() && self.vtable_diff.is_empty() && !self.has_failure()
    }

    /// Record a failed step, or hand back errors that must stop the check
    fn record_failure(&mut self, step: &str, e: Error) -> Result<()> {
        if !e.is_recoverable() {
            return Err(e);
        }
        error!("{}: Cannot diff {}: {}", self.relative_path, step, e);
        self.failures.push(format!("{}: {}", step, e));
        Ok(())
    }
}

/// Result of one scan pass
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanOutcome {
    /// Number of incompatible libraries
    pub error_count: usize,
    /// Every compared library, in name order
    pub libraries: Vec<LibraryDiff>,
    /// Libraries with golden dumps but no file in any search directory
    pub not_found: Vec<String>,
    /// Files in the dump directory that are not dumps
    pub unrecognized_dumps: Vec<PathBuf>,
}

impl ScanOutcome {
    pub fn incompatible(&self) -> impl Iterator<Item = &LibraryDiff> {
        self.libraries.iter().filter(|lib| !lib.is_compatible())
    }

    pub fn pass_count(&self) -> usize {
        self.libraries.len() - self.error_count
    }
}

/// Compares golden dumps with libraries through a [`BinaryIntrospector`]
pub struct Scanner<'a> {
    introspector: &'a dyn BinaryIntrospector,
    report_root: Option<PathBuf>,
    expected_bitness: Option<u8>,
}

impl<'a> Scanner<'a> {
    pub fn new(introspector: &'a dyn BinaryIntrospector) -> Self {
        Self {
            introspector,
            report_root: None,
            expected_bitness: None,
        }
    }

    /// Report library paths relative to `root` when they live under it
    pub fn with_report_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.report_root = Some(root.into());
        self
    }

    /// Warn about libraries whose word width differs from `bitness`
    pub fn with_expected_bitness(mut self, bitness: u8) -> Self {
        self.expected_bitness = Some(bitness);
        self
    }

    /// Compare every dump under `dump_dir` with the first library of the same
    /// name found in `lib_dirs`.
    ///
    /// Failures on a single library are recorded in its [`LibraryDiff`] and the
    /// scan moves on. Only configuration errors are returned.
    pub fn scan_directory(&self, dump_dir: &Path, lib_dirs: &[PathBuf]) -> Result<ScanOutcome> {
        let resolved = resolve_libraries(dump_dir, lib_dirs)?;
        let mut outcome = ScanOutcome {
            unrecognized_dumps: resolved.unrecognized_dumps.clone(),
            ..Default::default()
        };

        for record in resolved.unresolved() {
            info!("{}: Not found on target", record.name);
            outcome.not_found.push(record.name.clone());
        }

        for record in resolved.resolved() {
            let Some(lib_path) = record.library_path.as_deref() else {
                continue;
            };

            let diff = self.diff_library(record, lib_path)?;
            if diff.is_compatible() {
                info!("{}: Pass", diff.relative_path);
            } else {
                outcome.error_count += 1;
            }
            outcome.libraries.push(diff);
        }

        Ok(outcome)
    }

    fn diff_library(&self, record: &LibraryRecord, lib_path: &Path) -> Result<LibraryDiff> {
        let relative_path = self.relative_path(lib_path, record.search_dir.as_deref());
        let mut diff = LibraryDiff {
            name: record.name.clone(),
            relative_path,
            ..Default::default()
        };

        self.check_bitness(&diff.relative_path, lib_path);

        if let Some(dump_path) = record.dump(DumpKind::Symbol) {
            match self.diff_symbols(dump_path, lib_path) {
                Ok(missing) => diff.missing_symbols = missing,
                Err(e) => diff.record_failure("symbols", e)?,
            }
        }

        if let Some(dump_path) = record.dump(DumpKind::Vtable) {
            match self.diff_vtables(dump_path, lib_path) {
                Ok(mismatches) => diff.vtable_diff = mismatches,
                Err(e) => diff.record_failure("vtables", e)?,
            }
        }

        if !diff.missing_symbols.is_empty() {
            error!(
                "{}: Missing Symbols:\n{}",
                diff.relative_path,
                diff.missing_symbols.join("\n")
            );
        }
        if !diff.vtable_diff.is_empty() {
            let rows: Vec<String> = diff.vtable_diff.iter().map(|m| m.to_string()).collect();
            error!(
                "{}: Vtable Difference:\nvtable symbol expected actual\n{}",
                diff.relative_path,
                rows.join("\n")
            );
        }

        Ok(diff)
    }

    fn diff_symbols(&self, dump_path: &Path, lib_path: &Path) -> Result<Vec<String>> {
        let golden = read_symbol_dump(dump_path)?;
        let actual = self.introspector.global_dynamic_symbols(lib_path)?;
        Ok(diff_symbols(&golden, &actual))
    }

    fn diff_vtables(&self, dump_path: &Path, lib_path: &Path) -> Result<Vec<VtableMismatch>> {
        let golden = read_vtable_dump(dump_path)?;
        let actual = self.introspector.vtables(lib_path)?;
        Ok(diff_vtables(&golden, &actual))
    }

    fn check_bitness(&self, relative_path: &str, lib_path: &Path) {
        let Some(expected) = self.expected_bitness else {
            return;
        };
        match self.introspector.binary_info(lib_path) {
            Ok(Some(info)) => {
                debug!(
                    "{}: {} {} {}-bit",
                    relative_path, info.format, info.architecture, info.bitness
                );
                if info.bitness != expected {
                    warn!(
                        "{}: {}-bit library found where {}-bit was expected",
                        relative_path, info.bitness, expected
                    );
                }
            }
            Ok(None) => {}
            // The diff steps report the same failure.
            Err(e) => debug!("{}: no binary info: {}", relative_path, e),
        }
    }

    fn relative_path(&self, lib_path: &Path, search_dir: Option<&Path>) -> String {
        let base = self
            .report_root
            .as_deref()
            .filter(|root| lib_path.starts_with(root))
            .or_else(|| search_dir.and_then(Path::parent));

        base.and_then(|base| lib_path.strip_prefix(base).ok())
            .unwrap_or(lib_path)
            .display()
            .to_string()
    }
}
