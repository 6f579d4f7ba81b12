//! Library resolution: golden dump names to library files on the target

use crate::dump::DumpKind;
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Everything known about one library name during a scan pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryRecord {
    /// Library file name, e.g. `libutils.so`
    pub name: String,
    pub symbol_dump: Option<PathBuf>,
    pub vtable_dump: Option<PathBuf>,
    /// First matching library file in search directory order
    pub library_path: Option<PathBuf>,
    /// Search directory `library_path` was found under
    pub search_dir: Option<PathBuf>,
}

impl LibraryRecord {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn dump(&self, kind: DumpKind) -> Option<&Path> {
        match kind {
            DumpKind::Symbol => self.symbol_dump.as_deref(),
            DumpKind::Vtable => self.vtable_dump.as_deref(),
        }
    }

    fn dump_slot(&mut self, kind: DumpKind) -> &mut Option<PathBuf> {
        match kind {
            DumpKind::Symbol => &mut self.symbol_dump,
            DumpKind::Vtable => &mut self.vtable_dump,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.library_path.is_some()
    }
}

/// Result of matching a dump directory against search directories
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedLibraries {
    /// Records keyed by library name, so iteration order is deterministic
    pub records: BTreeMap<String, LibraryRecord>,
    /// Files in the dump directory matching neither dump suffix
    pub unrecognized_dumps: Vec<PathBuf>,
}

impl ResolvedLibraries {
    pub fn get(&self, name: &str) -> Option<&LibraryRecord> {
        self.records.get(name)
    }

    pub fn resolved(&self) -> impl Iterator<Item = &LibraryRecord> {
        self.records.values().filter(|record| record.is_resolved())
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &LibraryRecord> {
        self.records.values().filter(|record| !record.is_resolved())
    }
}

/// Index the dumps under `dump_dir` and bind each library name to the first
/// file of that name found under `lib_dirs`, honoring the list order.
///
/// A missing search directory is treated as empty. A missing dump directory is
/// a configuration error.
pub fn resolve_libraries(dump_dir: &Path, lib_dirs: &[PathBuf]) -> Result<ResolvedLibraries> {
    if !dump_dir.is_dir() {
        return Err(Error::Configuration(format!(
            "dump directory '{}' does not exist",
            dump_dir.display()
        )));
    }

    let mut resolved = ResolvedLibraries::default();

    for dump_path in iterate_files(dump_dir) {
        let classified = dump_path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(DumpKind::classify)
            .map(|(kind, lib_name)| (kind, lib_name.to_string()));
        let Some((kind, lib_name)) = classified else {
            warn!("Unknown dump: {}", dump_path.display());
            resolved.unrecognized_dumps.push(dump_path);
            continue;
        };

        let record = resolved
            .records
            .entry(lib_name.clone())
            .or_insert_with(|| LibraryRecord::new(&lib_name));
        if let Some(existing) = record.dump(kind) {
            warn!(
                "{}: duplicate {} dump {} ignored, using {}",
                lib_name,
                kind,
                dump_path.display(),
                existing.display()
            );
        } else {
            *record.dump_slot(kind) = Some(dump_path);
        }
    }

    for lib_dir in lib_dirs {
        if !lib_dir.is_dir() {
            debug!("{} doesn't exist, treating as empty", lib_dir.display());
            continue;
        }
        for lib_path in iterate_files(lib_dir) {
            let Some(lib_name) = lib_path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(record) = resolved.records.get_mut(lib_name) {
                if record.library_path.is_none() {
                    record.library_path = Some(lib_path);
                    record.search_dir = Some(lib_dir.clone());
                }
            }
        }
    }

    Ok(resolved)
}

/// List regular files under `dir` recursively.
///
/// Files of a directory come before the contents of its subdirectories, and
/// entries are visited in name order. Symlinked directories are not followed.
/// Entries that cannot be read are logged and skipped.
pub fn iterate_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by(files_first) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!("Skipping unreadable entry under {}: {}", dir.display(), err);
                continue;
            }
        };
        if !entry.file_type().is_dir() && entry.path().is_file() {
            files.push(entry.into_path());
        }
    }
    files
}

fn files_first(a: &DirEntry, b: &DirEntry) -> std::cmp::Ordering {
    (a.file_type().is_dir(), a.file_name()).cmp(&(b.file_type().is_dir(), b.file_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_dumps_indexed_by_kind() {
        let dumps = tempfile::tempdir().unwrap();
        touch(&dumps.path().join("libfoo.so_symbol.dump"));
        touch(&dumps.path().join("libfoo.so_vtable.dump"));
        touch(&dumps.path().join("nested/libbar.so_symbol.dump"));
        touch(&dumps.path().join("notes.txt"));

        let resolved = resolve_libraries(dumps.path(), &[]).unwrap();

        assert_eq!(resolved.records.len(), 2);
        let foo = resolved.get("libfoo.so").unwrap();
        assert!(foo.symbol_dump.is_some());
        assert!(foo.vtable_dump.is_some());
        let bar = resolved.get("libbar.so").unwrap();
        assert!(bar.symbol_dump.is_some());
        assert!(bar.dump(DumpKind::Vtable).is_none());

        assert_eq!(
            resolved.unrecognized_dumps,
            vec![dumps.path().join("notes.txt")]
        );
        assert_eq!(resolved.unresolved().count(), 2);
    }

    #[test]
    fn test_first_search_directory_wins() {
        let dumps = tempfile::tempdir().unwrap();
        touch(&dumps.path().join("libfoo.so_symbol.dump"));

        let target = tempfile::tempdir().unwrap();
        let vendor = target.path().join("vendor/lib");
        let system = target.path().join("system/lib");
        touch(&vendor.join("libfoo.so"));
        touch(&system.join("libfoo.so"));

        let resolved =
            resolve_libraries(dumps.path(), &[vendor.clone(), system.clone()]).unwrap();
        let foo = resolved.get("libfoo.so").unwrap();
        assert_eq!(foo.library_path, Some(vendor.join("libfoo.so")));
        assert_eq!(foo.search_dir, Some(vendor.clone()));

        let resolved = resolve_libraries(dumps.path(), &[system.clone(), vendor]).unwrap();
        assert_eq!(
            resolved.get("libfoo.so").unwrap().library_path,
            Some(system.join("libfoo.so"))
        );
    }

    #[test]
    fn test_libraries_without_dumps_are_ignored() {
        let dumps = tempfile::tempdir().unwrap();
        touch(&dumps.path().join("libfoo.so_symbol.dump"));

        let libs = tempfile::tempdir().unwrap();
        touch(&libs.path().join("libfoo.so"));
        touch(&libs.path().join("libunrelated.so"));

        let resolved = resolve_libraries(dumps.path(), &[libs.path().to_path_buf()]).unwrap();
        assert_eq!(resolved.records.len(), 1);
        assert!(resolved.get("libunrelated.so").is_none());
        assert_eq!(resolved.resolved().count(), 1);
    }

    #[test]
    fn test_missing_search_directory_is_empty() {
        let dumps = tempfile::tempdir().unwrap();
        touch(&dumps.path().join("libfoo.so_vtable.dump"));

        let resolved =
            resolve_libraries(dumps.path(), &[dumps.path().join("does/not/exist")]).unwrap();
        assert!(!resolved.get("libfoo.so").unwrap().is_resolved());
    }

    #[test]
    fn test_missing_dump_directory_is_configuration_error() {
        let root = tempfile::tempdir().unwrap();
        let result = resolve_libraries(&root.path().join("28/arm"), &[]);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_iterate_files_lists_shallow_files_first() {
        let root = tempfile::tempdir().unwrap();
        touch(&root.path().join("b.so"));
        touch(&root.path().join("a/deep.so"));
        touch(&root.path().join("a.so"));

        let files = iterate_files(root.path());
        assert_eq!(
            files,
            vec![
                root.path().join("a.so"),
                root.path().join("b.so"),
                root.path().join("a/deep.so"),
            ]
        );
    }

    #[test]
    fn test_top_level_copy_shadows_nested_copy() {
        let dumps = tempfile::tempdir().unwrap();
        touch(&dumps.path().join("libfoo.so_symbol.dump"));

        let libs = tempfile::tempdir().unwrap();
        touch(&libs.path().join("hw/libfoo.so"));
        touch(&libs.path().join("libfoo.so"));

        let resolved = resolve_libraries(dumps.path(), &[libs.path().to_path_buf()]).unwrap();
        assert_eq!(
            resolved.get("libfoo.so").unwrap().library_path,
            Some(libs.path().join("libfoo.so"))
        );
    }

    /// Nest `depth` directories with long names under `parent` without ever
    /// naming a path longer than two components, by renaming the chain into
    /// a fresh parent at each step.
    #[cfg(target_os = "linux")]
    fn nest_past_path_max(parent: &Path, depth: usize) {
        let long = |i: usize| format!("{:0>200}", i);
        let mut top = long(0);
        fs::create_dir_all(parent.join(&top)).unwrap();
        for i in 1..depth {
            let next = long(i);
            fs::create_dir(parent.join(&next)).unwrap();
            fs::rename(parent.join(&top), parent.join(&next).join(&top)).unwrap();
            top = next;
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unreadable_subtree_is_skipped() {
        let dumps = tempfile::tempdir().unwrap();
        touch(&dumps.path().join("libfoo.so_symbol.dump"));
        touch(&dumps.path().join("libbar.so_symbol.dump"));

        let target = tempfile::tempdir().unwrap();
        let vendor = target.path().join("vendor/lib");
        let system = target.path().join("system/lib");
        touch(&vendor.join("libfoo.so"));
        touch(&system.join("libbar.so"));
        // 25 levels of 201 bytes each is past PATH_MAX
        nest_past_path_max(&system, 25);

        let resolved = resolve_libraries(dumps.path(), &[vendor.clone(), system.clone()]).unwrap();
        assert_eq!(
            resolved.get("libfoo.so").unwrap().library_path,
            Some(vendor.join("libfoo.so"))
        );
        assert_eq!(
            resolved.get("libbar.so").unwrap().library_path,
            Some(system.join("libbar.so"))
        );
        assert_eq!(resolved.unresolved().count(), 0);
    }
}
