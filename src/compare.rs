//! Folder-to-folder comparison of two flattened snapshots.
//!
//! Change detection is hash-first: inventories map snapshot-relative paths
//! to SHA-256 digests, taken from each snapshot's manifest when one is
//! present and readable, otherwise rebuilt by re-hashing the directory.
//! A missing manifest degrades the comparison, it never fails it.

use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::addressing::AddressKey;
use crate::hashing::sha256_file;
use crate::manifest::{Manifest, MANIFEST_FILE_NAME};
use crate::text_diff::unified_diff;

/// Default context window for line-based file diffs.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Errors from snapshot comparison. Only genuinely fatal conditions live
/// here; everything else degrades to a flagged, best-effort result.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("[BOOKFLAT_CMP_001] snapshot root does not exist: {}. Suggestion: check the path or re-run extraction.", path.display())]
    RootMissing { path: PathBuf },

    #[error("[BOOKFLAT_CMP_002] both snapshot roots are empty; nothing to compare. Suggestion: verify extraction produced category files.")]
    BothEmpty,
}

impl CompareError {
    pub fn code(&self) -> &'static str {
        match self {
            CompareError::RootMissing { .. } => "BOOKFLAT_CMP_001",
            CompareError::BothEmpty => "BOOKFLAT_CMP_002",
        }
    }
}

/// Path-level comparison outcome, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub modified: Vec<String>,
}

impl ChangedFiles {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Key-level delta of one tabular category file.
///
/// `added`/`removed` carry `(key, value)`; `modified` carries
/// `(key, old, new)`. Entries are sorted in canonical address order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabularDelta {
    pub added: Vec<(String, String)>,
    pub removed: Vec<(String, String)>,
    pub modified: Vec<(String, String, String)>,
}

impl TabularDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.modified.len()
    }
}

/// A comparison of two read-only snapshot directories.
#[derive(Debug)]
pub struct SnapshotComparison {
    root_a: PathBuf,
    root_b: PathBuf,
    manifest_a: Option<Manifest>,
    manifest_b: Option<Manifest>,
    files_a: BTreeMap<String, String>,
    files_b: BTreeMap<String, String>,
}

impl SnapshotComparison {
    /// Open a comparison between two snapshot roots.
    ///
    /// Fatal only when a root is missing or both inventories come up
    /// empty. A missing or corrupt manifest falls back to re-hashing the
    /// directory; the fallback is logged, not surfaced as an error.
    pub fn new(snapshot_a: &Path, snapshot_b: &Path) -> Result<SnapshotComparison, CompareError> {
        for root in [snapshot_a, snapshot_b] {
            if !root.is_dir() {
                return Err(CompareError::RootMissing {
                    path: root.to_path_buf(),
                });
            }
        }

        let manifest_a = load_manifest(snapshot_a);
        let manifest_b = load_manifest(snapshot_b);
        let files_a = build_inventory(snapshot_a, manifest_a.as_ref());
        let files_b = build_inventory(snapshot_b, manifest_b.as_ref());

        if files_a.is_empty() && files_b.is_empty() {
            return Err(CompareError::BothEmpty);
        }

        Ok(SnapshotComparison {
            root_a: snapshot_a.to_path_buf(),
            root_b: snapshot_b.to_path_buf(),
            manifest_a,
            manifest_b,
            files_a,
            files_b,
        })
    }

    pub fn manifest_a(&self) -> Option<&Manifest> {
        self.manifest_a.as_ref()
    }

    pub fn manifest_b(&self) -> Option<&Manifest> {
        self.manifest_b.as_ref()
    }

    /// Inventory of the old snapshot: relative path → SHA-256.
    pub fn inventory_a(&self) -> &BTreeMap<String, String> {
        &self.files_a
    }

    /// Inventory of the new snapshot: relative path → SHA-256.
    pub fn inventory_b(&self) -> &BTreeMap<String, String> {
        &self.files_b
    }

    /// Added/removed by path-set difference, modified by hash inequality.
    pub fn changed_files(&self) -> ChangedFiles {
        let mut changed = ChangedFiles::default();
        for (path, hash) in &self.files_b {
            match self.files_a.get(path) {
                None => changed.added.push(path.clone()),
                Some(old_hash) if old_hash != hash => changed.modified.push(path.clone()),
                Some(_) => {}
            }
        }
        for path in self.files_a.keys() {
            if !self.files_b.contains_key(path) {
                changed.removed.push(path.clone());
            }
        }
        // BTreeMap iteration already sorted added/modified; removed too.
        changed
    }

    /// Key-level three-way delta of one tabular file.
    ///
    /// Both versions are parsed into address→value maps, so line
    /// reordering and comment-only churn register nothing. A file absent
    /// on one side parses as empty, turning every key into an add/remove.
    pub fn compare_tabular(&self, relative_path: &str) -> TabularDelta {
        let content_a = parse_tabular(&self.root_a.join(relative_path));
        let content_b = parse_tabular(&self.root_b.join(relative_path));

        let mut delta = TabularDelta::default();
        for (key, value) in &content_b {
            match content_a.get(key) {
                None => delta.added.push((key.clone(), value.clone())),
                Some(old) if old != value => {
                    delta
                        .modified
                        .push((key.clone(), old.clone(), value.clone()))
                }
                Some(_) => {}
            }
        }
        for (key, value) in &content_a {
            if !content_b.contains_key(key) {
                delta.removed.push((key.clone(), value.clone()));
            }
        }

        sort_by_address(&mut delta.added, |e| &e.0);
        sort_by_address(&mut delta.removed, |e| &e.0);
        sort_by_address(&mut delta.modified, |e| &e.0);
        delta
    }

    /// Unified diff of one file present in both snapshots.
    ///
    /// Returns `None` when the file is absent on either side or looks
    /// binary; callers substitute the `(binary change)` sentinel.
    pub fn file_diff(&self, relative_path: &str, context_lines: usize) -> Option<String> {
        let path_a = self.root_a.join(relative_path);
        let path_b = self.root_b.join(relative_path);
        if !path_a.is_file() || !path_b.is_file() {
            return None;
        }

        let bytes_a = read_logged(&path_a)?;
        let bytes_b = read_logged(&path_b)?;
        if looks_binary(&bytes_a) || looks_binary(&bytes_b) {
            return None;
        }

        let text_a = String::from_utf8_lossy(&bytes_a);
        let text_b = String::from_utf8_lossy(&bytes_b);
        Some(unified_diff(
            &text_a,
            &text_b,
            &format!("a/{relative_path}"),
            &format!("b/{relative_path}"),
            context_lines,
        ))
    }

    /// Combined unified diff over all changed files, with `New file:` /
    /// `Deleted file:` markers for additions and removals.
    pub fn full_unified_diff(&self, context_lines: usize) -> String {
        let changed = self.changed_files();
        let mut parts: Vec<String> = Vec::new();

        for path in &changed.modified {
            match self.file_diff(path, context_lines) {
                Some(diff) if !diff.is_empty() => parts.push(diff),
                Some(_) => {}
                None => parts.push(format!("Binary change: {path}\n")),
            }
        }
        for path in &changed.added {
            parts.push(format!("New file: {path}\n"));
        }
        for path in &changed.removed {
            parts.push(format!("Deleted file: {path}\n"));
        }

        parts.join("\n")
    }
}

fn load_manifest(root: &Path) -> Option<Manifest> {
    let path = root.join(MANIFEST_FILE_NAME);
    if !path.is_file() {
        return None;
    }
    match Manifest::load(&path) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            log::warn!(
                "unreadable manifest at {}, falling back to directory re-hash: {e}",
                path.display()
            );
            None
        }
    }
}

/// Path → SHA-256 inventory, from the manifest when usable, otherwise by
/// walking and re-hashing the snapshot root. The manifest file itself is
/// never part of an inventory.
fn build_inventory(root: &Path, manifest: Option<&Manifest>) -> BTreeMap<String, String> {
    if let Some(manifest) = manifest {
        if !manifest.files.is_empty() {
            return manifest
                .files
                .iter()
                .filter(|f| f.path != MANIFEST_FILE_NAME)
                .map(|f| (f.path.clone(), f.sha256.clone()))
                .collect();
        }
    }

    let paths: Vec<(String, PathBuf)> = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel = entry.path().strip_prefix(root).ok()?;
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if rel == MANIFEST_FILE_NAME {
                None
            } else {
                Some((rel, entry.path().to_path_buf()))
            }
        })
        .collect();

    // Per-file hashing has no ordering dependency; parallelize freely.
    paths
        .into_par_iter()
        .filter_map(|(rel, path)| match sha256_file(&path) {
            Ok(hash) => Some((rel, hash)),
            Err(e) => {
                log::warn!("failed to hash {}: {e}", path.display());
                None
            }
        })
        .collect()
}

/// Parse a tabular category file into a key→value map.
///
/// `#`-prefixed lines are comments; data lines split on the first tab.
fn parse_tabular(path: &Path) -> BTreeMap<String, String> {
    let mut content = BTreeMap::new();
    let Ok(raw) = fs::read(path) else {
        return content;
    };
    let text = String::from_utf8_lossy(&raw);

    for line in text.lines() {
        if line.starts_with('#') || line.is_empty() {
            continue;
        }
        if let Some((key, value)) = line.split_once('\t') {
            content.insert(key.to_string(), value.to_string());
        }
    }
    content
}

fn sort_by_address<T>(entries: &mut [T], key: impl Fn(&T) -> &String) {
    entries.sort_by(|a, b| {
        let (ka, kb) = (key(a), key(b));
        AddressKey::from_address(ka)
            .cmp(&AddressKey::from_address(kb))
            .then_with(|| ka.cmp(kb))
    });
}

fn read_logged(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("failed to read {} for diffing: {e}", path.display());
            None
        }
    }
}

fn looks_binary(bytes: &[u8]) -> bool {
    bytes.contains(&0)
}
