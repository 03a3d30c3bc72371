//! The snapshot manifest: sheet inventory, file index, warnings, provenance.
//!
//! The manifest JSON is the one binary-stable contract other tooling reads;
//! field names and the `files` sort order must not change. Determinism is
//! the entire point: two extraction runs over byte-identical inputs (with a
//! pinned timestamp) must produce byte-identical manifests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

use crate::hashing::sha256_file;

/// Filename of the manifest inside a snapshot root.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Version stamp written into every manifest.
pub const EXTRACTOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One sheet in the workbook's own order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetInfo {
    /// 1-based position. Positional, not stable across structural edits:
    /// sheet reordering is a legitimate, detectable change.
    pub index: u32,
    /// Human-readable name, verbatim.
    pub name: String,
    /// The workbook's internal sheet id.
    #[serde(rename = "sheetId")]
    pub sheet_id: u32,
    pub visible: bool,
}

/// One extracted file: snapshot-relative path (forward slashes) and digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub sha256: String,
}

/// Where the workbook came from, when the caller knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_commit_message: Option<String>,
}

impl Origin {
    pub fn is_empty(&self) -> bool {
        self.origin_repo.is_none()
            && self.origin_path.is_none()
            && self.origin_commit.is_none()
            && self.origin_commit_message.is_none()
    }
}

/// Errors from manifest persistence.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("[BOOKFLAT_MAN_001] failed to read or write manifest: {0}. Suggestion: check the snapshot directory permissions.")]
    Io(#[from] io::Error),
    #[error("[BOOKFLAT_MAN_002] manifest is not valid JSON: {0}. Suggestion: re-extract the snapshot; comparison falls back to re-hashing without one.")]
    Json(#[from] serde_json::Error),
}

/// Per-snapshot metadata and file index.
///
/// The manifest is an index, not a cache: every file present under the
/// snapshot root appears exactly once, and comparison tolerates its absence
/// entirely (falling back to a directory re-hash).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub workbook_filename: String,
    pub original_sha256: String,
    pub extracted_at: String,
    pub extractor_version: String,
    pub include_evaluated: bool,
    #[serde(default)]
    pub sheets: Vec<SheetInfo>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,
}

impl Manifest {
    pub fn new(
        workbook_filename: impl Into<String>,
        original_sha256: impl Into<String>,
        include_evaluated: bool,
        extracted_at: DateTime<Utc>,
    ) -> Manifest {
        Manifest {
            workbook_filename: workbook_filename.into(),
            original_sha256: original_sha256.into(),
            extracted_at: extracted_at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            extractor_version: EXTRACTOR_VERSION.to_string(),
            include_evaluated,
            sheets: Vec::new(),
            files: Vec::new(),
            warnings: Vec::new(),
            origin: None,
        }
    }

    pub fn add_sheet(&mut self, index: u32, name: impl Into<String>, sheet_id: u32, visible: bool) {
        self.sheets.push(SheetInfo {
            index,
            name: name.into(),
            sheet_id,
            visible,
        });
    }

    /// Hash a file and record it under its snapshot-relative path.
    ///
    /// A missing file becomes a warning, not an error: one lost category
    /// file must not abort the snapshot.
    pub fn add_file(&mut self, file_path: &Path, snapshot_root: &Path) {
        if !file_path.is_file() {
            log::warn!("file not found, skipping from manifest: {}", file_path.display());
            self.add_warning(format!(
                "file not found, skipped from manifest: {}",
                file_path.display()
            ));
            return;
        }

        let relative = match file_path.strip_prefix(snapshot_root) {
            Ok(rel) => rel,
            Err(_) => {
                self.add_warning(format!(
                    "file outside snapshot root, skipped from manifest: {}",
                    file_path.display()
                ));
                return;
            }
        };

        match sha256_file(file_path) {
            Ok(sha256) => {
                let path = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                self.files.push(FileEntry { path, sha256 });
            }
            Err(e) => {
                self.add_warning(format!(
                    "failed to hash file for manifest: {}: {e}",
                    file_path.display()
                ));
            }
        }
    }

    /// Record a warning once; duplicates are dropped.
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        if !self.warnings.contains(&warning) {
            log::warn!("manifest warning: {warning}");
            self.warnings.push(warning);
        }
    }

    pub fn set_origin(&mut self, origin: Origin) {
        if !origin.is_empty() {
            self.origin = Some(origin);
        }
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Sort and dedup the file index by path. Serialization always goes
    /// through this, so emitted manifests are deterministic.
    pub fn normalize_files(&mut self) {
        self.files.sort_by(|a, b| a.path.cmp(&b.path));
        self.files.dedup_by(|a, b| a.path == b.path);
    }

    /// Serialize to the on-disk JSON form (pretty-printed, sorted files).
    pub fn to_json(&self) -> Result<String, ManifestError> {
        let mut normalized = self.clone();
        normalized.normalize_files();
        Ok(serde_json::to_string_pretty(&normalized)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        log::debug!("saved manifest to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// Deterministic snapshot root directory name:
/// `<stem>-snapshot-<YYYYMMDDTHHMMSSZ>-<hash8>`.
pub fn snapshot_root_name(filename: &str, timestamp: DateTime<Utc>, file_hash: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    // Char-wise truncation: the hash is hex in practice, but a stray
    // multi-byte input must not panic on a byte boundary.
    let short_hash: String = file_hash.chars().take(8).collect();
    format!(
        "{stem}-snapshot-{}-{short_hash}",
        timestamp.format("%Y%m%dT%H%M%SZ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 27, 12, 0, 0).unwrap()
    }

    #[test]
    fn warnings_are_idempotent() {
        let mut manifest = Manifest::new("book.xlsx", "abc", false, fixed_time());
        manifest.add_warning("same thing");
        manifest.add_warning("same thing");
        manifest.add_warning("other thing");
        assert_eq!(manifest.warnings.len(), 2);
    }

    #[test]
    fn files_sorted_and_deduped_on_serialization() {
        let mut manifest = Manifest::new("book.xlsx", "abc", false, fixed_time());
        manifest.files.push(FileEntry {
            path: "sheets/02.B.formulas.txt".into(),
            sha256: "22".into(),
        });
        manifest.files.push(FileEntry {
            path: "sheets/01.A.formulas.txt".into(),
            sha256: "11".into(),
        });
        manifest.files.push(FileEntry {
            path: "sheets/01.A.formulas.txt".into(),
            sha256: "11".into(),
        });

        let json = manifest.to_json().expect("serialize");
        let parsed: Manifest = serde_json::from_str(&json).expect("parse back");
        assert_eq!(parsed.files.len(), 2);
        assert_eq!(parsed.files[0].path, "sheets/01.A.formulas.txt");
        assert_eq!(parsed.files[1].path, "sheets/02.B.formulas.txt");
    }

    #[test]
    fn missing_file_becomes_warning_not_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut manifest = Manifest::new("book.xlsx", "abc", false, fixed_time());
        manifest.add_file(&dir.path().join("not_there.txt"), dir.path());
        assert!(manifest.files.is_empty());
        assert_eq!(manifest.warnings.len(), 1);
        assert!(manifest.warnings[0].contains("not_there.txt"));
    }

    #[test]
    fn added_files_use_forward_slash_relative_paths() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sheets = dir.path().join("sheets");
        fs::create_dir_all(&sheets).expect("mkdir");
        let file = sheets.join("01.Data.formulas.txt");
        let mut f = fs::File::create(&file).expect("create");
        f.write_all(b"# Formulas\n").expect("write");

        let mut manifest = Manifest::new("book.xlsx", "abc", false, fixed_time());
        manifest.add_file(&file, dir.path());
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].path, "sheets/01.Data.formulas.txt");
        assert_eq!(manifest.files[0].sha256.len(), 64);
    }

    #[test]
    fn save_load_round_trips_exactly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut manifest = Manifest::new("book.xlsm", "deadbeef", true, fixed_time());
        manifest.add_sheet(1, "Sheet1", 1, true);
        manifest.add_sheet(2, "Hidden", 7, false);
        manifest.add_warning("something odd");
        manifest.set_origin(Origin {
            origin_repo: Some("ssh://repo".into()),
            origin_commit: Some("abc123".into()),
            ..Origin::default()
        });
        manifest.normalize_files();

        let path = dir.path().join(MANIFEST_FILE_NAME);
        manifest.save(&path).expect("save");
        let loaded = Manifest::load(&path).expect("load");
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn empty_origin_not_recorded() {
        let mut manifest = Manifest::new("book.xlsx", "abc", false, fixed_time());
        manifest.set_origin(Origin::default());
        assert!(manifest.origin.is_none());
        let json = manifest.to_json().expect("serialize");
        assert!(!json.contains("origin"));
    }

    #[test]
    fn snapshot_root_names_are_deterministic() {
        let name = snapshot_root_name("model v2.xlsm", fixed_time(), &"a".repeat(64));
        assert_eq!(name, "model v2-snapshot-20251027T120000Z-aaaaaaaa");
    }

    #[test]
    fn snapshot_root_names_truncate_on_char_boundaries() {
        // Not a real hash, but truncation must not panic mid-character.
        let name = snapshot_root_name("book.xlsx", fixed_time(), "αβγδεζηθικλ");
        assert_eq!(name, "book-snapshot-20251027T120000Z-αβγδεζηθ");
        let short = snapshot_root_name("book.xlsx", fixed_time(), "ab");
        assert_eq!(short, "book-snapshot-20251027T120000Z-ab");
    }
}
