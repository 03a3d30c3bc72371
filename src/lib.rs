//! Bookflat: deterministic workbook snapshots and structural diffs.
//!
//! This crate provides functionality for:
//! - Flattening a typed workbook into a deterministic text snapshot
//!   (canonical category files per sheet, VBA module code, a manifest
//!   with SHA-256 hashes of everything)
//! - Comparing two snapshots hash-first, then cell-by-cell
//! - Producing a structured, categorized diff report with summary counters
//!
//! It never parses a workbook container itself; a [`WorkbookSource`]
//! collaborator supplies already-typed sheets and VBA modules.
//!
//! # Quick Start
//!
//! ```ignore
//! use bookflat::{flatten_workbook, generate_diff, FlattenOptions, SnapshotComparison};
//!
//! let old = flatten_workbook(&workbook_v1, out_dir, &FlattenOptions::default())?;
//! let new = flatten_workbook(&workbook_v2, out_dir, &FlattenOptions::default())?;
//!
//! let comparison = SnapshotComparison::new(&old.snapshot_dir, &new.snapshot_dir)?;
//! let report = generate_diff(&comparison);
//! println!("{}", bookflat::output::json::serialize_report_pretty(&report)?);
//! ```

pub mod addressing;
pub mod canonical;
mod compare;
mod extract;
pub mod hashing;
mod manifest;
pub mod output;
mod record;
mod report;
mod source;
pub(crate) mod text_diff;
mod vba;

pub use compare::{
    ChangedFiles, CompareError, SnapshotComparison, TabularDelta, DEFAULT_CONTEXT_LINES,
};
pub use extract::{flatten_workbook, FlattenError, FlattenOptions, FlattenOutcome};
pub use manifest::{
    snapshot_root_name, FileEntry, Manifest, ManifestError, Origin, SheetInfo,
    EXTRACTOR_VERSION, MANIFEST_FILE_NAME,
};
pub use record::{
    build_sheet_records, sanitize_sheet_name, sheet_file_prefix, Category, FormulaOrder,
    SheetRecords,
};
pub use report::{
    generate_diff, ChangeAction, ChangeCategory, ComparisonSummary, DiffChange, DiffReport,
};
pub use source::{
    AlignmentDesc, CellContent, CellRecord, CommentDesc, DefinedName, FillDesc, FontDesc,
    MemoryWorkbook, SheetData, SheetState, ValidationDesc, WorkbookProperties, WorkbookSource,
};
pub use canonical::RawValue;
pub use vba::{VbaModule, VbaModuleType};
