//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use bookflat::{
    flatten_workbook, CellRecord, FlattenOptions, FlattenOutcome, MemoryWorkbook, RawValue,
    SnapshotComparison,
};
use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use tempfile::TempDir;

pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 27, 12, 0, 0).unwrap()
}

pub fn later_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 28, 12, 0, 0).unwrap()
}

pub fn pinned_options(at: DateTime<Utc>) -> FlattenOptions {
    FlattenOptions {
        extracted_at: Some(at),
        ..FlattenOptions::default()
    }
}

/// A minimal workbook: one sheet, a literal and a formula.
pub fn basic_workbook() -> MemoryWorkbook {
    workbook_with_cells(vec![
        CellRecord::literal("A1", RawValue::Number(10.0)),
        CellRecord::literal("A2", RawValue::Text("foo".into())),
        CellRecord::formula("B1", "=SUM(A1:A1)", Some(RawValue::Number(10.0))),
    ])
}

pub fn workbook_with_cells(cells: Vec<CellRecord>) -> MemoryWorkbook {
    let mut wb = MemoryWorkbook::new("model.xlsm", "cd".repeat(32));
    wb.push_sheet("Data", cells);
    wb
}

/// Flatten into a fresh tempdir; panics on failure so tests read cleanly.
pub fn flatten_to_tempdir(
    wb: &MemoryWorkbook,
    options: &FlattenOptions,
) -> (TempDir, FlattenOutcome) {
    let dir = tempfile::tempdir().expect("tempdir");
    let outcome = flatten_workbook(wb, dir.path(), options).expect("flatten should succeed");
    (dir, outcome)
}

pub fn compare_dirs(a: &Path, b: &Path) -> SnapshotComparison {
    SnapshotComparison::new(a, b).expect("comparison should open")
}
