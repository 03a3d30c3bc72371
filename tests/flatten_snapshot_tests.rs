use bookflat::{CellRecord, FlattenOptions, FormulaOrder, Manifest, RawValue, MANIFEST_FILE_NAME};
use std::fs;

mod common;
use common::{basic_workbook, fixed_time, flatten_to_tempdir, pinned_options, workbook_with_cells};

#[test]
fn two_runs_over_the_same_workbook_are_byte_identical() {
    let wb = basic_workbook();
    let options = pinned_options(fixed_time());
    let (_dir_a, first) = flatten_to_tempdir(&wb, &options);
    let (_dir_b, second) = flatten_to_tempdir(&wb, &options);

    // Same inputs, same pinned timestamp: every file, manifest included,
    // must match byte for byte.
    for entry in &first.manifest.files {
        let bytes_a = fs::read(first.snapshot_dir.join(&entry.path)).expect("read a");
        let bytes_b = fs::read(second.snapshot_dir.join(&entry.path)).expect("read b");
        assert_eq!(bytes_a, bytes_b, "{} differs between runs", entry.path);
    }
    let manifest_a =
        fs::read_to_string(first.snapshot_dir.join(MANIFEST_FILE_NAME)).expect("read");
    let manifest_b =
        fs::read_to_string(second.snapshot_dir.join(MANIFEST_FILE_NAME)).expect("read");
    assert_eq!(manifest_a, manifest_b);
}

#[test]
fn manifest_describes_the_extraction() {
    let wb = basic_workbook();
    let (_dir, outcome) = flatten_to_tempdir(&wb, &pinned_options(fixed_time()));

    let loaded =
        Manifest::load(&outcome.snapshot_dir.join(MANIFEST_FILE_NAME)).expect("load manifest");
    assert_eq!(loaded.workbook_filename, "model.xlsm");
    assert_eq!(loaded.original_sha256, "cd".repeat(32));
    assert!(!loaded.include_evaluated);
    assert_eq!(loaded.sheet_names(), vec!["Data"]);
    assert_eq!(loaded.extracted_at, "2025-10-27T12:00:00.000000Z");
    assert!(loaded.files.iter().any(|f| f.path == "workbook/structure.txt"));
}

#[test]
fn cell_input_order_does_not_affect_output() {
    let cells = vec![
        CellRecord::literal("B2", RawValue::Number(4.0)),
        CellRecord::literal("A1", RawValue::Number(1.0)),
        CellRecord::literal("A2", RawValue::Number(3.0)),
        CellRecord::literal("B1", RawValue::Number(2.0)),
    ];
    let mut shuffled = cells.clone();
    shuffled.reverse();

    let options = pinned_options(fixed_time());
    let (_dir_a, first) = flatten_to_tempdir(&workbook_with_cells(cells), &options);
    let (_dir_b, second) = flatten_to_tempdir(&workbook_with_cells(shuffled), &options);

    let rel = "sheets/01.Data.values_hardcoded.txt";
    let values_a = fs::read_to_string(first.snapshot_dir.join(rel)).expect("read");
    let values_b = fs::read_to_string(second.snapshot_dir.join(rel)).expect("read");
    assert_eq!(values_a, values_b);
    assert_eq!(
        values_a,
        "# Hard-coded Values (non-formula cells only)\n# ADDRESS\tVALUE\n\n\
         A1\t1\nB1\t2\nA2\t3\nB2\t4\n"
    );
}

#[test]
fn column_major_ordering_applies_to_formulas_only() {
    let wb = workbook_with_cells(vec![
        CellRecord::formula("B1", "=1", None),
        CellRecord::formula("A2", "=2", None),
        CellRecord::literal("B2", RawValue::Number(9.0)),
        CellRecord::literal("A3", RawValue::Number(8.0)),
    ]);
    let options = FlattenOptions {
        formula_order: FormulaOrder::ColumnMajor,
        ..pinned_options(fixed_time())
    };
    let (_dir, outcome) = flatten_to_tempdir(&wb, &options);

    let formulas = fs::read_to_string(
        outcome.snapshot_dir.join("sheets/01.Data.formulas.txt"),
    )
    .expect("read");
    assert!(formulas.ends_with("A2\t=2\nB1\t=1\n"));

    let values = fs::read_to_string(
        outcome
            .snapshot_dir
            .join("sheets/01.Data.values_hardcoded.txt"),
    )
    .expect("read");
    // Values keep the canonical row-major order.
    assert!(values.ends_with("B2\t9\nA3\t8\n"));
}

#[test]
fn unparseable_addresses_surface_as_manifest_warnings() {
    let wb = workbook_with_cells(vec![
        CellRecord::literal("A1", RawValue::Number(1.0)),
        CellRecord::literal("bogus!!", RawValue::Number(2.0)),
    ]);
    let (_dir, outcome) = flatten_to_tempdir(&wb, &pinned_options(fixed_time()));

    assert_eq!(
        outcome.manifest.warnings,
        vec!["unparseable cell address 'bogus!!' in sheet 'Data'".to_string()]
    );
    // The cell still lands in the output, after all parsed addresses.
    let values = fs::read_to_string(
        outcome
            .snapshot_dir
            .join("sheets/01.Data.values_hardcoded.txt"),
    )
    .expect("read");
    assert!(values.ends_with("A1\t1\nbogus!!\t2\n"));
}
