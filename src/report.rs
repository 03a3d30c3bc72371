//! Structured diff report: typed change records plus summary counters.
//!
//! The report is the machine-readable face of a comparison. Each change is
//! one `DiffChange` with only the fields relevant to its category; the
//! summary is derived from the change list in a single pass so the two can
//! never disagree.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::compare::{SnapshotComparison, DEFAULT_CONTEXT_LINES};
use crate::vba::VbaModuleType;

/// What kind of thing changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    Sheet,
    Formula,
    ValueHardcoded,
    ValueEvaluated,
    Vba,
    Format,
    File,
}

/// How it changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Added,
    Removed,
    Modified,
}

/// One change record. Fields are populated per category and omitted from
/// the JSON when absent, so a formula change reads as
/// `{category, action, sheet, cell, old, new}` and nothing more.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffChange {
    pub category: ChangeCategory,
    pub action: ChangeAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_kind: Option<VbaModuleType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl DiffChange {
    fn new(category: ChangeCategory, action: ChangeAction) -> DiffChange {
        DiffChange {
            category,
            action,
            sheet: None,
            cell: None,
            old: None,
            new: None,
            old_name: None,
            new_name: None,
            module: None,
            module_kind: None,
            path: None,
            diff: None,
            note: None,
            details: None,
            count: None,
        }
    }
}

/// Fixed summary counters, one per change family.
///
/// `format_changes` counts *cells*, taken from the aggregate format
/// record's count, not the number of aggregate records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSummary {
    pub sheets_added: usize,
    pub sheets_removed: usize,
    pub formulas_changed: usize,
    pub values_hardcoded_changed: usize,
    pub values_evaluated_changed: usize,
    pub vba_modules_changed: usize,
    pub format_changes: usize,
    pub other_changes: usize,
}

impl ComparisonSummary {
    pub fn total(&self) -> usize {
        self.sheets_added
            + self.sheets_removed
            + self.formulas_changed
            + self.values_hardcoded_changed
            + self.values_evaluated_changed
            + self.vba_modules_changed
            + self.format_changes
            + self.other_changes
    }
}

/// The full structured report for one comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    pub changes: Vec<DiffChange>,
    pub summary: ComparisonSummary,
}

impl DiffReport {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Text sentinel for an unprintable VBA diff.
const BINARY_CHANGE: &str = "(binary change)";
/// Text sentinel for an unprintable generic file diff.
const BINARY_OR_LARGE_CHANGE: &str = "(binary or large change)";

/// Paths never reported as generic file changes: category files and VBA
/// modules are reported cell-by-cell (or in aggregate) above, and the
/// extraction log is run metadata that differs between any two runs.
const SKIP_PATTERNS: [&str; 6] = [
    ".formulas.txt",
    ".values_hardcoded.txt",
    ".values_evaluated.txt",
    ".cell_formats.txt",
    "vba/",
    "logs/",
];

/// Build the structured diff report for a snapshot comparison.
pub fn generate_diff(comparison: &SnapshotComparison) -> DiffReport {
    let mut changes = Vec::new();

    detect_sheet_changes(comparison, &mut changes);
    detect_tabular_changes(
        comparison,
        ".formulas.txt",
        ChangeCategory::Formula,
        None,
        &mut changes,
    );
    detect_tabular_changes(
        comparison,
        ".values_hardcoded.txt",
        ChangeCategory::ValueHardcoded,
        None,
        &mut changes,
    );
    detect_tabular_changes(
        comparison,
        ".values_evaluated.txt",
        ChangeCategory::ValueEvaluated,
        Some("cached"),
        &mut changes,
    );
    detect_vba_changes(comparison, &mut changes);
    detect_format_changes(comparison, &mut changes);
    detect_file_changes(comparison, &mut changes);

    let summary = summarize(&changes);
    DiffReport { changes, summary }
}

/// Sheet adds and removals, by manifest name sets. Without both manifests
/// there is nothing authoritative to compare, so nothing is reported here;
/// the category files still surface the content differences.
fn detect_sheet_changes(comparison: &SnapshotComparison, changes: &mut Vec<DiffChange>) {
    let (Some(manifest_a), Some(manifest_b)) = (comparison.manifest_a(), comparison.manifest_b())
    else {
        return;
    };

    let names_a: BTreeSet<&str> = manifest_a.sheet_names().into_iter().collect();
    let names_b: BTreeSet<&str> = manifest_b.sheet_names().into_iter().collect();

    for name in names_b.difference(&names_a) {
        let mut change = DiffChange::new(ChangeCategory::Sheet, ChangeAction::Added);
        change.new_name = Some((*name).to_string());
        change.details = sheet_details(manifest_b, name);
        changes.push(change);
    }
    for name in names_a.difference(&names_b) {
        let mut change = DiffChange::new(ChangeCategory::Sheet, ChangeAction::Removed);
        change.old_name = Some((*name).to_string());
        change.details = sheet_details(manifest_a, name);
        changes.push(change);
    }
}

fn sheet_details(manifest: &crate::manifest::Manifest, name: &str) -> Option<serde_json::Value> {
    manifest
        .sheets
        .iter()
        .find(|s| s.name == name)
        .and_then(|s| serde_json::to_value(s).ok())
}

/// One change record per changed cell key, across every category file
/// matching `suffix` in either snapshot.
fn detect_tabular_changes(
    comparison: &SnapshotComparison,
    suffix: &str,
    category: ChangeCategory,
    note: Option<&str>,
    changes: &mut Vec<DiffChange>,
) {
    for file_path in matching_files(comparison, suffix) {
        let sheet_name = extract_sheet_name(&file_path);
        let delta = comparison.compare_tabular(&file_path);

        for (cell, value) in delta.added {
            let mut change = DiffChange::new(category, ChangeAction::Added);
            change.sheet = Some(sheet_name.clone());
            change.cell = Some(cell);
            change.new = Some(value);
            change.note = note.map(str::to_string);
            changes.push(change);
        }
        for (cell, value) in delta.removed {
            let mut change = DiffChange::new(category, ChangeAction::Removed);
            change.sheet = Some(sheet_name.clone());
            change.cell = Some(cell);
            change.old = Some(value);
            change.note = note.map(str::to_string);
            changes.push(change);
        }
        for (cell, old, new) in delta.modified {
            let mut change = DiffChange::new(category, ChangeAction::Modified);
            change.sheet = Some(sheet_name.clone());
            change.cell = Some(cell);
            change.old = Some(old);
            change.new = Some(new);
            change.note = note.map(str::to_string);
            changes.push(change);
        }
    }
}

/// VBA module add/remove/modify under `vba/`, classified by hash; modified
/// modules carry a unified diff when one can be printed.
fn detect_vba_changes(comparison: &SnapshotComparison, changes: &mut Vec<DiffChange>) {
    let is_module = |path: &str| path.starts_with("vba/") && VbaModuleType::from_path(path).is_some();

    let paths: BTreeSet<String> = comparison
        .inventory_a()
        .keys()
        .chain(comparison.inventory_b().keys())
        .filter(|p| is_module(p))
        .cloned()
        .collect();

    for path in paths {
        let module_name = module_stem(&path);
        let hash_a = comparison.inventory_a().get(&path);
        let hash_b = comparison.inventory_b().get(&path);

        let action = match (hash_a, hash_b) {
            (None, Some(_)) => ChangeAction::Added,
            (Some(_), None) => ChangeAction::Removed,
            (Some(a), Some(b)) if a != b => ChangeAction::Modified,
            _ => continue,
        };

        let mut change = DiffChange::new(ChangeCategory::Vba, action);
        change.module = Some(module_name);
        change.module_kind = VbaModuleType::from_path(&path);
        if action == ChangeAction::Modified {
            change.diff = Some(
                comparison
                    .file_diff(&path, DEFAULT_CONTEXT_LINES)
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| BINARY_CHANGE.to_string()),
            );
        }
        changes.push(change);
    }
}

/// A single aggregate record for all format churn. Per-cell format records
/// would dwarf the content changes they accompany.
fn detect_format_changes(comparison: &SnapshotComparison, changes: &mut Vec<DiffChange>) {
    let mut total = 0usize;
    for file_path in matching_files(comparison, ".cell_formats.txt") {
        total += comparison.compare_tabular(&file_path).total();
    }

    if total > 0 {
        let mut change = DiffChange::new(ChangeCategory::Format, ChangeAction::Modified);
        change.count = Some(total);
        change.details = Some(serde_json::Value::String(format!(
            "{total} cell format changes across all sheets"
        )));
        changes.push(change);
    }
}

/// Generic records for modified files not already covered cell-by-cell
/// (merged ranges, validations, comments, workbook structure, ...).
fn detect_file_changes(comparison: &SnapshotComparison, changes: &mut Vec<DiffChange>) {
    for path in comparison.changed_files().modified {
        if SKIP_PATTERNS.iter().any(|p| path.contains(p)) {
            continue;
        }

        let mut change = DiffChange::new(ChangeCategory::File, ChangeAction::Modified);
        change.diff = Some(
            comparison
                .file_diff(&path, DEFAULT_CONTEXT_LINES)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| BINARY_OR_LARGE_CHANGE.to_string()),
        );
        change.path = Some(path);
        changes.push(change);
    }
}

fn summarize(changes: &[DiffChange]) -> ComparisonSummary {
    let mut summary = ComparisonSummary::default();
    for change in changes {
        match change.category {
            ChangeCategory::Sheet => match change.action {
                ChangeAction::Added => summary.sheets_added += 1,
                ChangeAction::Removed => summary.sheets_removed += 1,
                ChangeAction::Modified => summary.other_changes += 1,
            },
            ChangeCategory::Formula => summary.formulas_changed += 1,
            ChangeCategory::ValueHardcoded => summary.values_hardcoded_changed += 1,
            ChangeCategory::ValueEvaluated => summary.values_evaluated_changed += 1,
            ChangeCategory::Vba => summary.vba_modules_changed += 1,
            ChangeCategory::Format => summary.format_changes += change.count.unwrap_or(1),
            ChangeCategory::File => summary.other_changes += 1,
        }
    }
    summary
}

/// Sorted union of inventory paths containing `suffix`.
fn matching_files(comparison: &SnapshotComparison, suffix: &str) -> Vec<String> {
    comparison
        .inventory_a()
        .keys()
        .chain(comparison.inventory_b().keys())
        .filter(|p| p.contains(suffix))
        .cloned()
        .collect::<BTreeSet<String>>()
        .into_iter()
        .collect()
}

/// Sheet name from the `NN.SheetName.<suffix>` filename convention;
/// unconventional names fall back to the whole filename.
fn extract_sheet_name(file_path: &str) -> String {
    let file_name = file_path.rsplit('/').next().unwrap_or(file_path);
    let parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() >= 3 {
        parts[1].to_string()
    } else {
        file_name.to_string()
    }
}

fn module_stem(path: &str) -> String {
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem.to_string())
        .unwrap_or_else(|| file_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_names_extracted_from_convention() {
        assert_eq!(
            extract_sheet_name("sheets/01.Revenue.formulas.txt"),
            "Revenue"
        );
        assert_eq!(
            extract_sheet_name("sheets/12.Q1_Summary.values_hardcoded.txt"),
            "Q1_Summary"
        );
        assert_eq!(extract_sheet_name("sheets/odd_name.txt"), "odd_name.txt");
    }

    #[test]
    fn module_stems_drop_extension_only() {
        assert_eq!(module_stem("vba/Module1.bas"), "Module1");
        assert_eq!(module_stem("vba/CAccount.cls"), "CAccount");
    }

    #[test]
    fn summary_counts_format_cells_not_records() {
        let mut aggregate = DiffChange::new(ChangeCategory::Format, ChangeAction::Modified);
        aggregate.count = Some(7);
        let summary = summarize(&[aggregate]);
        assert_eq!(summary.format_changes, 7);
        assert_eq!(summary.total(), 7);
    }

    #[test]
    fn summary_buckets_by_category() {
        let changes = vec![
            DiffChange::new(ChangeCategory::Sheet, ChangeAction::Added),
            DiffChange::new(ChangeCategory::Formula, ChangeAction::Modified),
            DiffChange::new(ChangeCategory::Formula, ChangeAction::Added),
            DiffChange::new(ChangeCategory::ValueEvaluated, ChangeAction::Removed),
            DiffChange::new(ChangeCategory::Vba, ChangeAction::Modified),
            DiffChange::new(ChangeCategory::File, ChangeAction::Modified),
        ];
        let summary = summarize(&changes);
        assert_eq!(summary.sheets_added, 1);
        assert_eq!(summary.formulas_changed, 2);
        assert_eq!(summary.values_evaluated_changed, 1);
        assert_eq!(summary.vba_modules_changed, 1);
        assert_eq!(summary.other_changes, 1);
        assert_eq!(summary.values_hardcoded_changed, 0);
    }

    #[test]
    fn optional_fields_absent_from_json() {
        let mut change = DiffChange::new(ChangeCategory::Formula, ChangeAction::Modified);
        change.sheet = Some("Data".into());
        change.cell = Some("B2".into());
        change.old = Some("=SUM(A1:A2)".into());
        change.new = Some("=SUM(A1:A3)".into());

        let json = serde_json::to_value(&change).expect("serialize");
        let object = json.as_object().expect("object");
        assert_eq!(object["category"], "formula");
        assert_eq!(object["action"], "modified");
        assert!(!object.contains_key("module"));
        assert!(!object.contains_key("note"));
        assert!(!object.contains_key("diff"));
        assert_eq!(object.len(), 6);
    }
}
