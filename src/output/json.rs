//! JSON serialization of diff reports.

use crate::report::DiffReport;

/// Serialize a diff report to compact JSON.
pub fn serialize_report(report: &DiffReport) -> serde_json::Result<String> {
    serde_json::to_string(report)
}

/// Serialize a diff report to pretty-printed JSON, for human inspection
/// and stable fixture files.
pub fn serialize_report_pretty(report: &DiffReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}
