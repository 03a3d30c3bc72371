//! Typed records supplied by the spreadsheet-library collaborator.
//!
//! This crate never parses a workbook container itself. A [`WorkbookSource`]
//! yields sheets of already-typed cell records (plus any VBA module code),
//! and everything downstream consumes only this shape: canonicalization,
//! category files, and the manifest all read from here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::canonical::RawValue;
use crate::vba::VbaModule;

/// Content of one non-empty cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// A formula cell; `cached` is the engine's stored result, if any.
    /// This crate never evaluates formulas, so cached results are all it
    /// will ever report as "evaluated" values.
    Formula {
        text: String,
        cached: Option<RawValue>,
    },
    /// A literal (hardcoded) value.
    Literal(RawValue),
}

/// Font styling on a cell, present only when it deviates from defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FontDesc {
    pub name: Option<String>,
    pub size: Option<f64>,
    pub bold: bool,
    pub italic: bool,
    /// Color in any of the accepted raw forms (hex/ARGB/theme/indexed).
    pub color: Option<String>,
}

impl FontDesc {
    pub fn is_default(&self) -> bool {
        self.name.is_none()
            && self.size.is_none()
            && !self.bold
            && !self.italic
            && self.color.is_none()
    }
}

/// Fill styling on a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct FillDesc {
    pub pattern: String,
    pub fg_color: Option<String>,
    pub bg_color: Option<String>,
}

/// Alignment settings on a cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignmentDesc {
    pub horizontal: Option<String>,
    pub vertical: Option<String>,
    pub wrap_text: bool,
}

impl AlignmentDesc {
    pub fn is_default(&self) -> bool {
        self.horizontal.is_none() && self.vertical.is_none() && !self.wrap_text
    }
}

/// A threaded comment or note attached to a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentDesc {
    pub author: String,
    pub text: String,
}

/// One data-validation rule on a sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationDesc {
    /// Range the rule applies to (e.g., `B2:B100`).
    pub range: String,
    /// Rule type (`list`, `whole`, `decimal`, ...).
    pub rule_type: String,
    /// Primary rule formula, verbatim.
    pub formula: String,
}

/// One non-empty cell as delivered by the collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct CellRecord {
    /// A1-style address (e.g., `B2`).
    pub address: String,
    pub content: CellContent,
    /// Number format code; `None` or `"General"` means the default.
    pub number_format: Option<String>,
    pub font: Option<FontDesc>,
    pub fill: Option<FillDesc>,
    /// Whether any border edge carries a style.
    pub border: bool,
    pub alignment: Option<AlignmentDesc>,
    pub comment: Option<CommentDesc>,
}

impl CellRecord {
    /// A bare value cell with no styling, the common case in tests.
    pub fn literal(address: impl Into<String>, value: RawValue) -> CellRecord {
        CellRecord {
            address: address.into(),
            content: CellContent::Literal(value),
            number_format: None,
            font: None,
            fill: None,
            border: false,
            alignment: None,
            comment: None,
        }
    }

    /// A formula cell with an optional cached result.
    pub fn formula(
        address: impl Into<String>,
        text: impl Into<String>,
        cached: Option<RawValue>,
    ) -> CellRecord {
        CellRecord {
            address: address.into(),
            content: CellContent::Formula {
                text: text.into(),
                cached,
            },
            number_format: None,
            font: None,
            fill: None,
            border: false,
            alignment: None,
            comment: None,
        }
    }
}

/// Visibility state of a sheet tab.
///
/// `VeryHidden` is distinct from `Hidden`: it cannot be unhidden through
/// the normal UI, and a transition between the two is a real change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SheetState {
    #[default]
    Visible,
    Hidden,
    VeryHidden,
}

impl SheetState {
    pub fn is_visible(&self) -> bool {
        matches!(self, SheetState::Visible)
    }

    /// The state token as written into structure and metadata files.
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetState::Visible => "visible",
            SheetState::Hidden => "hidden",
            SheetState::VeryHidden => "veryHidden",
        }
    }
}

/// One sheet's worth of typed records.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetData {
    /// 1-based position in the workbook's own sheet order.
    pub index: u32,
    /// Human-readable name, stored verbatim in the manifest.
    pub name: String,
    /// The workbook's internal sheet id.
    pub sheet_id: u32,
    pub state: SheetState,
    /// Tab color in any of the accepted raw forms, when set.
    pub tab_color: Option<String>,
    /// Whether sheet protection is enabled.
    pub protected: bool,
    pub cells: Vec<CellRecord>,
    pub merged_ranges: Vec<String>,
    pub validations: Vec<ValidationDesc>,
}

/// Workbook-level document properties, as far as the collaborator knows
/// them. Everything is optional; absent fields write as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookProperties {
    pub author: Option<String>,
    pub last_modified_by: Option<String>,
    pub created: Option<NaiveDateTime>,
    pub modified: Option<NaiveDateTime>,
    pub title: Option<String>,
    pub subject: Option<String>,
    pub company: Option<String>,
    /// Calculation mode (`auto`, `manual`, ...). `None` means `auto`.
    pub calculation_mode: Option<String>,
}

/// A defined name (named range) in the workbook.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedName {
    pub name: String,
    /// Sheet the name is scoped to, or `Workbook` for global names.
    pub scope: String,
    /// The reference the name resolves to, verbatim.
    pub refers_to: String,
}

/// A workbook as seen by the extractor: typed sheets plus provenance.
pub trait WorkbookSource {
    /// Original workbook filename (e.g., `model.xlsm`).
    fn filename(&self) -> &str;

    /// SHA-256 of the original workbook bytes.
    fn content_hash(&self) -> &str;

    /// Sheets in workbook order.
    fn sheets(&self) -> &[SheetData];

    /// VBA modules, empty when the workbook carries none.
    fn vba_modules(&self) -> &[VbaModule] {
        &[]
    }

    /// Document properties, when the collaborator exposes them.
    fn properties(&self) -> Option<&WorkbookProperties> {
        None
    }

    /// Defined names (named ranges), empty when there are none.
    fn defined_names(&self) -> &[DefinedName] {
        &[]
    }
}

/// An in-memory [`WorkbookSource`], used by tests and by embedders that
/// already hold typed records.
#[derive(Debug, Clone, Default)]
pub struct MemoryWorkbook {
    pub filename: String,
    pub content_hash: String,
    pub sheets: Vec<SheetData>,
    pub vba_modules: Vec<VbaModule>,
    pub properties: Option<WorkbookProperties>,
    pub defined_names: Vec<DefinedName>,
}

impl MemoryWorkbook {
    pub fn new(filename: impl Into<String>, content_hash: impl Into<String>) -> MemoryWorkbook {
        MemoryWorkbook {
            filename: filename.into(),
            content_hash: content_hash.into(),
            sheets: Vec::new(),
            vba_modules: Vec::new(),
            properties: None,
            defined_names: Vec::new(),
        }
    }

    pub fn push_sheet(&mut self, name: impl Into<String>, cells: Vec<CellRecord>) -> &mut Self {
        let index = self.sheets.len() as u32 + 1;
        self.sheets.push(SheetData {
            index,
            name: name.into(),
            sheet_id: index,
            state: SheetState::Visible,
            tab_color: None,
            protected: false,
            cells,
            merged_ranges: Vec::new(),
            validations: Vec::new(),
        });
        self
    }
}

impl WorkbookSource for MemoryWorkbook {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn content_hash(&self) -> &str {
        &self.content_hash
    }

    fn sheets(&self) -> &[SheetData] {
        &self.sheets
    }

    fn vba_modules(&self) -> &[VbaModule] {
        &self.vba_modules
    }

    fn properties(&self) -> Option<&WorkbookProperties> {
        self.properties.as_ref()
    }

    fn defined_names(&self) -> &[DefinedName] {
        &self.defined_names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sheet_states_map_to_file_tokens() {
        assert_eq!(SheetState::Visible.as_str(), "visible");
        assert_eq!(SheetState::Hidden.as_str(), "hidden");
        assert_eq!(SheetState::VeryHidden.as_str(), "veryHidden");
        assert!(SheetState::Visible.is_visible());
        assert!(!SheetState::VeryHidden.is_visible());
    }
}
