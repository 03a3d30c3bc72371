//! Per-sheet category records and their on-disk text form.
//!
//! Each sheet flattens into one file per category, every file deterministic:
//! `#`-prefixed header lines, then `ADDRESS<TAB>VALUE` rows in ascending
//! address order. Within one category file addresses are unique (first
//! occurrence wins) so downstream diffing can treat the file as a map.

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use crate::addressing::AddressKey;
use crate::canonical::{canonicalize_color, canonicalize_formula};
use crate::source::{CellContent, CellRecord, SheetData};

/// An output category, one file per sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Formulas,
    ValuesHardcoded,
    ValuesEvaluated,
    CellFormats,
    MergedRanges,
    DataValidations,
    Comments,
}

impl Category {
    /// The keyed (`ADDRESS<TAB>VALUE`) categories, in emission order.
    pub const KEYED: [Category; 4] = [
        Category::Formulas,
        Category::ValuesHardcoded,
        Category::ValuesEvaluated,
        Category::CellFormats,
    ];

    /// Filename suffix for this category (`formulas.txt`, ...).
    pub fn file_suffix(&self) -> &'static str {
        match self {
            Category::Formulas => "formulas.txt",
            Category::ValuesHardcoded => "values_hardcoded.txt",
            Category::ValuesEvaluated => "values_evaluated.txt",
            Category::CellFormats => "cell_formats.txt",
            Category::MergedRanges => "merged_ranges.txt",
            Category::DataValidations => "data_validations.txt",
            Category::Comments => "comments.txt",
        }
    }

    /// Comment header written at the top of the category file.
    pub fn header(&self) -> &'static str {
        match self {
            Category::Formulas => "# Formulas\n# ADDRESS\tFORMULA\n\n",
            Category::ValuesHardcoded => {
                "# Hard-coded Values (non-formula cells only)\n# ADDRESS\tVALUE\n\n"
            }
            Category::ValuesEvaluated => {
                "# Evaluated Values (cached formula results; not recomputed)\n# ADDRESS\tVALUE\n\n"
            }
            Category::CellFormats => "# Cell Formats\n# ADDRESS\tFORMAT\n\n",
            Category::MergedRanges => "# Merged Ranges\n\n",
            Category::DataValidations => "# Data Validations\n# RANGE\tTYPE\tFORMULA\n\n",
            Category::Comments => "# Comments\n# ADDRESS\tAUTHOR|TEXT\n\n",
        }
    }
}

/// Ordering for the formulas file. Row-major is the canonical default;
/// column-major helps reviewing fill-across formula patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormulaOrder {
    #[default]
    RowMajor,
    ColumnMajor,
}

/// Sanitize a sheet name for filesystem use.
///
/// Anything outside alphanumerics and `-` acts as a separator; runs of
/// separators collapse to a single `_` and edges are trimmed. The verbatim
/// name survives in the manifest's `SheetInfo`, so nothing is lost.
pub fn sanitize_sheet_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for ch in name.chars() {
        if ch.is_alphanumeric() || ch == '-' {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    if out.is_empty() {
        "Sheet".to_string()
    } else {
        out
    }
}

/// File prefix for one sheet's category files: `NN.SafeName`.
pub fn sheet_file_prefix(index: u32, name: &str) -> String {
    format!("{:02}.{}", index, sanitize_sheet_name(name))
}

/// The extracted records of one sheet, ready to write.
#[derive(Debug, Clone, Default)]
pub struct SheetRecords {
    pub formulas: Vec<(String, String)>,
    pub values_hardcoded: Vec<(String, String)>,
    pub values_evaluated: Vec<(String, String)>,
    pub cell_formats: Vec<(String, String)>,
    pub merged_ranges: Vec<String>,
    /// `RANGE<TAB>TYPE<TAB>FORMULA` lines.
    pub validations: Vec<String>,
    pub comments: Vec<(String, String)>,
    /// Data-quality notes collected while building (unparseable addresses,
    /// duplicate keys); the extractor forwards these to the manifest.
    pub warnings: Vec<String>,
}

impl SheetRecords {
    /// The rows backing a keyed category. Unkeyed categories (merged
    /// ranges, validations) have no keyed rows and return an empty slice.
    pub fn keyed_rows(&self, category: Category) -> &[(String, String)] {
        match category {
            Category::Formulas => &self.formulas,
            Category::ValuesHardcoded => &self.values_hardcoded,
            Category::ValuesEvaluated => &self.values_evaluated,
            Category::CellFormats => &self.cell_formats,
            Category::Comments => &self.comments,
            Category::MergedRanges | Category::DataValidations => &[],
        }
    }
}

/// Build the category records for one sheet.
///
/// Formula cells land in `formulas`; non-empty literal cells in
/// `values_hardcoded`; when `include_evaluated` is set, cached formula
/// results (tagged `|cached`) and literal values land in `values_evaluated`.
/// Formats are recorded only for cells that deviate from defaults.
pub fn build_sheet_records(sheet: &SheetData, include_evaluated: bool) -> SheetRecords {
    let mut records = SheetRecords::default();

    for cell in &sheet.cells {
        let addr = cell.address.clone();

        match &cell.content {
            CellContent::Formula { text, cached } => {
                records
                    .formulas
                    .push((addr.clone(), canonicalize_formula(text)));
                if include_evaluated {
                    if let Some(value) = cached {
                        records
                            .values_evaluated
                            .push((addr.clone(), format!("{}|cached", value.canonical())));
                    }
                }
            }
            CellContent::Literal(value) => {
                let rendered = value.canonical();
                if !rendered.is_empty() {
                    records
                        .values_hardcoded
                        .push((addr.clone(), rendered.clone()));
                    if include_evaluated {
                        records.values_evaluated.push((addr.clone(), rendered));
                    }
                }
            }
        }

        if let Some(format_str) = describe_format(cell) {
            records.cell_formats.push((addr.clone(), format_str));
        }

        if let Some(comment) = &cell.comment {
            let text = comment.text.replace('\r', "").replace('\n', "\\n");
            records
                .comments
                .push((addr.clone(), format!("{}|{}", comment.author, text)));
        }
    }

    records.merged_ranges = sheet.merged_ranges.clone();
    records.merged_ranges.sort();

    let mut validations: Vec<(AddressKey, String)> = sheet
        .validations
        .iter()
        .map(|v| {
            let start = v.range.split(':').next().unwrap_or(&v.range);
            (
                AddressKey::from_address(start),
                format!("{}\t{}\t{}", v.range, v.rule_type, v.formula),
            )
        })
        .collect();
    validations.sort_by(|a, b| a.cmp(b));
    records.validations = validations.into_iter().map(|(_, line)| line).collect();

    for rows in [
        &mut records.formulas,
        &mut records.values_hardcoded,
        &mut records.values_evaluated,
        &mut records.cell_formats,
        &mut records.comments,
    ] {
        order_keyed_rows(rows, FormulaOrder::RowMajor, &sheet.name, &mut records.warnings);
    }

    records
}

/// Sort keyed rows into canonical order and drop duplicate addresses.
fn order_keyed_rows(
    rows: &mut Vec<(String, String)>,
    order: FormulaOrder,
    sheet_name: &str,
    warnings: &mut Vec<String>,
) {
    let mut keyed: Vec<(AddressKey, String, String)> = std::mem::take(rows)
        .into_iter()
        .map(|(addr, value)| (AddressKey::from_address(&addr), addr, value))
        .collect();

    for (key, addr, _) in &keyed {
        if key.is_unparsable() {
            let warning = format!("unparseable cell address '{addr}' in sheet '{sheet_name}'");
            if !warnings.contains(&warning) {
                warnings.push(warning);
            }
        }
    }

    match order {
        FormulaOrder::RowMajor => keyed.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1))),
        FormulaOrder::ColumnMajor => {
            keyed.sort_by(|a, b| a.0.cmp_column_major(&b.0).then_with(|| a.1.cmp(&b.1)))
        }
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(keyed.len());
    rows.extend(keyed.into_iter().filter_map(|(_, addr, value)| {
        if seen.insert(addr.clone()) {
            Some((addr, value))
        } else {
            None
        }
    }));
}

/// Re-sort the formulas list column-major, for the alternate ordering.
pub fn reorder_formulas(records: &mut SheetRecords, order: FormulaOrder) {
    if order == FormulaOrder::ColumnMajor {
        let mut scratch = Vec::new();
        order_keyed_rows(&mut records.formulas, order, "", &mut scratch);
    }
}

/// Describe a cell's formatting, or `None` when it matches defaults.
///
/// Default formatting must never appear in the output: diffs stay
/// proportional to actual styling changes.
fn describe_format(cell: &CellRecord) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();

    if let Some(nf) = &cell.number_format {
        if !nf.is_empty() && nf != "General" {
            parts.push(format!("number_format:{nf}"));
        }
    }

    if let Some(font) = &cell.font {
        if !font.is_default() {
            let mut font_parts: Vec<String> = Vec::new();
            if let Some(name) = &font.name {
                font_parts.push(format!("name={name}"));
            }
            if let Some(size) = font.size {
                font_parts.push(format!("size={size}"));
            }
            if font.bold {
                font_parts.push("bold".to_string());
            }
            if font.italic {
                font_parts.push("italic".to_string());
            }
            if let Some(color) = &font.color {
                font_parts.push(format!("color={}", canonicalize_color(color)));
            }
            parts.push(format!("font:{}", font_parts.join(",")));
        }
    }

    if let Some(fill) = &cell.fill {
        if !fill.pattern.is_empty() && fill.pattern != "none" {
            let mut fill_parts = vec![format!("pattern={}", fill.pattern)];
            if let Some(fg) = &fill.fg_color {
                fill_parts.push(format!("fgColor={}", canonicalize_color(fg)));
            }
            if let Some(bg) = &fill.bg_color {
                fill_parts.push(format!("bgColor={}", canonicalize_color(bg)));
            }
            parts.push(format!("fill:{}", fill_parts.join(",")));
        }
    }

    if let Some(align) = &cell.alignment {
        if !align.is_default() {
            let mut align_parts: Vec<String> = Vec::new();
            if let Some(h) = &align.horizontal {
                align_parts.push(format!("h={h}"));
            }
            if let Some(v) = &align.vertical {
                align_parts.push(format!("v={v}"));
            }
            if align.wrap_text {
                align_parts.push("wrap".to_string());
            }
            parts.push(format!("align:{}", align_parts.join(",")));
        }
    }

    if cell.border {
        parts.push("border:yes".to_string());
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("|"))
    }
}

/// Write a keyed category file: header, then `KEY<TAB>VALUE` lines.
pub fn write_keyed_file(
    path: &Path,
    category: Category,
    rows: &[(String, String)],
) -> io::Result<()> {
    let mut out = String::from(category.header());
    for (key, value) in rows {
        out.push_str(key);
        out.push('\t');
        out.push_str(value);
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())
}

/// Write an unkeyed category file: header, then one entry per line.
pub fn write_list_file(path: &Path, category: Category, lines: &[String]) -> io::Result<()> {
    let mut out = String::from(category.header());
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    Ok(())
}
