//! Snapshot writer: turns a [`WorkbookSource`] into an on-disk snapshot.
//!
//! Layout under the snapshot root:
//!
//! ```text
//! <stem>-snapshot-<timestamp>-<hash8>/
//!   manifest.json
//!   sheets/NN.SafeName.<category>.txt
//!   sheets/NN.SafeName.metadata.json
//!   vba/<Module>.<ext>          (or vba/no_vba.txt)
//!   workbook/metadata.txt
//!   workbook/structure.txt
//!   workbook/defined_names.txt
//!   logs/extraction.log
//! ```
//!
//! Sheet records build in parallel; everything that touches the manifest
//! happens on the calling thread, folding results in workbook sheet order
//! so two runs over the same input emit identical files.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::canonical::{canonicalize_boolean, canonicalize_color, canonicalize_date};
use crate::manifest::{snapshot_root_name, Manifest, ManifestError, Origin, MANIFEST_FILE_NAME};
use crate::record::{
    build_sheet_records, reorder_formulas, sheet_file_prefix, write_keyed_file, write_list_file,
    Category, FormulaOrder, SheetRecords,
};
use crate::source::{SheetData, WorkbookProperties, WorkbookSource};

/// Marker file written when the workbook carries no VBA project.
const NO_VBA_FILE: &str = "no_vba.txt";

/// Errors that abort an extraction. Per-file write failures do not appear
/// here; they degrade to manifest warnings.
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("[BOOKFLAT_EXT_001] failed to create snapshot directory {}: {source}. Suggestion: check the output path and its permissions.", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("[BOOKFLAT_EXT_002] failed to save snapshot manifest: {0}")]
    Manifest(#[from] ManifestError),
}

/// Knobs for one extraction run.
#[derive(Debug, Clone, Default)]
pub struct FlattenOptions {
    /// Emit the `values_evaluated` category (cached formula results only;
    /// nothing is recomputed).
    pub include_evaluated: bool,
    /// Ordering for the formulas file.
    pub formula_order: FormulaOrder,
    /// Provenance recorded in the manifest, when known.
    pub origin: Origin,
    /// Pin the extraction timestamp. `None` uses the current time; pinning
    /// it makes runs over byte-identical inputs byte-identical themselves.
    pub extracted_at: Option<DateTime<Utc>>,
}

/// Result of a successful extraction.
#[derive(Debug)]
pub struct FlattenOutcome {
    /// The snapshot root that was written.
    pub snapshot_dir: PathBuf,
    /// The manifest as saved into the snapshot.
    pub manifest: Manifest,
}

/// Flatten a workbook into a deterministic snapshot under `output_dir`.
///
/// The snapshot root is named from the workbook stem, the extraction
/// timestamp, and the first eight hash characters. Category files for all
/// sheets are written first, then the VBA area, then the workbook
/// structure file; the manifest indexes everything and is saved last.
pub fn flatten_workbook(
    source: &dyn WorkbookSource,
    output_dir: &Path,
    options: &FlattenOptions,
) -> Result<FlattenOutcome, FlattenError> {
    let timestamp = options.extracted_at.unwrap_or_else(Utc::now);
    let root_name = snapshot_root_name(source.filename(), timestamp, source.content_hash());
    let snapshot_dir = output_dir.join(root_name);

    let sheets_dir = snapshot_dir.join("sheets");
    let vba_dir = snapshot_dir.join("vba");
    let workbook_dir = snapshot_dir.join("workbook");
    let logs_dir = snapshot_dir.join("logs");
    for dir in [&sheets_dir, &vba_dir, &workbook_dir, &logs_dir] {
        fs::create_dir_all(dir).map_err(|source| FlattenError::CreateDir {
            path: dir.clone(),
            source,
        })?;
    }

    log::info!(
        "flattening {} into {}",
        source.filename(),
        snapshot_dir.display()
    );

    let mut manifest = Manifest::new(
        source.filename(),
        source.content_hash(),
        options.include_evaluated,
        timestamp,
    );
    manifest.set_origin(options.origin.clone());

    // Record building is pure per sheet; rayon preserves input order in
    // the collected vector, so the fold below stays in workbook order.
    let built: Vec<SheetRecords> = source
        .sheets()
        .par_iter()
        .map(|sheet| build_sheet_records(sheet, options.include_evaluated))
        .collect();

    for (sheet, mut records) in source.sheets().iter().zip(built) {
        reorder_formulas(&mut records, options.formula_order);
        manifest.add_sheet(
            sheet.index,
            sheet.name.clone(),
            sheet.sheet_id,
            sheet.state.is_visible(),
        );
        for warning in records.warnings.drain(..) {
            manifest.add_warning(warning);
        }
        write_sheet_files(
            &sheets_dir,
            sheet,
            &records,
            options.include_evaluated,
            &mut manifest,
        );
    }

    write_vba_area(source, &vba_dir, &mut manifest);
    write_metadata_file(source.properties(), &workbook_dir, &mut manifest);
    write_structure_file(source, &workbook_dir, &mut manifest);
    write_defined_names_file(source, &workbook_dir, &mut manifest);
    if let Err(e) = write_extraction_log(&manifest, &logs_dir) {
        manifest.add_warning(format!("failed to write extraction log: {e}"));
    }

    index_snapshot_files(&snapshot_dir, &mut manifest);
    manifest.save(&snapshot_dir.join(MANIFEST_FILE_NAME))?;

    log::info!("flattening complete: {}", snapshot_dir.display());
    Ok(FlattenOutcome {
        snapshot_dir,
        manifest,
    })
}

/// Per-sheet metadata sidecar, `NN.SafeName.metadata.json`.
#[derive(Serialize)]
struct SheetMetaFile<'a> {
    #[serde(rename = "sheetId")]
    sheet_id: u32,
    visible: bool,
    state: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tab_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    protection: Option<SheetProtection>,
}

#[derive(Serialize)]
struct SheetProtection {
    sheet_protected: bool,
}

/// Write one sheet's category files and its metadata sidecar. A failed
/// write becomes a manifest warning and the remaining files still go out.
fn write_sheet_files(
    sheets_dir: &Path,
    sheet: &SheetData,
    records: &SheetRecords,
    include_evaluated: bool,
    manifest: &mut Manifest,
) {
    let name = sheet.name.as_str();
    let prefix = sheet_file_prefix(sheet.index, name);
    let path_for = |category: Category| {
        sheets_dir.join(format!("{prefix}.{}", category.file_suffix()))
    };

    for category in Category::KEYED {
        if category == Category::ValuesEvaluated && !include_evaluated {
            continue;
        }
        if let Err(e) = write_keyed_file(&path_for(category), category, records.keyed_rows(category))
        {
            manifest.add_warning(format!(
                "failed to write {} for sheet '{name}': {e}",
                category.file_suffix()
            ));
        }
    }

    if let Err(e) = write_keyed_file(
        &path_for(Category::Comments),
        Category::Comments,
        records.keyed_rows(Category::Comments),
    ) {
        manifest.add_warning(format!("failed to write comments for sheet '{name}': {e}"));
    }

    let lists: [(Category, &[String]); 2] = [
        (Category::MergedRanges, &records.merged_ranges),
        (Category::DataValidations, &records.validations),
    ];
    for (category, lines) in lists {
        if let Err(e) = write_list_file(&path_for(category), category, lines) {
            manifest.add_warning(format!(
                "failed to write {} for sheet '{name}': {e}",
                category.file_suffix()
            ));
        }
    }

    let meta = SheetMetaFile {
        sheet_id: sheet.sheet_id,
        visible: sheet.state.is_visible(),
        state: sheet.state.as_str(),
        tab_color: sheet.tab_color.as_deref().map(canonicalize_color),
        protection: sheet.protected.then_some(SheetProtection {
            sheet_protected: true,
        }),
    };
    let meta_path = sheets_dir.join(format!("{prefix}.metadata.json"));
    let written = serde_json::to_string_pretty(&meta)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .and_then(|json| fs::write(&meta_path, json));
    if let Err(e) = written {
        manifest.add_warning(format!("failed to write metadata for sheet '{name}': {e}"));
    }
}

/// Write VBA module code files, or the `no_vba.txt` marker so an empty VBA
/// area is distinguishable from a failed one.
fn write_vba_area(source: &dyn WorkbookSource, vba_dir: &Path, manifest: &mut Manifest) {
    let modules = source.vba_modules();
    if modules.is_empty() {
        if let Err(e) = fs::write(
            vba_dir.join(NO_VBA_FILE),
            "# No VBA project found in this workbook\n",
        ) {
            manifest.add_warning(format!("failed to write VBA marker file: {e}"));
        }
        return;
    }

    for module in modules {
        let path = vba_dir.join(module.file_name());
        if let Err(e) = fs::write(&path, module.code.as_bytes()) {
            manifest.add_warning(format!(
                "failed to write VBA module '{}': {e}",
                module.name
            ));
        }
    }
}

/// Write the workbook document properties as `KEY: value` lines.
///
/// The line set is fixed and sorted so the file is byte-stable; date
/// fields appear only when the collaborator knows them.
fn write_metadata_file(
    properties: Option<&WorkbookProperties>,
    workbook_dir: &Path,
    manifest: &mut Manifest,
) {
    let default = WorkbookProperties::default();
    let props = properties.unwrap_or(&default);
    let text = |v: &Option<String>| v.clone().unwrap_or_default();

    let mut out = String::from("# Workbook Metadata\n# ==================\n\n");
    out.push_str(&format!("Author: {}\n", text(&props.author)));
    out.push_str(&format!(
        "Calculation Mode: {}\n",
        props.calculation_mode.as_deref().unwrap_or("auto")
    ));
    out.push_str(&format!("Company: {}\n", text(&props.company)));
    if let Some(created) = &props.created {
        out.push_str(&format!("Created: {}\n", canonicalize_date(created)));
    }
    out.push_str(&format!(
        "Last Modified By: {}\n",
        text(&props.last_modified_by)
    ));
    if let Some(modified) = &props.modified {
        out.push_str(&format!("Modified: {}\n", canonicalize_date(modified)));
    }
    out.push_str(&format!("Subject: {}\n", text(&props.subject)));
    out.push_str(&format!("Title: {}\n", text(&props.title)));

    if let Err(e) = fs::write(workbook_dir.join("metadata.txt"), out) {
        manifest.add_warning(format!("failed to write workbook metadata file: {e}"));
    }
}

/// Write the sheet inventory: index, verbatim name, id, visibility,
/// state token, canonicalized tab color (empty when unset).
fn write_structure_file(source: &dyn WorkbookSource, workbook_dir: &Path, manifest: &mut Manifest) {
    let mut out =
        String::from("# Sheet Structure\n# INDEX\tNAME\tSHEET_ID\tVISIBLE\tSTATE\tTAB_COLOR\n\n");
    for sheet in source.sheets() {
        let tab_color = sheet
            .tab_color
            .as_deref()
            .map(canonicalize_color)
            .unwrap_or_default();
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{}\n",
            sheet.index,
            sheet.name,
            sheet.sheet_id,
            canonicalize_boolean(sheet.state.is_visible()),
            sheet.state.as_str(),
            tab_color
        ));
    }
    if let Err(e) = fs::write(workbook_dir.join("structure.txt"), out) {
        manifest.add_warning(format!("failed to write workbook structure file: {e}"));
    }
}

/// Write defined names as `NAME<TAB>SCOPE<TAB>REFERS_TO`, sorted by
/// scope then name.
fn write_defined_names_file(
    source: &dyn WorkbookSource,
    workbook_dir: &Path,
    manifest: &mut Manifest,
) {
    let mut names: Vec<_> = source.defined_names().to_vec();
    names.sort_by(|a, b| (&a.scope, &a.name).cmp(&(&b.scope, &b.name)));

    let mut out = String::from("# Defined Names\n# NAME\tSCOPE\tREFERS_TO\n\n");
    for item in &names {
        out.push_str(&format!(
            "{}\t{}\t{}\n",
            item.name, item.scope, item.refers_to
        ));
    }
    if let Err(e) = fs::write(workbook_dir.join("defined_names.txt"), out) {
        manifest.add_warning(format!("failed to write defined names file: {e}"));
    }
}

/// Write a human-readable record of the run into `logs/extraction.log`.
///
/// The log repeats the manifest's run fields and warnings; it carries the
/// timestamp, so it differs between runs and is excluded from the diff
/// categorizer as run metadata.
fn write_extraction_log(manifest: &Manifest, logs_dir: &Path) -> io::Result<()> {
    let mut out = String::from("Extraction Log\n==============\n\n");
    out.push_str(&format!("Extracted at: {}\n", manifest.extracted_at));
    out.push_str(&format!(
        "Extractor version: {}\n",
        manifest.extractor_version
    ));
    out.push_str(&format!(
        "Include evaluated: {}\n\n",
        canonicalize_boolean(manifest.include_evaluated)
    ));

    if manifest.warnings.is_empty() {
        out.push_str("No warnings.\n");
    } else {
        out.push_str("Warnings:\n");
        for warning in &manifest.warnings {
            out.push_str(&format!("  - {warning}\n"));
        }
    }

    fs::write(logs_dir.join("extraction.log"), out)
}

/// Index every emitted file into the manifest. The manifest file itself is
/// excluded; it cannot contain its own hash.
fn index_snapshot_files(snapshot_dir: &Path, manifest: &mut Manifest) {
    for entry in WalkDir::new(snapshot_dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        if entry.file_name() == MANIFEST_FILE_NAME {
            continue;
        }
        manifest.add_file(entry.path(), snapshot_dir);
    }
}
