//! VBA module model.
//!
//! Module code arrives already extracted from the workbook container; this
//! crate only decides file naming for the snapshot's `vba/` area and infers
//! module kind back from the filename convention when diffing. Binary VBA
//! project parsing is a collaborator concern.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// The kind of VBA module contained in a macro-enabled workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VbaModuleType {
    /// A standard module (e.g., `Module1`).
    Standard,
    /// A class module.
    Class,
    /// A form module.
    Form,
    /// A document module (e.g., `ThisWorkbook`, sheet modules).
    Document,
}

impl VbaModuleType {
    /// File extension used when writing this module into a snapshot.
    pub fn extension(&self) -> &'static str {
        match self {
            VbaModuleType::Standard | VbaModuleType::Document => "bas",
            VbaModuleType::Class => "cls",
            VbaModuleType::Form => "frm",
        }
    }

    /// Infer the module kind from a snapshot path's extension.
    ///
    /// Returns `None` for paths outside the `.bas`/`.cls`/`.frm` convention.
    pub fn from_path(path: &str) -> Option<VbaModuleType> {
        match Path::new(path).extension()?.to_str()? {
            "bas" => Some(VbaModuleType::Standard),
            "cls" => Some(VbaModuleType::Class),
            "frm" => Some(VbaModuleType::Form),
            _ => None,
        }
    }
}

/// A VBA module extracted from a workbook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VbaModule {
    /// Module name as stored in the VBA project.
    pub name: String,
    /// Module kind (standard/class/form/document).
    pub module_type: VbaModuleType,
    /// Raw module source code.
    pub code: String,
}

impl VbaModule {
    /// Snapshot filename for this module (`Module1.bas`, `CSheet.cls`, ...).
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.name, self.module_type.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_round_trip_through_paths() {
        assert_eq!(
            VbaModuleType::from_path("vba/Module1.bas"),
            Some(VbaModuleType::Standard)
        );
        assert_eq!(
            VbaModuleType::from_path("vba/CAccount.cls"),
            Some(VbaModuleType::Class)
        );
        assert_eq!(
            VbaModuleType::from_path("vba/frmMain.frm"),
            Some(VbaModuleType::Form)
        );
        assert_eq!(VbaModuleType::from_path("vba/vbaProject.bin"), None);
        assert_eq!(VbaModuleType::from_path("vba/no_vba.txt"), None);
    }

    #[test]
    fn module_file_names_follow_convention() {
        let module = VbaModule {
            name: "ThisWorkbook".into(),
            module_type: VbaModuleType::Document,
            code: "Option Explicit\n".into(),
        };
        assert_eq!(module.file_name(), "ThisWorkbook.bas");
    }
}
