//! Read-only view of a workbook taken at the start of a call

use std::collections::BTreeMap;

use sheetguard_core::{CellAddress, CellValue, Workbook};

/// One sheet's populated cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetSnapshot {
    pub name: String,
    pub cells: BTreeMap<CellAddress, CellValue>,
}

/// Every sheet of a workbook, in workbook order.
///
/// Formula cells are kept as formulas along with the cached value the
/// file carried, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkbookSnapshot {
    pub sheets: Vec<SheetSnapshot>,
    pub date_1904: bool,
}

impl WorkbookSnapshot {
    /// Copy the cells of `workbook`
    pub fn from_workbook(workbook: &Workbook) -> Self {
        let sheets = workbook
            .worksheets()
            .map(|ws| SheetSnapshot {
                name: ws.name().to_string(),
                cells: ws
                    .iter_cells()
                    .map(|(row, col, cell)| (CellAddress::new(row, col), cell.value.clone()))
                    .collect(),
            })
            .collect();

        Self {
            sheets,
            date_1904: workbook.settings().date_1904,
        }
    }

    /// Find a sheet; an exact match wins over a case-insensitive one
    pub fn sheet(&self, name: &str) -> Option<&SheetSnapshot> {
        self.sheets
            .iter()
            .find(|s| s.name == name)
            .or_else(|| self.sheets.iter().find(|s| s.name.eq_ignore_ascii_case(name)))
    }

    /// Total populated cells across all sheets
    pub fn cell_count(&self) -> usize {
        self.sheets.iter().map(|s| s.cells.len()).sum()
    }
}

/// Sheet names in workbook order
pub fn sheet_names(snapshot: &WorkbookSnapshot) -> Vec<&str> {
    snapshot.sheets.iter().map(|s| s.name.as_str()).collect()
}

/// The populated cells of `sheet`, or `None` if there is no such sheet
pub fn cell_values<'a>(
    snapshot: &'a WorkbookSnapshot,
    sheet: &str,
) -> Option<&'a BTreeMap<CellAddress, CellValue>> {
    snapshot.sheet(sheet).map(|s| &s.cells)
}
