//! The workbook collaborator: load a snapshot, write one cell

use std::path::{Path, PathBuf};

use log::{debug, info};
use sheetguard_core::{CellAddress, CellValue};
use sheetguard_xlsx::{CellPatch, XlsxError, XlsxPatcher, XlsxReader};

use crate::error::{GuardError, GuardResult};
use crate::result::ScalarValue;
use crate::snapshot::WorkbookSnapshot;

/// What to put in a cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellContent {
    /// Formula text; written with a leading `=`
    Formula(String),
    /// Plain value, written without validation
    Literal(ScalarValue),
}

impl CellContent {
    fn into_cell_value(self) -> CellValue {
        match self {
            CellContent::Formula(text) => CellValue::formula(normalize_formula(&text)),
            CellContent::Literal(value) => value.into(),
        }
    }
}

/// Trim and make sure the text starts with exactly one `=`
pub(crate) fn normalize_formula(text: &str) -> String {
    let text = text.trim();
    if text.starts_with('=') {
        text.to_string()
    } else {
        format!("={}", text)
    }
}

/// Storage behind the guarded writer.
///
/// Every call reopens the file; nothing is cached between calls.
pub trait WorkbookStore {
    /// Read every sheet and cell of the workbook at `path`
    fn load_snapshot(&self, path: &Path) -> GuardResult<WorkbookSnapshot>;

    /// Write one cell and save, returning the path written
    fn write_cell(
        &self,
        path: &Path,
        sheet: &str,
        address: CellAddress,
        content: CellContent,
    ) -> GuardResult<PathBuf>;
}

/// [`WorkbookStore`] for `.xlsx` files.
///
/// Writes patch the one worksheet part in place, so formatting and parts
/// the reader does not model survive the write.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxStore;

impl XlsxStore {
    pub fn new() -> Self {
        Self
    }
}

impl WorkbookStore for XlsxStore {
    fn load_snapshot(&self, path: &Path) -> GuardResult<WorkbookSnapshot> {
        if !path.exists() {
            return Err(GuardError::FileNotFound(path.to_path_buf()));
        }
        let workbook = XlsxReader::read_file(path).map_err(|e| map_xlsx_error(path, e))?;
        let snapshot = WorkbookSnapshot::from_workbook(&workbook);
        debug!(
            "loaded {}: {} sheet(s), {} cell(s)",
            path.display(),
            snapshot.sheets.len(),
            snapshot.cell_count()
        );
        Ok(snapshot)
    }

    fn write_cell(
        &self,
        path: &Path,
        sheet: &str,
        address: CellAddress,
        content: CellContent,
    ) -> GuardResult<PathBuf> {
        if !path.exists() {
            return Err(GuardError::FileNotFound(path.to_path_buf()));
        }
        let patch = CellPatch::new(sheet, address, content.into_cell_value());
        match XlsxPatcher::patch_file(path, std::slice::from_ref(&patch)) {
            Ok(()) => {
                info!("wrote {}!{} in {}", sheet, address.to_a1_string(), path.display());
                Ok(path.to_path_buf())
            }
            Err(XlsxError::SheetNotFound(name)) => Err(GuardError::SheetNotFound {
                sheet: name,
                available: available_sheets(path),
            }),
            Err(e) => Err(map_xlsx_error(path, e)),
        }
    }
}

fn available_sheets(path: &Path) -> Vec<String> {
    XlsxReader::read_file(path)
        .map(|wb| wb.sheet_names().into_iter().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Sort reader failures into caller-facing errors
fn map_xlsx_error(path: &Path, err: XlsxError) -> GuardError {
    match err {
        XlsxError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
            GuardError::FileNotFound(path.to_path_buf())
        }
        XlsxError::Io(e) => GuardError::Io(e),
        XlsxError::Zip(_)
        | XlsxError::Xml(_)
        | XlsxError::InvalidFormat(_)
        | XlsxError::MissingPart(_)
        | XlsxError::Parse(_) => GuardError::Format(format!("{}: {}", path.display(), err)),
        XlsxError::Core(e) => GuardError::Core(e),
        other => GuardError::Xlsx(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetguard_core::Workbook;
    use sheetguard_xlsx::XlsxWriter;
    use tempfile::TempDir;

    fn write_workbook(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("book.xlsx");
        let mut wb = Workbook::new();
        wb.worksheet_mut(0).unwrap().set_cell_value("A1", 5.0).unwrap();
        XlsxWriter::write_file(&wb, &path).unwrap();
        path
    }

    #[test]
    fn test_normalize_formula() {
        assert_eq!(normalize_formula("SUM(A1:A2)"), "=SUM(A1:A2)");
        assert_eq!(normalize_formula("  =A1 "), "=A1");
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.xlsx");
        assert!(matches!(
            XlsxStore.load_snapshot(&path),
            Err(GuardError::FileNotFound(p)) if p == path
        ));
        assert!(matches!(
            XlsxStore.write_cell(&path, "Sheet1", CellAddress::new(0, 0), CellContent::Formula("1".into())),
            Err(GuardError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_not_a_workbook_is_format_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.xlsx");
        std::fs::write(&path, "plain text").unwrap();
        assert!(matches!(XlsxStore.load_snapshot(&path), Err(GuardError::Format(_))));
    }

    #[test]
    fn test_write_formula_adds_marker() {
        let dir = TempDir::new().unwrap();
        let path = write_workbook(&dir);

        let written = XlsxStore
            .write_cell(&path, "Sheet1", CellAddress::new(0, 1), CellContent::Formula("A1*2".into()))
            .unwrap();
        assert_eq!(written, path);

        let snapshot = XlsxStore.load_snapshot(&path).unwrap();
        let cells = &snapshot.sheet("Sheet1").unwrap().cells;
        assert_eq!(cells[&CellAddress::new(0, 1)].formula_text(), Some("=A1*2"));
        assert_eq!(cells[&CellAddress::new(0, 0)], CellValue::Number(5.0));
    }

    #[test]
    fn test_write_literal() {
        let dir = TempDir::new().unwrap();
        let path = write_workbook(&dir);

        XlsxStore
            .write_cell(
                &path,
                "Sheet1",
                CellAddress::new(2, 0),
                CellContent::Literal(ScalarValue::Text("n/a".into())),
            )
            .unwrap();

        let snapshot = XlsxStore.load_snapshot(&path).unwrap();
        assert_eq!(
            snapshot.sheet("Sheet1").unwrap().cells[&CellAddress::new(2, 0)],
            CellValue::string("n/a")
        );
    }

    #[test]
    fn test_write_to_unknown_sheet_lists_available() {
        let dir = TempDir::new().unwrap();
        let path = write_workbook(&dir);

        let err = XlsxStore
            .write_cell(&path, "Data", CellAddress::new(0, 0), CellContent::Formula("=1".into()))
            .unwrap_err();
        match err {
            GuardError::SheetNotFound { sheet, available } => {
                assert_eq!(sheet, "Data");
                assert_eq!(available, vec!["Sheet1".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
