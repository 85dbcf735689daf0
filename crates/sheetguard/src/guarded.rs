//! Guarded writer: validate first, write only on success

use std::path::Path;

use log::debug;
use sheetguard_core::CellAddress;

use crate::error::{GuardError, GuardResult};
use crate::options::GuardOptions;
use crate::result::{ScalarValue, ValidationResult};
use crate::semantic::evaluate_formula;
use crate::snapshot::{sheet_names, WorkbookSnapshot};
use crate::store::{CellContent, WorkbookStore, XlsxStore};
use crate::syntax::check_syntax;

/// A formula that passed both checks, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Validated {
    /// The sheet name as the workbook spells it
    pub sheet: String,
    pub address: CellAddress,
    /// Normalized formula, with a leading `=`
    pub formula: String,
    pub value: Option<ScalarValue>,
}

/// Runs the syntax checker, then the semantic evaluator, then writes.
///
/// ```no_run
/// use sheetguard::GuardedWriter;
///
/// let result = GuardedWriter::new()
///     .write_and_evaluate_formula("report.xlsx", "Summary", "B2", "=SUM(Raw_Orders!C:C)")
///     .unwrap();
/// println!("{}", result.to_json().unwrap());
/// ```
#[derive(Debug, Clone, Default)]
pub struct GuardedWriter<S = XlsxStore> {
    store: S,
    options: GuardOptions,
}

impl GuardedWriter<XlsxStore> {
    /// A writer for `.xlsx` files with default options
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: GuardOptions) -> Self {
        Self {
            store: XlsxStore,
            options,
        }
    }
}

impl<S: WorkbookStore> GuardedWriter<S> {
    /// A writer backed by another store
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            options: GuardOptions::default(),
        }
    }

    /// Replace the options
    pub fn options(mut self, options: GuardOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate without writing.
    ///
    /// Returns the same result a write would, but leaves the file alone.
    pub fn check<P: AsRef<Path>>(
        &self,
        path: P,
        sheet: &str,
        cell: &str,
        formula: &str,
    ) -> GuardResult<ValidationResult> {
        Ok(match self.validate(path.as_ref(), sheet, cell, formula)? {
            Ok(validated) => ValidationResult::ok(validated.value),
            Err(failed) => failed,
        })
    }

    /// Validate `formula` against the workbook at `path` and write it to
    /// `sheet!cell` only if it passes.
    ///
    /// A rejected formula is an `Ok` result with `success == false`; errors
    /// are reserved for a missing file, an unknown sheet, a bad cell address
    /// and I/O failures.
    pub fn write_and_evaluate_formula<P: AsRef<Path>>(
        &self,
        path: P,
        sheet: &str,
        cell: &str,
        formula: &str,
    ) -> GuardResult<ValidationResult> {
        let path = path.as_ref();
        let validated = match self.validate(path, sheet, cell, formula)? {
            Ok(validated) => validated,
            Err(failed) => return Ok(failed),
        };

        self.store.write_cell(
            path,
            &validated.sheet,
            validated.address,
            CellContent::Formula(validated.formula),
        )?;
        Ok(ValidationResult::ok(validated.value))
    }

    /// The outer `Result` carries caller errors, the inner one the verdict
    pub(crate) fn validate(
        &self,
        path: &Path,
        sheet: &str,
        cell: &str,
        formula: &str,
    ) -> GuardResult<Result<Validated, ValidationResult>> {
        let snapshot = self.store.load_snapshot(path)?;
        let sheet = resolve_sheet(&snapshot, sheet)?;
        let address = parse_cell(cell)?;

        let formula = match check_syntax(formula, &sheet_names(&snapshot)) {
            Ok(normalized) => normalized,
            Err(rejection) => {
                debug!("syntax check rejected {}: {}", formula, rejection);
                return Ok(Err(rejection.into()));
            }
        };
        debug!("syntax check passed: {}", formula);

        match evaluate_formula(&formula, &sheet, address, &snapshot, &self.options) {
            Ok(value) => Ok(Ok(Validated {
                sheet,
                address,
                formula,
                value,
            })),
            Err(rejection) => {
                debug!("evaluation rejected {}: {}", formula, rejection);
                Ok(Err(rejection.into()))
            }
        }
    }
}

/// Validate and write a formula into an `.xlsx` file with default options
pub fn write_and_evaluate_formula<P: AsRef<Path>>(
    path: P,
    sheet: &str,
    cell: &str,
    formula: &str,
) -> GuardResult<ValidationResult> {
    GuardedWriter::new().write_and_evaluate_formula(path, sheet, cell, formula)
}

pub(crate) fn resolve_sheet(snapshot: &WorkbookSnapshot, sheet: &str) -> GuardResult<String> {
    snapshot
        .sheet(sheet)
        .map(|s| s.name.clone())
        .ok_or_else(|| GuardError::SheetNotFound {
            sheet: sheet.to_string(),
            available: sheet_names(snapshot).into_iter().map(str::to_string).collect(),
        })
}

/// Parse an A1 address, dropping `$` markers
pub(crate) fn parse_cell(cell: &str) -> GuardResult<CellAddress> {
    CellAddress::parse(cell)
        .map(|a| CellAddress::new(a.row, a.col))
        .map_err(|e| GuardError::InvalidCell(format!("'{}': {}", cell, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ErrorKind;
    use pretty_assertions::assert_eq;
    use sheetguard_core::{CellValue, Workbook};
    use sheetguard_xlsx::{XlsxReader, XlsxWriter};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn workbook_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("book.xlsx");
        let mut wb = Workbook::empty();
        let idx = wb.add_worksheet_with_name("Data").unwrap();
        let ws = wb.worksheet_mut(idx).unwrap();
        ws.set_cell_value("A1", 4.0).unwrap();
        ws.set_cell_value("A2", 6.0).unwrap();
        XlsxWriter::write_file(&wb, &path).unwrap();
        path
    }

    fn cell(path: &Path, address: &str) -> CellValue {
        XlsxReader::read_file(path)
            .unwrap()
            .worksheet_by_name("Data")
            .unwrap()
            .get_value(address)
            .unwrap()
    }

    #[test]
    fn test_parse_cell() {
        assert_eq!(parse_cell("$B$2").unwrap(), CellAddress::new(1, 1));
        assert!(matches!(parse_cell("2B"), Err(GuardError::InvalidCell(_))));
        assert!(matches!(parse_cell("XFE1"), Err(GuardError::InvalidCell(_))));
    }

    #[test]
    fn test_success_writes_normalized_formula() {
        let dir = TempDir::new().unwrap();
        let path = workbook_file(&dir);

        let result = GuardedWriter::new()
            .write_and_evaluate_formula(&path, "Data", "B1", "SUM(A1:A2)")
            .unwrap();

        assert_eq!(result, ValidationResult::ok(Some(ScalarValue::Number(10.0))));
        assert_eq!(cell(&path, "B1").formula_text(), Some("=SUM(A1:A2)"));
    }

    #[test]
    fn test_rejection_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = workbook_file(&dir);
        let before = std::fs::read(&path).unwrap();

        let result = write_and_evaluate_formula(&path, "Data", "B1", "=A1/0").unwrap();

        assert!(!result.success);
        assert_eq!(result.error, Some(ErrorKind::DivisionByZero));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_check_is_a_dry_run() {
        let dir = TempDir::new().unwrap();
        let path = workbook_file(&dir);
        let before = std::fs::read(&path).unwrap();

        let result = GuardedWriter::new().check(&path, "Data", "B1", "=A1*A2").unwrap();

        assert_eq!(result.value, Some(ScalarValue::Number(24.0)));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_caller_errors() {
        let dir = TempDir::new().unwrap();
        let path = workbook_file(&dir);
        let writer = GuardedWriter::new();

        match writer.write_and_evaluate_formula(&path, "Summary", "A1", "=1").unwrap_err() {
            GuardError::SheetNotFound { sheet, available } => {
                assert_eq!(sheet, "Summary");
                assert_eq!(available, vec!["Data".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            writer.write_and_evaluate_formula(&path, "Data", "A0", "=1"),
            Err(GuardError::InvalidCell(_))
        ));
        assert!(matches!(
            writer.write_and_evaluate_formula(dir.path().join("none.xlsx"), "Data", "A1", "=1"),
            Err(GuardError::FileNotFound(_))
        ));
    }

    #[test]
    fn test_precision_option() {
        let dir = TempDir::new().unwrap();
        let path = workbook_file(&dir);

        let result = GuardedWriter::with_options(GuardOptions::default().with_precision(3))
            .write_and_evaluate_formula(&path, "data", "C1", "=A1/A2")
            .unwrap();

        assert_eq!(result.value, Some(ScalarValue::Number(0.667)));
        assert_eq!(cell(&path, "C1").formula_text(), Some("=A1/A2"));
    }
}
