//! Semantic evaluator: run a formula against a copy of the workbook

use lazy_regex::regex;
use log::debug;
use sheetguard_core::{CellAddress, Workbook};
use sheetguard_formula::functions::math::round_half_away;
use sheetguard_formula::{evaluate, parse_formula, CellKey, EvaluationContext, FormulaError, FormulaValue};

use crate::calculation::WorkbookCalculationExt;
use crate::classify::{classify, classify_error};
use crate::options::GuardOptions;
use crate::result::{ErrorKind, Rejection, ScalarValue};
use crate::snapshot::WorkbookSnapshot;
use crate::syntax::mask_strings;

/// The value the target cell would show (`None` for empty), or why it failed
pub type EvalOutcome = Result<Option<ScalarValue>, Rejection>;

/// Functions whose result can hide an error in one of their arguments
const ERROR_TRAPPING: &[&str] = &["IF", "IFS", "IFERROR", "IFNA", "ISERROR", "ISERR", "SWITCH", "CHOOSE"];

/// Evaluate `formula_text` as if it were stored at `target_sheet!target_cell`
pub fn evaluate_formula(
    formula_text: &str,
    target_sheet: &str,
    target_cell: CellAddress,
    snapshot: &WorkbookSnapshot,
    options: &GuardOptions,
) -> EvalOutcome {
    if has_literal_zero_divisor(formula_text) {
        return Err(Rejection::new(
            ErrorKind::DivisionByZero,
            "Division by zero: the formula divides by a literal 0",
        ));
    }

    let mut workbook = materialize(snapshot)?;
    let sheet_idx = workbook.sheet_index(target_sheet).ok_or_else(|| {
        Rejection::new(
            ErrorKind::ReferenceError,
            format!("Sheet '{}' not found", target_sheet),
        )
    })?;
    inject(&mut workbook, sheet_idx, target_cell, formula_text)?;

    let recalc = workbook.recalculate();
    let target = format!("{}!{}", target_sheet, target_cell.to_a1_string());
    if recalc.is_circular(CellKey::from_address(sheet_idx, &target_cell)) {
        return Err(Rejection::new(
            ErrorKind::ReferenceError,
            format!("Circular reference: {} depends on itself", target),
        ));
    }

    let expr = parse_formula(formula_text).map_err(|e| from_formula_error(&e))?;
    let ctx = EvaluationContext::new(Some(&workbook), sheet_idx, target_cell.row, target_cell.col);
    let value = evaluate(&expr, &ctx)
        .map_err(|e| from_formula_error(&e))?
        .into_scalar();
    debug!("{} evaluates to {:?}", target, value);

    match value {
        FormulaValue::Error(error) => Err(Rejection::new(
            classify_error(error),
            format!("Formula evaluates to {} at {}", error, target),
        )),
        FormulaValue::Number(n) if !n.is_finite() => Err(Rejection::new(
            ErrorKind::NumError,
            format!("Formula evaluates to a number too large to store at {}", target),
        )),
        FormulaValue::Number(n) => Ok(Some(ScalarValue::Number(round(n, options)))),
        FormulaValue::String(s) => Ok(Some(ScalarValue::Text(s))),
        FormulaValue::Boolean(b) => Ok(Some(ScalarValue::Boolean(b))),
        FormulaValue::Empty | FormulaValue::Array(_) => Ok(None),
    }
}

/// Whether the formula divides by a literal zero (`/0`, `/0.0`, `/(0)`)
/// outside any function that could trap the error
pub(crate) fn has_literal_zero_divisor(formula_text: &str) -> bool {
    let masked = mask_strings(formula_text).to_uppercase();
    let calls = regex!(r"([A-Z_][A-Z0-9_.]*)\s*\(");
    if calls
        .captures_iter(&masked)
        .any(|caps| ERROR_TRAPPING.contains(&&caps[1]))
    {
        return false;
    }

    let divisor = regex!(r"/\s*(?:\(\s*0+(?:\.0*)?\s*\)|0+(?:\.0*)?)");
    divisor.find_iter(&masked).any(|m| {
        masked[m.end()..]
            .chars()
            .next()
            .map_or(true, |c| !(c.is_alphanumeric() || matches!(c, '.' | '_' | '(' | ':' | '!')))
    })
}

/// Build a workbook holding every cell of the snapshot
fn materialize(snapshot: &WorkbookSnapshot) -> Result<Workbook, Rejection> {
    let mut workbook = Workbook::empty();
    workbook.settings_mut().date_1904 = snapshot.date_1904;

    for sheet in &snapshot.sheets {
        let idx = workbook
            .add_worksheet_with_name(&sheet.name)
            .map_err(|e| Rejection::new(ErrorKind::UnsupportedError, e.to_string()))?;
        if let Some(ws) = workbook.worksheet_mut(idx) {
            for (address, value) in &sheet.cells {
                ws.set_cell_value_at(address.row, address.col, value.clone())
                    .map_err(|e| Rejection::new(ErrorKind::ReferenceError, e.to_string()))?;
            }
        }
    }
    Ok(workbook)
}

fn inject(
    workbook: &mut Workbook,
    sheet_idx: usize,
    cell: CellAddress,
    formula_text: &str,
) -> Result<(), Rejection> {
    let sheet = workbook.worksheet_mut(sheet_idx).ok_or_else(|| {
        Rejection::new(ErrorKind::ReferenceError, format!("Sheet {} not found", sheet_idx))
    })?;
    sheet
        .set_cell_formula_at(cell.row, cell.col, formula_text)
        .map_err(|e| Rejection::new(ErrorKind::ReferenceError, e.to_string()))
}

fn from_formula_error(err: &FormulaError) -> Rejection {
    let kind = match err {
        FormulaError::InvalidReference(_) | FormulaError::CircularReference(_) => {
            ErrorKind::ReferenceError
        }
        FormulaError::UnknownFunction(_) => ErrorKind::NameError,
        FormulaError::Parse(_) | FormulaError::ArgumentCount { .. } => ErrorKind::SyntaxError,
        FormulaError::Evaluation(msg) => classify(msg),
    };
    Rejection::new(kind, err.to_string())
}

fn round(n: f64, options: &GuardOptions) -> f64 {
    match options.precision {
        Some(digits) => round_half_away(n, digits.min(28) as i32),
        None => n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetguard_core::CellValue;

    fn snapshot() -> WorkbookSnapshot {
        let mut wb = Workbook::empty();
        let idx = wb.add_worksheet_with_name("Raw_Orders").unwrap();
        let ws = wb.worksheet_mut(idx).unwrap();
        ws.set_cell_value("A1", "Customer").unwrap();
        ws.set_cell_value("B1", "Plan").unwrap();
        ws.set_cell_value("C1", "Amount").unwrap();
        ws.set_cell_value("E1", "Active").unwrap();
        let rows = [("Pro", 100.0, 1.0), ("Basic", 20.0, 0.0), ("Pro", 50.0, 1.0)];
        for (i, (plan, amount, active)) in rows.iter().enumerate() {
            let row = i as u32 + 1;
            ws.set_cell_value_at(row, 0, format!("c{}", row)).unwrap();
            ws.set_cell_value_at(row, 1, *plan).unwrap();
            ws.set_cell_value_at(row, 2, *amount).unwrap();
            ws.set_cell_value_at(row, 4, *active).unwrap();
        }
        ws.set_cell_formula("F2", "=C2*2").unwrap();
        wb.add_worksheet_with_name("Summary").unwrap();
        WorkbookSnapshot::from_workbook(&wb)
    }

    fn eval(formula: &str, cell: &str) -> EvalOutcome {
        evaluate_formula(
            formula,
            "Raw_Orders",
            CellAddress::parse(cell).unwrap(),
            &snapshot(),
            &GuardOptions::default(),
        )
    }

    fn kind(outcome: EvalOutcome) -> Option<ErrorKind> {
        outcome.err().map(|r| r.kind)
    }

    #[test]
    fn test_literal_zero_divisor() {
        assert!(has_literal_zero_divisor("=A1/0"));
        assert!(has_literal_zero_divisor("=A1 / 0.0"));
        assert!(has_literal_zero_divisor("=SUM(A1:A3)/(0)"));
        assert!(has_literal_zero_divisor("=A1/0+1"));
        assert!(!has_literal_zero_divisor("=A1/0.5"));
        assert!(!has_literal_zero_divisor("=A1/05"));
        assert!(!has_literal_zero_divisor("=A1/(0+1)"));
        assert!(!has_literal_zero_divisor(r#"=CONCAT("a/0",A1)"#));
        assert!(!has_literal_zero_divisor("=IFERROR(A1/0,0)"));
    }

    #[test]
    fn test_fast_path_needs_no_workbook() {
        let outcome = evaluate_formula(
            "=A1/0",
            "Nowhere",
            CellAddress::new(0, 0),
            &WorkbookSnapshot::default(),
            &GuardOptions::default(),
        );
        assert_eq!(kind(outcome), Some(ErrorKind::DivisionByZero));
    }

    #[test]
    fn test_concrete_values() {
        assert_eq!(eval("=SUM(C:C)", "H1"), Ok(Some(ScalarValue::Number(170.0))));
        assert_eq!(eval("=B2&\"!\"", "H1"), Ok(Some(ScalarValue::Text("Pro!".into()))));
        assert_eq!(eval("=C2>C3", "H1"), Ok(Some(ScalarValue::Boolean(true))));
        assert_eq!(eval("=D2+0", "H1"), Ok(Some(ScalarValue::Number(0.0))));
    }

    #[test]
    fn test_reads_recalculated_formula_cells() {
        assert_eq!(eval("=F2+1", "H1"), Ok(Some(ScalarValue::Number(201.0))));
    }

    #[test]
    fn test_division_by_zero_from_data() {
        let formula = r#"=AVERAGEIFS(C:C,B:B,"Pro")/COUNTIFS(B:B,"Enterprise",E:E,1)"#;
        assert_eq!(kind(eval(formula, "H2")), Some(ErrorKind::DivisionByZero));

        let guarded = r#"=IF(COUNTIFS(B:B,"Enterprise",E:E,1)=0,0,AVERAGEIFS(C:C,B:B,"Pro")/COUNTIFS(B:B,"Enterprise",E:E,1))"#;
        assert_eq!(eval(guarded, "H2"), Ok(Some(ScalarValue::Number(0.0))));
    }

    #[test]
    fn test_error_tokens_are_classified() {
        assert_eq!(kind(eval("=Summary!A1/Summary!B1", "H1")), Some(ErrorKind::DivisionByZero));
        assert_eq!(kind(eval("=NA()", "H1")), Some(ErrorKind::NullError));
        assert_eq!(kind(eval("=SQRT(-1)", "H1")), Some(ErrorKind::NumError));
        assert_eq!(kind(eval("=B2+1", "H1")), Some(ErrorKind::ValueError));
        assert_eq!(kind(eval("=Gone!A1", "H1")), Some(ErrorKind::ReferenceError));
    }

    #[test]
    fn test_circular_reference_through_target() {
        let outcome = eval("=SUM(C1:C5)", "C4");
        let rejection = outcome.unwrap_err();
        assert_eq!(rejection.kind, ErrorKind::ReferenceError);
        assert!(rejection.message.contains("Circular reference"));
    }

    #[test]
    fn test_precision() {
        let snapshot = snapshot();
        let options = GuardOptions::default().with_precision(2);
        let outcome = evaluate_formula("=2/3", "Raw_Orders", CellAddress::new(9, 9), &snapshot, &options);
        assert_eq!(outcome, Ok(Some(ScalarValue::Number(0.67))));

        let outcome = evaluate_formula("=2.675", "Raw_Orders", CellAddress::new(9, 9), &snapshot, &options);
        assert_eq!(outcome, Ok(Some(ScalarValue::Number(2.68))));
    }

    #[test]
    fn test_overflow_is_num_error() {
        assert_eq!(kind(eval("=1E308*10", "H1")), Some(ErrorKind::NumError));
        assert_eq!(kind(eval("=1E308*10-1E308*10", "H1")), Some(ErrorKind::NumError));
        assert_eq!(kind(eval("=-1E308-1E308", "H1")), Some(ErrorKind::NumError));
        assert_eq!(eval("=1E307*2", "H1"), Ok(Some(ScalarValue::Number(2e307))));
    }

    #[test]
    fn test_whole_columns_on_other_sheets() {
        assert_eq!(
            eval(r#"=COUNTIFS(B:B,"Pro",Summary!A:A,"")"#, "H1"),
            Ok(Some(ScalarValue::Number(2.0)))
        );
        assert_eq!(
            eval("=SUMPRODUCT(C:C,Summary!A:A)", "H1"),
            Ok(Some(ScalarValue::Number(0.0)))
        );
    }

    #[test]
    fn test_aggregate_over_header_cell() {
        assert_eq!(eval("=SUM(A1)", "H1"), Ok(Some(ScalarValue::Number(0.0))));
        assert_eq!(eval("=SUM(A1,C2)", "H1"), Ok(Some(ScalarValue::Number(100.0))));
        assert_eq!(eval("=MAX(C1,C3)", "H1"), Ok(Some(ScalarValue::Number(50.0))));
    }

    #[test]
    fn test_empty_result() {
        assert_eq!(eval("=Summary!A1", "H1"), Ok(None));
    }

    #[test]
    fn test_snapshot_is_not_modified() {
        let snapshot = snapshot();
        let before = snapshot.clone();
        let _ = evaluate_formula("=1", "Raw_Orders", CellAddress::new(0, 7), &snapshot, &GuardOptions::default());
        assert_eq!(snapshot, before);
        assert_eq!(
            snapshot.sheet("Raw_Orders").unwrap().cells.get(&CellAddress::new(0, 7)),
            None::<&CellValue>
        );
    }
}
