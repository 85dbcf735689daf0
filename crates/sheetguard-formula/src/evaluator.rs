//! Formula evaluator
//!
//! Evaluates formula ASTs against a workbook. Spreadsheet errors such as
//! `#DIV/0!` are ordinary values and propagate through operators; only
//! structural problems (unknown function, wrong argument count, malformed
//! ranges) come back as [`FormulaError`].

use std::cmp::Ordering;

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{FormulaError, FormulaResult};
use crate::functions;
use sheetguard_core::{CellError, CellRange, CellValue, Workbook, Worksheet};

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Numeric view used by operators: text that parses as a number counts,
    /// empty counts as zero
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => s.trim().parse().ok(),
            FormulaValue::Empty => Some(0.0),
            FormulaValue::Array(rows) => rows.first().and_then(|r| r.first()).and_then(|v| v.as_number()),
            FormulaValue::Error(_) => None,
        }
    }

    /// Numeric view, or the error the spreadsheet would show
    pub fn to_number(&self) -> Result<f64, CellError> {
        match self {
            FormulaValue::Error(e) => Err(*e),
            other => other.as_number().ok_or(CellError::Value),
        }
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) => {
                if s.eq_ignore_ascii_case("TRUE") {
                    Some(true)
                } else if s.eq_ignore_ascii_case("FALSE") {
                    Some(false)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Text view, formatting numbers the way a cell displays them
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(rows) => rows
                .first()
                .and_then(|r| r.first())
                .map(|v| v.as_string())
                .unwrap_or_default(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// The value a single cell would show: the top-left element of an array
    pub fn into_scalar(self) -> FormulaValue {
        match self {
            FormulaValue::Array(rows) => rows
                .into_iter()
                .next()
                .and_then(|r| r.into_iter().next())
                .map(FormulaValue::into_scalar)
                .unwrap_or(FormulaValue::Empty),
            other => other,
        }
    }
}

/// Integers print without a decimal point
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        FormulaValue::from(&value)
    }
}

impl From<&CellValue> for FormulaValue {
    fn from(value: &CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(*n),
            CellValue::String(s) => FormulaValue::String(s.as_str().to_string()),
            CellValue::Boolean(b) => FormulaValue::Boolean(*b),
            CellValue::Error(e) => FormulaValue::Error(*e),
            CellValue::Formula { cached_value, .. } => cached_value
                .as_deref()
                .map(FormulaValue::from)
                .unwrap_or(FormulaValue::Empty),
        }
    }
}

impl From<FormulaValue> for CellValue {
    fn from(value: FormulaValue) -> Self {
        match value.into_scalar() {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::string(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            FormulaValue::Array(_) => CellValue::Error(CellError::Value),
        }
    }
}

/// Context for formula evaluation
#[derive(Clone)]
pub struct EvaluationContext<'a> {
    /// Workbook for cell lookups
    pub workbook: Option<&'a Workbook>,
    /// Current worksheet index
    pub current_sheet: usize,
    /// Current cell row
    pub current_row: u32,
    /// Current cell column
    pub current_col: u16,
    /// Extent that whole-column and whole-row ranges are clipped to, on top
    /// of their own sheet's used range
    shared_extent: Option<CellRange>,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(workbook: Option<&'a Workbook>, sheet: usize, row: u32, col: u16) -> Self {
        Self {
            workbook,
            current_sheet: sheet,
            current_row: row,
            current_col: col,
            shared_extent: None,
        }
    }

    /// A context without a workbook; every reference reads as empty
    pub fn simple() -> Self {
        Self::new(None, 0, 0, 0)
    }

    /// Whether the workbook uses the 1904 date system
    pub fn date_1904(&self) -> bool {
        self.workbook.map_or(false, |wb| wb.settings().date_1904)
    }

    fn worksheet(&self, sheet: Option<&str>) -> Result<&'a Worksheet, CellError> {
        let workbook = self.workbook.ok_or(CellError::Ref)?;
        let index = match sheet {
            Some(name) => workbook.sheet_index(name).ok_or(CellError::Ref)?,
            None => self.current_sheet,
        };
        workbook.worksheet(index).ok_or(CellError::Ref)
    }

    /// Get a cell value; an unknown sheet reads as `#REF!`
    pub fn get_cell_value(&self, sheet: Option<&str>, row: u32, col: u16) -> FormulaValue {
        if self.workbook.is_none() {
            return FormulaValue::Empty;
        }
        match self.worksheet(sheet) {
            Ok(ws) => ws
                .cell_at(row, col)
                .map(|c| FormulaValue::from(&c.value))
                .unwrap_or(FormulaValue::Empty),
            Err(e) => FormulaValue::Error(e),
        }
    }

    /// Get a range of cell values as an array.
    ///
    /// Whole-column and whole-row ranges are clipped to the sheet's used
    /// range, widened to the shared extent of the enclosing call, so `B:B`
    /// and `Summary!A:A` passed to one function have equal shapes.
    pub fn get_range_values(&self, sheet: Option<&str>, range: &CellRange) -> FormulaValue {
        if self.workbook.is_none() {
            return FormulaValue::Array(vec![]);
        }
        let ws = match self.worksheet(sheet) {
            Ok(ws) => ws,
            Err(e) => return FormulaValue::Error(e),
        };

        let used = match (ws.used_range(), self.shared_extent) {
            (Some(own), Some(shared)) => Some(union(&own, &shared)),
            (own, shared) => own.or(shared),
        };
        let range = range.clip_to_used(used.as_ref());
        let rows = (range.start.row..=range.end.row)
            .map(|row| {
                (range.start.col..=range.end.col)
                    .map(|col| {
                        ws.cell_at(row, col)
                            .map(|c| FormulaValue::from(&c.value))
                            .unwrap_or(FormulaValue::Empty)
                    })
                    .collect()
            })
            .collect();

        FormulaValue::Array(rows)
    }

    /// Union of the used ranges of every sheet read by a whole-column or
    /// whole-row argument in `args`
    fn whole_range_extent(&self, args: &[FormulaExpr]) -> Option<CellRange> {
        args.iter()
            .filter_map(|arg| match arg {
                FormulaExpr::RangeRef(r) if r.range.is_whole_column() || r.range.is_whole_row() => {
                    self.worksheet(r.sheet.as_deref()).ok()?.used_range()
                }
                _ => None,
            })
            .reduce(|a, b| union(&a, &b))
    }
}

fn union(a: &CellRange, b: &CellRange) -> CellRange {
    CellRange::from_indices(
        a.start.row.min(b.start.row),
        a.start.col.min(b.start.col),
        a.end.row.max(b.end.row),
        a.end.col.max(b.end.col),
    )
}

/// A number result, or `#NUM!` when it overflowed or is undefined
fn finite(n: f64) -> FormulaValue {
    if n.is_finite() {
        FormulaValue::Number(n)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(FormulaValue::Number(*n)),
        FormulaExpr::String(s) => Ok(FormulaValue::String(s.clone())),
        FormulaExpr::Boolean(b) => Ok(FormulaValue::Boolean(*b)),
        FormulaExpr::Error(e) => Ok(FormulaValue::Error(*e)),

        // === References ===
        FormulaExpr::CellRef(cell_ref) => Ok(ctx.get_cell_value(
            cell_ref.sheet.as_deref(),
            cell_ref.address.row,
            cell_ref.address.col,
        )),

        FormulaExpr::RangeRef(range_ref) => {
            Ok(ctx.get_range_values(range_ref.sheet.as_deref(), &range_ref.range))
        }

        // Defined names are not supported, so every bare name is unknown
        FormulaExpr::NameRef(_) => Ok(FormulaValue::Error(CellError::Name)),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),

        // === Arrays ===
        FormulaExpr::Array(rows) => {
            let rows = rows
                .iter()
                .map(|row| row.iter().map(|e| evaluate(e, ctx)).collect())
                .collect::<FormulaResult<Vec<Vec<_>>>>()?;
            Ok(FormulaValue::Array(rows))
        }
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    if op == BinaryOperator::Range {
        return Err(FormulaError::InvalidReference(
            "range operator needs a reference on both sides".into(),
        ));
    }

    let left_val = evaluate(left, ctx)?.into_scalar();
    let right_val = evaluate(right, ctx)?.into_scalar();

    if let Some(e) = left_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }
    if let Some(e) = right_val.get_error() {
        return Ok(FormulaValue::Error(e));
    }

    let arithmetic = |f: fn(f64, f64) -> FormulaValue| -> FormulaValue {
        match (left_val.to_number(), right_val.to_number()) {
            (Ok(l), Ok(r)) => f(l, r),
            (Err(e), _) | (_, Err(e)) => FormulaValue::Error(e),
        }
    };

    let result = match op {
        BinaryOperator::Add => arithmetic(|l, r| finite(l + r)),
        BinaryOperator::Subtract => arithmetic(|l, r| finite(l - r)),
        BinaryOperator::Multiply => arithmetic(|l, r| finite(l * r)),
        BinaryOperator::Divide => arithmetic(|l, r| {
            if r == 0.0 {
                FormulaValue::Error(CellError::Div0)
            } else {
                finite(l / r)
            }
        }),
        BinaryOperator::Power => arithmetic(|l, r| finite(l.powf(r))),

        BinaryOperator::Equal => FormulaValue::Boolean(compare_values(&left_val, &right_val).is_eq()),
        BinaryOperator::NotEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val).is_ne())
        }
        BinaryOperator::LessThan => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val).is_lt())
        }
        BinaryOperator::LessEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val).is_le())
        }
        BinaryOperator::GreaterThan => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val).is_gt())
        }
        BinaryOperator::GreaterEqual => {
            FormulaValue::Boolean(compare_values(&left_val, &right_val).is_ge())
        }

        BinaryOperator::Concat => {
            FormulaValue::String(left_val.as_string() + &right_val.as_string())
        }

        BinaryOperator::Range => FormulaValue::Error(CellError::Ref),
    };

    Ok(result)
}

/// Spreadsheet ordering: numbers < text < booleans, text compares
/// case-insensitively, empty behaves like the other operand's zero value
pub(crate) fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    fn rank(v: &FormulaValue) -> u8 {
        match v {
            FormulaValue::Number(_) | FormulaValue::Empty => 0,
            FormulaValue::String(_) => 1,
            FormulaValue::Boolean(_) => 2,
            _ => 3,
        }
    }

    match (left, right) {
        (FormulaValue::Empty, FormulaValue::String(s)) => "".cmp(&s.to_lowercase().as_str()),
        (FormulaValue::String(s), FormulaValue::Empty) => s.to_lowercase().as_str().cmp(""),
        (FormulaValue::Empty, FormulaValue::Boolean(b)) => false.cmp(b),
        (FormulaValue::Boolean(b), FormulaValue::Empty) => b.cmp(&false),
        (FormulaValue::Number(_) | FormulaValue::Empty, FormulaValue::Number(_) | FormulaValue::Empty) => {
            let l = left.as_number().unwrap_or(0.0);
            let r = right.as_number().unwrap_or(0.0);
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        (FormulaValue::String(l), FormulaValue::String(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (FormulaValue::Boolean(l), FormulaValue::Boolean(r)) => l.cmp(r),
        (FormulaValue::Error(l), FormulaValue::Error(r)) => l.code().cmp(&r.code()),
        _ => rank(left).cmp(&rank(right)),
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let val = evaluate(operand, ctx)?.into_scalar();

    let n = match val.to_number() {
        Ok(n) => n,
        Err(e) => return Ok(FormulaValue::Error(e)),
    };

    Ok(match op {
        UnaryOperator::Negate => finite(-n),
        UnaryOperator::Percent => finite(n / 100.0),
    })
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let func = functions::registry()
        .get(name)
        .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;

    func.check_arity(args.len())?;

    let mut arg_ctx = ctx.clone();
    if let Some(extent) = ctx.whole_range_extent(args) {
        arg_ctx.shared_extent = Some(match ctx.shared_extent {
            Some(outer) => union(&outer, &extent),
            None => extent,
        });
    }

    let evaluated_args = args
        .iter()
        .map(|arg| {
            let value = evaluate(arg, &arg_ctx)?;
            Ok(match (arg, value) {
                (FormulaExpr::CellRef(_), value)
                    if func.references_as_ranges && !matches!(value, FormulaValue::Array(_)) =>
                {
                    FormulaValue::Array(vec![vec![value]])
                }
                (_, value) => value,
            })
        })
        .collect::<FormulaResult<Vec<_>>>()?;

    (func.implementation)(&evaluated_args, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        let ast = parse_formula(formula)?;
        let ctx = EvaluationContext::simple();
        evaluate(&ast, &ctx)
    }

    fn eval_in(wb: &Workbook, sheet: usize, formula: &str) -> FormulaValue {
        let ast = parse_formula(formula).unwrap();
        let ctx = EvaluationContext::new(Some(wb), sheet, 0, 0);
        evaluate(&ast, &ctx).unwrap()
    }

    fn num(n: f64) -> FormulaValue {
        FormulaValue::Number(n)
    }

    fn err(e: CellError) -> FormulaValue {
        FormulaValue::Error(e)
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("=42").unwrap(), num(42.0));
        assert_eq!(eval("=\"Hello\"").unwrap(), FormulaValue::String("Hello".into()));
        assert_eq!(eval("=TRUE").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=#VALUE!").unwrap(), err(CellError::Value));
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("=1+2").unwrap(), num(3.0));
        assert_eq!(eval("=10-3").unwrap(), num(7.0));
        assert_eq!(eval("=4*5").unwrap(), num(20.0));
        assert_eq!(eval("=20/4").unwrap(), num(5.0));
        assert_eq!(eval("=2^10").unwrap(), num(1024.0));
        assert_eq!(eval("=2+3*4-5").unwrap(), num(9.0));
        assert_eq!(eval("=(1+2)*3").unwrap(), num(9.0));
        assert_eq!(eval("=--5").unwrap(), num(5.0));
        assert_eq!(eval("=50%").unwrap(), num(0.5));
    }

    #[test]
    fn test_type_mismatch_is_value_error() {
        assert_eq!(eval("=\"abc\"+1").unwrap(), err(CellError::Value));
        assert_eq!(eval("=-\"abc\"").unwrap(), err(CellError::Value));
        assert_eq!(eval("=\"3\"+1").unwrap(), num(4.0));
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("=1<2").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=5<>5").unwrap(), FormulaValue::Boolean(false));
        assert_eq!(eval("=\"a\"=\"A\"").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=1<\"a\"").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=\"z\"<TRUE").unwrap(), FormulaValue::Boolean(true));
    }

    #[test]
    fn test_evaluate_concatenation() {
        assert_eq!(
            eval("=\"Value: \"&42").unwrap(),
            FormulaValue::String("Value: 42".into())
        );
    }

    #[test]
    fn test_division_by_zero_propagates() {
        assert_eq!(eval("=1/0").unwrap(), err(CellError::Div0));
        assert_eq!(eval("=1/0+5").unwrap(), err(CellError::Div0));
        assert_eq!(eval("=IF(0=0,0,1/0)").unwrap(), num(0.0));
        assert_eq!(eval("=IFERROR(1/0,7)").unwrap(), num(7.0));
    }

    #[test]
    fn test_unknown_function_and_arity() {
        assert!(matches!(
            eval("=NOPE(1)"),
            Err(FormulaError::UnknownFunction(name)) if name == "NOPE"
        ));
        assert!(matches!(
            eval("=ROUND()"),
            Err(FormulaError::ArgumentCount { .. })
        ));
        assert_eq!(eval("=Revenue").unwrap(), err(CellError::Name));
    }

    #[test]
    fn test_cell_references() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        {
            let ws = wb.worksheet_mut(0).unwrap();
            ws.set_cell_value("A1", 10.0).unwrap();
            ws.set_cell_value("A2", 20.0).unwrap();
        }
        wb.worksheet_mut(1)
            .unwrap()
            .set_cell_value("B2", 5.0)
            .unwrap();

        assert_eq!(eval_in(&wb, 0, "=A1+A2"), num(30.0));
        assert_eq!(eval_in(&wb, 0, "=SUM(A1:A2)*Data!B2"), num(150.0));
        assert_eq!(eval_in(&wb, 0, "=data!B2"), num(5.0));
        assert_eq!(eval_in(&wb, 0, "=Missing!A1"), err(CellError::Ref));
        assert_eq!(eval_in(&wb, 0, "=A1/A3"), err(CellError::Div0));
    }

    #[test]
    fn test_whole_columns_clip_to_used_range() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", "Header").unwrap();
        for row in 2..=4 {
            ws.set_cell_value(&format!("A{}", row), row as f64).unwrap();
        }
        ws.set_cell_value("C1", "Flag").unwrap();

        assert_eq!(eval_in(&wb, 0, "=SUM(A:A)"), num(9.0));
        assert_eq!(eval_in(&wb, 0, "=ROWS(A:A)"), num(4.0));
        assert_eq!(eval_in(&wb, 0, "=ROWS(C:C)"), num(4.0));
        assert_eq!(eval_in(&wb, 0, "=SUM(2:3)"), num(5.0));
    }

    #[test]
    fn test_whole_columns_across_sheets_share_one_extent() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, (plan, amount)) in [("Pro", 10.0), ("Basic", 20.0), ("Pro", 30.0)].iter().enumerate() {
            ws.set_cell_value_at(row as u32, 1, *plan).unwrap();
            ws.set_cell_value_at(row as u32, 2, *amount).unwrap();
        }
        let idx = wb.add_worksheet_with_name("Summary").unwrap();
        wb.worksheet_mut(idx).unwrap().set_cell_value("A1", 2.0).unwrap();

        assert_eq!(eval_in(&wb, 0, "=COUNTIFS(B:B,\"Pro\",Summary!A:A,\"\")"), num(1.0));
        assert_eq!(eval_in(&wb, 0, "=SUMPRODUCT(C:C,Summary!A:A)"), num(20.0));
        assert_eq!(eval_in(&wb, 1, "=SUMPRODUCT(A:A,Sheet1!C:C)"), num(20.0));
    }

    #[test]
    fn test_overflow_is_num_error() {
        assert_eq!(eval("=1E308*10").unwrap(), err(CellError::Num));
        assert_eq!(eval("=1E308*10-1E308*10").unwrap(), err(CellError::Num));
        assert_eq!(eval("=-1E308-1E308").unwrap(), err(CellError::Num));
        assert_eq!(eval("=1E308/1E-10").unwrap(), err(CellError::Num));
        assert_eq!(eval("=10^400").unwrap(), err(CellError::Num));
    }

    #[test]
    fn test_aggregates_skip_text_read_through_references() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", "Customer").unwrap();
        ws.set_cell_value("A2", 5.0).unwrap();
        ws.set_cell_value("A3", true).unwrap();

        assert_eq!(eval_in(&wb, 0, "=SUM(A1)"), num(0.0));
        assert_eq!(eval_in(&wb, 0, "=SUM(A1,A2,A3)"), num(5.0));
        assert_eq!(eval_in(&wb, 0, "=MAX(A1,A2)"), num(5.0));
        assert_eq!(eval_in(&wb, 0, "=AVERAGE(A1)"), err(CellError::Div0));
        // Literal text is still coerced, and rejected when it is not a number
        assert_eq!(eval_in(&wb, 0, "=SUM(\"3\",A2)"), num(8.0));
        assert_eq!(eval_in(&wb, 0, "=SUM(\"Customer\")"), err(CellError::Value));
        // A scalar parameter read through a reference still works
        assert_eq!(eval_in(&wb, 0, "=LARGE(A2:A2,A3)"), num(5.0));
    }

    #[test]
    fn test_array_literal() {
        assert_eq!(
            eval("={1,2;3,4}").unwrap(),
            FormulaValue::Array(vec![vec![num(1.0), num(2.0)], vec![num(3.0), num(4.0)]])
        );
        assert_eq!(eval("={1,2;3,4}").unwrap().into_scalar(), num(1.0));
    }

    #[test]
    fn test_cell_value_conversion() {
        let cached = CellValue::Formula {
            text: "=1+1".into(),
            cached_value: Some(Box::new(CellValue::Number(2.0))),
        };
        assert_eq!(FormulaValue::from(cached), num(2.0));
        assert_eq!(FormulaValue::from(CellValue::formula("=A1")), FormulaValue::Empty);
        assert_eq!(CellValue::from(num(3.5)), CellValue::Number(3.5));
        assert_eq!(
            CellValue::from(FormulaValue::Array(vec![vec![FormulaValue::Boolean(true)]])),
            CellValue::Boolean(true)
        );
    }
}
