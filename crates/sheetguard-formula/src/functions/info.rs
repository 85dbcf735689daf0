//! Information functions

use sheetguard_core::CellError;

use super::scalar_arg;
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

/// Apply `test` to the first argument; a range is tested at its top-left cell
fn is(args: &[FormulaValue], test: fn(&FormulaValue) -> bool) -> FormulaResult<FormulaValue> {
    let value = scalar_arg(args, 0).unwrap_or(FormulaValue::Empty);
    Ok(FormulaValue::Boolean(test(&value)))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Empty))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::String(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Boolean(_)))
}

/// ISERROR(value): any error
pub fn fn_iserror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, FormulaValue::is_error)
}

/// ISERR(value): any error except `#N/A`
pub fn fn_iserr(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Error(e) if *e != CellError::Na))
}

/// ISNA(value)
pub fn fn_isna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Error(CellError::Na)))
}

/// NA() - Returns the `#N/A` error
pub fn fn_na(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Error(CellError::Na))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(f: super::super::FunctionImpl, value: FormulaValue) -> bool {
        match f(&[value], &EvaluationContext::simple()).unwrap() {
            FormulaValue::Boolean(b) => b,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_type_checks() {
        assert!(check(fn_isblank, FormulaValue::Empty));
        assert!(!check(fn_isblank, FormulaValue::String(String::new())));
        assert!(check(fn_isnumber, FormulaValue::Number(1.0)));
        assert!(!check(fn_isnumber, FormulaValue::String("1".into())));
        assert!(check(fn_istext, FormulaValue::String("a".into())));
        assert!(check(fn_islogical, FormulaValue::Boolean(false)));
    }

    #[test]
    fn test_error_checks() {
        let na = FormulaValue::Error(CellError::Na);
        let div0 = FormulaValue::Error(CellError::Div0);
        assert!(check(fn_iserror, na.clone()));
        assert!(check(fn_iserror, div0.clone()));
        assert!(!check(fn_iserr, na.clone()));
        assert!(check(fn_iserr, div0.clone()));
        assert!(check(fn_isna, na));
        assert!(!check(fn_isna, div0));
    }

    #[test]
    fn test_range_uses_top_left() {
        let range = FormulaValue::Array(vec![vec![FormulaValue::Number(1.0), FormulaValue::Empty]]);
        assert!(check(fn_isnumber, range));
    }
}
