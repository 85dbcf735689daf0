//! Logical functions
//!
//! Arguments arrive already evaluated, so IF and IFERROR only choose
//! between values; an error in the branch that is not taken is dropped.

use sheetguard_core::CellError;

use super::{lift, scalar_arg};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

/// Condition value as a boolean; text other than TRUE/FALSE is `#VALUE!`
fn truthy(value: &FormulaValue) -> Result<bool, CellError> {
    match value.clone().into_scalar() {
        FormulaValue::Error(e) => Err(e),
        v => v.as_bool().ok_or(CellError::Value),
    }
}

/// Booleans in the arguments for AND/OR/XOR: text inside ranges is skipped,
/// a direct text argument is `#VALUE!`
fn logical_values(args: &[FormulaValue]) -> Result<Vec<bool>, CellError> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Boolean(b) => values.push(*b),
                        FormulaValue::Number(n) => values.push(*n != 0.0),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
            FormulaValue::Empty => {}
            other => values.push(truthy(other)?),
        }
    }
    if values.is_empty() {
        return Err(CellError::Value);
    }
    Ok(values)
}

/// IF(condition, value_if_true, [value_if_false])
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        if truthy(&args[0])? {
            Ok(args[1].clone())
        } else {
            Ok(args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false)))
        }
    })
}

/// AND function
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Boolean(logical_values(args)?.iter().all(|b| *b))))
}

/// OR function
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Boolean(logical_values(args)?.iter().any(|b| *b))))
}

/// XOR: true when an odd number of arguments are true
pub fn fn_xor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let trues = logical_values(args)?.into_iter().filter(|b| *b).count();
        Ok(FormulaValue::Boolean(trues % 2 == 1))
    })
}

/// NOT function
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Boolean(!truthy(&args[0])?)))
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match &args[0] {
        FormulaValue::Error(_) => Ok(args[1].clone()),
        value => Ok(value.clone()),
    }
}

/// IFNA(value, value_if_na): only `#N/A` is replaced
pub fn fn_ifna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    match &args[0] {
        FormulaValue::Error(CellError::Na) => Ok(args[1].clone()),
        value => Ok(value.clone()),
    }
}

/// IFS(condition1, value1, ...): first true condition wins, none is `#N/A`
pub fn fn_ifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        if args.len() % 2 != 0 {
            return Err(CellError::Value);
        }
        for pair in args.chunks(2) {
            if truthy(&pair[0])? {
                return Ok(pair[1].clone());
            }
        }
        Err(CellError::Na)
    })
}

/// SWITCH(expression, value1, result1, ..., [default])
pub fn fn_switch(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let target = match scalar_arg(args, 0) {
            Some(FormulaValue::Error(e)) => return Err(e),
            Some(v) => v,
            None => return Err(CellError::Value),
        };

        let cases = &args[1..];
        for pair in cases.chunks_exact(2) {
            let candidate = pair[0].clone().into_scalar();
            if let FormulaValue::Error(e) = candidate {
                return Err(e);
            }
            if switch_matches(&target, &candidate) {
                return Ok(pair[1].clone());
            }
        }

        match cases.chunks_exact(2).remainder() {
            [default] => Ok(default.clone()),
            _ => Err(CellError::Na),
        }
    })
}

fn switch_matches(target: &FormulaValue, candidate: &FormulaValue) -> bool {
    match (target, candidate) {
        (FormulaValue::Number(a), FormulaValue::Number(b)) => a == b,
        (FormulaValue::String(a), FormulaValue::String(b)) => a.eq_ignore_ascii_case(b),
        (FormulaValue::Boolean(a), FormulaValue::Boolean(b)) => a == b,
        (FormulaValue::Empty, FormulaValue::Empty) => true,
        _ => false,
    }
}

/// TRUE function
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE function
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(false))
}
