//! Statistical functions

use sheetguard_core::CellError;

use super::criteria::{criteria_mask, selected, CriteriaMatcher};
use super::{array_dims, collect_numbers, grid_arg, lift, number_arg, total};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

/// Numbers among `values`; errors propagate, everything else is skipped
fn numbers_in<'a>(values: impl Iterator<Item = &'a FormulaValue>) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for value in values {
        match value {
            FormulaValue::Number(n) => numbers.push(*n),
            FormulaValue::Error(e) => return Err(*e),
            _ => {}
        }
    }
    Ok(numbers)
}

fn mean(numbers: &[f64]) -> Result<f64, CellError> {
    if numbers.is_empty() {
        return Err(CellError::Div0);
    }
    Ok(total(numbers.iter().copied()) / numbers.len() as f64)
}

/// COUNTIF(range, criteria) - Counts cells that meet a criteria
pub fn fn_countif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let range = grid_arg(args, 0)?;
        let matcher = CriteriaMatcher::new(&args[1])?;
        let count = range.iter().flatten().filter(|v| matcher.matches(v)).count();
        Ok(FormulaValue::Number(count as f64))
    })
}

/// COUNTIFS(criteria_range1, criteria1, ...) - Counts cells where all criteria hold.
///
/// Ranges of different shapes give `#VALUE!`.
pub fn fn_countifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mask = criteria_mask(args, None)?;
        let count = mask.iter().flatten().filter(|hit| **hit).count();
        Ok(FormulaValue::Number(count as f64))
    })
}

/// AVERAGEIF(range, criteria, [average_range])
///
/// No matching numbers is `#DIV/0!`.
pub fn fn_averageif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let range = grid_arg(args, 0)?;
        let matcher = CriteriaMatcher::new(&args[1])?;
        let average_range = if args.len() > 2 {
            grid_arg(args, 2)?
        } else {
            range.clone()
        };

        let mut hits = Vec::new();
        for (r, row) in range.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if matcher.matches(cell) {
                    if let Some(v) = average_range.get(r).and_then(|row| row.get(c)) {
                        hits.push(v);
                    }
                }
            }
        }
        Ok(FormulaValue::Number(mean(&numbers_in(hits.into_iter())?)?))
    })
}

/// AVERAGEIFS(average_range, criteria_range1, criteria1, ...)
pub fn fn_averageifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let average_range = grid_arg(args, 0)?;
        let mask = criteria_mask(&args[1..], Some(array_dims(&average_range)))?;
        let numbers = numbers_in(selected(&average_range, &mask))?;
        Ok(FormulaValue::Number(mean(&numbers)?))
    })
}

/// MAXIFS(max_range, criteria_range1, criteria1, ...); no match gives 0
pub fn fn_maxifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let range = grid_arg(args, 0)?;
        let mask = criteria_mask(&args[1..], Some(array_dims(&range)))?;
        let max = numbers_in(selected(&range, &mask))?.into_iter().reduce(f64::max);
        Ok(FormulaValue::Number(max.unwrap_or(0.0)))
    })
}

/// MINIFS(min_range, criteria_range1, criteria1, ...); no match gives 0
pub fn fn_minifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let range = grid_arg(args, 0)?;
        let mask = criteria_mask(&args[1..], Some(array_dims(&range)))?;
        let min = numbers_in(selected(&range, &mask))?.into_iter().reduce(f64::min);
        Ok(FormulaValue::Number(min.unwrap_or(0.0)))
    })
}

/// MEDIAN(number1, ...) - The middle value, or the mean of the two middle values
pub fn fn_median(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut numbers = collect_numbers(args)?;
        if numbers.is_empty() {
            return Err(CellError::Num);
        }
        numbers.sort_by(f64::total_cmp);
        let mid = numbers.len() / 2;
        let median = if numbers.len() % 2 == 0 {
            (numbers[mid - 1] + numbers[mid]) / 2.0
        } else {
            numbers[mid]
        };
        Ok(FormulaValue::Number(median))
    })
}

/// k-th value from the top (`largest`) or the bottom of the first argument
fn kth(args: &[FormulaValue], largest: bool) -> Result<FormulaValue, CellError> {
    let mut numbers = collect_numbers(&args[..1])?;
    let k = number_arg(args, 1)?.ceil();
    if k < 1.0 || k as usize > numbers.len() {
        return Err(CellError::Num);
    }
    numbers.sort_by(f64::total_cmp);
    if largest {
        numbers.reverse();
    }
    Ok(FormulaValue::Number(numbers[k as usize - 1]))
}

/// LARGE(array, k)
pub fn fn_large(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| kth(args, true))
}

/// SMALL(array, k)
pub fn fn_small(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| kth(args, false))
}

/// Variance with `ddof` = 1 for samples, 0 for populations
fn variance(args: &[FormulaValue], ddof: usize) -> Result<f64, CellError> {
    let numbers = collect_numbers(args)?;
    if numbers.len() <= ddof {
        return Err(CellError::Div0);
    }
    let m = mean(&numbers)?;
    let squares = total(numbers.iter().map(|n| (n - m).powi(2)));
    Ok(squares / (numbers.len() - ddof) as f64)
}

/// STDEV.S / STDEV
pub fn fn_stdev_s(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(variance(args, 1)?.sqrt())))
}

/// STDEV.P
pub fn fn_stdev_p(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(variance(args, 0)?.sqrt())))
}

/// VAR.S / VAR
pub fn fn_var_s(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(variance(args, 1)?)))
}

/// VAR.P
pub fn fn_var_p(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(variance(args, 0)?)))
}
