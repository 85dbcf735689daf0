//! Math functions

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use sheetguard_core::CellError;

use super::criteria::{criteria_mask, selected, CriteriaMatcher};
use super::{array_dims, collect_numbers, grid_arg, lift, number_arg, opt_number_arg, total};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

/// Round `n` to `digits` decimal places, halves away from zero.
///
/// Negative `digits` round to the left of the decimal point. Goes through
/// `Decimal` so that `2.675` rounds to `2.68` as it displays.
pub fn round_half_away(n: f64, digits: i32) -> f64 {
    round_with(n, digits, RoundingStrategy::MidpointAwayFromZero)
}

fn round_with(n: f64, digits: i32, strategy: RoundingStrategy) -> f64 {
    if !n.is_finite() {
        return n;
    }

    if digits < 0 {
        let factor = 10f64.powi(-digits);
        return round_with(n / factor, 0, strategy) * factor;
    }

    match Decimal::from_f64(n) {
        Some(d) => d
            .round_dp_with_strategy(digits.min(28) as u32, strategy)
            .to_string()
            .parse()
            .unwrap_or(n),
        // Out of Decimal range; such magnitudes carry no fractional digits
        None => n,
    }
}

fn digits_arg(args: &[FormulaValue], index: usize) -> Result<i32, CellError> {
    Ok(opt_number_arg(args, index, 0.0)?.trunc() as i32)
}

/// SUM function
pub fn fn_sum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(total(collect_numbers(args)?))))
}

/// AVERAGE function; no numbers at all is `#DIV/0!`
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let numbers = collect_numbers(args)?;
        if numbers.is_empty() {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number(total(numbers.iter().copied()) / numbers.len() as f64))
    })
}

/// MIN function
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let min = collect_numbers(args)?.into_iter().reduce(f64::min);
        Ok(FormulaValue::Number(min.unwrap_or(0.0)))
    })
}

/// MAX function
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let max = collect_numbers(args)?.into_iter().reduce(f64::max);
        Ok(FormulaValue::Number(max.unwrap_or(0.0)))
    })
}

/// COUNT: numbers only; errors are skipped rather than propagated
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .map(|arg| match arg {
            FormulaValue::Number(_) => 1,
            FormulaValue::String(s) if s.trim().parse::<f64>().is_ok() => 1,
            FormulaValue::Array(rows) => rows
                .iter()
                .flatten()
                .filter(|v| matches!(v, FormulaValue::Number(_)))
                .count(),
            _ => 0,
        })
        .sum::<usize>();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA: everything that is not empty
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .map(|arg| match arg {
            FormulaValue::Empty => 0,
            FormulaValue::Array(rows) => rows
                .iter()
                .flatten()
                .filter(|v| !matches!(v, FormulaValue::Empty))
                .count(),
            _ => 1,
        })
        .sum::<usize>();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTBLANK: empty cells and empty strings
pub fn fn_countblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = match &args[0] {
        FormulaValue::Array(rows) => rows
            .iter()
            .flatten()
            .filter(|v| match v {
                FormulaValue::Empty => true,
                FormulaValue::String(s) => s.is_empty(),
                _ => false,
            })
            .count(),
        FormulaValue::Empty => 1,
        FormulaValue::String(s) if s.is_empty() => 1,
        _ => 0,
    };
    Ok(FormulaValue::Number(count as f64))
}

/// ABS function
pub fn fn_abs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(number_arg(args, 0)?.abs())))
}

/// ROUND(number, [digits])
pub fn fn_round(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        Ok(FormulaValue::Number(round_half_away(n, digits_arg(args, 1)?)))
    })
}

/// ROUNDUP(number, [digits]): away from zero
pub fn fn_roundup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        Ok(FormulaValue::Number(round_with(
            n,
            digits_arg(args, 1)?,
            RoundingStrategy::AwayFromZero,
        )))
    })
}

/// ROUNDDOWN(number, [digits]): toward zero
pub fn fn_rounddown(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        Ok(FormulaValue::Number(round_with(
            n,
            digits_arg(args, 1)?,
            RoundingStrategy::ToZero,
        )))
    })
}

/// INT: rounds down, so `INT(-1.5)` is -2
pub fn fn_int(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(number_arg(args, 0)?.floor())))
}

/// TRUNC(number, [digits])
pub fn fn_trunc(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    fn_rounddown(args, ctx)
}

/// MOD: the result takes the sign of the divisor
pub fn fn_mod(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        let d = number_arg(args, 1)?;
        if d == 0.0 {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number(n - d * (n / d).floor()))
    })
}

/// POWER function
pub fn fn_power(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let base = number_arg(args, 0)?;
        let exp = number_arg(args, 1)?;
        if base == 0.0 && exp < 0.0 {
            return Err(CellError::Div0);
        }
        finite(base.powf(exp))
    })
}

/// `#NUM!` for NaN and infinities
fn finite(n: f64) -> Result<FormulaValue, CellError> {
    if n.is_finite() {
        Ok(FormulaValue::Number(n))
    } else {
        Err(CellError::Num)
    }
}

/// SQRT function
pub fn fn_sqrt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        if n < 0.0 {
            return Err(CellError::Num);
        }
        Ok(FormulaValue::Number(n.sqrt()))
    })
}

/// EXP function
pub fn fn_exp(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| finite(number_arg(args, 0)?.exp()))
}

/// LN function
pub fn fn_ln(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        if n <= 0.0 {
            return Err(CellError::Num);
        }
        Ok(FormulaValue::Number(n.ln()))
    })
}

/// LOG(number, [base]), base 10 by default
pub fn fn_log(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        let base = opt_number_arg(args, 1, 10.0)?;
        if n <= 0.0 || base <= 0.0 {
            return Err(CellError::Num);
        }
        if base == 1.0 {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number(n.log(base)))
    })
}

/// LOG10 function
pub fn fn_log10(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        if n <= 0.0 {
            return Err(CellError::Num);
        }
        Ok(FormulaValue::Number(n.log10()))
    })
}

/// PI function
pub fn fn_pi(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(std::f64::consts::PI))
}

/// PRODUCT function
pub fn fn_product(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let numbers = collect_numbers(args)?;
        if numbers.is_empty() {
            return Ok(FormulaValue::Number(0.0));
        }
        Ok(FormulaValue::Number(numbers.iter().product()))
    })
}

/// SUMPRODUCT: element-wise product of equally shaped arrays, summed.
/// Non-numeric elements count as zero.
pub fn fn_sumproduct(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let grids = (0..args.len())
            .map(|i| grid_arg(args, i))
            .collect::<Result<Vec<_>, _>>()?;

        let dims = array_dims(&grids[0]);
        if grids.iter().any(|g| array_dims(g) != dims) {
            return Err(CellError::Value);
        }

        let mut sum_of_products = 0.0;
        for r in 0..dims.0 {
            for c in 0..dims.1 {
                let mut product = 1.0;
                for grid in &grids {
                    product *= match &grid[r][c] {
                        FormulaValue::Number(n) => *n,
                        FormulaValue::Error(e) => return Err(*e),
                        _ => 0.0,
                    };
                }
                sum_of_products += product;
            }
        }
        Ok(FormulaValue::Number(sum_of_products))
    })
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let range = grid_arg(args, 0)?;
        let matcher = CriteriaMatcher::new(&args[1])?;
        let sum_range = if args.len() > 2 {
            grid_arg(args, 2)?
        } else {
            range.clone()
        };

        let mut sum = 0.0;
        for (r, row) in range.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if !matcher.matches(cell) {
                    continue;
                }
                // sum_range is read from its top-left at the shape of range
                match sum_range.get(r).and_then(|row| row.get(c)) {
                    Some(FormulaValue::Number(n)) => sum += n,
                    Some(FormulaValue::Error(e)) => return Err(*e),
                    _ => {}
                }
            }
        }
        Ok(FormulaValue::Number(sum))
    })
}

/// SUMIFS(sum_range, criteria_range1, criteria1, ...)
pub fn fn_sumifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let sum_range = grid_arg(args, 0)?;
        let mask = criteria_mask(&args[1..], Some(array_dims(&sum_range)))?;

        let mut sum = 0.0;
        for value in selected(&sum_range, &mask) {
            match value {
                FormulaValue::Number(n) => sum += n,
                FormulaValue::Error(e) => return Err(*e),
                _ => {}
            }
        }
        Ok(FormulaValue::Number(sum))
    })
}

/// Round `n` to a multiple of `significance` using `round` on the quotient
fn to_multiple(args: &[FormulaValue], round: fn(f64) -> f64) -> Result<FormulaValue, CellError> {
    let n = number_arg(args, 0)?;
    let default = if n < 0.0 { -1.0 } else { 1.0 };
    let significance = opt_number_arg(args, 1, default)?;

    if significance == 0.0 || n == 0.0 {
        return Ok(FormulaValue::Number(0.0));
    }
    if n > 0.0 && significance < 0.0 {
        return Err(CellError::Num);
    }

    // Snap the quotient first so 0.3/0.1 does not round up to 4
    let quotient = round_half_away(n / significance, 9);
    Ok(FormulaValue::Number(round(quotient) * significance))
}

/// CEILING(number, [significance])
pub fn fn_ceiling(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| to_multiple(args, f64::ceil))
}

/// FLOOR(number, [significance])
pub fn fn_floor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| to_multiple(args, f64::floor))
}

/// SIGN function
pub fn fn_sign(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?;
        let sign = if n > 0.0 {
            1.0
        } else if n < 0.0 {
            -1.0
        } else {
            0.0
        };
        Ok(FormulaValue::Number(sign))
    })
}

/// RAND: uniform in [0, 1)
pub fn fn_rand(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Number(rand::thread_rng().gen::<f64>()))
}

/// RANDBETWEEN(bottom, top), inclusive
pub fn fn_randbetween(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let bottom = number_arg(args, 0)?.ceil() as i64;
        let top = number_arg(args, 1)?.floor() as i64;
        if bottom > top {
            return Err(CellError::Num);
        }
        let n = rand::thread_rng().gen_range(bottom..=top);
        Ok(FormulaValue::Number(n as f64))
    })
}
