//! Financial functions
//!
//! Sign convention: money paid out is negative, money received is positive.
//! `type` 1 means payments fall at the start of each period.

use sheetguard_core::CellError;

use super::{collect_numbers, grid_arg, lift, number_arg, opt_number_arg, total};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

const IRR_MAX_ITERATIONS: usize = 50;
const IRR_TOLERANCE: f64 = 1e-10;

fn finite(n: f64) -> Result<FormulaValue, CellError> {
    if n.is_finite() {
        Ok(FormulaValue::Number(n))
    } else {
        Err(CellError::Num)
    }
}

fn payment_type(args: &[FormulaValue], index: usize) -> Result<f64, CellError> {
    Ok(if opt_number_arg(args, index, 0.0)? != 0.0 { 1.0 } else { 0.0 })
}

/// PMT(rate, nper, pv, [fv], [type]) - Payment per period of a loan
pub fn fn_pmt(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let rate = number_arg(args, 0)?;
        let nper = number_arg(args, 1)?;
        let pv = number_arg(args, 2)?;
        let fv = opt_number_arg(args, 3, 0.0)?;
        let when = payment_type(args, 4)?;

        if nper == 0.0 {
            return Err(CellError::Num);
        }
        if rate == 0.0 {
            return finite(-(pv + fv) / nper);
        }
        let growth = (1.0 + rate).powf(nper);
        finite(-(rate * (pv * growth + fv)) / ((1.0 + rate * when) * (growth - 1.0)))
    })
}

/// PV(rate, nper, pmt, [fv], [type]) - Present value of a series of payments
pub fn fn_pv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let rate = number_arg(args, 0)?;
        let nper = number_arg(args, 1)?;
        let pmt = number_arg(args, 2)?;
        let fv = opt_number_arg(args, 3, 0.0)?;
        let when = payment_type(args, 4)?;

        if rate == 0.0 {
            return finite(-(fv + pmt * nper));
        }
        let growth = (1.0 + rate).powf(nper);
        finite(-(fv + pmt * (1.0 + rate * when) * (growth - 1.0) / rate) / growth)
    })
}

/// FV(rate, nper, pmt, [pv], [type]) - Future value of an investment
pub fn fn_fv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let rate = number_arg(args, 0)?;
        let nper = number_arg(args, 1)?;
        let pmt = number_arg(args, 2)?;
        let pv = opt_number_arg(args, 3, 0.0)?;
        let when = payment_type(args, 4)?;

        if rate == 0.0 {
            return finite(-(pv + pmt * nper));
        }
        let growth = (1.0 + rate).powf(nper);
        finite(-(pv * growth + pmt * (1.0 + rate * when) * (growth - 1.0) / rate))
    })
}

/// NPER(rate, pmt, pv, [fv], [type]) - Number of periods
pub fn fn_nper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let rate = number_arg(args, 0)?;
        let pmt = number_arg(args, 1)?;
        let pv = number_arg(args, 2)?;
        let fv = opt_number_arg(args, 3, 0.0)?;
        let when = payment_type(args, 4)?;

        if rate == 0.0 {
            if pmt == 0.0 {
                return Err(CellError::Num);
            }
            return finite(-(pv + fv) / pmt);
        }

        let adjusted = pmt * (1.0 + rate * when);
        let ratio = (adjusted - fv * rate) / (adjusted + pv * rate);
        if ratio <= 0.0 {
            return Err(CellError::Num);
        }
        finite(ratio.ln() / (1.0 + rate).ln())
    })
}

/// NPV(rate, value1, ...) - Net present value; the first value is one period out
pub fn fn_npv(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let rate = number_arg(args, 0)?;
        if rate == -1.0 {
            return Err(CellError::Div0);
        }
        let values = collect_numbers(&args[1..])?;
        let npv = total(
            values
                .iter()
                .enumerate()
                .map(|(i, v)| v / (1.0 + rate).powi(i as i32 + 1)),
        );
        finite(npv)
    })
}

/// IRR(values, [guess]) - Internal rate of return by Newton's method
pub fn fn_irr(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut flows = Vec::new();
        for value in grid_arg(args, 0)?.into_iter().flatten() {
            match value {
                FormulaValue::Number(n) => flows.push(n),
                FormulaValue::Error(e) => return Err(e),
                _ => {}
            }
        }

        if !flows.iter().any(|f| *f > 0.0) || !flows.iter().any(|f| *f < 0.0) {
            return Err(CellError::Num);
        }

        let mut rate = opt_number_arg(args, 1, 0.1)?;
        for _ in 0..IRR_MAX_ITERATIONS {
            let (mut npv, mut slope) = (0.0, 0.0);
            for (t, flow) in flows.iter().enumerate() {
                let t = t as f64;
                let discount = (1.0 + rate).powf(t);
                npv += flow / discount;
                slope -= t * flow / (discount * (1.0 + rate));
            }
            if slope == 0.0 {
                break;
            }
            let next = rate - npv / slope;
            if !next.is_finite() || next <= -1.0 {
                break;
            }
            if (next - rate).abs() < IRR_TOLERANCE {
                return Ok(FormulaValue::Number(next));
            }
            rate = next;
        }
        Err(CellError::Num)
    })
}

/// SLN(cost, salvage, life) - Straight-line depreciation per period
pub fn fn_sln(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let cost = number_arg(args, 0)?;
        let salvage = number_arg(args, 1)?;
        let life = number_arg(args, 2)?;
        if life == 0.0 {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number((cost - salvage) / life))
    })
}
