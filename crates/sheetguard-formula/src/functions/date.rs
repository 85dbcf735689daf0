//! Date/time functions
//!
//! Dates are serial day numbers. In the 1900 system serial 1 is 1900-01-01
//! and serial 60 is the non-existent 1900-02-29 kept for compatibility;
//! in the 1904 system serial 0 is 1904-01-01.

use chrono::{Datelike, Local, Months, NaiveDate, Timelike};
use sheetguard_core::CellError;

use super::{lift, number_arg, opt_number_arg};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

/// Serial of the phantom 1900-02-29
const LEAP_BUG_SERIAL: i64 = 60;

fn epoch(date_1904: bool) -> NaiveDate {
    if date_1904 {
        NaiveDate::from_ymd_opt(1904, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 31)
    }
    .unwrap_or_default()
}

/// Serial number for a calendar date
pub(crate) fn date_to_serial(date: NaiveDate, date_1904: bool) -> i64 {
    let days = (date - epoch(date_1904)).num_days();
    if !date_1904 && days >= LEAP_BUG_SERIAL {
        days + 1
    } else {
        days
    }
}

/// Calendar date for a serial number; `None` for negative or out of range serials.
///
/// The 1900 system's serial 0 and 60 have no real date and read as
/// 1899-12-31 and 1900-02-28.
pub(crate) fn serial_to_date(serial: i64, date_1904: bool) -> Option<NaiveDate> {
    if serial < 0 {
        return None;
    }
    let days = if !date_1904 && serial > LEAP_BUG_SERIAL {
        serial - 1
    } else if !date_1904 && serial == LEAP_BUG_SERIAL {
        LEAP_BUG_SERIAL - 1
    } else {
        serial
    };
    epoch(date_1904).checked_add_signed(chrono::Duration::days(days))
}

/// Year, month and day as a spreadsheet shows them, including 1900-02-29
/// and 1900-01-00
fn serial_to_ymd(serial: i64, date_1904: bool) -> Option<(i32, u32, u32)> {
    if !date_1904 {
        match serial {
            0 => return Some((1900, 1, 0)),
            LEAP_BUG_SERIAL => return Some((1900, 2, 29)),
            _ => {}
        }
    }
    serial_to_date(serial, date_1904).map(|d| (d.year(), d.month(), d.day()))
}

fn serial_arg(args: &[FormulaValue], index: usize) -> Result<i64, CellError> {
    let n = number_arg(args, index)?;
    if n < 0.0 {
        return Err(CellError::Num);
    }
    Ok(n.floor() as i64)
}

fn date_arg(args: &[FormulaValue], index: usize, ctx: &EvaluationContext) -> Result<NaiveDate, CellError> {
    serial_to_date(serial_arg(args, index)?, ctx.date_1904()).ok_or(CellError::Num)
}

fn ymd_part(
    args: &[FormulaValue],
    ctx: &EvaluationContext,
    part: fn((i32, u32, u32)) -> f64,
) -> FormulaResult<FormulaValue> {
    lift(|| {
        let ymd = serial_to_ymd(serial_arg(args, 0)?, ctx.date_1904()).ok_or(CellError::Num)?;
        Ok(FormulaValue::Number(part(ymd)))
    })
}

fn shift_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let delta = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(delta)
    } else {
        date.checked_sub_months(delta)
    }
}

fn serial_result(date: NaiveDate, ctx: &EvaluationContext) -> Result<FormulaValue, CellError> {
    let serial = date_to_serial(date, ctx.date_1904());
    if serial < 0 {
        return Err(CellError::Num);
    }
    Ok(FormulaValue::Number(serial as f64))
}

/// DATE(year, month, day)
///
/// Years below 1900 are offsets from 1900; months and days outside their
/// usual range roll over into neighbouring months and years.
pub fn fn_date(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut year = number_arg(args, 0)?.trunc() as i64;
        let month = number_arg(args, 1)?.trunc() as i64;
        let day = number_arg(args, 2)?.trunc() as i64;

        if (0..1900).contains(&year) {
            year += 1900;
        }
        if !(0..10000).contains(&year) {
            return Err(CellError::Num);
        }

        let first = NaiveDate::from_ymd_opt(year as i32, 1, 1).ok_or(CellError::Num)?;
        let date = shift_months(first, month - 1)
            .and_then(|d| d.checked_add_signed(chrono::Duration::days(day - 1)))
            .ok_or(CellError::Num)?;
        serial_result(date, ctx)
    })
}

/// YEAR(serial)
pub fn fn_year(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    ymd_part(args, ctx, |(y, _, _)| y as f64)
}

/// MONTH(serial)
pub fn fn_month(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    ymd_part(args, ctx, |(_, m, _)| m as f64)
}

/// DAY(serial)
pub fn fn_day(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    ymd_part(args, ctx, |(_, _, d)| d as f64)
}

/// TODAY() - Current date as a serial number
pub fn fn_today(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let today = Local::now().date_naive();
    Ok(FormulaValue::Number(date_to_serial(today, ctx.date_1904()) as f64))
}

/// NOW() - Current date and time; the time is the fractional part
pub fn fn_now(_args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let now = Local::now();
    let serial = date_to_serial(now.date_naive(), ctx.date_1904()) as f64;
    let seconds = now.num_seconds_from_midnight() as f64;
    Ok(FormulaValue::Number(serial + seconds / 86_400.0))
}

/// EDATE(start, months): same day of the month, clamped to the month's end
pub fn fn_edate(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let start = date_arg(args, 0, ctx)?;
        let months = number_arg(args, 1)?.trunc() as i64;
        let date = shift_months(start, months).ok_or(CellError::Num)?;
        serial_result(date, ctx)
    })
}

/// EOMONTH(start, months): last day of the month `months` away
pub fn fn_eomonth(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let start = date_arg(args, 0, ctx)?;
        let months = number_arg(args, 1)?.trunc() as i64;
        let last = start
            .with_day(1)
            .and_then(|first| shift_months(first, months + 1))
            .and_then(|next| next.pred_opt())
            .ok_or(CellError::Num)?;
        serial_result(last, ctx)
    })
}

/// WEEKDAY(serial, [return_type])
///
/// Type 1: Sunday=1..Saturday=7. Type 2: Monday=1..Sunday=7. Type 3: Monday=0..Sunday=6.
pub fn fn_weekday(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let serial = serial_arg(args, 0)?;
        let return_type = opt_number_arg(args, 1, 1.0)?.trunc() as i64;

        // Days since Sunday
        let from_sunday = if ctx.date_1904() {
            let date = serial_to_date(serial, true).ok_or(CellError::Num)?;
            i64::from(date.weekday().num_days_from_sunday())
        } else {
            // Serial 1 is treated as a Sunday, which keeps every date from
            // 1900-03-01 on its real weekday
            (serial + 6) % 7
        };

        let value = match return_type {
            1 => from_sunday + 1,
            2 => (from_sunday + 6) % 7 + 1,
            3 => (from_sunday + 6) % 7,
            _ => return Err(CellError::Num),
        };
        Ok(FormulaValue::Number(value as f64))
    })
}

/// DAYS(end, start)
pub fn fn_days(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let end = serial_arg(args, 0)?;
        let start = serial_arg(args, 1)?;
        Ok(FormulaValue::Number((end - start) as f64))
    })
}
