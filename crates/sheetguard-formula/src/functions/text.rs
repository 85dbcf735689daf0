//! Text functions
//!
//! Positions and lengths count characters, not bytes.

use chrono::Datelike;
use sheetguard_core::CellError;

use super::date::serial_to_date;
use super::math::round_half_away;
use super::{lift, number_arg, opt_number_arg, scalar_arg, text_arg};
use crate::error::FormulaResult;
use crate::evaluator::{EvaluationContext, FormulaValue};

fn count_arg(args: &[FormulaValue], index: usize, default: f64) -> Result<usize, CellError> {
    let n = opt_number_arg(args, index, default)?;
    if n < 0.0 {
        return Err(CellError::Value);
    }
    Ok(n.trunc() as usize)
}

fn text(s: String) -> Result<FormulaValue, CellError> {
    Ok(FormulaValue::String(s))
}

/// LEN(text)
pub fn fn_len(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(text_arg(args, 0)?.chars().count() as f64)))
}

/// LEFT(text, [num_chars])
pub fn fn_left(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let n = count_arg(args, 1, 1.0)?;
        text(s.chars().take(n).collect())
    })
}

/// RIGHT(text, [num_chars])
pub fn fn_right(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let n = count_arg(args, 1, 1.0)?;
        let skip = s.chars().count().saturating_sub(n);
        text(s.chars().skip(skip).collect())
    })
}

/// MID(text, start_num, num_chars)
pub fn fn_mid(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let start = number_arg(args, 1)?.trunc();
        if start < 1.0 {
            return Err(CellError::Value);
        }
        let n = count_arg(args, 2, 0.0)?;
        text(s.chars().skip(start as usize - 1).take(n).collect())
    })
}

/// UPPER(text)
pub fn fn_upper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| text(text_arg(args, 0)?.to_uppercase()))
}

/// LOWER(text)
pub fn fn_lower(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| text(text_arg(args, 0)?.to_lowercase()))
}

/// PROPER(text) - Capitalizes the first letter of every word
pub fn fn_proper(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let mut out = String::new();
        let mut word_start = true;
        for ch in text_arg(args, 0)?.chars() {
            if ch.is_alphabetic() {
                if word_start {
                    out.extend(ch.to_uppercase());
                } else {
                    out.extend(ch.to_lowercase());
                }
                word_start = false;
            } else {
                out.push(ch);
                word_start = !ch.is_alphanumeric();
            }
        }
        text(out)
    })
}

/// TRIM(text) - Strips the ends and collapses inner runs of spaces
pub fn fn_trim(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        text(s.split(' ').filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
    })
}

/// Every value in the arguments, ranges flattened row by row
fn flat_strings(args: &[FormulaValue], skip_empty: bool) -> Result<Vec<String>, CellError> {
    let mut out = Vec::new();
    for arg in args {
        let values: Box<dyn Iterator<Item = &FormulaValue>> = match arg {
            FormulaValue::Array(rows) => Box::new(rows.iter().flatten()),
            other => Box::new(std::iter::once(other)),
        };
        for value in values {
            match value {
                FormulaValue::Error(e) => return Err(*e),
                FormulaValue::Empty if skip_empty => {}
                FormulaValue::String(s) if skip_empty && s.is_empty() => {}
                v => out.push(v.as_string()),
            }
        }
    }
    Ok(out)
}

/// CONCAT / CONCATENATE
pub fn fn_concat(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| text(flat_strings(args, false)?.concat()))
}

/// TEXTJOIN(delimiter, ignore_empty, text1, ...)
pub fn fn_textjoin(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let delimiter = text_arg(args, 0)?;
        let ignore_empty = match scalar_arg(args, 1) {
            Some(FormulaValue::Error(e)) => return Err(e),
            Some(v) => v.as_bool().ok_or(CellError::Value)?,
            None => true,
        };
        text(flat_strings(&args[2..], ignore_empty)?.join(&delimiter))
    })
}

/// REPT(text, times)
pub fn fn_rept(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let times = count_arg(args, 1, 0.0)?;
        if s.chars().count().saturating_mul(times) > 32_767 {
            return Err(CellError::Value);
        }
        text(s.repeat(times))
    })
}

/// SUBSTITUTE(text, old_text, new_text, [instance_num])
///
/// Without `instance_num` every occurrence is replaced.
pub fn fn_substitute(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let s = text_arg(args, 0)?;
        let old = text_arg(args, 1)?;
        let new = text_arg(args, 2)?;
        if old.is_empty() {
            return text(s);
        }

        if args.len() < 4 {
            return text(s.replace(&old, &new));
        }

        let instance = number_arg(args, 3)?.trunc();
        if instance < 1.0 {
            return Err(CellError::Value);
        }
        match s.match_indices(&old).nth(instance as usize - 1) {
            Some((pos, _)) => text(format!("{}{}{}", &s[..pos], new, &s[pos + old.len()..])),
            None => text(s),
        }
    })
}

/// 1-based character position of `needle` in `haystack` from `start_num`
fn position(args: &[FormulaValue], fold_case: bool) -> Result<FormulaValue, CellError> {
    let mut needle = text_arg(args, 0)?;
    let mut haystack = text_arg(args, 1)?;
    let start = opt_number_arg(args, 2, 1.0)?.trunc();

    if fold_case {
        needle = needle.to_lowercase();
        haystack = haystack.to_lowercase();
    }

    let len = haystack.chars().count();
    if start < 1.0 || start as usize > len.max(1) {
        return Err(CellError::Value);
    }

    let skip = start as usize - 1;
    let rest: String = haystack.chars().skip(skip).collect();
    let found = if fold_case && needle.contains(['*', '?']) {
        wildcard_find(&needle, &rest)
    } else {
        rest.find(&needle).map(|byte| rest[..byte].chars().count())
    };

    found
        .map(|offset| FormulaValue::Number((skip + offset + 1) as f64))
        .ok_or(CellError::Value)
}

/// Character offset of the first match of a `*`/`?` pattern
fn wildcard_find(pattern: &str, text: &str) -> Option<usize> {
    let chars: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();
    (0..=chars.len()).find(|&start| matches_prefix(&pattern, &chars[start..]))
}

fn matches_prefix(pattern: &[char], text: &[char]) -> bool {
    match pattern.split_first() {
        None => true,
        Some(('*', rest)) => (0..=text.len()).any(|i| matches_prefix(rest, &text[i..])),
        Some((&p, rest)) => match text.split_first() {
            Some((&t, text_rest)) if p == '?' || p == t => matches_prefix(rest, text_rest),
            _ => false,
        },
    }
}

/// FIND(find_text, within_text, [start_num]) - Case-sensitive, no wildcards
pub fn fn_find(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| position(args, false))
}

/// SEARCH(find_text, within_text, [start_num]) - Case-insensitive, with wildcards
pub fn fn_search(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| position(args, true))
}

/// EXACT(text1, text2) - Case-sensitive comparison
pub fn fn_exact(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Boolean(text_arg(args, 0)? == text_arg(args, 1)?)))
}

/// VALUE(text) - Parses numbers, including percentages and thousands separators
pub fn fn_value(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = scalar_arg(args, 0).ok_or(CellError::Value)?;
        let s = match value {
            FormulaValue::Number(n) => return Ok(FormulaValue::Number(n)),
            FormulaValue::Error(e) => return Err(e),
            FormulaValue::Empty => return Ok(FormulaValue::Number(0.0)),
            v => v.as_string(),
        };

        let trimmed = s.trim();
        let (body, scale) = match trimmed.strip_suffix('%') {
            Some(body) => (body, 0.01),
            None => (trimmed, 1.0),
        };
        let cleaned: String = body.chars().filter(|c| *c != ',' && *c != '$').collect();
        cleaned
            .trim()
            .parse::<f64>()
            .map(|n| FormulaValue::Number(n * scale))
            .map_err(|_| CellError::Value)
    })
}

/// TEXT(value, format_text)
///
/// Understands digit placeholders (`0`, `#`), thousands separators,
/// percentages, literal prefixes and suffixes, and the date tokens
/// `yyyy`, `yy`, `mm`, `m`, `dd` and `d`.
pub fn fn_text(args: &[FormulaValue], ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let value = scalar_arg(args, 0).ok_or(CellError::Value)?;
        let pattern = text_arg(args, 1)?;

        if let FormulaValue::Error(e) = value {
            return Err(e);
        }
        let n = match value.as_number() {
            Some(n) if !matches!(value, FormulaValue::Empty | FormulaValue::Boolean(_)) => n,
            _ => return text(value.as_string()),
        };

        if pattern.is_empty() || pattern.eq_ignore_ascii_case("general") || pattern == "@" {
            return text(value.as_string());
        }

        if is_date_pattern(&pattern) {
            return format_date(n, &pattern, ctx.date_1904()).map(FormulaValue::String);
        }
        text(format_number_pattern(n, &pattern))
    })
}

fn is_date_pattern(pattern: &str) -> bool {
    let lower = pattern.to_ascii_lowercase();
    !lower.contains(['0', '#']) && lower.contains(['y', 'm', 'd'])
}

fn format_date(serial: f64, pattern: &str, date_1904: bool) -> Result<String, CellError> {
    let date = serial_to_date(serial.floor() as i64, date_1904).ok_or(CellError::Value)?;
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i].to_ascii_lowercase();
        let run = chars[i..]
            .iter()
            .take_while(|ch| ch.to_ascii_lowercase() == c)
            .count();

        match (c, run) {
            ('y', 1..=2) => out.push_str(&format!("{:02}", date.year() % 100)),
            ('y', _) => out.push_str(&format!("{:04}", date.year())),
            ('m', 1) => out.push_str(&date.month().to_string()),
            ('m', _) => out.push_str(&format!("{:02}", date.month())),
            ('d', 1) => out.push_str(&date.day().to_string()),
            ('d', _) => out.push_str(&format!("{:02}", date.day())),
            _ => chars[i..i + run].iter().for_each(|ch| out.push(*ch)),
        }
        i += run;
    }
    Ok(out)
}

fn format_number_pattern(n: f64, pattern: &str) -> String {
    let is_placeholder = |c: char| matches!(c, '0' | '#' | '.' | ',');
    let (first, last) = match (pattern.find(is_placeholder), pattern.rfind(is_placeholder)) {
        (Some(first), Some(last)) => (first, last),
        _ => return pattern.to_string(),
    };
    let prefix = &pattern[..first];
    let core = &pattern[first..=last];
    let suffix = &pattern[last + 1..];

    let n = if pattern.contains('%') { n * 100.0 } else { n };
    let decimals = core
        .split_once('.')
        .map_or(0, |(_, frac)| frac.chars().filter(|c| *c == '0' || *c == '#').count());
    let grouped = core.split('.').next().map_or(false, |int| int.contains(','));

    let rounded = round_half_away(n.abs(), decimals as i32);
    let formatted = format!("{:.*}", decimals, rounded);
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };

    let mut body = if grouped { group_thousands(&int_part) } else { int_part };
    if let Some(frac) = frac_part {
        body.push('.');
        body.push_str(&frac);
    }

    let sign = if n < 0.0 && rounded != 0.0 { "-" } else { "" };
    format!("{}{}{}{}", sign, prefix, body, suffix)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(f: super::super::FunctionImpl, args: &[FormulaValue]) -> FormulaValue {
        f(args, &EvaluationContext::simple()).unwrap()
    }

    fn s(v: &str) -> FormulaValue {
        FormulaValue::String(v.into())
    }

    fn num(n: f64) -> FormulaValue {
        FormulaValue::Number(n)
    }

    #[test]
    fn test_slicing_counts_characters() {
        assert_eq!(call(fn_len, &[s("héllo")]), num(5.0));
        assert_eq!(call(fn_left, &[s("héllo"), num(2.0)]), s("hé"));
        assert_eq!(call(fn_right, &[s("héllo")]), s("o"));
        assert_eq!(call(fn_mid, &[s("héllo"), num(2.0), num(3.0)]), s("éll"));
        assert_eq!(call(fn_mid, &[s("abc"), num(0.0), num(1.0)]), FormulaValue::Error(CellError::Value));
        assert_eq!(call(fn_len, &[num(123.0)]), num(3.0));
    }

    #[test]
    fn test_case_and_trim() {
        assert_eq!(call(fn_upper, &[s("pro")]), s("PRO"));
        assert_eq!(call(fn_proper, &[s("hello wORLD-wide")]), s("Hello World-Wide"));
        assert_eq!(call(fn_trim, &[s("  a   b  ")]), s("a b"));
    }

    #[test]
    fn test_concat_and_textjoin() {
        let range = FormulaValue::Array(vec![vec![s("a"), FormulaValue::Empty, num(1.0)]]);
        assert_eq!(call(fn_concat, &[range.clone(), s("!")]), s("a1!"));
        assert_eq!(
            call(fn_textjoin, &[s(", "), FormulaValue::Boolean(true), range.clone()]),
            s("a, 1")
        );
        assert_eq!(
            call(fn_textjoin, &[s("-"), FormulaValue::Boolean(false), range]),
            s("a--1")
        );
    }

    #[test]
    fn test_substitute() {
        assert_eq!(call(fn_substitute, &[s("a-b-c"), s("-"), s("+")]), s("a+b+c"));
        assert_eq!(call(fn_substitute, &[s("a-b-c"), s("-"), s("+"), num(2.0)]), s("a-b+c"));
        assert_eq!(call(fn_substitute, &[s("a-b-c"), s("-"), s("+"), num(5.0)]), s("a-b-c"));
    }

    #[test]
    fn test_find_and_search() {
        assert_eq!(call(fn_find, &[s("b"), s("abcb")]), num(2.0));
        assert_eq!(call(fn_find, &[s("b"), s("abcb"), num(3.0)]), num(4.0));
        assert_eq!(call(fn_find, &[s("B"), s("abc")]), FormulaValue::Error(CellError::Value));
        assert_eq!(call(fn_search, &[s("B"), s("abc")]), num(2.0));
        assert_eq!(call(fn_search, &[s("c?e"), s("abcde")]), num(3.0));
    }

    #[test]
    fn test_value_parsing() {
        assert_eq!(call(fn_value, &[s("1,234.5")]), num(1234.5));
        assert_eq!(call(fn_value, &[s("50%")]), num(0.5));
        assert_eq!(call(fn_value, &[s("abc")]), FormulaValue::Error(CellError::Value));
    }

    #[test]
    fn test_text_formats() {
        assert_eq!(call(fn_text, &[num(1234.567), s("#,##0.00")]), s("1,234.57"));
        assert_eq!(call(fn_text, &[num(0.256), s("0.0%")]), s("25.6%"));
        assert_eq!(call(fn_text, &[num(-42.0), s("$0")]), s("-$42"));
        assert_eq!(call(fn_text, &[num(45306.0), s("yyyy-mm-dd")]), s("2024-01-15"));
        assert_eq!(call(fn_text, &[s("abc"), s("0.00")]), s("abc"));
    }

    #[test]
    fn test_rept_and_exact() {
        assert_eq!(call(fn_rept, &[s("ab"), num(3.0)]), s("ababab"));
        assert_eq!(call(fn_exact, &[s("a"), s("A")]), FormulaValue::Boolean(false));
    }
}
