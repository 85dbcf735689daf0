//! Auto-repair loop
//!
//! Runs the guarded writer on a short, fixed list of candidates:
//!
//! 1. the formula as given
//! 2. `=IF(<denominator>=0,0,<formula>)`, when the formula divides
//! 3. `=IFERROR(<formula>,0)`
//!
//! The loop moves to the next candidate only after a `DivisionByZero`, and
//! never runs more than `max_retries` guarded writes. When nothing could be
//! written, the fallback literal is written instead, if there is one.

use std::path::Path;

use log::{debug, info};

use crate::error::GuardResult;
use crate::guarded::{parse_cell, GuardedWriter};
use crate::options::RepairOptions;
use crate::result::{
    ErrorKind, FallbackValue, RepairAttempt, RepairOutcome, RepairState, ValidationResult,
};
use crate::store::{normalize_formula, CellContent, WorkbookStore, XlsxStore};

/// Guarded writes with bounded automatic repair
#[derive(Debug, Clone)]
pub struct RepairLoop<S = XlsxStore> {
    writer: GuardedWriter<S>,
    options: RepairOptions,
}

impl RepairLoop<XlsxStore> {
    pub fn new(options: RepairOptions) -> Self {
        Self::with_store(XlsxStore, options)
    }
}

impl Default for RepairLoop<XlsxStore> {
    fn default() -> Self {
        Self::new(RepairOptions::default())
    }
}

impl<S: WorkbookStore> RepairLoop<S> {
    pub fn with_store(store: S, options: RepairOptions) -> Self {
        Self {
            writer: GuardedWriter::with_store(store).options(options.guard),
            options,
        }
    }

    pub fn options(&self) -> &RepairOptions {
        &self.options
    }

    /// Write `formula` to `sheet!cell`, repairing it if it divides by zero.
    ///
    /// Only a failed fallback write is returned as an error; failures of
    /// the guarded writer are recorded in the attempt trail.
    pub fn run<P: AsRef<Path>>(
        &self,
        path: P,
        sheet: &str,
        cell: &str,
        formula: &str,
    ) -> GuardResult<RepairOutcome> {
        let path = path.as_ref();
        let candidates = candidates(formula);
        let mut attempts: Vec<RepairAttempt> = Vec::new();
        let mut state = RepairState::Attempting(1);

        while let RepairState::Attempting(n) = state {
            if n > self.options.max_retries {
                break;
            }
            let Some(candidate) = candidates.get(n - 1) else {
                break;
            };

            debug!("attempt {}: {}", n, candidate);
            let result = match self.writer.write_and_evaluate_formula(path, sheet, cell, candidate) {
                Ok(result) => result,
                Err(e) => ValidationResult::failure(ErrorKind::UnsupportedError, e.to_string()),
            };
            let retry = result.error == Some(ErrorKind::DivisionByZero);
            let success = result.success;
            attempts.push(RepairAttempt {
                attempt: n,
                formula: candidate.clone(),
                result,
            });

            state = if success {
                RepairState::Succeeded
            } else if retry {
                RepairState::Attempting(n + 1)
            } else {
                break;
            };
        }

        if state == RepairState::Succeeded {
            let value = attempts.last().and_then(|a| a.result.value.clone());
            return Ok(RepairOutcome {
                success: true,
                value,
                used_fallback: false,
                attempts,
                original_formula: formula.to_string(),
                state,
            });
        }

        match &self.options.error_fallback {
            Some(fallback) => {
                self.write_fallback(path, sheet, cell, fallback)?;
                Ok(RepairOutcome {
                    success: true,
                    value: Some(fallback.clone()),
                    used_fallback: true,
                    attempts,
                    original_formula: formula.to_string(),
                    state: RepairState::FallbackUsed,
                })
            }
            None => {
                debug!("no candidate succeeded after {} attempt(s)", attempts.len());
                Ok(RepairOutcome {
                    success: false,
                    value: None,
                    used_fallback: false,
                    attempts,
                    original_formula: formula.to_string(),
                    state: RepairState::ExhaustedNoFallback,
                })
            }
        }
    }

    fn write_fallback(
        &self,
        path: &Path,
        sheet: &str,
        cell: &str,
        fallback: &FallbackValue,
    ) -> GuardResult<()> {
        let address = parse_cell(cell)?;
        self.writer
            .store()
            .write_cell(path, sheet, address, CellContent::Literal(fallback.clone()))?;
        info!("wrote fallback {} to {}!{}", fallback, sheet, cell);
        Ok(())
    }
}

/// Write a formula with up to `max_retries` guarded attempts, then the
/// fallback literal if every attempt failed
pub fn write_formula_with_error_handling<P: AsRef<Path>>(
    path: P,
    sheet: &str,
    cell: &str,
    formula: &str,
    max_retries: usize,
    error_fallback: Option<FallbackValue>,
) -> GuardResult<RepairOutcome> {
    let options = RepairOptions {
        max_retries,
        error_fallback,
        ..RepairOptions::default()
    };
    RepairLoop::new(options).run(path, sheet, cell, formula)
}

/// The candidate formulas, in order, without repeats
pub(crate) fn candidates(formula: &str) -> Vec<String> {
    let original = normalize_formula(formula);
    let body = original[1..].to_string();

    let mut list = vec![original];
    match denominator(&body) {
        Some(den) => list.push(format!("=IF({}=0,0,{})", den, body)),
        None => debug!("no denominator found in {}", body),
    }
    list.push(format!("=IFERROR({},0)", body));

    let mut unique: Vec<String> = Vec::with_capacity(list.len());
    for candidate in list {
        if !unique.contains(&candidate) {
            unique.push(candidate);
        }
    }
    unique
}

/// The operand right of the last `/` that is outside any parentheses.
///
/// A textual scan: string literals and quoted sheet names are skipped, and
/// the operand ends at the next operator or closing parenthesis at its own
/// nesting level. Exponents stay with the operand, since `^` binds tighter
/// than `/`.
pub(crate) fn denominator(body: &str) -> Option<String> {
    let chars: Vec<char> = body.chars().collect();
    let mut depth = 0i32;
    let mut last_slash = None;
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '"' | '\'' => i = skip_quoted(&chars, i),
            '(' => depth += 1,
            ')' => depth -= 1,
            '/' if depth == 0 => last_slash = Some(i),
            _ => {}
        }
        i += 1;
    }

    let start = last_slash? + 1;
    let mut depth = 0i32;
    let mut end = start;
    let mut seen_operand = false;

    while end < chars.len() {
        let c = chars[end];
        match c {
            '"' | '\'' => {
                end = skip_quoted(&chars, end);
                seen_operand = true;
            }
            '(' => depth += 1,
            ')' if depth == 0 => break,
            ')' => depth -= 1,
            // A leading sign belongs to the operand
            '+' | '-' if depth == 0 && !seen_operand => {}
            '+' | '-' | '*' | '/' | '&' | '=' | '<' | '>' | ',' if depth == 0 => break,
            c if c.is_whitespace() => {}
            _ => seen_operand = true,
        }
        end += 1;
    }

    let operand: String = chars[start..end.min(chars.len())].iter().collect();
    let operand = operand.trim();
    if operand.is_empty() {
        None
    } else {
        Some(operand.to_string())
    }
}

/// Index of the quote closing the literal that opens at `start`.
/// Doubled quotes are escapes.
fn skip_quoted(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i;
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_denominator() {
        assert_eq!(denominator("A1/B1").as_deref(), Some("B1"));
        assert_eq!(denominator("A1/B1+1").as_deref(), Some("B1"));
        assert_eq!(denominator("A1/(B1-C1)*2").as_deref(), Some("(B1-C1)"));
        assert_eq!(denominator("A1/B1^2").as_deref(), Some("B1^2"));
        assert_eq!(denominator("A1/-B1").as_deref(), Some("-B1"));
        assert_eq!(denominator("A1/B1/C1").as_deref(), Some("C1"));
        assert_eq!(
            denominator(r#"AVERAGEIFS(C:C,B:B,"Pro")/COUNTIFS(B:B,"Enterprise",E:E,1)"#).as_deref(),
            Some(r#"COUNTIFS(B:B,"Enterprise",E:E,1)"#)
        );
        assert_eq!(denominator("'Q1 / Q2'!A1/Data!B2").as_deref(), Some("Data!B2"));
    }

    #[test]
    fn test_no_top_level_division() {
        assert_eq!(denominator("SUM(A1/B1)"), None);
        assert_eq!(denominator(r#"CONCAT("a/b",A1)"#), None);
        assert_eq!(denominator("A1/"), None);
        assert_eq!(denominator("A1+B1"), None);
    }

    #[test]
    fn test_candidates() {
        assert_eq!(
            candidates("A1/B1"),
            vec![
                "=A1/B1".to_string(),
                "=IF(B1=0,0,A1/B1)".to_string(),
                "=IFERROR(A1/B1,0)".to_string(),
            ]
        );
        assert_eq!(
            candidates("=SUM(A1/B1)"),
            vec!["=SUM(A1/B1)".to_string(), "=IFERROR(SUM(A1/B1),0)".to_string()]
        );
    }
}
