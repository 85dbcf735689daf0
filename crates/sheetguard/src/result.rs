//! Result types returned to callers, serializable to JSON

use std::fmt;

use serde::{Deserialize, Serialize};
use sheetguard_core::CellValue;

/// The class of a failed validation. Exactly one is assigned per failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed formula text: unbalanced parentheses, bad range, wrong arity
    SyntaxError,
    /// Unknown sheet, out-of-bounds reference, circular reference, `#REF!`
    ReferenceError,
    /// `#DIV/0!` or a literal zero denominator
    DivisionByZero,
    /// Unknown function or `#NAME?`
    NameError,
    /// `#VALUE!`
    ValueError,
    /// `#N/A` or `#NULL!`
    NullError,
    /// `#NUM!`
    NumError,
    /// Anything not otherwise classified
    UnsupportedError,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 8] = [
        ErrorKind::SyntaxError,
        ErrorKind::ReferenceError,
        ErrorKind::DivisionByZero,
        ErrorKind::NameError,
        ErrorKind::ValueError,
        ErrorKind::NullError,
        ErrorKind::NumError,
        ErrorKind::UnsupportedError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::DivisionByZero => "DivisionByZero",
            ErrorKind::NameError => "NameError",
            ErrorKind::ValueError => "ValueError",
            ErrorKind::NullError => "NullError",
            ErrorKind::NumError => "NumError",
            ErrorKind::UnsupportedError => "UnsupportedError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell value as reported to callers: JSON number, string or bool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Number(f64),
    Boolean(bool),
    Text(String),
}

/// A literal written in place of a formula that could not be repaired
pub type FallbackValue = ScalarValue;

impl ScalarValue {
    /// Read a command-line style literal: a number, `TRUE`/`FALSE`, or text.
    /// Digits with a leading zero (`007`, `-0012`) stay text, like codes.
    pub fn parse_literal(s: &str) -> Self {
        let trimmed = s.trim();
        if !has_leading_zero(trimmed) {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return ScalarValue::Number(n);
                }
            }
        }
        if trimmed.eq_ignore_ascii_case("TRUE") {
            ScalarValue::Boolean(true)
        } else if trimmed.eq_ignore_ascii_case("FALSE") {
            ScalarValue::Boolean(false)
        } else {
            ScalarValue::Text(s.to_string())
        }
    }
}

fn has_leading_zero(s: &str) -> bool {
    let digits = s.trim_start_matches(['+', '-']);
    let mut chars = digits.chars();
    chars.next() == Some('0') && chars.next().map_or(false, |c| c.is_ascii_digit())
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Number(n) => write!(f, "{}", n),
            ScalarValue::Boolean(true) => f.write_str("TRUE"),
            ScalarValue::Boolean(false) => f.write_str("FALSE"),
            ScalarValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self {
        ScalarValue::Number(n)
    }
}

impl From<bool> for ScalarValue {
    fn from(b: bool) -> Self {
        ScalarValue::Boolean(b)
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Text(s)
    }
}

impl From<ScalarValue> for CellValue {
    fn from(value: ScalarValue) -> Self {
        match value {
            ScalarValue::Number(n) => CellValue::Number(n),
            ScalarValue::Boolean(b) => CellValue::Boolean(b),
            ScalarValue::Text(s) => CellValue::string(s),
        }
    }
}

/// Why a formula was turned down before anything was written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: ErrorKind,
    pub message: String,
}

impl Rejection {
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<Rejection> for ValidationResult {
    fn from(rejection: Rejection) -> Self {
        ValidationResult::failure(rejection.kind, rejection.message)
    }
}

/// Outcome of one guarded write: `{success, value, error, error_message}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub value: Option<ScalarValue>,
    pub error: Option<ErrorKind>,
    pub error_message: Option<String>,
}

impl ValidationResult {
    /// A passed validation; `value` is `None` when the formula evaluated to an empty cell
    pub fn ok(value: Option<ScalarValue>) -> Self {
        Self {
            success: true,
            value,
            error: None,
            error_message: None,
        }
    }

    /// A failed validation
    pub fn failure<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            success: false,
            value: None,
            error: Some(kind),
            error_message: Some(message.into()),
        }
    }

    /// The error kind if this is a failure
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// One candidate tried by the repair loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairAttempt {
    /// 1-based attempt number
    pub attempt: usize,
    pub formula: String,
    pub result: ValidationResult,
}

/// Where the repair loop is, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RepairState {
    /// About to run the nth guarded write
    Attempting(usize),
    /// A candidate formula was written
    Succeeded,
    /// Every candidate failed and the fallback literal was written
    FallbackUsed,
    /// Every candidate failed and there was no fallback
    ExhaustedNoFallback,
}

impl RepairState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RepairState::Attempting(_))
    }
}

/// Terminal outcome of the repair loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    /// A candidate or the fallback was written
    pub success: bool,
    pub value: Option<ScalarValue>,
    pub used_fallback: bool,
    /// Every guarded write, in order
    pub attempts: Vec<RepairAttempt>,
    /// The caller's formula, unchanged
    pub original_formula: String,
    pub state: RepairState,
}

impl RepairOutcome {
    /// The formula that was written, if any candidate succeeded
    pub fn written_formula(&self) -> Option<&str> {
        match self.state {
            RepairState::Succeeded => self
                .attempts
                .last()
                .filter(|a| a.result.success)
                .map(|a| a.formula.as_str()),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
