//! Syntax checker
//!
//! Cheap textual checks run before the formula is parsed, failing on the
//! first problem found:
//!
//! 1. empty input, then normalization to a leading `=`
//! 2. parenthesis balance
//! 3. sheet prefixes (`Name!`, `'Quoted Name'!` and the mistaken `Name.A1`)
//! 4. cell and range bounds
//! 5. function names against the built-in table
//! 6. a full parse
//! 7. argument counts
//!
//! Text inside string literals never takes part in the textual checks.

use std::ops::Range;

use lazy_regex::regex;
use regex::Captures;
use sheetguard_core::{CellAddress, MAX_ROWS};
use sheetguard_formula::functions::registry;
use sheetguard_formula::parse_formula;

use crate::result::{ErrorKind, Rejection};
use crate::store::normalize_formula;

/// The normalized formula (leading `=`) or the first problem found
pub type SyntaxCheck = Result<String, Rejection>;

/// Longest row number the grid can hold, in digits
const MAX_ROW_DIGITS: usize = 7;

/// Check `formula_text` against the sheets of the target workbook
pub fn check_syntax<S: AsRef<str>>(formula_text: &str, known_sheet_names: &[S]) -> SyntaxCheck {
    if formula_text.trim().is_empty() {
        return Err(Rejection::new(ErrorKind::SyntaxError, "Formula is empty"));
    }
    let formula = normalize_formula(formula_text);

    let masked = mask_strings(&formula);
    let prefixes = sheet_prefixes(&masked);
    let scan = blank_spans(&masked, prefixes.iter().map(|p| p.span.clone()));

    check_parentheses(&scan)?;
    check_sheet_prefixes(&prefixes, known_sheet_names)?;
    check_dotted_prefixes(&scan, known_sheet_names)?;
    check_ranges(&scan)?;
    check_function_names(&scan)?;

    let expr = parse_formula(&formula)
        .map_err(|e| Rejection::new(ErrorKind::SyntaxError, e.to_string()))?;

    let mut arity_error = None;
    expr.for_each_call(&mut |name, argc| {
        if arity_error.is_some() {
            return;
        }
        if let Some(def) = registry().get(name) {
            if !def.accepts(argc) {
                arity_error = Some(format!(
                    "{} takes {} argument(s), got {}",
                    def.name,
                    def.arity_text(),
                    argc
                ));
            }
        }
    });
    if let Some(message) = arity_error {
        return Err(Rejection::new(ErrorKind::SyntaxError, message));
    }

    Ok(formula)
}

/// Replace the contents of `"..."` literals with spaces, keeping the quotes.
///
/// A doubled quote inside a literal is an escaped quote. An unterminated
/// literal runs to the end of the text.
pub(crate) fn mask_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if !in_string {
            in_string = c == '"';
            out.push(c);
        } else if c != '"' {
            out.push(' ');
        } else if chars.peek() == Some(&'"') {
            chars.next();
            out.push_str("  ");
        } else {
            in_string = false;
            out.push(c);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
struct SheetPrefix {
    name: String,
    /// Byte span of the prefix including the `!`
    span: Range<usize>,
}

fn sheet_prefixes(masked: &str) -> Vec<SheetPrefix> {
    let mut prefixes: Vec<SheetPrefix> = regex!(r"'((?:[^']|'')+)'!")
        .captures_iter(masked)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(SheetPrefix {
                name: caps[1].replace("''", "'"),
                span: whole.range(),
            })
        })
        .collect();

    for caps in regex!(r"(?:^|[^\w.'$#])([A-Za-z_][\w.]*)!").captures_iter(masked) {
        if let Some(name) = caps.get(1) {
            let span = name.start()..name.end() + 1;
            if !prefixes.iter().any(|p| p.span.start <= span.start && span.end <= p.span.end) {
                prefixes.push(SheetPrefix {
                    name: name.as_str().to_string(),
                    span,
                });
            }
        }
    }

    prefixes.sort_by_key(|p| p.span.start);
    prefixes
}

fn blank_spans(text: &str, spans: impl Iterator<Item = Range<usize>>) -> String {
    let mut bytes = text.as_bytes().to_vec();
    for span in spans {
        for b in &mut bytes[span] {
            *b = b' ';
        }
    }
    // Spans start and end on ASCII characters, so blanking keeps UTF-8 valid
    String::from_utf8(bytes).unwrap_or_else(|_| text.to_string())
}

fn check_parentheses(scan: &str) -> Result<(), Rejection> {
    let open = scan.matches('(').count();
    let close = scan.matches(')').count();
    if open == close {
        return Ok(());
    }
    Err(Rejection::new(
        ErrorKind::SyntaxError,
        format!(
            "Unbalanced parentheses: {} opening '(' and {} closing ')'",
            open, close
        ),
    ))
}

fn is_known_sheet<S: AsRef<str>>(name: &str, known: &[S]) -> bool {
    known.iter().any(|s| s.as_ref().eq_ignore_ascii_case(name))
}

fn sheet_list<S: AsRef<str>>(known: &[S]) -> String {
    if known.is_empty() {
        return "(none)".to_string();
    }
    known.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(", ")
}

fn check_sheet_prefixes<S: AsRef<str>>(prefixes: &[SheetPrefix], known: &[S]) -> Result<(), Rejection> {
    match prefixes.iter().find(|p| !is_known_sheet(&p.name, known)) {
        None => Ok(()),
        Some(prefix) => Err(Rejection::new(
            ErrorKind::ReferenceError,
            format!(
                "Sheet '{}' not found. Available sheets: {}",
                prefix.name,
                sheet_list(known)
            ),
        )),
    }
}

/// `Sheet1.A1` is a common slip for `Sheet1!A1`
fn check_dotted_prefixes<S: AsRef<str>>(scan: &str, known: &[S]) -> Result<(), Rejection> {
    let dotted = regex!(r"(?:^|[^\w.'$!])([A-Za-z_]\w*)\.(\$?[A-Za-z]{1,3}\$?[0-9]*)");

    for caps in dotted.captures_iter(scan) {
        let (Some(sheet), Some(reference)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if continues_identifier(scan, reference.end()) {
            continue;
        }

        let name = sheet.as_str();
        if is_known_sheet(name, known) {
            return Err(Rejection::new(
                ErrorKind::SyntaxError,
                format!(
                    "Invalid sheet reference '{}.{}': use '{}!{}' to refer to another sheet",
                    name,
                    reference.as_str(),
                    name,
                    reference.as_str()
                ),
            ));
        }
        return Err(Rejection::new(
            ErrorKind::ReferenceError,
            format!(
                "Sheet '{}' not found (in '{}.{}'). Available sheets: {}",
                name,
                name,
                reference.as_str(),
                sheet_list(known)
            ),
        ));
    }
    Ok(())
}

/// Whether the character at `pos` makes the preceding token part of a longer
/// identifier or a function call
fn continues_identifier(text: &str, pos: usize) -> bool {
    text[pos..]
        .chars()
        .next()
        .map_or(false, |c| c.is_alphanumeric() || matches!(c, '_' | '.' | '(' | '$'))
}

fn check_ranges(scan: &str) -> Result<(), Rejection> {
    let cells = regex!(
        r"(?:^|[^\w.$#])(\$?[A-Za-z]{1,3})(\$?[0-9]+)?(?::(\$?[A-Za-z]{1,3})(\$?[0-9]+)?)?"
    );
    for caps in cells.captures_iter(scan) {
        let Some(whole) = caps.get(0) else { continue };
        if continues_identifier(scan, whole.end()) || scan[whole.end()..].starts_with(':') {
            continue;
        }
        check_range_token(&caps)?;
    }

    let rows = regex!(r"(?:^|[^\w.$:])(\$?[0-9]+):(\$?[0-9]+)");
    for caps in rows.captures_iter(scan) {
        let Some(whole) = caps.get(0) else { continue };
        if continues_identifier(scan, whole.end()) {
            continue;
        }
        let token = format!("{}:{}", &caps[1], &caps[2]);
        check_row(&caps[1], &token)?;
        check_row(&caps[2], &token)?;
    }
    Ok(())
}

fn check_range_token(caps: &Captures) -> Result<(), Rejection> {
    let start_col = &caps[1];
    let start_row = caps.get(2).map(|m| m.as_str());
    let end = caps.get(3).map(|m| (m.as_str(), caps.get(4).map(|r| r.as_str())));

    let token = match end {
        Some((end_col, end_row)) => format!(
            "{}{}:{}{}",
            start_col,
            start_row.unwrap_or(""),
            end_col,
            end_row.unwrap_or("")
        ),
        None => format!("{}{}", start_col, start_row.unwrap_or("")),
    };

    match end {
        // Bare letters: a name, not a reference
        None if start_row.is_none() => Ok(()),
        None => {
            check_column(start_col, &token)?;
            check_row(start_row.unwrap_or_default(), &token)
        }
        Some((_, end_row)) if start_row.is_some() != end_row.is_some() => Err(Rejection::new(
            ErrorKind::SyntaxError,
            format!(
                "Malformed range '{}': both ends need a row number, or neither",
                token
            ),
        )),
        Some((end_col, end_row)) => {
            check_column(start_col, &token)?;
            check_column(end_col, &token)?;
            if let (Some(start_row), Some(end_row)) = (start_row, end_row) {
                check_row(start_row, &token)?;
                check_row(end_row, &token)?;
            }
            Ok(())
        }
    }
}

fn check_column(letters: &str, token: &str) -> Result<(), Rejection> {
    CellAddress::letters_to_column(letters.trim_start_matches('$'))
        .map(|_| ())
        .map_err(|_| {
            Rejection::new(
                ErrorKind::ReferenceError,
                format!(
                    "Reference '{}' is out of bounds: columns end at XFD",
                    token
                ),
            )
        })
}

fn check_row(digits: &str, token: &str) -> Result<(), Rejection> {
    let digits = digits.trim_start_matches('$');
    if digits.len() > MAX_ROW_DIGITS {
        return Err(Rejection::new(
            ErrorKind::SyntaxError,
            format!("Malformed reference '{}': row number is too long", token),
        ));
    }
    match digits.parse::<u32>() {
        Ok(row) if row >= 1 && row <= MAX_ROWS => Ok(()),
        _ => Err(Rejection::new(
            ErrorKind::ReferenceError,
            format!(
                "Reference '{}' is out of bounds: rows run from 1 to {}",
                token, MAX_ROWS
            ),
        )),
    }
}

fn check_function_names(scan: &str) -> Result<(), Rejection> {
    let calls = regex!(r"(?:^|[^\w.$])([A-Za-z_][\w.]*)\s*\(");
    for caps in calls.captures_iter(scan) {
        let name = caps[1].to_uppercase();
        if registry().contains(&name) {
            continue;
        }

        let suggestions = similar_functions(&name);
        let message = if suggestions.is_empty() {
            format!("Unknown function '{}'", name)
        } else {
            format!(
                "Unknown function '{}'. Did you mean: {}?",
                name,
                suggestions.join(", ")
            )
        };
        return Err(Rejection::new(ErrorKind::NameError, message));
    }
    Ok(())
}

/// Known functions sharing the first two letters of `name`
fn similar_functions(name: &str) -> Vec<&'static str> {
    let prefix: String = name.chars().take(2).collect();
    if prefix.chars().count() < 2 {
        return Vec::new();
    }
    registry()
        .names()
        .into_iter()
        .filter(|candidate| candidate.starts_with(&prefix))
        .collect()
}
