//! Map evaluator tokens and error text onto [`ErrorKind`]

use lazy_regex::regex;
use sheetguard_core::CellError;

use crate::result::ErrorKind;

/// Keyword groups tried in order against lowercase free text
const KEYWORDS: &[(&[&str], ErrorKind)] = &[
    (&["division by zero", "divide by zero"], ErrorKind::DivisionByZero),
    (&["circular", "reference", "sheet not found"], ErrorKind::ReferenceError),
    (&["unknown function", "name"], ErrorKind::NameError),
    (&["parse", "syntax", "parenthes", "argument"], ErrorKind::SyntaxError),
    (&["value", "type"], ErrorKind::ValueError),
    (&["num", "overflow"], ErrorKind::NumError),
    (&["null", "not available"], ErrorKind::NullError),
];

/// Classify an evaluator error token
pub fn classify_error(error: CellError) -> ErrorKind {
    match error {
        CellError::Div0 => ErrorKind::DivisionByZero,
        CellError::Name => ErrorKind::NameError,
        CellError::Ref => ErrorKind::ReferenceError,
        CellError::Value => ErrorKind::ValueError,
        CellError::Na | CellError::Null => ErrorKind::NullError,
        CellError::Num => ErrorKind::NumError,
        CellError::Spill | CellError::Calc | CellError::GettingData => ErrorKind::UnsupportedError,
    }
}

/// Classify an error token or a free-text error message.
///
/// A spreadsheet error token anywhere in the text wins; otherwise the text
/// is matched against keyword groups. Unmatched text is `UnsupportedError`.
pub fn classify(text: &str) -> ErrorKind {
    let token = regex!(r"(?i)#(?:DIV/0!|NAME\?|REF!|VALUE!|N/A|NUM!|NULL!|SPILL!|CALC!|GETTING_DATA)");
    if let Some(error) = token.find(text).and_then(|m| CellError::from_str(m.as_str())) {
        return classify_error(error);
    }

    let lower = text.to_lowercase();
    KEYWORDS
        .iter()
        .find(|(words, _)| words.iter().any(|w| lower.contains(w)))
        .map(|&(_, kind)| kind)
        .unwrap_or(ErrorKind::UnsupportedError)
}
