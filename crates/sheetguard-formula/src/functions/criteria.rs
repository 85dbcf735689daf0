//! Criteria matching for SUMIF, COUNTIFS, AVERAGEIFS and related functions
//!
//! A criterion is either a plain value (`5`, `"Pro"`) or a string that
//! starts with a comparison operator (`">5"`, `"<>Pro"`, `"="`). Text
//! matches are case-insensitive and understand `*` and `?` wildcards.

use sheetguard_core::CellError;

use super::{array_dims, grid_arg};
use crate::evaluator::FormulaValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn split(s: &str) -> (Op, &str) {
        for (prefix, op) in [
            (">=", Op::Ge),
            ("<=", Op::Le),
            ("<>", Op::Ne),
            (">", Op::Gt),
            ("<", Op::Lt),
            ("=", Op::Eq),
        ] {
            if let Some(rest) = s.strip_prefix(prefix) {
                return (op, rest);
            }
        }
        (Op::Eq, s)
    }

    fn holds(self, ord: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Op::Eq => ord == Equal,
            Op::Ne => ord != Equal,
            Op::Lt => ord == Less,
            Op::Le => ord != Greater,
            Op::Gt => ord == Greater,
            Op::Ge => ord != Less,
        }
    }
}

#[derive(Debug)]
enum Criterion {
    Number(Op, f64),
    /// Lowercased pattern
    Text(Op, String),
    /// `""` or `"="`
    Blank,
    /// `"<>"`
    NonBlank,
}

/// Criteria matcher for the conditional aggregate functions
#[derive(Debug)]
pub struct CriteriaMatcher {
    criterion: Criterion,
}

impl CriteriaMatcher {
    /// Build a matcher from a criteria argument; an error criteria is returned as `Err`
    pub fn new(criteria: &FormulaValue) -> Result<Self, CellError> {
        let criterion = match criteria.clone().into_scalar() {
            FormulaValue::Number(n) => Criterion::Number(Op::Eq, n),
            FormulaValue::Boolean(b) => Criterion::Number(Op::Eq, if b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => Self::parse(&s),
            FormulaValue::Empty => Criterion::Blank,
            FormulaValue::Error(e) => return Err(e),
            FormulaValue::Array(_) => Criterion::Blank,
        };
        Ok(Self { criterion })
    }

    fn parse(s: &str) -> Criterion {
        let (op, rest) = Op::split(s.trim());
        let rest = rest.trim();

        if rest.is_empty() {
            return match op {
                Op::Eq => Criterion::Blank,
                Op::Ne => Criterion::NonBlank,
                _ => Criterion::Text(op, String::new()),
            };
        }

        match rest.parse::<f64>() {
            Ok(n) => Criterion::Number(op, n),
            Err(_) => Criterion::Text(op, rest.to_lowercase()),
        }
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &FormulaValue) -> bool {
        match &self.criterion {
            Criterion::Number(op, target) => {
                let n = match value {
                    FormulaValue::Number(n) => *n,
                    FormulaValue::Boolean(b) => {
                        if *b {
                            1.0
                        } else {
                            0.0
                        }
                    }
                    // "<>5" counts everything that is not the number 5
                    _ => return *op == Op::Ne,
                };
                let ord = if (n - target).abs() < 1e-10 {
                    std::cmp::Ordering::Equal
                } else {
                    n.partial_cmp(target).unwrap_or(std::cmp::Ordering::Equal)
                };
                op.holds(ord)
            }

            Criterion::Text(op, pattern) => match op {
                Op::Eq | Op::Ne => {
                    let text = match value {
                        FormulaValue::Empty | FormulaValue::Error(_) => None,
                        v => Some(v.as_string().to_lowercase()),
                    };
                    let hit = text.map_or(false, |t| wildcard_match(pattern, &t));
                    hit == (*op == Op::Eq)
                }
                _ => match value {
                    FormulaValue::String(s) => op.holds(s.to_lowercase().as_str().cmp(pattern)),
                    _ => false,
                },
            },

            Criterion::Blank => is_blank(value),
            Criterion::NonBlank => !is_blank(value),
        }
    }
}

fn is_blank(value: &FormulaValue) -> bool {
    matches!(value, FormulaValue::Empty) || matches!(value, FormulaValue::String(s) if s.is_empty())
}

/// `*` matches any run of characters, `?` exactly one
fn wildcard_match(pattern: &str, text: &str) -> bool {
    if !pattern.contains(['*', '?']) {
        return pattern == text;
    }

    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = backtrack {
            pi = star_pi + 1;
            ti = star_ti + 1;
            backtrack = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }

    pattern[pi..].iter().all(|&c| c == '*')
}

/// Evaluate `(range, criteria)` pairs into a grid of cells matching all of them.
///
/// Every range must have the same shape (and match `shape` when given),
/// otherwise the result is `#VALUE!`.
pub(crate) fn criteria_mask(
    pairs: &[FormulaValue],
    shape: Option<(usize, usize)>,
) -> Result<Vec<Vec<bool>>, CellError> {
    if pairs.is_empty() || pairs.len() % 2 != 0 {
        return Err(CellError::Value);
    }

    let mut mask: Option<Vec<Vec<bool>>> = None;
    for pair in 0..pairs.len() / 2 {
        let range = grid_arg(pairs, pair * 2)?;
        let matcher = CriteriaMatcher::new(&pairs[pair * 2 + 1])?;

        let dims = array_dims(&range);
        let expected = shape.or_else(|| mask.as_ref().map(|m| array_dims_bool(m)));
        if expected.map_or(false, |e| e != dims) {
            return Err(CellError::Value);
        }

        let hits: Vec<Vec<bool>> = range
            .iter()
            .map(|row| row.iter().map(|cell| matcher.matches(cell)).collect())
            .collect();

        mask = Some(match mask {
            None => hits,
            Some(prev) => prev
                .into_iter()
                .zip(hits)
                .map(|(a, b)| a.into_iter().zip(b).map(|(x, y)| x && y).collect())
                .collect(),
        });
    }

    mask.ok_or(CellError::Value)
}

fn array_dims_bool(mask: &[Vec<bool>]) -> (usize, usize) {
    (mask.len(), mask.first().map_or(0, |r| r.len()))
}

/// Values of `grid` at the positions set in `mask`
pub(crate) fn selected<'a>(
    grid: &'a [Vec<FormulaValue>],
    mask: &'a [Vec<bool>],
) -> impl Iterator<Item = &'a FormulaValue> + 'a {
    grid.iter()
        .zip(mask)
        .flat_map(|(row, hits)| row.iter().zip(hits).filter(|(_, hit)| **hit).map(|(v, _)| v))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> FormulaValue {
        FormulaValue::String(s.into())
    }

    fn matcher(criteria: FormulaValue) -> CriteriaMatcher {
        CriteriaMatcher::new(&criteria).unwrap()
    }

    #[test]
    fn test_number_criteria() {
        let m = matcher(FormulaValue::Number(5.0));
        assert!(m.matches(&FormulaValue::Number(5.0)));
        assert!(!m.matches(&FormulaValue::Number(4.0)));
        assert!(!m.matches(&text("5")));
    }

    #[test]
    fn test_comparison_criteria() {
        let gt = matcher(text(">5"));
        assert!(gt.matches(&FormulaValue::Number(6.0)));
        assert!(!gt.matches(&FormulaValue::Number(5.0)));

        let le = matcher(text("<=5"));
        assert!(le.matches(&FormulaValue::Number(5.0)));
        assert!(!le.matches(&FormulaValue::Number(6.0)));

        let ne = matcher(text("<>5"));
        assert!(ne.matches(&FormulaValue::Number(4.0)));
        assert!(ne.matches(&text("abc")));
        assert!(!ne.matches(&FormulaValue::Number(5.0)));
    }

    #[test]
    fn test_text_criteria() {
        let m = matcher(text("Pro"));
        assert!(m.matches(&text("pro")));
        assert!(m.matches(&text("PRO")));
        assert!(!m.matches(&text("Enterprise")));
        assert!(!m.matches(&FormulaValue::Empty));

        let not_pro = matcher(text("<>Pro"));
        assert!(not_pro.matches(&text("Enterprise")));
        assert!(!not_pro.matches(&text("pro")));
    }

    #[test]
    fn test_wildcard_criteria() {
        let m = matcher(text("a*e"));
        assert!(m.matches(&text("apple")));
        assert!(m.matches(&text("ae")));
        assert!(!m.matches(&text("apples")));

        let m = matcher(text("a?p*"));
        assert!(m.matches(&text("apple")));
        assert!(!m.matches(&text("ap")));
    }

    #[test]
    fn test_blank_criteria() {
        let blank = matcher(text(""));
        assert!(blank.matches(&FormulaValue::Empty));
        assert!(blank.matches(&text("")));
        assert!(!blank.matches(&FormulaValue::Number(0.0)));

        let non_blank = matcher(text("<>"));
        assert!(non_blank.matches(&FormulaValue::Number(0.0)));
        assert!(!non_blank.matches(&FormulaValue::Empty));
    }

    #[test]
    fn test_error_criteria_propagates() {
        assert_eq!(
            CriteriaMatcher::new(&FormulaValue::Error(CellError::Na)).unwrap_err(),
            CellError::Na
        );
    }

    #[test]
    fn test_criteria_mask_shapes() {
        let col = |vals: &[f64]| {
            FormulaValue::Array(vals.iter().map(|v| vec![FormulaValue::Number(*v)]).collect())
        };
        let pairs = vec![
            col(&[1.0, 2.0, 3.0]),
            text(">1"),
            col(&[1.0, 1.0, 0.0]),
            FormulaValue::Number(1.0),
        ];
        assert_eq!(
            criteria_mask(&pairs, None).unwrap(),
            vec![vec![false], vec![true], vec![false]]
        );

        let mismatched = vec![col(&[1.0, 2.0]), text(">1"), col(&[1.0]), text("1")];
        assert_eq!(criteria_mask(&mismatched, None), Err(CellError::Value));
        assert_eq!(criteria_mask(&pairs[..3], None), Err(CellError::Value));
    }
}
