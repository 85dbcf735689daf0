//! Lookup functions

use std::cmp::Ordering;

use sheetguard_core::CellError;

use super::criteria::CriteriaMatcher;
use super::{array_dims, grid_arg, lift, number_arg, opt_number_arg, scalar_arg};
use crate::error::FormulaResult;
use crate::evaluator::{compare_values, EvaluationContext, FormulaValue};

fn values_equal(a: &FormulaValue, b: &FormulaValue) -> bool {
    match (a, b) {
        (FormulaValue::Number(x), FormulaValue::Number(y)) => x == y,
        (FormulaValue::Boolean(x), FormulaValue::Boolean(y)) => x == y,
        (FormulaValue::String(x), FormulaValue::String(y)) => x.eq_ignore_ascii_case(y),
        (FormulaValue::Empty, FormulaValue::Empty) => true,
        _ => false,
    }
}

/// Same family for approximate matching: numbers with numbers, text with text
fn same_kind(a: &FormulaValue, b: &FormulaValue) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// The lookup value; ranges and errors are rejected
fn lookup_value(args: &[FormulaValue]) -> Result<FormulaValue, CellError> {
    match args.first().ok_or(CellError::Value)? {
        FormulaValue::Error(e) => Err(*e),
        v => Ok(v.clone().into_scalar()),
    }
}

/// A one-row or one-column grid as a flat list
fn vector(grid: &[Vec<FormulaValue>]) -> Result<Vec<FormulaValue>, CellError> {
    match array_dims(grid) {
        (1, _) => Ok(grid[0].clone()),
        (_, 1) => Ok(grid.iter().map(|row| row[0].clone()).collect()),
        _ => Err(CellError::Na),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchMode {
    Exact,
    Wildcard,
    /// Largest value not above the lookup value, input sorted ascending
    NextSmaller,
    /// Smallest value not below the lookup value, input sorted descending
    NextLarger,
}

/// Position of `target` in `values` (0-based)
fn find(target: &FormulaValue, values: &[FormulaValue], mode: MatchMode) -> Option<usize> {
    match mode {
        MatchMode::Exact => values.iter().position(|v| values_equal(target, v)),
        MatchMode::Wildcard => {
            let matcher = CriteriaMatcher::new(&FormulaValue::String(format!("={}", target.as_string()))).ok()?;
            values.iter().position(|v| matcher.matches(v))
        }
        MatchMode::NextSmaller | MatchMode::NextLarger => {
            let stop = if mode == MatchMode::NextSmaller {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            let mut found = None;
            for (i, v) in values.iter().enumerate() {
                if !same_kind(target, v) {
                    continue;
                }
                let ord = compare_values(v, target);
                if ord == Ordering::Equal {
                    return Some(i);
                }
                if ord == stop {
                    break;
                }
                found = Some(i);
            }
            found
        }
    }
}

/// 1-based index argument, checked against `len`
fn index_arg(args: &[FormulaValue], index: usize, len: usize) -> Result<usize, CellError> {
    let n = number_arg(args, index)?.trunc();
    if n < 1.0 {
        return Err(CellError::Value);
    }
    if n as usize > len {
        return Err(CellError::Ref);
    }
    Ok(n as usize - 1)
}

fn range_lookup_arg(args: &[FormulaValue], index: usize) -> Result<MatchMode, CellError> {
    let approximate = match scalar_arg(args, index) {
        None | Some(FormulaValue::Empty) => true,
        Some(FormulaValue::Error(e)) => return Err(e),
        Some(v) => v.as_bool().ok_or(CellError::Value)?,
    };
    Ok(if approximate {
        MatchMode::NextSmaller
    } else {
        MatchMode::Exact
    })
}

/// INDEX(array, row_num, [column_num]); a zero index selects the whole row or column
pub fn fn_index(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let grid = grid_arg(args, 0)?;
        let (rows, cols) = array_dims(&grid);
        let mut row = number_arg(args, 1)?.trunc();
        let mut col = opt_number_arg(args, 2, 0.0)?.trunc();

        if row < 0.0 || col < 0.0 {
            return Err(CellError::Value);
        }
        // A single row or column can be indexed by one number
        if args.len() < 3 && rows == 1 && cols > 1 {
            (row, col) = (1.0, row);
        } else if args.len() < 3 {
            col = 1.0;
        }
        if row as usize > rows || col as usize > cols {
            return Err(CellError::Ref);
        }

        Ok(match (row as usize, col as usize) {
            (0, 0) => FormulaValue::Array(grid),
            (0, c) => FormulaValue::Array(grid.iter().map(|r| vec![r[c - 1].clone()]).collect()),
            (r, 0) => FormulaValue::Array(vec![grid[r - 1].clone()]),
            (r, c) => grid[r - 1][c - 1].clone(),
        })
    })
}

/// MATCH(lookup_value, lookup_array, [match_type])
///
/// `match_type` 1 (default) finds the largest value not above the lookup
/// value, 0 an exact match (with wildcards for text), -1 the smallest value
/// not below it.
pub fn fn_match(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let target = lookup_value(args)?;
        let values = vector(&grid_arg(args, 1)?)?;
        let mode = match opt_number_arg(args, 2, 1.0)? {
            t if t > 0.0 => MatchMode::NextSmaller,
            t if t < 0.0 => MatchMode::NextLarger,
            _ if matches!(&target, FormulaValue::String(s) if s.contains(['*', '?'])) => {
                MatchMode::Wildcard
            }
            _ => MatchMode::Exact,
        };

        find(&target, &values, mode)
            .map(|i| FormulaValue::Number((i + 1) as f64))
            .ok_or(CellError::Na)
    })
}

/// VLOOKUP(lookup_value, table_array, col_index_num, [range_lookup])
pub fn fn_vlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let target = lookup_value(args)?;
        let table = grid_arg(args, 1)?;
        let (_, cols) = array_dims(&table);
        let col = index_arg(args, 2, cols)?;
        let mode = range_lookup_arg(args, 3)?;

        let keys: Vec<FormulaValue> = table.iter().map(|row| row[0].clone()).collect();
        let row = find(&target, &keys, mode).ok_or(CellError::Na)?;
        Ok(table[row][col].clone())
    })
}

/// HLOOKUP(lookup_value, table_array, row_index_num, [range_lookup])
pub fn fn_hlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let target = lookup_value(args)?;
        let table = grid_arg(args, 1)?;
        let (rows, _) = array_dims(&table);
        let row = index_arg(args, 2, rows)?;
        let mode = range_lookup_arg(args, 3)?;

        let col = find(&target, &table[0], mode).ok_or(CellError::Na)?;
        Ok(table[row][col].clone())
    })
}

/// XLOOKUP(lookup_value, lookup_array, return_array, [if_not_found], [match_mode], [search_mode])
///
/// `match_mode`: 0 exact, -1 exact or next smaller, 1 exact or next larger,
/// 2 wildcard. `search_mode` -1 searches from the end.
pub fn fn_xlookup(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let target = lookup_value(args)?;
        let lookup = grid_arg(args, 1)?;
        let returns = grid_arg(args, 2)?;
        let keys = vector(&lookup).map_err(|_| CellError::Value)?;

        let match_mode = opt_number_arg(args, 4, 0.0)?.trunc() as i64;
        let reverse = opt_number_arg(args, 5, 1.0)? < 0.0;

        let mut ordered: Vec<(usize, &FormulaValue)> = keys.iter().enumerate().collect();
        if reverse {
            ordered.reverse();
        }

        let hit = match match_mode {
            0 => ordered.iter().find(|(_, v)| values_equal(&target, v)).map(|(i, _)| *i),
            2 => {
                let flat: Vec<FormulaValue> = ordered.iter().map(|(_, v)| (*v).clone()).collect();
                find(&target, &flat, MatchMode::Wildcard).map(|pos| ordered[pos].0)
            }
            -1 | 1 => {
                let wanted = if match_mode == -1 {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                // Exact match first, otherwise the closest value on the wanted side
                ordered
                    .iter()
                    .find(|(_, v)| values_equal(&target, v))
                    .or_else(|| {
                        ordered
                            .iter()
                            .filter(|(_, v)| same_kind(&target, v) && compare_values(v, &target) == wanted)
                            .reduce(|best, cand| {
                                if compare_values(cand.1, best.1) == wanted.reverse() {
                                    cand
                                } else {
                                    best
                                }
                            })
                    })
                    .map(|(i, _)| *i)
            }
            _ => return Err(CellError::Value),
        };

        let Some(i) = hit else {
            return match args.get(3) {
                Some(fallback) => Ok(fallback.clone()),
                None => Err(CellError::Na),
            };
        };

        // Return the matching row (vertical lookup) or column (horizontal lookup)
        let (lookup_rows, _) = array_dims(&lookup);
        let (ret_rows, ret_cols) = array_dims(&returns);
        if lookup_rows > 1 || keys.len() == 1 {
            if i >= ret_rows {
                return Err(CellError::Value);
            }
            Ok(match ret_cols {
                1 => returns[i][0].clone(),
                _ => FormulaValue::Array(vec![returns[i].clone()]),
            })
        } else {
            if i >= ret_cols {
                return Err(CellError::Value);
            }
            Ok(match ret_rows {
                1 => returns[0][i].clone(),
                _ => FormulaValue::Array(returns.iter().map(|r| vec![r[i].clone()]).collect()),
            })
        }
    })
}

/// CHOOSE(index_num, value1, ...)
pub fn fn_choose(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| {
        let n = number_arg(args, 0)?.trunc();
        if n < 1.0 || n as usize >= args.len() {
            return Err(CellError::Value);
        }
        Ok(args[n as usize].clone())
    })
}

/// ROWS(array)
pub fn fn_rows(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(array_dims(&grid_arg(args, 0)?).0 as f64)))
}

/// COLUMNS(array)
pub fn fn_columns(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    lift(|| Ok(FormulaValue::Number(array_dims(&grid_arg(args, 0)?).1 as f64)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(f: super::super::FunctionImpl, args: &[FormulaValue]) -> FormulaValue {
        f(args, &EvaluationContext::simple()).unwrap()
    }

    fn num(n: f64) -> FormulaValue {
        FormulaValue::Number(n)
    }

    fn s(v: &str) -> FormulaValue {
        FormulaValue::String(v.into())
    }

    fn table() -> FormulaValue {
        FormulaValue::Array(vec![
            vec![num(10.0), s("Basic")],
            vec![num(20.0), s("Pro")],
            vec![num(30.0), s("Enterprise")],
        ])
    }

    #[test]
    fn test_vlookup_exact_and_approximate() {
        assert_eq!(
            call(fn_vlookup, &[num(20.0), table(), num(2.0), FormulaValue::Boolean(false)]),
            s("Pro")
        );
        assert_eq!(call(fn_vlookup, &[num(25.0), table(), num(2.0)]), s("Pro"));
        assert_eq!(
            call(fn_vlookup, &[num(25.0), table(), num(2.0), FormulaValue::Boolean(false)]),
            FormulaValue::Error(CellError::Na)
        );
        assert_eq!(
            call(fn_vlookup, &[num(20.0), table(), num(3.0)]),
            FormulaValue::Error(CellError::Ref)
        );
    }

    #[test]
    fn test_hlookup() {
        let row_table = FormulaValue::Array(vec![
            vec![s("a"), s("b")],
            vec![num(1.0), num(2.0)],
        ]);
        assert_eq!(
            call(fn_hlookup, &[s("B"), row_table, num(2.0), FormulaValue::Boolean(false)]),
            num(2.0)
        );
    }

    #[test]
    fn test_match_modes() {
        let sorted = FormulaValue::Array(vec![vec![num(10.0)], vec![num(20.0)], vec![num(30.0)]]);
        assert_eq!(call(fn_match, &[num(20.0), sorted.clone(), num(0.0)]), num(2.0));
        assert_eq!(call(fn_match, &[num(25.0), sorted.clone()]), num(2.0));
        assert_eq!(
            call(fn_match, &[num(5.0), sorted]),
            FormulaValue::Error(CellError::Na)
        );

        let names = FormulaValue::Array(vec![vec![s("apple"), s("banana")]]);
        assert_eq!(call(fn_match, &[s("ban*"), names, num(0.0)]), num(2.0));
    }

    #[test]
    fn test_index() {
        assert_eq!(call(fn_index, &[table(), num(3.0), num(2.0)]), s("Enterprise"));
        assert_eq!(call(fn_index, &[table(), num(4.0), num(1.0)]), FormulaValue::Error(CellError::Ref));
        assert_eq!(
            call(fn_index, &[table(), num(0.0), num(1.0)]),
            FormulaValue::Array(vec![vec![num(10.0)], vec![num(20.0)], vec![num(30.0)]])
        );
    }

    #[test]
    fn test_xlookup() {
        let keys = FormulaValue::Array(vec![vec![s("x")], vec![s("y")], vec![s("z")]]);
        let vals = FormulaValue::Array(vec![vec![num(1.0)], vec![num(2.0)], vec![num(3.0)]]);
        assert_eq!(call(fn_xlookup, &[s("Y"), keys.clone(), vals.clone()]), num(2.0));
        assert_eq!(
            call(fn_xlookup, &[s("w"), keys.clone(), vals.clone(), s("none")]),
            s("none")
        );
        assert_eq!(
            call(fn_xlookup, &[s("w"), keys, vals.clone()]),
            FormulaValue::Error(CellError::Na)
        );

        let numbers = FormulaValue::Array(vec![vec![num(10.0)], vec![num(20.0)], vec![num(30.0)]]);
        assert_eq!(
            call(fn_xlookup, &[num(25.0), numbers.clone(), vals.clone(), FormulaValue::Empty, num(-1.0)]),
            num(2.0)
        );
        assert_eq!(
            call(fn_xlookup, &[num(25.0), numbers, vals, FormulaValue::Empty, num(1.0)]),
            num(3.0)
        );
    }

    #[test]
    fn test_choose_rows_columns() {
        assert_eq!(call(fn_choose, &[num(2.0), s("a"), s("b")]), s("b"));
        assert_eq!(call(fn_choose, &[num(3.0), s("a"), s("b")]), FormulaValue::Error(CellError::Value));
        assert_eq!(call(fn_rows, &[table()]), num(3.0));
        assert_eq!(call(fn_columns, &[table()]), num(2.0));
        assert_eq!(call(fn_rows, &[num(1.0)]), num(1.0));
    }
}
