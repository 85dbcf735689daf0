//! Formula Abstract Syntax Tree types

use sheetguard_core::{CellAddress, CellError, CellRange};

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(CellError),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference, including whole columns (`C:C`) and rows (`1:1`)
    RangeRef(RangeReference),
    /// Bare name that is neither a reference nor a function call
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },

    // === Array ===
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Visit every cell and range reference in the expression.
    ///
    /// Single cells are reported as one-cell ranges.
    pub fn for_each_reference<F>(&self, f: &mut F)
    where
        F: FnMut(Option<&str>, &CellRange),
    {
        match self {
            FormulaExpr::CellRef(r) => f(r.sheet.as_deref(), &CellRange::single(r.address)),
            FormulaExpr::RangeRef(r) => f(r.sheet.as_deref(), &r.range),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.for_each_reference(f);
                right.for_each_reference(f);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.for_each_reference(f),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.for_each_reference(f);
                }
            }
            FormulaExpr::Array(rows) => {
                for expr in rows.iter().flatten() {
                    expr.for_each_reference(f);
                }
            }
            FormulaExpr::Number(_)
            | FormulaExpr::String(_)
            | FormulaExpr::Boolean(_)
            | FormulaExpr::Error(_)
            | FormulaExpr::NameRef(_) => {}
        }
    }

    /// Visit every function call as `(NAME, argument_count)`, outermost first
    pub fn for_each_call<F>(&self, f: &mut F)
    where
        F: FnMut(&str, usize),
    {
        match self {
            FormulaExpr::Function { name, args } => {
                f(name, args.len());
                for arg in args {
                    arg.for_each_call(f);
                }
            }
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.for_each_call(f);
                right.for_each_call(f);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.for_each_call(f),
            FormulaExpr::Array(rows) => {
                for expr in rows.iter().flatten() {
                    expr.for_each_call(f);
                }
            }
            _ => {}
        }
    }
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,

    // Range between two non-literal operands
    Range,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}

#[cfg(test)]
mod tests {
    use crate::parse_formula;

    #[test]
    fn test_reference_walk() {
        let ast = parse_formula("=SUM(A1:A3)+Data!B2*C:C").unwrap();
        let mut seen = Vec::new();
        ast.for_each_reference(&mut |sheet, range| {
            seen.push((sheet.map(str::to_string), range.to_a1_string()));
        });
        assert_eq!(
            seen,
            vec![
                (None, "A1:A3".to_string()),
                (Some("Data".to_string()), "B2".to_string()),
                (None, "C:C".to_string()),
            ]
        );
    }

    #[test]
    fn test_call_walk() {
        let ast = parse_formula("=IF(A1>0,ROUND(A1,2),SUM(1,2,3))").unwrap();
        let mut calls = Vec::new();
        ast.for_each_call(&mut |name, argc| calls.push((name.to_string(), argc)));
        assert_eq!(
            calls,
            vec![
                ("IF".to_string(), 3),
                ("ROUND".to_string(), 2),
                ("SUM".to_string(), 3)
            ]
        );
    }
}
