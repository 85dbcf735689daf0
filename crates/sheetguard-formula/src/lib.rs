//! # sheetguard-formula
//!
//! Formula parser and evaluator for sheetguard.
//!
//! This crate provides:
//! - Formula parsing (text → AST), including quoted sheet names and
//!   whole-column / whole-row ranges
//! - Formula evaluation (AST → value) against a [`Workbook`](sheetguard_core::Workbook)
//! - The built-in function table, partitioned by [`FunctionCategory`]
//! - Dependency tracking for recalculation order and cycle detection
//!
//! ## Example
//!
//! ```rust
//! use sheetguard_formula::{evaluate, parse_formula, EvaluationContext, FormulaValue};
//!
//! let ast = parse_formula("=SUM(1,2,3)").unwrap();
//! let value = evaluate(&ast, &EvaluationContext::simple()).unwrap();
//! assert_eq!(value, FormulaValue::Number(6.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;

pub use ast::{BinaryOperator, CellReference, FormulaExpr, RangeReference, UnaryOperator};
pub use dependency::{CellKey, DependencyGraph};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, EvaluationContext, FormulaValue};
pub use functions::{FunctionCategory, FunctionDef, FunctionRegistry};
pub use parser::parse_formula;
