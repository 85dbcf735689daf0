//! # sheetguard
//!
//! Validate a spreadsheet formula before it is written, and repair the
//! common failure of dividing by zero.
//!
//! A guarded write runs three stages in a fixed order, and the file is
//! only touched when all of them pass:
//!
//! - the [syntax checker](check_syntax): parentheses, sheet names, range
//!   bounds, known functions, argument counts
//! - the [semantic evaluator](evaluate_formula): the formula is evaluated
//!   against a copy of the workbook, with every other formula recalculated
//! - the write itself, through a [`WorkbookStore`]
//!
//! Failures come back as a [`ValidationResult`] tagged with an
//! [`ErrorKind`]. [`GuardError`] is reserved for caller mistakes such as a
//! missing file or an unknown sheet.
//!
//! ## Example
//!
//! ```no_run
//! use sheetguard::{write_formula_with_error_handling, ScalarValue};
//!
//! let outcome = write_formula_with_error_handling(
//!     "orders.xlsx",
//!     "Raw_Orders",
//!     "H2",
//!     r#"=AVERAGEIFS(C:C,B:B,"Pro")/COUNTIFS(B:B,"Enterprise",E:E,1)"#,
//!     3,
//!     Some(ScalarValue::Number(0.0)),
//! )
//! .unwrap();
//!
//! // The zero-guarded rewrite was written on the second attempt
//! assert!(outcome.success && !outcome.used_fallback);
//! println!("{}", outcome.to_json().unwrap());
//! ```

pub mod calculation;
pub mod classify;
pub mod error;
pub mod guarded;
pub mod options;
pub mod prelude;
pub mod repair;
pub mod result;
pub mod semantic;
pub mod snapshot;
pub mod store;
pub mod syntax;

pub use calculation::{RecalcStats, Recalculation, WorkbookCalculationExt};
pub use classify::{classify, classify_error};
pub use error::{GuardError, GuardResult};
pub use guarded::{write_and_evaluate_formula, GuardedWriter};
pub use options::{GuardOptions, RepairOptions};
pub use repair::{write_formula_with_error_handling, RepairLoop};
pub use result::{
    ErrorKind, FallbackValue, Rejection, RepairAttempt, RepairOutcome, RepairState, ScalarValue,
    ValidationResult,
};
pub use semantic::{evaluate_formula, EvalOutcome};
pub use snapshot::{cell_values, sheet_names, SheetSnapshot, WorkbookSnapshot};
pub use store::{CellContent, WorkbookStore, XlsxStore};
pub use syntax::{check_syntax, SyntaxCheck};

// Re-export the model and formula types callers need alongside the pipeline
pub use sheetguard_core::{
    CellAddress, CellError, CellRange, CellValue, Workbook, Worksheet, MAX_COLS, MAX_ROWS,
};
pub use sheetguard_formula::{
    evaluate, parse_formula, EvaluationContext, FormulaError, FormulaExpr, FormulaValue,
    FunctionCategory, FunctionDef, FunctionRegistry,
};
pub use sheetguard_formula::functions::registry;
pub use sheetguard_xlsx::{XlsxError, XlsxReader, XlsxWriter};
