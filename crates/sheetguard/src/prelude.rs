//! Prelude module - common imports for sheetguard users
//!
//! ```rust
//! use sheetguard::prelude::*;
//! ```

pub use crate::{
    check_syntax,
    classify,
    evaluate_formula,
    write_and_evaluate_formula,
    write_formula_with_error_handling,
    CellAddress,
    CellValue,
    ErrorKind,
    GuardError,
    GuardOptions,
    GuardResult,
    GuardedWriter,
    RepairLoop,
    RepairOptions,
    RepairOutcome,
    RepairState,
    ScalarValue,
    ValidationResult,
    WorkbookStore,
    XlsxStore,
};
