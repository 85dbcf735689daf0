//! # sheetguard-core
//!
//! Core data structures shared by the sheetguard crates.
//!
//! - [`CellValue`] and [`CellError`] - what a cell holds, including spreadsheet error tokens
//! - [`CellAddress`] and [`CellRange`] - A1-style addressing bounded to `A1:XFD1048576`
//! - [`Worksheet`] and [`Workbook`] - the in-memory model formulas are evaluated against
//!
//! ## Example
//!
//! ```rust
//! use sheetguard_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value("A1", 42.0).unwrap();
//! sheet.set_cell_formula("B1", "A1*2").unwrap();
//!
//! assert_eq!(sheet.get_value("A1").unwrap(), CellValue::Number(42.0));
//! assert_eq!(sheet.get_value("B1").unwrap().formula_text(), Some("=A1*2"));
//! ```

pub mod cell;
pub mod error;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellData, CellError, CellRange, CellValue, SharedString};
pub use error::{Error, Result};
pub use workbook::{Workbook, WorkbookSettings};
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit, column XFD)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
