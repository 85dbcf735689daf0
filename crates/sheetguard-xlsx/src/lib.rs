//! # sheetguard-xlsx
//!
//! XLSX (Office Open XML) support for sheetguard.
//!
//! - [`XlsxReader`] loads cell values, formulas and their cached results.
//! - [`XlsxWriter`] writes a whole [`Workbook`](sheetguard_core::Workbook) to a new file.
//! - [`XlsxPatcher`] rewrites individual cells of an existing file and copies
//!   every other part of the package unchanged.

pub mod error;
pub mod patch;
pub mod reader;
pub mod writer;

pub use error::{XlsxError, XlsxResult};
pub use patch::{CellPatch, XlsxPatcher};
pub use reader::XlsxReader;
pub use writer::XlsxWriter;
