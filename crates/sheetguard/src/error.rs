//! Errors for caller misuse and I/O.
//!
//! A formula that fails validation is not an error: it comes back as a
//! [`ValidationResult`](crate::ValidationResult). `GuardError` covers the
//! conditions a caller has to fix before any formula can be checked.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for guarded operations
pub type GuardResult<T> = std::result::Result<T, GuardError>;

/// Errors raised by the guarded-write pipeline
#[derive(Debug, Error)]
pub enum GuardError {
    /// The workbook file does not exist
    #[error("Workbook not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The target sheet does not exist in the workbook
    #[error("Sheet '{sheet}' not found. Available sheets: {}", .available.join(", "))]
    SheetNotFound { sheet: String, available: Vec<String> },

    /// The target cell is not a valid A1 address
    #[error("Invalid cell address: {0}")]
    InvalidCell(String),

    /// The file is not a readable workbook archive
    #[error("Not a valid workbook: {0}")]
    Format(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// XLSX error not covered by a more specific variant
    #[error("XLSX error: {0}")]
    Xlsx(#[from] sheetguard_xlsx::XlsxError),

    /// Core model error
    #[error("Core error: {0}")]
    Core(#[from] sheetguard_core::Error),
}
