//! Cell-related types
//!
//! - [`CellValue`] - the value stored in a cell
//! - [`CellAddress`] / [`CellRange`] - a cell's location and rectangular spans
//! - [`CellData`] / [`CellStorage`] - sparse per-sheet storage

mod address;
mod storage;
mod value;

pub use address::{CellAddress, CellRange, CellRangeIterator};
pub use storage::{CellData, CellStorage};
pub use value::{CellError, CellValue, SharedString};
