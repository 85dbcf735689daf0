//! Worksheet type

use crate::cell::{CellAddress, CellData, CellRange, CellStorage, CellValue};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// A single sheet in a workbook
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    cells: CellStorage,
}

impl Worksheet {
    /// Create an empty worksheet
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            cells: CellStorage::new(),
        }
    }

    /// Get the sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    // === Cell access ===

    /// Get a cell by address string (e.g., "A1")
    pub fn cell(&self, address: &str) -> Result<Option<&CellData>> {
        let addr = CellAddress::parse(address)?;
        Ok(self.cells.get(addr.row, addr.col))
    }

    /// Get a cell by row and column indices
    pub fn cell_at(&self, row: u32, col: u16) -> Option<&CellData> {
        self.cells.get(row, col)
    }

    /// Get a cell's value by address string
    pub fn get_value(&self, address: &str) -> Result<CellValue> {
        let addr = CellAddress::parse(address)?;
        Ok(self.get_value_at(addr.row, addr.col))
    }

    /// Get a cell's value by indices (`Empty` when the cell is absent)
    pub fn get_value_at(&self, row: u32, col: u16) -> CellValue {
        self.cells
            .get(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    // === Cell modification ===

    /// Set a cell value by address string
    pub fn set_cell_value<V: Into<CellValue>>(&mut self, address: &str, value: V) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_value_at(addr.row, addr.col, value)
    }

    /// Set a cell value by row and column indices
    pub fn set_cell_value_at<V: Into<CellValue>>(
        &mut self,
        row: u32,
        col: u16,
        value: V,
    ) -> Result<()> {
        Self::validate_cell_position(row, col)?;
        self.cells.set_value(row, col, value.into());
        Ok(())
    }

    /// Set a cell formula by address string
    pub fn set_cell_formula(&mut self, address: &str, formula: &str) -> Result<()> {
        let addr = CellAddress::parse(address)?;
        self.set_cell_formula_at(addr.row, addr.col, formula)
    }

    /// Set a cell formula by indices; a leading `=` is added when missing
    pub fn set_cell_formula_at(&mut self, row: u32, col: u16, formula: &str) -> Result<()> {
        Self::validate_cell_position(row, col)?;
        let formula = formula.trim();
        let text = if formula.starts_with('=') {
            formula.to_string()
        } else {
            format!("={}", formula)
        };
        self.cells.set_value(row, col, CellValue::formula(text));
        Ok(())
    }

    /// Record the style index a cell carried in its source file
    pub fn set_cell_style_index_at(&mut self, row: u32, col: u16, style_index: u32) -> Result<()> {
        Self::validate_cell_position(row, col)?;
        let value = self.get_value_at(row, col);
        self.cells.set(row, col, CellData { value, style_index });
        Ok(())
    }

    // === Ranges ===

    /// The bounds of all non-empty cells
    pub fn used_range(&self) -> Option<CellRange> {
        self.cells
            .used_bounds()
            .map(|(min_row, min_col, max_row, max_col)| {
                CellRange::from_indices(min_row, min_col, max_row, max_col)
            })
    }

    fn validate_cell_position(row: u32, col: u16) -> Result<()> {
        if row >= MAX_ROWS {
            return Err(Error::RowOutOfBounds(row + 1, MAX_ROWS));
        }
        if col >= MAX_COLS {
            return Err(Error::ColumnOutOfBounds(col as u32 + 1, MAX_COLS));
        }
        Ok(())
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.cell_count()
    }

    /// Check if the worksheet has no cells
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over all non-empty cells in row order
    pub fn iter_cells(&self) -> impl Iterator<Item = (u32, u16, &CellData)> {
        self.cells.iter()
    }

    // === Formula calculation support ===

    /// Iterate over formula cells: (row, col, formula_text)
    pub fn formula_cells(&self) -> impl Iterator<Item = (u32, u16, &str)> {
        self.cells
            .iter()
            .filter_map(|(row, col, cell)| cell.value.formula_text().map(|t| (row, col, t)))
    }

    /// Store the calculated result of a formula cell
    pub fn set_formula_result(&mut self, row: u32, col: u16, value: CellValue) -> Result<()> {
        let address = CellAddress::new(row, col).to_a1_string();
        let cell = self
            .cells
            .get_mut(row, col)
            .ok_or_else(|| Error::NotAFormula(address.clone()))?;

        match &mut cell.value {
            CellValue::Formula { cached_value, .. } => {
                *cached_value = Some(Box::new(value));
                Ok(())
            }
            _ => Err(Error::NotAFormula(address)),
        }
    }

    /// The cached result of a formula cell, or the plain value
    pub fn get_calculated_value_at(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(row, col).map(|cell| cell.value.effective_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cell_values() {
        let mut ws = Worksheet::new("Test");

        ws.set_cell_value("A1", "Hello").unwrap();
        ws.set_cell_value("B1", 42.0).unwrap();
        ws.set_cell_value("C1", true).unwrap();

        assert_eq!(ws.get_value("A1").unwrap().as_string(), Some("Hello"));
        assert_eq!(ws.get_value("B1").unwrap().as_number(), Some(42.0));
        assert_eq!(ws.get_value("C1").unwrap().as_bool(), Some(true));
        assert_eq!(ws.get_value("D1").unwrap(), CellValue::Empty);
    }

    #[test]
    fn test_set_cell_formula_prefixes_marker() {
        let mut ws = Worksheet::new("Test");

        ws.set_cell_formula("A1", "SUM(B1:B10)").unwrap();
        ws.set_cell_formula("A2", "=B1").unwrap();

        assert_eq!(ws.get_value("A1").unwrap().formula_text(), Some("=SUM(B1:B10)"));
        assert_eq!(ws.get_value("A2").unwrap().formula_text(), Some("=B1"));
        assert_eq!(ws.formula_cells().count(), 2);
    }

    #[test]
    fn test_formula_result() {
        let mut ws = Worksheet::new("Test");
        ws.set_cell_formula("A1", "=1+1").unwrap();
        ws.set_cell_value("A2", 5.0).unwrap();

        ws.set_formula_result(0, 0, CellValue::Number(2.0)).unwrap();
        assert_eq!(ws.get_calculated_value_at(0, 0), Some(&CellValue::Number(2.0)));
        assert!(ws.set_formula_result(1, 0, CellValue::Number(1.0)).is_err());
        assert!(ws.set_formula_result(9, 9, CellValue::Number(1.0)).is_err());
    }

    #[test]
    fn test_used_range() {
        let mut ws = Worksheet::new("Test");
        assert!(ws.used_range().is_none());

        ws.set_cell_value_at(5, 3, "A").unwrap();
        ws.set_cell_value_at(10, 7, "B").unwrap();

        assert_eq!(ws.used_range(), Some(CellRange::from_indices(5, 3, 10, 7)));
    }

    #[test]
    fn test_out_of_bounds_position() {
        let mut ws = Worksheet::new("Test");
        assert!(ws.set_cell_value_at(MAX_ROWS, 0, 1.0).is_err());
        assert!(ws.set_cell_value_at(0, MAX_COLS, 1.0).is_err());
    }
}
