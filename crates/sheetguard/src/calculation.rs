//! Workbook recalculation
//!
//! Recomputes every formula cell of a materialized workbook in dependency
//! order, so that a formula injected for validation reads up-to-date values
//! instead of whatever results the file happened to cache.

use std::collections::{HashMap, HashSet};

use log::{debug, warn};
use sheetguard_core::{CellError, CellValue, Workbook};
use sheetguard_formula::{
    evaluate, parse_formula, CellKey, DependencyGraph, EvaluationContext, FormulaExpr,
};

/// Statistics from a recalculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecalcStats {
    /// Formula cells that parsed
    pub formula_count: usize,
    /// Cells whose result was stored
    pub cells_calculated: usize,
    /// Cells that are part of a cycle
    pub circular_references: usize,
    /// Formulas that failed to parse or evaluate
    pub errors: usize,
}

/// Outcome of [`WorkbookCalculationExt::recalculate`]
#[derive(Debug, Clone, Default)]
pub struct Recalculation {
    pub stats: RecalcStats,
    /// Cells that can reach themselves through their references
    pub circular_cells: HashSet<CellKey>,
}

impl Recalculation {
    pub fn is_circular(&self, cell: CellKey) -> bool {
        self.circular_cells.contains(&cell)
    }
}

/// Extension trait for Workbook to add recalculation
pub trait WorkbookCalculationExt {
    /// Recalculate every formula cell.
    ///
    /// Cells in a cycle get `#REF!`. A formula that does not parse keeps
    /// its cached value.
    fn recalculate(&mut self) -> Recalculation;
}

impl WorkbookCalculationExt for Workbook {
    fn recalculate(&mut self) -> Recalculation {
        let mut engine = CalculationEngine::default();
        let stats = engine.calculate_all(self);
        Recalculation {
            stats,
            circular_cells: engine.circular_cells,
        }
    }
}

#[derive(Default)]
struct CalculationEngine {
    dependency_graph: DependencyGraph,
    /// Parsed formula ASTs, keyed by CellKey
    parsed_formulas: HashMap<CellKey, FormulaExpr>,
    circular_cells: HashSet<CellKey>,
}

impl CalculationEngine {
    fn calculate_all(&mut self, workbook: &mut Workbook) -> RecalcStats {
        let mut stats = RecalcStats::default();

        self.collect_formulas(workbook, &mut stats);
        if stats.formula_count == 0 {
            return stats;
        }

        self.build_dependencies(workbook);
        self.detect_circular_references();
        stats.circular_references = self.circular_cells.len();

        let order = self.calculation_order();
        self.calculate_cells(workbook, &order, &mut stats);

        debug!(
            "recalculated {} of {} formula cell(s), {} circular, {} error(s)",
            stats.cells_calculated, stats.formula_count, stats.circular_references, stats.errors
        );
        stats
    }

    /// Parse every formula cell
    fn collect_formulas(&mut self, workbook: &Workbook, stats: &mut RecalcStats) {
        for (sheet_idx, sheet) in workbook.worksheets().enumerate() {
            for (row, col, formula_text) in sheet.formula_cells() {
                match parse_formula(formula_text) {
                    Ok(ast) => {
                        self.parsed_formulas.insert(CellKey::new(sheet_idx, row, col), ast);
                        stats.formula_count += 1;
                    }
                    Err(e) => {
                        warn!(
                            "keeping cached value of {}!{}: {}",
                            sheet.name(),
                            sheetguard_core::CellAddress::new(row, col).to_a1_string(),
                            e
                        );
                        stats.errors += 1;
                    }
                }
            }
        }
    }

    /// Link each formula to the formula cells its references cover.
    ///
    /// Plain values never need recalculating, so only formula precedents
    /// are tracked; whole-column ranges stay cheap this way.
    fn build_dependencies(&mut self, workbook: &Workbook) {
        let mut by_sheet: HashMap<usize, Vec<CellKey>> = HashMap::new();
        for key in self.parsed_formulas.keys() {
            by_sheet.entry(key.sheet).or_default().push(*key);
        }

        for (&cell_key, ast) in &self.parsed_formulas {
            ast.for_each_reference(&mut |sheet, range| {
                let sheet_idx = match sheet {
                    Some(name) => match workbook.sheet_index(name) {
                        Some(idx) => idx,
                        // Evaluates to #REF!; nothing to depend on
                        None => return,
                    },
                    None => cell_key.sheet,
                };
                for &precedent in by_sheet.get(&sheet_idx).into_iter().flatten() {
                    let address = sheetguard_core::CellAddress::new(precedent.row, precedent.col);
                    if range.contains(&address) {
                        self.dependency_graph.add_dependency(precedent, cell_key);
                    }
                }
            });
        }
    }

    fn detect_circular_references(&mut self) {
        for &cell_key in self.parsed_formulas.keys() {
            if self.dependency_graph.has_circular_reference(cell_key) {
                self.circular_cells.insert(cell_key);
            }
        }
    }

    /// Formula cells, precedents first
    fn calculation_order(&self) -> Vec<CellKey> {
        let all_cells: Vec<CellKey> = self.parsed_formulas.keys().copied().collect();
        self.dependency_graph.evaluation_order(&all_cells)
    }

    fn calculate_cells(&self, workbook: &mut Workbook, order: &[CellKey], stats: &mut RecalcStats) {
        for &cell_key in order {
            let Some(ast) = self.parsed_formulas.get(&cell_key) else {
                continue;
            };

            let result: CellValue = if self.circular_cells.contains(&cell_key) {
                stats.errors += 1;
                CellValue::Error(CellError::Ref)
            } else {
                let ctx = EvaluationContext::new(
                    Some(workbook),
                    cell_key.sheet,
                    cell_key.row,
                    cell_key.col,
                );
                match evaluate(ast, &ctx) {
                    Ok(value) => value.into_scalar().into(),
                    Err(e) => {
                        debug!(
                            "evaluation error at ({}, {}, {}): {}",
                            cell_key.sheet, cell_key.row, cell_key.col, e
                        );
                        stats.errors += 1;
                        CellValue::Error(CellError::Value)
                    }
                }
            };

            if let Some(sheet) = workbook.worksheet_mut(cell_key.sheet) {
                if sheet.set_formula_result(cell_key.row, cell_key.col, result).is_ok() {
                    stats.cells_calculated += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn calculated(wb: &Workbook, sheet: usize, address: &str) -> CellValue {
        let addr = sheetguard_core::CellAddress::parse(address).unwrap();
        wb.worksheet(sheet)
            .unwrap()
            .get_calculated_value_at(addr.row, addr.col)
            .cloned()
            .unwrap_or_default()
    }

    #[test]
    fn test_chain_is_calculated_in_dependency_order() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_value("A1", 10.0).unwrap();
        // C1 reads B1, which is stored after it in row-major order
        ws.set_cell_formula("A2", "=C1+1").unwrap();
        ws.set_cell_formula("C1", "=B1*2").unwrap();
        ws.set_cell_formula("B1", "=A1+5").unwrap();

        let recalc = wb.recalculate();

        assert_eq!(recalc.stats.formula_count, 3);
        assert_eq!(recalc.stats.cells_calculated, 3);
        assert_eq!(calculated(&wb, 0, "B1"), CellValue::Number(15.0));
        assert_eq!(calculated(&wb, 0, "C1"), CellValue::Number(30.0));
        assert_eq!(calculated(&wb, 0, "A2"), CellValue::Number(31.0));
    }

    #[test]
    fn test_cross_sheet_and_whole_column_dependencies() {
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();
        wb.worksheet_mut(1).unwrap().set_cell_value("A1", 2.0).unwrap();
        wb.worksheet_mut(1).unwrap().set_cell_formula("A2", "=A1*3").unwrap();
        wb.worksheet_mut(0).unwrap().set_cell_formula("A1", "=SUM(Data!A:A)").unwrap();

        wb.recalculate();

        assert_eq!(calculated(&wb, 0, "A1"), CellValue::Number(8.0));
    }

    #[test]
    fn test_cycle_members_get_ref_error() {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        ws.set_cell_formula("A1", "=B1+1").unwrap();
        ws.set_cell_formula("B1", "=A1+1").unwrap();
        ws.set_cell_formula("C1", "=1+1").unwrap();

        let recalc = wb.recalculate();

        assert_eq!(recalc.stats.circular_references, 2);
        assert!(recalc.is_circular(CellKey::new(0, 0, 0)));
        assert!(!recalc.is_circular(CellKey::new(0, 0, 2)));
        assert_eq!(calculated(&wb, 0, "A1"), CellValue::Error(CellError::Ref));
        assert_eq!(calculated(&wb, 0, "C1"), CellValue::Number(2.0));
    }

    #[test]
    fn test_unparseable_formula_keeps_cached_value() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0)
            .unwrap()
            .set_cell_value(
                "A1",
                CellValue::Formula {
                    text: "=SUM(".into(),
                    cached_value: Some(Box::new(CellValue::Number(7.0))),
                },
            )
            .unwrap();

        let recalc = wb.recalculate();

        assert_eq!(recalc.stats.errors, 1);
        assert_eq!(recalc.stats.formula_count, 0);
        assert_eq!(calculated(&wb, 0, "A1"), CellValue::Number(7.0));
    }

    #[test]
    fn test_reference_to_unknown_sheet() {
        let mut wb = Workbook::new();
        wb.worksheet_mut(0).unwrap().set_cell_formula("A1", "=Gone!A1").unwrap();

        wb.recalculate();

        assert_eq!(calculated(&wb, 0, "A1"), CellValue::Error(CellError::Ref));
    }
}
