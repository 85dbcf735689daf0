//! Dependency tracking for formula calculation

use ahash::{AHashMap, AHashSet};
use sheetguard_core::CellAddress;

/// Unique key for a cell (sheet index + address)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    pub sheet: usize,
    pub row: u32,
    pub col: u16,
}

impl CellKey {
    /// Create a new cell key
    pub fn new(sheet: usize, row: u32, col: u16) -> Self {
        Self { sheet, row, col }
    }

    /// Create from sheet index and cell address
    pub fn from_address(sheet: usize, addr: &CellAddress) -> Self {
        Self::new(sheet, addr.row, addr.col)
    }
}

/// Dependency graph for formula cells
///
/// Tracks which cells each formula reads, so formulas can be recalculated
/// precedents-first and cycles can be reported. Built fresh for every
/// recalculation.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Cell → cells it depends on
    precedents: AHashMap<CellKey, AHashSet<CellKey>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `dependent` reads `precedent`
    pub fn add_dependency(&mut self, precedent: CellKey, dependent: CellKey) {
        self.precedents
            .entry(dependent)
            .or_default()
            .insert(precedent);
    }

    /// Get cells that the given cell depends on
    pub fn get_precedents(&self, cell: CellKey) -> impl Iterator<Item = CellKey> + '_ {
        self.precedents
            .get(&cell)
            .into_iter()
            .flat_map(|set| set.iter().copied())
    }

    /// Order `cells` so that every cell comes after the cells it reads.
    ///
    /// Only cells from `cells` appear in the result. Members of a cycle are
    /// emitted in DFS order; callers check [`has_circular_reference`] first.
    ///
    /// [`has_circular_reference`]: DependencyGraph::has_circular_reference
    pub fn evaluation_order(&self, cells: &[CellKey]) -> Vec<CellKey> {
        let wanted: AHashSet<CellKey> = cells.iter().copied().collect();
        let mut result = Vec::with_capacity(cells.len());
        let mut visited = AHashSet::new();

        // Sorted so that the order is stable between runs
        let mut roots = cells.to_vec();
        roots.sort_unstable();

        for cell in roots {
            self.visit_precedents(cell, &wanted, &mut visited, &mut result);
        }

        result
    }

    fn visit_precedents(
        &self,
        cell: CellKey,
        wanted: &AHashSet<CellKey>,
        visited: &mut AHashSet<CellKey>,
        result: &mut Vec<CellKey>,
    ) {
        if !visited.insert(cell) {
            return;
        }

        if let Some(precedents) = self.precedents.get(&cell) {
            let mut sorted: Vec<_> = precedents.iter().copied().collect();
            sorted.sort_unstable();
            for precedent in sorted {
                self.visit_precedents(precedent, wanted, visited, result);
            }
        }

        if wanted.contains(&cell) {
            result.push(cell);
        }
    }

    /// Whether `cell` can reach itself through its precedents
    pub fn has_circular_reference(&self, cell: CellKey) -> bool {
        let mut stack: Vec<CellKey> = self.get_precedents(cell).collect();
        let mut seen = AHashSet::new();

        while let Some(next) = stack.pop() {
            if next == cell {
                return true;
            }
            if seen.insert(next) {
                stack.extend(self.get_precedents(next));
            }
        }

        false
    }
}
