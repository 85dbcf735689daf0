//! Cell address and range types

use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};
use std::fmt;
use std::str::FromStr;

/// A cell address (e.g., "A1", "$B$2")
///
/// Columns run from A to XFD (1-16384) and rows from 1 to 1048576. Both are
/// stored 0-based. The optional `$` markers are kept so that formulas can be
/// written back the way they were read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    /// Row index (0-based internally, 1-based in display)
    pub row: u32,
    /// Column index (0-based, A=0, XFD=16383)
    pub col: u16,
    /// Whether the row reference is absolute ($)
    pub row_absolute: bool,
    /// Whether the column reference is absolute ($)
    pub col_absolute: bool,
}

impl CellAddress {
    /// Create a new cell address with relative references
    pub fn new(row: u32, col: u16) -> Self {
        Self {
            row,
            col,
            row_absolute: false,
            col_absolute: false,
        }
    }

    /// Create a cell address with explicit absolute markers
    pub fn with_absolute(row: u32, col: u16, row_absolute: bool, col_absolute: bool) -> Self {
        Self {
            row,
            col,
            row_absolute,
            col_absolute,
        }
    }

    /// Parse a cell address from A1-style notation
    ///
    /// # Examples
    /// ```
    /// use sheetguard_core::CellAddress;
    ///
    /// let addr = CellAddress::parse("$B$2").unwrap();
    /// assert_eq!((addr.row, addr.col), (1, 1));
    /// assert!(addr.row_absolute && addr.col_absolute);
    ///
    /// assert!(CellAddress::parse("XFE1").is_err());
    /// assert!(CellAddress::parse("A1048577").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".into()));
        }

        let bytes = s.as_bytes();
        let mut pos = 0;

        let col_absolute = bytes.first() == Some(&b'$');
        if col_absolute {
            pos += 1;
        }

        let col_start = pos;
        while pos < bytes.len() && bytes[pos].is_ascii_alphabetic() {
            pos += 1;
        }
        if pos == col_start {
            return Err(Error::InvalidAddress(format!("no column letters in '{}'", s)));
        }
        let col = Self::letters_to_column(&s[col_start..pos])?;

        let row_absolute = bytes.get(pos) == Some(&b'$');
        if row_absolute {
            pos += 1;
        }

        let row_str = &s[pos..];
        if row_str.is_empty() {
            return Err(Error::InvalidAddress(format!("no row number in '{}'", s)));
        }
        let row = Self::parse_row_number(row_str)?;

        Ok(Self {
            row,
            col,
            row_absolute,
            col_absolute,
        })
    }

    /// Parse a 1-based row number into a 0-based index
    fn parse_row_number(digits: &str) -> Result<u32> {
        let row: u64 = if is_digits(digits) {
            digits
                .parse()
                .map_err(|_| Error::InvalidAddress(format!("invalid row number '{}'", digits)))?
        } else {
            return Err(Error::InvalidAddress(format!("invalid row number '{}'", digits)));
        };
        if row == 0 || row > MAX_ROWS as u64 {
            return Err(Error::RowOutOfBounds(row.min(u32::MAX as u64) as u32, MAX_ROWS));
        }
        Ok(row as u32 - 1)
    }

    /// Convert a column index to letters (0 = A, 25 = Z, 26 = AA)
    pub fn column_to_letters(col: u16) -> String {
        let mut letters = Vec::with_capacity(3);
        let mut n = col as u32 + 1;
        while n > 0 {
            n -= 1;
            letters.push(b'A' + (n % 26) as u8);
            n /= 26;
        }
        letters.iter().rev().map(|&b| b as char).collect()
    }

    /// Convert column letters to a 0-based index (A = 0, AA = 26), rejecting columns past XFD
    pub fn letters_to_column(letters: &str) -> Result<u16> {
        if letters.is_empty() {
            return Err(Error::InvalidAddress("empty column letters".into()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            if !c.is_ascii_alphabetic() {
                return Err(Error::InvalidAddress(format!("invalid column letter '{}'", c)));
            }
            col = col.saturating_mul(26).saturating_add(
                c.to_ascii_uppercase() as u32 - 'A' as u32 + 1,
            );
        }

        if col > MAX_COLS as u32 {
            return Err(Error::ColumnOutOfBounds(col, MAX_COLS));
        }
        Ok((col - 1) as u16)
    }

    /// Format as A1-style string, keeping `$` markers
    pub fn to_a1_string(&self) -> String {
        let mut result = String::new();
        if self.col_absolute {
            result.push('$');
        }
        result.push_str(&Self::column_to_letters(self.col));
        if self.row_absolute {
            result.push('$');
        }
        result.push_str(&(self.row + 1).to_string());
        result
    }

    /// Strip `$` markers
    pub fn relative(&self) -> Self {
        Self::new(self.row, self.col)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A rectangular range of cells (e.g., "A1:B10", "C:C", "2:5")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    /// Start address (top-left)
    pub start: CellAddress,
    /// End address (bottom-right)
    pub end: CellAddress,
}

impl CellRange {
    /// Create a range, normalizing so that `start` is the top-left corner
    pub fn new(start: CellAddress, end: CellAddress) -> Self {
        let (top, bottom) = if start.row <= end.row {
            (start.row, end.row)
        } else {
            (end.row, start.row)
        };
        let (left, right) = if start.col <= end.col {
            (start.col, end.col)
        } else {
            (end.col, start.col)
        };

        Self {
            start: CellAddress::with_absolute(top, left, start.row_absolute, start.col_absolute),
            end: CellAddress::with_absolute(bottom, right, end.row_absolute, end.col_absolute),
        }
    }

    /// Create a range from 0-based row/column indices
    pub fn from_indices(start_row: u32, start_col: u16, end_row: u32, end_col: u16) -> Self {
        Self::new(
            CellAddress::new(start_row, start_col),
            CellAddress::new(end_row, end_col),
        )
    }

    /// A single-cell range
    pub fn single(addr: CellAddress) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Every row of the given columns (`C:E`)
    pub fn whole_columns(first_col: u16, last_col: u16) -> Self {
        Self::from_indices(0, first_col, MAX_ROWS - 1, last_col)
    }

    /// Every column of the given rows (`2:5`)
    pub fn whole_rows(first_row: u32, last_row: u32) -> Self {
        Self::from_indices(first_row, 0, last_row, MAX_COLS - 1)
    }

    /// Parse `A1:B10`, `A1`, `C:E` or `2:5`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((left, right)) = s.split_once(':') else {
            return Ok(Self::single(CellAddress::parse(s)?));
        };

        let strip = |part: &str| part.trim().replace('$', "");
        let (left, right) = (strip(left), strip(right));

        if is_letters(&left) && is_letters(&right) {
            let first = CellAddress::letters_to_column(&left)?;
            let last = CellAddress::letters_to_column(&right)?;
            return Ok(Self::whole_columns(first.min(last), first.max(last)));
        }

        if is_digits(&left) && is_digits(&right) {
            let first = CellAddress::parse_row_number(&left)?;
            let last = CellAddress::parse_row_number(&right)?;
            return Ok(Self::whole_rows(first.min(last), first.max(last)));
        }

        if is_letters(&left) || is_letters(&right) || is_digits(&left) || is_digits(&right) {
            return Err(Error::InvalidRange(format!(
                "'{}' mixes a whole column or row with a cell",
                s
            )));
        }

        let (start, end) = s.split_once(':').unwrap_or((s, s));
        Ok(Self::new(CellAddress::parse(start)?, CellAddress::parse(end)?))
    }

    /// Whether the range spans every row of the sheet
    pub fn is_whole_column(&self) -> bool {
        self.start.row == 0 && self.end.row == MAX_ROWS - 1
    }

    /// Whether the range spans every column of the sheet
    pub fn is_whole_row(&self) -> bool {
        self.start.col == 0 && self.end.col == MAX_COLS - 1
    }

    /// Check if a cell is within this range
    pub fn contains(&self, addr: &CellAddress) -> bool {
        addr.row >= self.start.row
            && addr.row <= self.end.row
            && addr.col >= self.start.col
            && addr.col <= self.end.col
    }

    /// Number of rows in the range
    pub fn row_count(&self) -> u32 {
        self.end.row - self.start.row + 1
    }

    /// Number of columns in the range
    pub fn col_count(&self) -> u16 {
        self.end.col - self.start.col + 1
    }

    /// Total number of cells in the range
    pub fn cell_count(&self) -> u64 {
        self.row_count() as u64 * self.col_count() as u64
    }

    /// Shrink whole-column / whole-row extents to `used` (the sheet's used range).
    ///
    /// Ranges that name explicit corners are returned unchanged. When the
    /// sheet is empty, or the used range ends before the start of this range,
    /// the clipped extent collapses to the range's first row / column.
    pub fn clip_to_used(&self, used: Option<&CellRange>) -> CellRange {
        let mut clipped = *self;
        if self.is_whole_column() {
            let last = used.map_or(0, |u| u.end.row).max(self.start.row);
            clipped.end.row = last;
        }
        if self.is_whole_row() {
            let last = used.map_or(0, |u| u.end.col).max(self.start.col);
            clipped.end.col = last;
        }
        clipped
    }

    /// Iterate over all cell addresses in the range, row by row
    pub fn cells(&self) -> CellRangeIterator {
        CellRangeIterator {
            range: *self,
            current_row: self.start.row,
            current_col: self.start.col,
            remaining: self.cell_count(),
        }
    }

    /// Format as `A1:B10`, `C:E` or `2:5`
    pub fn to_a1_string(&self) -> String {
        if self.is_whole_column() {
            return format!(
                "{}:{}",
                CellAddress::column_to_letters(self.start.col),
                CellAddress::column_to_letters(self.end.col)
            );
        }
        if self.is_whole_row() {
            return format!("{}:{}", self.start.row + 1, self.end.row + 1);
        }
        if self.start == self.end {
            self.start.to_a1_string()
        } else {
            format!("{}:{}", self.start.to_a1_string(), self.end.to_a1_string())
        }
    }
}

fn is_letters(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphabetic())
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_a1_string())
    }
}

impl FromStr for CellRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Iterator over the cells of a range, row-major
pub struct CellRangeIterator {
    range: CellRange,
    current_row: u32,
    current_col: u16,
    remaining: u64,
}

impl Iterator for CellRangeIterator {
    type Item = CellAddress;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let addr = CellAddress::new(self.current_row, self.current_col);
        self.remaining -= 1;

        if self.current_col == self.range.end.col {
            self.current_col = self.range.start.col;
            self.current_row += 1;
        } else {
            self.current_col += 1;
        }

        Some(addr)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for CellRangeIterator {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letters_round_trip() {
        for (col, letters) in [(0, "A"), (25, "Z"), (26, "AA"), (701, "ZZ"), (702, "AAA"), (16383, "XFD")] {
            assert_eq!(CellAddress::column_to_letters(col), letters);
            assert_eq!(CellAddress::letters_to_column(letters).unwrap(), col);
        }
        assert_eq!(CellAddress::letters_to_column("xfd").unwrap(), 16383);
    }

    #[test]
    fn test_cell_address_parse() {
        let addr = CellAddress::parse("A1").unwrap();
        assert_eq!((addr.row, addr.col), (0, 0));
        assert!(!addr.row_absolute && !addr.col_absolute);

        let addr = CellAddress::parse("$A1").unwrap();
        assert!(addr.col_absolute && !addr.row_absolute);

        let addr = CellAddress::parse("XFD1048576").unwrap();
        assert_eq!((addr.row, addr.col), (1_048_575, 16_383));
    }

    #[test]
    fn test_cell_address_bounds() {
        assert!(CellAddress::parse("").is_err());
        assert!(CellAddress::parse("A").is_err());
        assert!(CellAddress::parse("1").is_err());
        assert!(CellAddress::parse("A1B").is_err());
        assert!(matches!(
            CellAddress::parse("A0"),
            Err(Error::RowOutOfBounds(0, MAX_ROWS))
        ));
        assert!(matches!(
            CellAddress::parse("A1048577"),
            Err(Error::RowOutOfBounds(1_048_577, MAX_ROWS))
        ));
        assert!(matches!(
            CellAddress::parse("XFE1"),
            Err(Error::ColumnOutOfBounds(16_385, MAX_COLS))
        ));
        assert!(CellAddress::parse("ZZZZZZZZ1").is_err());
    }

    #[test]
    fn test_cell_address_display() {
        assert_eq!(CellAddress::new(99, 2).to_string(), "C100");
        assert_eq!(CellAddress::with_absolute(0, 0, true, true).to_string(), "$A$1");
    }

    #[test]
    fn test_cell_range_parse() {
        let range = CellRange::parse("B2:A1").unwrap();
        assert_eq!(range.start, CellAddress::new(0, 0));
        assert_eq!(range.end, CellAddress::new(1, 1));

        let range = CellRange::parse("C3").unwrap();
        assert_eq!(range.start, range.end);
    }

    #[test]
    fn test_whole_column_and_row_ranges() {
        let cols = CellRange::parse("C:$E").unwrap();
        assert!(cols.is_whole_column());
        assert_eq!((cols.start.col, cols.end.col), (2, 4));
        assert_eq!(cols.to_string(), "C:E");

        let rows = CellRange::parse("2:5").unwrap();
        assert!(rows.is_whole_row());
        assert_eq!((rows.start.row, rows.end.row), (1, 4));
        assert_eq!(rows.to_string(), "2:5");

        assert!(CellRange::parse("A:XFE").is_err());
        assert!(CellRange::parse("0:3").is_err());
    }

    #[test]
    fn test_clip_to_used() {
        let used = CellRange::parse("A1:D20").unwrap();
        let clipped = CellRange::parse("B:B").unwrap().clip_to_used(Some(&used));
        assert_eq!(clipped, CellRange::from_indices(0, 1, 19, 1));

        let explicit = CellRange::parse("A1:A100").unwrap();
        assert_eq!(explicit.clip_to_used(Some(&used)), explicit);

        let empty = CellRange::parse("C:C").unwrap().clip_to_used(None);
        assert_eq!(empty.cell_count(), 1);
    }

    #[test]
    fn test_cell_range_iterator() {
        let cells: Vec<_> = CellRange::parse("A1:B2").unwrap().cells().collect();
        assert_eq!(
            cells,
            vec![
                CellAddress::new(0, 0),
                CellAddress::new(0, 1),
                CellAddress::new(1, 0),
                CellAddress::new(1, 1),
            ]
        );
    }
}
