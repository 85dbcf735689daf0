//! Built-in spreadsheet functions
//!
//! Every function is registered once, in one of the per-category tables
//! below, with its argument bounds. The same table drives the syntax
//! checker's allowlist and arity checks and the evaluator's dispatch.

pub mod criteria;
pub mod date;
pub mod financial;
pub mod info;
pub mod logical;
pub mod lookup;
pub mod math;
pub mod statistical;
pub mod text;

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use ahash::AHashMap;
use sheetguard_core::CellError;

use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvaluationContext, FormulaValue};

/// Function implementation signature
///
/// Functions can consult the evaluation context (e.g. the workbook's date
/// system) to match spreadsheet semantics.
pub type FunctionImpl = fn(&[FormulaValue], &EvaluationContext) -> FormulaResult<FormulaValue>;

/// The group a built-in function belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FunctionCategory {
    Math,
    Statistical,
    Logical,
    Text,
    Date,
    Lookup,
    Financial,
    Information,
}

impl FunctionCategory {
    /// All categories in display order
    pub const ALL: [FunctionCategory; 8] = [
        FunctionCategory::Math,
        FunctionCategory::Statistical,
        FunctionCategory::Logical,
        FunctionCategory::Text,
        FunctionCategory::Date,
        FunctionCategory::Lookup,
        FunctionCategory::Financial,
        FunctionCategory::Information,
    ];

    /// Lowercase name, as accepted by `FromStr`
    pub fn as_str(&self) -> &'static str {
        match self {
            FunctionCategory::Math => "math",
            FunctionCategory::Statistical => "statistical",
            FunctionCategory::Logical => "logical",
            FunctionCategory::Text => "text",
            FunctionCategory::Date => "date",
            FunctionCategory::Lookup => "lookup",
            FunctionCategory::Financial => "financial",
            FunctionCategory::Information => "information",
        }
    }

    fn table(&self) -> &'static [Entry] {
        match self {
            FunctionCategory::Math => MATH,
            FunctionCategory::Statistical => STATISTICAL,
            FunctionCategory::Logical => LOGICAL,
            FunctionCategory::Text => TEXT,
            FunctionCategory::Date => DATE,
            FunctionCategory::Lookup => LOOKUP,
            FunctionCategory::Financial => FINANCIAL,
            FunctionCategory::Information => INFORMATION,
        }
    }
}

impl fmt::Display for FunctionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FunctionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("info") {
            return Ok(FunctionCategory::Information);
        }
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = Self::ALL.iter().map(|c| c.as_str()).collect();
                format!("unknown category '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Category the function is listed under
    pub category: FunctionCategory,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Single-cell references reach the implementation as 1x1 ranges, so
    /// text or booleans they hold are skipped instead of coerced
    pub references_as_ranges: bool,
}

impl FunctionDef {
    /// Whether `count` arguments are accepted
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Accepted argument count in words: "exactly 2", "1 to 3", "at least 1"
    pub fn arity_text(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("exactly {}", max),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }

    /// `Err(ArgumentCount)` when `count` is outside the accepted bounds
    pub fn check_arity(&self, count: usize) -> FormulaResult<()> {
        if self.accepts(count) {
            Ok(())
        } else {
            Err(FormulaError::ArgumentCount {
                function: self.name.to_string(),
                expected: self.arity_text(),
                actual: count,
            })
        }
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<&'static str, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        for category in FunctionCategory::ALL {
            for &(name, min_args, max_args, implementation) in category.table() {
                registry.register(FunctionDef {
                    name,
                    category,
                    min_args,
                    max_args,
                    implementation,
                    references_as_ranges: REFERENCE_AGGREGATES.contains(&name),
                });
            }
        }

        registry
    }

    /// Look up a function by name, case-insensitively
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name.to_uppercase().as_str())
    }

    /// Whether a function with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Register a function, replacing any previous definition
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name, def);
    }

    /// Sorted names of every function in `category`
    pub fn names_in(&self, category: FunctionCategory) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .functions
            .values()
            .filter(|f| f.category == category)
            .map(|f| f.name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Sorted names of every function
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The shared, immutable table of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    static REGISTRY: OnceLock<FunctionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(FunctionRegistry::new)
}

/// (name, min_args, max_args, implementation)
type Entry = (&'static str, usize, Option<usize>, FunctionImpl);

/// Aggregates that ignore non-numeric values read through references
const REFERENCE_AGGREGATES: &[&str] = &[
    "SUM", "AVERAGE", "MIN", "MAX", "PRODUCT", "MEDIAN", "LARGE", "SMALL", "STDEV", "STDEV.S",
    "STDEV.P", "VAR", "VAR.S", "VAR.P", "NPV",
];

const MATH: &[Entry] = &[
    ("SUM", 1, None, math::fn_sum),
    ("AVERAGE", 1, None, math::fn_average),
    ("MIN", 1, None, math::fn_min),
    ("MAX", 1, None, math::fn_max),
    ("COUNT", 1, None, math::fn_count),
    ("COUNTA", 1, None, math::fn_counta),
    ("COUNTBLANK", 1, Some(1), math::fn_countblank),
    ("ABS", 1, Some(1), math::fn_abs),
    ("ROUND", 1, Some(2), math::fn_round),
    ("ROUNDUP", 1, Some(2), math::fn_roundup),
    ("ROUNDDOWN", 1, Some(2), math::fn_rounddown),
    ("INT", 1, Some(1), math::fn_int),
    ("TRUNC", 1, Some(2), math::fn_trunc),
    ("MOD", 2, Some(2), math::fn_mod),
    ("POWER", 2, Some(2), math::fn_power),
    ("SQRT", 1, Some(1), math::fn_sqrt),
    ("EXP", 1, Some(1), math::fn_exp),
    ("LN", 1, Some(1), math::fn_ln),
    ("LOG", 1, Some(2), math::fn_log),
    ("LOG10", 1, Some(1), math::fn_log10),
    ("PI", 0, Some(0), math::fn_pi),
    ("PRODUCT", 1, None, math::fn_product),
    ("SUMPRODUCT", 1, None, math::fn_sumproduct),
    ("SUMIF", 2, Some(3), math::fn_sumif),
    ("SUMIFS", 3, None, math::fn_sumifs),
    ("CEILING", 1, Some(2), math::fn_ceiling),
    ("FLOOR", 1, Some(2), math::fn_floor),
    ("SIGN", 1, Some(1), math::fn_sign),
    ("RAND", 0, Some(0), math::fn_rand),
    ("RANDBETWEEN", 2, Some(2), math::fn_randbetween),
];

const STATISTICAL: &[Entry] = &[
    ("AVERAGEIF", 2, Some(3), statistical::fn_averageif),
    ("AVERAGEIFS", 3, None, statistical::fn_averageifs),
    ("COUNTIF", 2, Some(2), statistical::fn_countif),
    ("COUNTIFS", 2, None, statistical::fn_countifs),
    ("MEDIAN", 1, None, statistical::fn_median),
    ("LARGE", 2, Some(2), statistical::fn_large),
    ("SMALL", 2, Some(2), statistical::fn_small),
    ("STDEV", 1, None, statistical::fn_stdev_s),
    ("STDEV.S", 1, None, statistical::fn_stdev_s),
    ("STDEV.P", 1, None, statistical::fn_stdev_p),
    ("VAR", 1, None, statistical::fn_var_s),
    ("VAR.S", 1, None, statistical::fn_var_s),
    ("VAR.P", 1, None, statistical::fn_var_p),
    ("MAXIFS", 3, None, statistical::fn_maxifs),
    ("MINIFS", 3, None, statistical::fn_minifs),
];

const LOGICAL: &[Entry] = &[
    ("IF", 2, Some(3), logical::fn_if),
    ("AND", 1, None, logical::fn_and),
    ("OR", 1, None, logical::fn_or),
    ("NOT", 1, Some(1), logical::fn_not),
    ("XOR", 1, None, logical::fn_xor),
    ("IFERROR", 2, Some(2), logical::fn_iferror),
    ("IFNA", 2, Some(2), logical::fn_ifna),
    ("IFS", 2, None, logical::fn_ifs),
    ("SWITCH", 3, None, logical::fn_switch),
    ("TRUE", 0, Some(0), logical::fn_true),
    ("FALSE", 0, Some(0), logical::fn_false),
];

const TEXT: &[Entry] = &[
    ("LEN", 1, Some(1), text::fn_len),
    ("LEFT", 1, Some(2), text::fn_left),
    ("RIGHT", 1, Some(2), text::fn_right),
    ("MID", 3, Some(3), text::fn_mid),
    ("UPPER", 1, Some(1), text::fn_upper),
    ("LOWER", 1, Some(1), text::fn_lower),
    ("PROPER", 1, Some(1), text::fn_proper),
    ("TRIM", 1, Some(1), text::fn_trim),
    ("CONCAT", 1, None, text::fn_concat),
    ("CONCATENATE", 1, None, text::fn_concat),
    ("TEXTJOIN", 3, None, text::fn_textjoin),
    ("REPT", 2, Some(2), text::fn_rept),
    ("SUBSTITUTE", 3, Some(4), text::fn_substitute),
    ("FIND", 2, Some(3), text::fn_find),
    ("SEARCH", 2, Some(3), text::fn_search),
    ("EXACT", 2, Some(2), text::fn_exact),
    ("VALUE", 1, Some(1), text::fn_value),
    ("TEXT", 2, Some(2), text::fn_text),
];

const DATE: &[Entry] = &[
    ("DATE", 3, Some(3), date::fn_date),
    ("YEAR", 1, Some(1), date::fn_year),
    ("MONTH", 1, Some(1), date::fn_month),
    ("DAY", 1, Some(1), date::fn_day),
    ("TODAY", 0, Some(0), date::fn_today),
    ("NOW", 0, Some(0), date::fn_now),
    ("EDATE", 2, Some(2), date::fn_edate),
    ("EOMONTH", 2, Some(2), date::fn_eomonth),
    ("WEEKDAY", 1, Some(2), date::fn_weekday),
    ("DAYS", 2, Some(2), date::fn_days),
];

const LOOKUP: &[Entry] = &[
    ("INDEX", 2, Some(3), lookup::fn_index),
    ("MATCH", 2, Some(3), lookup::fn_match),
    ("VLOOKUP", 3, Some(4), lookup::fn_vlookup),
    ("HLOOKUP", 3, Some(4), lookup::fn_hlookup),
    ("XLOOKUP", 3, Some(6), lookup::fn_xlookup),
    ("CHOOSE", 2, None, lookup::fn_choose),
    ("ROWS", 1, Some(1), lookup::fn_rows),
    ("COLUMNS", 1, Some(1), lookup::fn_columns),
];

const FINANCIAL: &[Entry] = &[
    ("PMT", 3, Some(5), financial::fn_pmt),
    ("PV", 3, Some(5), financial::fn_pv),
    ("FV", 3, Some(5), financial::fn_fv),
    ("NPER", 3, Some(5), financial::fn_nper),
    ("NPV", 2, None, financial::fn_npv),
    ("IRR", 1, Some(2), financial::fn_irr),
    ("SLN", 3, Some(3), financial::fn_sln),
];

const INFORMATION: &[Entry] = &[
    ("ISBLANK", 1, Some(1), info::fn_isblank),
    ("ISNUMBER", 1, Some(1), info::fn_isnumber),
    ("ISTEXT", 1, Some(1), info::fn_istext),
    ("ISERROR", 1, Some(1), info::fn_iserror),
    ("ISERR", 1, Some(1), info::fn_iserr),
    ("ISNA", 1, Some(1), info::fn_isna),
    ("ISLOGICAL", 1, Some(1), info::fn_islogical),
    ("NA", 0, Some(0), info::fn_na),
];

// === Argument helpers shared by the function modules ===

/// Run a function body written against `Result<_, CellError>`, turning a
/// spreadsheet error into an error value
pub(crate) fn lift<F>(body: F) -> FormulaResult<FormulaValue>
where
    F: FnOnce() -> Result<FormulaValue, CellError>,
{
    Ok(body().unwrap_or_else(FormulaValue::Error))
}

/// Argument `index` as a single value (arrays give their top-left element)
pub(crate) fn scalar_arg(args: &[FormulaValue], index: usize) -> Option<FormulaValue> {
    args.get(index).cloned().map(FormulaValue::into_scalar)
}

/// Required numeric argument
pub(crate) fn number_arg(args: &[FormulaValue], index: usize) -> Result<f64, CellError> {
    scalar_arg(args, index)
        .ok_or(CellError::Value)?
        .to_number()
}

/// Optional numeric argument; missing or empty gives `default`
pub(crate) fn opt_number_arg(
    args: &[FormulaValue],
    index: usize,
    default: f64,
) -> Result<f64, CellError> {
    match scalar_arg(args, index) {
        None | Some(FormulaValue::Empty) => Ok(default),
        Some(v) => v.to_number(),
    }
}

/// Required text argument (numbers and booleans are formatted)
pub(crate) fn text_arg(args: &[FormulaValue], index: usize) -> Result<String, CellError> {
    match scalar_arg(args, index).ok_or(CellError::Value)? {
        FormulaValue::Error(e) => Err(e),
        v => Ok(v.as_string()),
    }
}

/// Argument as a 2-D grid; a scalar becomes a 1x1 grid
pub(crate) fn grid_arg(args: &[FormulaValue], index: usize) -> Result<Vec<Vec<FormulaValue>>, CellError> {
    match args.get(index).ok_or(CellError::Value)? {
        FormulaValue::Array(rows) => Ok(rows.clone()),
        FormulaValue::Error(e) => Err(*e),
        v => Ok(vec![vec![v.clone()]]),
    }
}

/// Collect numbers for aggregate functions.
///
/// Direct arguments coerce (`SUM("3", TRUE)` is 4, non-numeric text is
/// `#VALUE!`); inside ranges only numbers count. Errors anywhere propagate.
pub(crate) fn collect_numbers(args: &[FormulaValue]) -> Result<Vec<f64>, CellError> {
    let mut numbers = Vec::new();
    for arg in args {
        match arg {
            FormulaValue::Number(n) => numbers.push(*n),
            FormulaValue::Boolean(b) => numbers.push(if *b { 1.0 } else { 0.0 }),
            FormulaValue::String(s) => {
                numbers.push(s.trim().parse().map_err(|_| CellError::Value)?)
            }
            FormulaValue::Error(e) => return Err(*e),
            FormulaValue::Empty => {}
            FormulaValue::Array(rows) => {
                for cell in rows.iter().flatten() {
                    match cell {
                        FormulaValue::Number(n) => numbers.push(*n),
                        FormulaValue::Error(e) => return Err(*e),
                        _ => {}
                    }
                }
            }
        }
    }
    Ok(numbers)
}

/// Sum that starts from `+0.0`, so an empty input is not `-0.0`
pub(crate) fn total<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values.into_iter().fold(0.0, |acc, n| acc + n)
}

/// Rows and columns of a grid
pub(crate) fn array_dims(arr: &[Vec<FormulaValue>]) -> (usize, usize) {
    let rows = arr.len();
    let cols = arr.first().map_or(0, |r| r.len());
    (rows, cols)
}
