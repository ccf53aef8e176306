//! The compiled workbook description
//!
//! Assembly produces a [`CompiledModel`]: per-sheet cell listings, the
//! workbook-global defined names, and the named table regions. Writing this
//! out as an actual workbook file is a separate concern; the model is plain
//! data that any writer can consume.

use capsheet_core::{CellAddress, CellRange, DefinedName};
use rust_decimal::Decimal;
use std::fmt;

/// What a compiled cell holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellContent {
    /// A literal text label
    Text(String),
    /// A literal number (inputs and constants)
    Number(Decimal),
    /// A target-language formula, including the leading `=`
    Formula(String),
}

impl CellContent {
    /// The formula text, if this is a formula cell
    pub fn as_formula(&self) -> Option<&str> {
        match self {
            CellContent::Formula(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for CellContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellContent::Text(s) => f.write_str(s),
            CellContent::Number(n) => write!(f, "{}", n),
            CellContent::Formula(s) => f.write_str(s),
        }
    }
}

/// One compiled sheet: a name and its non-empty cells
#[derive(Debug, Clone)]
pub struct CompiledSheet {
    /// Sanitized sheet name
    pub name: String,
    /// Non-empty cells, in emission order
    pub cells: Vec<(CellAddress, CellContent)>,
}

impl CompiledSheet {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: Vec::new(),
        }
    }

    pub(crate) fn set(&mut self, addr: CellAddress, content: CellContent) {
        self.cells.push((addr, content));
    }

    /// The content at an address, if any
    pub fn get(&self, addr: &CellAddress) -> Option<&CellContent> {
        self.cells
            .iter()
            .find(|(a, _)| a.row == addr.row && a.col == addr.col)
            .map(|(_, c)| c)
    }
}

/// A named tabular region backing structured references
#[derive(Debug, Clone)]
pub struct TableDef {
    /// Table name (e.g. `Seed_Instruments`)
    pub name: String,
    /// Sheet the table lives on
    pub sheet: String,
    /// Header + data range
    pub range: CellRange,
    /// Column names, left to right
    pub columns: Vec<String>,
}

/// The full compiled workbook description
#[derive(Debug, Clone, Default)]
pub struct CompiledModel {
    /// Company label, when the document carries one
    pub company: Option<String>,
    /// Sheets in workbook order (rounds first, then the holdings sheet)
    pub sheets: Vec<CompiledSheet>,
    /// Workbook-global defined names, one per (round, aggregate)
    pub defined_names: Vec<DefinedName>,
    /// Named instrument tables, one per round
    pub tables: Vec<TableDef>,
}

impl CompiledModel {
    /// Find a sheet by name
    pub fn sheet(&self, name: &str) -> Option<&CompiledSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Find a defined name
    pub fn defined_name(&self, name: &str) -> Option<&DefinedName> {
        self.defined_names.iter().find(|n| n.name == name)
    }

    /// The formula at `sheet`!`addr`, if that cell holds one
    pub fn formula_at(&self, sheet: &str, addr: &str) -> Option<&str> {
        let addr = CellAddress::parse(addr).ok()?;
        self.sheet(sheet)?.get(&addr)?.as_formula()
    }

    /// Total number of formula cells across all sheets
    pub fn formula_count(&self) -> usize {
        self.sheets
            .iter()
            .flat_map(|s| &s.cells)
            .filter(|(_, c)| matches!(c, CellContent::Formula(_)))
            .count()
    }

    /// Iterate over every cell as `(sheet, address, content)`
    pub fn entries(&self) -> impl Iterator<Item = (&str, &CellAddress, &CellContent)> {
        self.sheets.iter().flat_map(|sheet| {
            sheet
                .cells
                .iter()
                .map(move |(addr, content)| (sheet.name.as_str(), addr, content))
        })
    }
}
