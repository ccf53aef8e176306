//! Physical locations in the compiled workbook
//!
//! A [`Location`] is what the layout registry stores: which sheet an entity
//! landed on, and either a single cell or a table column. Rendering a
//! location into target-language reference text is the resolver's job; this
//! module is pure data.

use crate::address::{CellAddress, CellRange};

/// Where an addressable entity lives in the compiled workbook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Sheet name (already sanitized)
    pub sheet: String,
    /// Cell or column within the sheet
    pub kind: LocationKind,
}

/// The shape of a registered location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationKind {
    /// A single cell
    Cell(CellAddress),
    /// A column of an instrument table
    ///
    /// `table` is the named tabular region, when one exists; `range` is the
    /// raw backing range the resolver falls back to otherwise.
    Column {
        table: Option<String>,
        column: String,
        range: CellRange,
    },
}

impl Location {
    /// A single-cell location
    pub fn cell(sheet: impl Into<String>, addr: CellAddress) -> Self {
        Self {
            sheet: sheet.into(),
            kind: LocationKind::Cell(addr),
        }
    }

    /// A table-column location with a named region
    pub fn table_column(
        sheet: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        range: CellRange,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            kind: LocationKind::Column {
                table: Some(table.into()),
                column: column.into(),
                range,
            },
        }
    }

    /// A bare column range with no named region
    pub fn column_range(sheet: impl Into<String>, column: impl Into<String>, range: CellRange) -> Self {
        Self {
            sheet: sheet.into(),
            kind: LocationKind::Column {
                table: None,
                column: column.into(),
                range,
            },
        }
    }

    /// The single cell address, if this is a cell location
    pub fn as_cell(&self) -> Option<&CellAddress> {
        match &self.kind {
            LocationKind::Cell(addr) => Some(addr),
            LocationKind::Column { .. } => None,
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            LocationKind::Cell(addr) => write!(f, "{}!{}", self.sheet, addr),
            LocationKind::Column {
                table: Some(table),
                column,
                ..
            } => write!(f, "{}[{}]", table, column),
            LocationKind::Column {
                table: None,
                column,
                range,
            } => write!(f, "{}!{} ({})", self.sheet, range, column),
        }
    }
}

/// A workbook-global defined name produced by assembly
///
/// Downstream rounds and summary views resolve these by name, so defining one
/// is a side effect the compiler performs exactly once per (round, kind).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinedName {
    /// The global identifier (e.g. `Seed_PreRoundShares`)
    pub name: String,
    /// What the name refers to (e.g. `Seed!$B$2`)
    pub refers_to: String,
}

impl DefinedName {
    /// Create a new defined name
    pub fn new(name: impl Into<String>, refers_to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            refers_to: refers_to.into(),
        }
    }
}
