//! # capsheet-core
//!
//! Core data structures for the capsheet cap-table formula compiler.
//!
//! This crate provides the fundamental types used throughout capsheet:
//! - [`Document`], [`Round`], [`Instrument`] - The capitalization domain model
//! - [`CellAddress`] and [`CellRange`] - Spreadsheet addressing
//! - [`SymbolKey`] and [`sanitize_name`] - Stable symbols derived from entity names
//! - [`LayoutRegistry`] - The symbol table mapping entities to coordinates
//!
//! ## Example
//!
//! ```rust
//! use capsheet_core::{CellAddress, LayoutRegistry, Location, SymbolKey};
//!
//! let mut registry = LayoutRegistry::new();
//! registry.declare_rounds(["Seed"]);
//!
//! let key = SymbolKey::round("Seed");
//! let loc = Location::cell("Seed", CellAddress::absolute(1, 1));
//! registry.register(key.clone(), loc).unwrap();
//!
//! assert!(registry.lookup(&key).is_ok());
//! ```

pub mod address;
pub mod error;
pub mod model;
pub mod registry;
pub mod symbol;

mod location;

// Re-exports for convenience
pub use address::{CellAddress, CellRange};
pub use error::{Error, Result};
pub use location::{DefinedName, Location, LocationKind};
pub use model::{
    CalculationType, DilutionMethod, Document, Holder, Instrument, InstrumentKind, ProRataType,
    Round,
};
pub use registry::LayoutRegistry;
pub use symbol::{aggregate_name, sanitize_name, AggregateKind, SymbolKey};

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Token substituted when sanitizing a name leaves nothing usable
pub const FALLBACK_SYMBOL: &str = "Unnamed";
