//! # capsheet
//!
//! Compile a declarative cap-table document into a spreadsheet program.
//!
//! Capsheet takes holders, financing rounds and instruments, and produces a
//! workbook description where every derived number is a live target-language
//! formula - pro-rata top-ups, anti-dilution adjustments, round-over-round
//! share chaining - so the result stays explainable and recomputable when an
//! input cell changes.
//!
//! ## Example
//!
//! ```rust,ignore
//! use capsheet::prelude::*;
//!
//! let doc: Document = serde_json::from_str(input)?;
//! let model = compile(&doc, &AssemblyOptions::default())?;
//!
//! for sheet in &model.sheets {
//!     for (addr, content) in &sheet.cells {
//!         println!("{}!{} = {}", sheet.name, addr, content);
//!     }
//! }
//! ```

pub mod assembly;
pub mod output;
pub mod prelude;

pub use assembly::{compile, AssemblyError, AssemblyOptions};
pub use output::{CellContent, CompiledModel, CompiledSheet, TableDef};

// Re-export core types
pub use capsheet_core::{
    aggregate_name, sanitize_name, AggregateKind, CalculationType, CellAddress, CellRange,
    DefinedName, DilutionMethod, Document, Error, Holder, Instrument, InstrumentKind,
    LayoutRegistry, Location, LocationKind, ProRataType, Result, Round, SymbolKey,
};

// Re-export formula types
pub use capsheet_formula::{
    allocation, resolve_encoding, Dependency, FormulaEncoding, FormulaError, FormulaResult,
    ReferenceKind, ResolveContext, Resolver,
};
