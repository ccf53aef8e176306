//! Convenience re-exports for the common case
//!
//! ```rust,ignore
//! use capsheet::prelude::*;
//! ```

pub use crate::assembly::{compile, AssemblyOptions};
pub use crate::output::{CellContent, CompiledModel, CompiledSheet};
pub use capsheet_core::{
    CalculationType, CellAddress, DilutionMethod, Document, Holder, Instrument, InstrumentKind,
    ProRataType, Round,
};
