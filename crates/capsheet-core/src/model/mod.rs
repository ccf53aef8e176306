//! The capitalization domain model
//!
//! These types mirror the validated input document: holders, financing rounds
//! and the instruments inside them. The document arrives already schema- and
//! business-rule-checked by an external validator; nothing here re-validates
//! shape, it only computes.

mod instrument;
mod round;

pub use instrument::{DilutionMethod, Instrument, InstrumentKind, ProRataType};
pub use round::{CalculationType, Round};

use serde::Deserialize;

/// A validated capitalization document
#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    /// Company name, used only for labeling
    #[serde(default)]
    pub company: Option<String>,
    /// All holders, in display order
    pub holders: Vec<Holder>,
    /// All rounds, in chronological processing order
    pub rounds: Vec<Round>,
}

impl Document {
    /// Find a round by its document name
    pub fn round(&self, name: &str) -> Option<&Round> {
        self.rounds.iter().find(|r| r.name == name)
    }

    /// Find a holder by name
    pub fn holder(&self, name: &str) -> Option<&Holder> {
        self.holders.iter().find(|h| h.name == name)
    }
}

/// A shareholder (founder, investor, pool)
///
/// The name is the join key: instruments reference holders by name.
#[derive(Debug, Clone, Deserialize)]
pub struct Holder {
    pub name: String,
}
