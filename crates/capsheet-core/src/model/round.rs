//! Round types

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::instrument::{Instrument, InstrumentKind};

/// How a round's price and base share issuance are computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationType {
    /// Instruments state their share counts directly
    FixedShares,
    /// Instruments state a target post-round ownership fraction
    TargetPercentage,
    /// Price derives from a pre-money valuation
    ValuationBased,
    /// Convertible note: converts at a discounted/capped price
    Convertible,
    /// Simple agreement for future equity, treated like a note without interest
    Safe,
}

impl CalculationType {
    /// Whether the round sets a real market price per share.
    ///
    /// Convertible and SAFE rounds defer pricing, so anti-dilution and
    /// discount references skip over them.
    pub fn is_priced(&self) -> bool {
        !matches!(self, CalculationType::Convertible | CalculationType::Safe)
    }
}

/// A financing round
///
/// Rounds are processed in document order. Round *i*'s pre-round share count
/// is round *i-1*'s pre-round count plus round *i-1*'s issued shares; every
/// compiled pre-round formula encodes that recurrence against the previous
/// round's named aggregates.
#[derive(Debug, Clone, Deserialize)]
pub struct Round {
    /// Unique round name (join key, also the basis of the sheet name)
    pub name: String,
    /// Closing date
    pub date: NaiveDate,
    /// How price and base shares are computed
    pub calculation_type: CalculationType,
    /// Pre-money valuation (valuation-based rounds)
    #[serde(default)]
    pub pre_money_valuation: Option<Decimal>,
    /// Explicit price per share, overriding the derived price
    #[serde(default)]
    pub price_per_share: Option<Decimal>,
    /// Instruments issued in this round
    #[serde(default)]
    pub instruments: Vec<Instrument>,
}

impl Round {
    /// Instruments carrying a primary investment
    pub fn primary_instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments
            .iter()
            .filter(|i| matches!(i.kind, InstrumentKind::Primary { .. }))
    }

    /// Instruments exercising a pro-rata right
    pub fn pro_rata_instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments
            .iter()
            .filter(|i| matches!(i.kind, InstrumentKind::ProRata { .. }))
    }

    /// Instruments receiving an anti-dilution adjustment
    pub fn anti_dilution_instruments(&self) -> impl Iterator<Item = &Instrument> {
        self.instruments
            .iter()
            .filter(|i| matches!(i.kind, InstrumentKind::AntiDilution { .. }))
    }
}
