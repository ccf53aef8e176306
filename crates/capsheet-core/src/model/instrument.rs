//! Instrument types
//!
//! The input format distinguishes instrument shapes by which optional fields
//! are present: a pro-rata row carries `pro_rata_type`, an anti-dilution row
//! carries `dilution_method`, and everything else is a primary investment.
//! That discrimination happens exactly once, during deserialization, into
//! [`InstrumentKind`]; downstream code only ever matches on the tag.

use rust_decimal::Decimal;
use serde::Deserialize;

/// A single instrument (one table row in the compiled round sheet)
///
/// Holder and class are referenced by name, not by pointer; names are the
/// join keys and are unique per intended entity.
#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    /// Stable unique id from the document
    pub id: String,
    /// Holder name (join key)
    pub holder: String,
    /// Share class name
    pub class: String,
    /// The instrument's shape
    #[serde(flatten)]
    pub kind: InstrumentKind,
}

/// The three mutually exclusive instrument shapes
///
/// Variant order matters: serde tries the discriminating fields
/// (`pro_rata_type`, `dilution_method`) before falling back to a primary
/// investment.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InstrumentKind {
    /// A pro-rata top-up right
    ProRata {
        pro_rata_type: ProRataType,
        /// Explicit target fraction; required for super, ignored for standard
        #[serde(default)]
        target_percentage: Option<Decimal>,
    },
    /// An anti-dilution adjustment
    AntiDilution {
        dilution_method: DilutionMethod,
        /// The round in which the protected investment was made.
        ///
        /// When absent, the engine falls back to the immediately preceding
        /// round; see the assembly documentation for the caveats.
        #[serde(default)]
        original_round: Option<String>,
    },
    /// A primary investment; which fields apply depends on the round's
    /// calculation type
    Primary {
        #[serde(default)]
        investment_amount: Option<Decimal>,
        #[serde(default)]
        shares: Option<u64>,
        #[serde(default)]
        target_percentage: Option<Decimal>,
        #[serde(default)]
        discount_rate: Option<Decimal>,
        #[serde(default)]
        valuation_cap: Option<Decimal>,
    },
}

/// Standard rights maintain the holder's current fraction; super rights reach
/// for an explicit target fraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProRataType {
    Standard,
    Super,
}

/// Anti-dilution adjustment methods
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DilutionMethod {
    /// Conversion price resets to the lowest later price
    FullRatchet,
    /// Share count adjusts to preserve the original ownership fraction
    PercentageBased,
    /// Weighted average over the preferred share base
    NarrowBasedWeightedAverage,
    /// Weighted average over all outstanding shares
    BroadBasedWeightedAverage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_is_the_fallback_shape() {
        let json = r#"{"id": "x", "holder": "A", "class": "Common", "shares": 100000}"#;
        let inst: Instrument = serde_json::from_str(json).unwrap();
        match inst.kind {
            InstrumentKind::Primary { shares, .. } => assert_eq!(shares, Some(100_000)),
            other => panic!("expected primary, got {:?}", other),
        }
    }

    #[test]
    fn test_pro_rata_shape_wins_over_primary() {
        let json = r#"{"id": "x", "holder": "A", "class": "Common",
                       "pro_rata_type": "standard"}"#;
        let inst: Instrument = serde_json::from_str(json).unwrap();
        assert!(matches!(
            inst.kind,
            InstrumentKind::ProRata {
                pro_rata_type: ProRataType::Standard,
                target_percentage: None,
            }
        ));
    }

    #[test]
    fn test_dilution_method_names() {
        let m: DilutionMethod =
            serde_json::from_str("\"narrow_based_weighted_average\"").unwrap();
        assert_eq!(m, DilutionMethod::NarrowBasedWeightedAverage);
        let m: DilutionMethod = serde_json::from_str("\"percentage_based\"").unwrap();
        assert_eq!(m, DilutionMethod::PercentageBased);
    }
}
