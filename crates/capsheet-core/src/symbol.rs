//! Stable symbols derived from free-text entity names
//!
//! Round, holder and class names come from user input and can contain
//! anything. Everything addressable in the compiled workbook (sheet names,
//! defined names, table names) goes through [`sanitize_name`] first so that
//! the same input name always yields the same identifier, and the identifier
//! is legal in the target spreadsheet language.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::FALLBACK_SYMBOL;

// Runs of a repeated separator collapse to a single one. The regex crate has
// no backreferences, so the two separator classes are spelled out.
static SEPARATOR_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{2,}|\.{2,}").unwrap());

/// Sanitize a free-text name into a stable identifier.
///
/// - characters outside `[A-Za-z0-9_.]` become `_`
/// - runs of repeated separators collapse to one
/// - a leading digit gets a `_` prefix
/// - an empty result falls back to [`FALLBACK_SYMBOL`]
///
/// The function is pure, deterministic and idempotent:
/// `sanitize_name(sanitize_name(x)) == sanitize_name(x)`.
///
/// # Examples
/// ```
/// use capsheet_core::sanitize_name;
///
/// assert_eq!(sanitize_name("Series A"), "Series_A");
/// assert_eq!(sanitize_name("Acme & Co."), "Acme_Co.");
/// assert_eq!(sanitize_name("2024 Bridge"), "_2024_Bridge");
/// assert_eq!(sanitize_name(""), "Unnamed");
/// ```
pub fn sanitize_name(name: &str) -> String {
    let mapped: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let collapsed = SEPARATOR_RUNS.replace_all(&mapped, |caps: &regex::Captures<'_>| {
        caps[0][..1].to_string()
    });

    if collapsed.is_empty() {
        return FALLBACK_SYMBOL.to_string();
    }

    if collapsed.as_bytes()[0].is_ascii_digit() {
        format!("_{}", collapsed)
    } else {
        collapsed.into_owned()
    }
}

/// Symbolic key addressing an entity in the [`LayoutRegistry`](crate::LayoutRegistry)
///
/// Keys built from free-text names sanitize them on construction, so looking
/// a key up by the raw document name always finds the registered entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SymbolKey {
    /// A round's sheet / constant block
    Round(String),
    /// A single instrument row, keyed by its document id
    Instrument(String),
    /// A per-round named aggregate cell
    Aggregate {
        round: String,
        kind: AggregateKind,
    },
    /// A column of a round's instrument table
    Column {
        round: String,
        column: String,
    },
    /// A holder's row on the holdings sheet
    Holding {
        holder: String,
    },
}

impl SymbolKey {
    /// Key for a round's constant block
    pub fn round(name: &str) -> Self {
        SymbolKey::Round(sanitize_name(name))
    }

    /// Key for an instrument row (ids are opaque, not sanitized)
    pub fn instrument(id: impl Into<String>) -> Self {
        SymbolKey::Instrument(id.into())
    }

    /// Key for a per-round aggregate cell
    pub fn aggregate(round: &str, kind: AggregateKind) -> Self {
        SymbolKey::Aggregate {
            round: sanitize_name(round),
            kind,
        }
    }

    /// Key for a column of a round's instrument table
    pub fn column(round: &str, column: impl Into<String>) -> Self {
        SymbolKey::Column {
            round: sanitize_name(round),
            column: column.into(),
        }
    }

    /// Key for a holder's holdings row
    pub fn holding(holder: &str) -> Self {
        SymbolKey::Holding {
            holder: sanitize_name(holder),
        }
    }

    /// The round a key belongs to, when it is round-scoped
    pub fn round_name(&self) -> Option<&str> {
        match self {
            SymbolKey::Round(name) => Some(name),
            SymbolKey::Aggregate { round, .. } => Some(round),
            SymbolKey::Column { round, .. } => Some(round),
            SymbolKey::Instrument(_) | SymbolKey::Holding { .. } => None,
        }
    }
}

impl fmt::Display for SymbolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolKey::Round(name) => write!(f, "round '{}'", name),
            SymbolKey::Instrument(id) => write!(f, "instrument '{}'", id),
            SymbolKey::Aggregate { round, kind } => {
                write!(f, "aggregate '{}_{}'", round, kind.suffix())
            }
            SymbolKey::Column { round, column } => {
                write!(f, "column '{}' of round '{}'", column, round)
            }
            SymbolKey::Holding { holder } => write!(f, "holding row '{}'", holder),
        }
    }
}

/// The fixed vocabulary of per-round named aggregate cells
///
/// Each aggregate is defined exactly once per round, at a stable cell in the
/// round's constant block, under the global name
/// `<SanitizedRound>_<suffix>` (see [`aggregate_name`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    /// Shares outstanding before this round
    PreRoundShares,
    /// Pre-money valuation input (valuation-based rounds)
    PreMoneyValuation,
    /// Effective price per share for this round
    PricePerShare,
    /// New money invested in this round
    NewMoney,
    /// Shares issued to primary investors, before top-ups
    BaseShares,
    /// Sum of standard pro-rata participants' target fractions
    ProRataTargetSum,
    /// Sum of super pro-rata participants' target fractions
    SuperTargetSum,
    /// Pre-round shares held by standard pro-rata participants
    ProRataHeldSum,
    /// Pre-round shares held by super pro-rata participants
    SuperHeldSum,
    /// Post-allocation total solving the simultaneous pro-rata targets
    NewTotalShares,
    /// Shares issued via pro-rata top-ups
    ProRataShares,
    /// Shares issued via anti-dilution adjustments
    AntiDilutionShares,
    /// Total shares issued by this round
    IssuedShares,
}

impl AggregateKind {
    /// All aggregate kinds, in constant-block row order
    pub const ALL: [AggregateKind; 13] = [
        AggregateKind::PreRoundShares,
        AggregateKind::PreMoneyValuation,
        AggregateKind::PricePerShare,
        AggregateKind::NewMoney,
        AggregateKind::BaseShares,
        AggregateKind::ProRataTargetSum,
        AggregateKind::SuperTargetSum,
        AggregateKind::ProRataHeldSum,
        AggregateKind::SuperHeldSum,
        AggregateKind::NewTotalShares,
        AggregateKind::ProRataShares,
        AggregateKind::AntiDilutionShares,
        AggregateKind::IssuedShares,
    ];

    /// The suffix used in the aggregate's defined name
    pub fn suffix(&self) -> &'static str {
        match self {
            AggregateKind::PreRoundShares => "PreRoundShares",
            AggregateKind::PreMoneyValuation => "PreMoneyValuation",
            AggregateKind::PricePerShare => "PricePerShare",
            AggregateKind::NewMoney => "NewMoney",
            AggregateKind::BaseShares => "BaseShares",
            AggregateKind::ProRataTargetSum => "ProRataTargetSum",
            AggregateKind::SuperTargetSum => "SuperTargetSum",
            AggregateKind::ProRataHeldSum => "ProRataHeldSum",
            AggregateKind::SuperHeldSum => "SuperHeldSum",
            AggregateKind::NewTotalShares => "NewTotalShares",
            AggregateKind::ProRataShares => "ProRataShares",
            AggregateKind::AntiDilutionShares => "AntiDilutionShares",
            AggregateKind::IssuedShares => "IssuedShares",
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// The defined name for a round's aggregate cell, e.g. `Seed_PreRoundShares`
pub fn aggregate_name(round: &str, kind: AggregateKind) -> String {
    format!("{}_{}", sanitize_name(round), kind.suffix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_sanitize_basic() {
        assert_eq!(sanitize_name("Seed"), "Seed");
        assert_eq!(sanitize_name("Series A"), "Series_A");
        assert_eq!(sanitize_name("Series  A"), "Series_A");
        assert_eq!(sanitize_name("Acme & Co."), "Acme_Co.");
        assert_eq!(sanitize_name("a-b-c"), "a_b_c");
        assert_eq!(sanitize_name("weird...name"), "weird.name");
    }

    #[test]
    fn test_sanitize_leading_digit() {
        assert_eq!(sanitize_name("2024 Bridge"), "_2024_Bridge");
        assert_eq!(sanitize_name("9"), "_9");
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_name(""), "Unnamed");
        assert_eq!(sanitize_name("Unnamed"), "Unnamed");
    }

    #[test]
    fn test_sanitize_idempotent_examples() {
        for name in ["Series A", "2024 Bridge", "", "a--b", "日本語", "___"] {
            let once = sanitize_name(name);
            assert_eq!(sanitize_name(&once), once, "not idempotent for {:?}", name);
        }
    }

    proptest! {
        #[test]
        fn prop_sanitize_idempotent(name in ".{0,40}") {
            let once = sanitize_name(&name);
            prop_assert_eq!(sanitize_name(&once), once.clone());
            prop_assert!(!once.is_empty());
            prop_assert!(!once.as_bytes()[0].is_ascii_digit());
        }
    }

    #[test]
    fn test_aggregate_name() {
        assert_eq!(
            aggregate_name("Series A", AggregateKind::PreRoundShares),
            "Series_A_PreRoundShares"
        );
    }

    #[test]
    fn test_key_equality_under_sanitization() {
        // Raw and sanitized spellings address the same entry
        assert_eq!(SymbolKey::round("Series A"), SymbolKey::round("Series_A"));
        assert_eq!(
            SymbolKey::aggregate("Series A", AggregateKind::BaseShares)
                .round_name()
                .unwrap(),
            "Series_A"
        );
    }
}
