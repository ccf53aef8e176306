//! Anti-dilution adjustment formulas
//!
//! When a later round prices below the round in which a protected holder
//! invested, the holder's effective conversion price (or share count) is
//! adjusted. Four methods are supported; all of them only ever adjust
//! downward in price / upward in shares, and every method's additional-share
//! output subtracts the holder's prior anti-dilution grants so a chain of
//! down-rounds never double-counts.

use capsheet_core::DilutionMethod;

use crate::encoding::ensure_division_guard;
use crate::expr::{if_expr, max, min, paren, round};

/// Resolved reference text for one anti-dilution adjustment
///
/// The original-round references point at the round in which the holder's
/// rights were granted - an explicit reference the assembler resolves, not
/// "the previous round".
#[derive(Debug, Clone)]
pub struct AntiDilutionRefs {
    /// `CP1` - price per share in the original round
    pub original_price: String,
    /// Shares issued to the holder in the original round
    pub original_shares: String,
    /// The holder's investment in the original round
    pub original_investment: String,
    /// The original round's pre-round share count (for percentage-based)
    pub original_pre_round: String,
    /// The original round's issued-share aggregate (for percentage-based)
    pub original_issued: String,
    /// Price per share in the current (down) round
    pub current_price: String,
    /// `A` broad variant - all shares outstanding before the new issuance
    pub broad_base: String,
    /// `A` narrow variant - the preferred-only outstanding base
    pub narrow_base: String,
    /// New-issuance consideration (the current round's new money)
    pub new_money: String,
    /// `C` - new shares issued in the current round
    pub new_shares: String,
    /// Current round's base-share aggregate (for percentage-based)
    pub current_base: String,
    /// Current round's pre-round share count (for percentage-based)
    pub current_pre_round: String,
    /// Sum of the holder's anti-dilution grants from earlier rounds
    pub prior_grants: String,
}

/// The adjusted conversion price for a price-based method.
///
/// - full ratchet: `MIN(CP1, price)` - never adjusts upward
/// - weighted average: `CP2 = CP1 * (A + B) / (A + C)` with
///   `B = consideration / CP1`, gated so it only triggers on a down round
pub fn adjusted_price_expr(method: DilutionMethod, refs: &AntiDilutionRefs) -> Option<String> {
    match method {
        DilutionMethod::FullRatchet => {
            Some(min(&refs.original_price, &refs.current_price))
        }
        DilutionMethod::BroadBasedWeightedAverage => {
            Some(weighted_average_expr(refs, &refs.broad_base))
        }
        DilutionMethod::NarrowBasedWeightedAverage => {
            Some(weighted_average_expr(refs, &refs.narrow_base))
        }
        // Percentage-based adjusts shares directly, not price
        DilutionMethod::PercentageBased => None,
    }
}

fn weighted_average_expr(refs: &AntiDilutionRefs, base: &str) -> String {
    let b = paren(&format!("{}/{}", refs.new_money, refs.original_price));
    let cp2 = format!(
        "{}*{}/{}",
        refs.original_price,
        paren(&format!("{}+{}", base, b)),
        paren(&format!("{}+{}", base, refs.new_shares)),
    );
    if_expr(
        &format!("{}<{}", refs.current_price, refs.original_price),
        &cp2,
        &refs.original_price,
    )
}

/// The holder's adjusted share count under a method.
///
/// Price-based methods re-price the original investment; the
/// percentage-based method preserves the holder's fraction of the original
/// round's post-money against the current pre-grant total, gated on a down
/// round.
pub fn adjusted_shares_expr(method: DilutionMethod, refs: &AntiDilutionRefs) -> String {
    match adjusted_price_expr(method, refs) {
        Some(price) => round(
            &format!("{}/{}", refs.original_investment, paren(&price)),
            0,
        ),
        None => {
            let original_fraction = paren(&format!(
                "{}/{}",
                refs.original_shares,
                paren(&format!(
                    "{}+{}",
                    refs.original_pre_round, refs.original_issued
                )),
            ));
            let preserved = round(
                &format!(
                    "{}*{}",
                    original_fraction,
                    paren(&format!(
                        "{}+{}",
                        refs.current_pre_round, refs.current_base
                    )),
                ),
                0,
            );
            if_expr(
                &format!("{}<{}", refs.current_price, refs.original_price),
                &preserved,
                &refs.original_shares,
            )
        }
    }
}

/// The additional shares granted by this adjustment:
/// `MAX(0, ROUND(adjusted - original - prior_grants, 0))`.
///
/// Prior grants from earlier down-rounds are subtracted so chained
/// adjustments never double-count.
pub fn additional_shares_formula(method: DilutionMethod, refs: &AntiDilutionRefs) -> String {
    let adjusted = adjusted_shares_expr(method, refs);
    let additional = format!(
        "{}-{}-{}",
        adjusted, refs.original_shares, refs.prior_grants
    );
    ensure_division_guard(&format!("={}", max("0", &round(&additional, 0))))
}

/// Numeric twin of the full-ratchet price
pub fn full_ratchet_price(original_price: f64, current_price: f64) -> f64 {
    original_price.min(current_price)
}

/// Numeric twin of the weighted-average price.
///
/// `a` is the outstanding-share base (broad or narrow), `consideration` the
/// new money, `new_shares` the shares it buys.
pub fn weighted_average_price(
    original_price: f64,
    current_price: f64,
    a: f64,
    consideration: f64,
    new_shares: f64,
) -> f64 {
    if current_price >= original_price {
        return original_price;
    }
    let b = consideration / original_price;
    let denominator = a + new_shares;
    if denominator == 0.0 {
        return original_price;
    }
    original_price * (a + b) / denominator
}

/// Numeric twin of [`additional_shares_formula`]
pub fn additional_shares(adjusted: f64, original: f64, prior_grants: f64) -> f64 {
    (adjusted - original - prior_grants).round().max(0.0)
}
