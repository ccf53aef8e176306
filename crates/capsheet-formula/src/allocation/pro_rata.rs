//! Pro-rata and super pro-rata allocation formulas
//!
//! For a round issuing `B` new base shares against `P` pre-round shares,
//! participants declare either a standard right (implicit target = their own
//! pre-round fraction) or a super right (explicit target fraction). All
//! targets must hold simultaneously, so the post-allocation total `T`
//! solves:
//!
//! ```text
//! T = (P + B - C_R - C_S) / (1 - R - S)
//! ```
//!
//! where `R`/`S` are the standard/super target-fraction sums and `C_R`/`C_S`
//! the pre-round shares held by each group. Every emitted formula references
//! the live aggregate cells for those sums - adding or removing a participant
//! only moves the aggregate's range, never rewrites individual formulas.

use crate::allocation::{OVERSUBSCRIPTION_CAP, OVERSUBSCRIPTION_CAP_F};
use crate::encoding::ensure_division_guard;
use crate::expr::{max, min, paren, round, sumif, text_literal};

/// Resolved reference text for a round's aggregate cells
///
/// Built once per round by the assembler; the allocation functions never
/// consult the registry themselves.
#[derive(Debug, Clone)]
pub struct AggregateRefs {
    /// `P` - shares outstanding before the round
    pub pre_round: String,
    /// `B` - base shares issued to primary investors
    pub base_shares: String,
    /// `R` - sum of standard participants' target fractions
    pub standard_target_sum: String,
    /// `S` - sum of super participants' target fractions
    pub super_target_sum: String,
    /// `C_R` - pre-round shares held by standard participants
    pub standard_held_sum: String,
    /// `C_S` - pre-round shares held by super participants
    pub super_held_sum: String,
    /// `T` - the round's new-total aggregate (referenced by participants)
    pub new_total: String,
}

/// The new-total formula defined once per round at the `NewTotalShares` cell.
///
/// `MIN(R+S, cap)` *is* the scaled target sum: it leaves undersubscribed
/// rounds untouched, clamps oversubscribed ones, and makes the
/// zero-participant round come out as `(P+B)/1`. The whole expression gets
/// the standard division guard.
pub fn new_total_formula(refs: &AggregateRefs) -> String {
    let target_sum = format!(
        "{}+{}",
        refs.standard_target_sum, refs.super_target_sum
    );
    let numerator = paren(&format!(
        "{}+{}-{}-{}",
        refs.pre_round, refs.base_shares, refs.standard_held_sum, refs.super_held_sum
    ));
    let denominator = paren(&format!("1-{}", min(&target_sum, OVERSUBSCRIPTION_CAP)));

    ensure_division_guard(&format!("={}/{}", numerator, denominator))
}

/// A standard participant's additional shares: the target fraction is the
/// holder's own pre-round fraction, read live from `held / P`.
pub fn standard_allocation_formula(refs: &AggregateRefs, held_ref: &str) -> String {
    let target = paren(&format!("{}/{}", held_ref, refs.pre_round));
    let additional = format!("{}*{}-{}", target, refs.new_total, held_ref);
    ensure_division_guard(&format!("={}", max("0", &round(&additional, 0))))
}

/// A super participant's additional shares against an explicit target
/// fraction (a literal or a reference).
pub fn super_allocation_formula(refs: &AggregateRefs, target_ref: &str, held_ref: &str) -> String {
    let additional = format!("{}*{}-{}", target_ref, refs.new_total, held_ref);
    format!("={}", max("0", &round(&additional, 0)))
}

/// A rights-group aggregate over the round's instrument table:
/// `SUMIF(rights_col, "standard"|"super", value_col)`.
pub fn rights_sum_formula(rights_col: &str, rights: &str, value_col: &str) -> String {
    format!(
        "={}",
        sumif(rights_col, &text_literal(rights), value_col)
    )
}

/// Numeric twin of [`new_total_formula`]
pub fn new_total(
    pre_round: f64,
    base_shares: f64,
    standard_target_sum: f64,
    super_target_sum: f64,
    standard_held_sum: f64,
    super_held_sum: f64,
) -> f64 {
    let target_sum = (standard_target_sum + super_target_sum).min(OVERSUBSCRIPTION_CAP_F);
    let denominator = 1.0 - target_sum;
    if denominator == 0.0 {
        return 0.0;
    }
    (pre_round + base_shares - standard_held_sum - super_held_sum) / denominator
}

/// Numeric twin of the participant allocation formulas
pub fn participant_allocation(target_fraction: f64, new_total: f64, held: f64) -> f64 {
    (target_fraction * new_total - held).round().max(0.0)
}
