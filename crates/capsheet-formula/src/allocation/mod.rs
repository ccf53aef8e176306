//! The allocation engine
//!
//! Pure functions that emit the expression text for pro-rata / super
//! pro-rata share top-ups and anti-dilution adjustments. Inputs are already
//! resolved reference strings (produced by the resolver against the layout
//! registry), so everything here is arithmetic over references - no registry
//! access, no I/O.
//!
//! Each emission function has a plain-number twin implementing the same
//! arithmetic over `f64`. The twins are what the test suite checks the math
//! against, and what the CLI uses for preview values; emitted formula text is
//! still only ever evaluated by the target spreadsheet engine.

pub mod anti_dilution;
pub mod pro_rata;

pub use anti_dilution::AntiDilutionRefs;
pub use pro_rata::AggregateRefs;

/// Clamp applied to oversubscribed target-fraction sums.
///
/// When the declared targets sum to 1 or more, both sums are scaled so their
/// total is this value, keeping the new-total denominator positive. A defined
/// behavior, not an error.
pub const OVERSUBSCRIPTION_CAP: &str = "0.999999";

/// Numeric twin of [`OVERSUBSCRIPTION_CAP`]
pub const OVERSUBSCRIPTION_CAP_F: f64 = 0.999999;
