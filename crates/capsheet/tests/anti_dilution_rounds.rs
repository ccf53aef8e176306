//! Anti-dilution compilation across a down-round chain

use capsheet::assembly::{AssemblyError, AssemblyOptions};
use capsheet::prelude::*;
use capsheet::FormulaError;

/// Founding, a priced Seed, then a down Series A carrying the adjustments
fn down_round_doc(anti: &str) -> Document {
    let json = format!(
        r#"{{
            "holders": [
                {{"name": "Alice"}},
                {{"name": "Founders"}},
                {{"name": "New Money"}}
            ],
            "rounds": [
                {{
                    "name": "Founding",
                    "date": "2022-01-01",
                    "calculation_type": "fixed_shares",
                    "instruments": [
                        {{"id": "f-1", "holder": "Founders", "class": "Common", "shares": 8000000}}
                    ]
                }},
                {{
                    "name": "Seed",
                    "date": "2023-02-01",
                    "calculation_type": "valuation_based",
                    "pre_money_valuation": "16000000",
                    "instruments": [
                        {{"id": "s-1", "holder": "Alice", "class": "Preferred Seed",
                         "investment_amount": "2000000"}}
                    ]
                }},
                {{
                    "name": "Series A",
                    "date": "2024-08-01",
                    "calculation_type": "valuation_based",
                    "pre_money_valuation": "5000000",
                    "instruments": [
                        {{"id": "a-1", "holder": "New Money", "class": "Preferred A",
                         "investment_amount": "1000000"}},
                        {}
                    ]
                }}
            ]
        }}"#,
        anti
    );
    serde_json::from_str(&json).unwrap()
}

/// Full ratchet reprices the original investment at the lower of the two
/// round prices, subtracting the original position and prior grants
#[test]
fn test_full_ratchet_formula() {
    let doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Alice", "class": "Preferred Seed",
            "dilution_method": "full_ratchet", "original_round": "Seed"}"#,
    );
    let model = compile(&doc, &AssemblyOptions::default()).unwrap();

    let formula = model.formula_at("Series_A", "H18").unwrap();
    assert!(
        formula.contains("MIN(Seed_PricePerShare,Series_A_PricePerShare)"),
        "formula: {formula}"
    );
    // The original position comes from the holdings sheet (Alice, Seed column)
    assert!(formula.contains("Holdings!$C$2"), "formula: {formula}");
    // Never negative, always whole shares, always guarded
    assert!(formula.starts_with("=IFERROR(MAX(0,ROUND("), "formula: {formula}");
}

/// Broad-based weighted average gates on the down round and uses the current
/// pre-round count as its outstanding base
#[test]
fn test_broad_based_weighted_average_formula() {
    let doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Alice", "class": "Preferred Seed",
            "dilution_method": "broad_based_weighted_average", "original_round": "Seed"}"#,
    );
    let model = compile(&doc, &AssemblyOptions::default()).unwrap();

    let formula = model.formula_at("Series_A", "H18").unwrap();
    assert!(
        formula.contains("IF(Series_A_PricePerShare<Seed_PricePerShare,"),
        "formula: {formula}"
    );
    assert!(
        formula.contains("Series_A_NewMoney/Seed_PricePerShare"),
        "formula: {formula}"
    );
}

/// The narrow variant swaps the outstanding base for one excluding founder
/// stock; everything else matches the broad variant
#[test]
fn test_narrow_base_excludes_founder_stock() {
    let doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Alice", "class": "Preferred Seed",
            "dilution_method": "narrow_based_weighted_average", "original_round": "Seed"}"#,
    );
    let model = compile(&doc, &AssemblyOptions::default()).unwrap();

    let formula = model.formula_at("Series_A", "H18").unwrap();
    assert!(
        formula.contains("(Series_A_PreRoundShares-Founding_IssuedShares)"),
        "formula: {formula}"
    );
}

/// Percentage-based preserves the original fraction without touching price
#[test]
fn test_percentage_based_formula() {
    let doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Alice", "class": "Preferred Seed",
            "dilution_method": "percentage_based", "original_round": "Seed"}"#,
    );
    let model = compile(&doc, &AssemblyOptions::default()).unwrap();

    let formula = model.formula_at("Series_A", "H18").unwrap();
    // Original fraction of the Seed post-money
    assert!(
        formula.contains("Holdings!$C$2/(Seed_PreRoundShares+Seed_IssuedShares)"),
        "formula: {formula}"
    );
    assert!(
        !formula.contains("MIN(Seed_PricePerShare"),
        "percentage-based must not reprice: {formula}"
    );
}

/// Prior grants from earlier rounds are subtracted so chained down-rounds do
/// not double-count
#[test]
fn test_prior_grants_are_subtracted() {
    let doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Alice", "class": "Preferred Seed",
            "dilution_method": "full_ratchet", "original_round": "Seed"}"#,
    );
    let model = compile(&doc, &AssemblyOptions::default()).unwrap();

    let formula = model.formula_at("Series_A", "H18").unwrap();
    assert!(
        formula.contains(
            "SUMIFS(Seed_Instruments[Shares],Seed_Instruments[Holder],\"Alice\",\
Seed_Instruments[Kind],\"anti_dilution\")"
        ),
        "formula: {formula}"
    );
}

/// Omitting original_round falls back to the immediately preceding round
#[test]
fn test_missing_original_round_falls_back_to_previous() {
    let doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Alice", "class": "Preferred Seed",
            "dilution_method": "full_ratchet"}"#,
    );
    let model = compile(&doc, &AssemblyOptions::default()).unwrap();

    let formula = model.formula_at("Series_A", "H18").unwrap();
    assert!(
        formula.contains("Seed_PricePerShare"),
        "expected fallback to Seed: {formula}"
    );
}

/// An original_round that exists nowhere in the document is a plain data
/// error
#[test]
fn test_nonexistent_original_round_is_data_error() {
    let doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Alice", "class": "Preferred Seed",
            "dilution_method": "full_ratchet", "original_round": "Series Z"}"#,
    );
    let err = compile(&doc, &AssemblyOptions::default()).unwrap_err();
    assert!(matches!(
        err,
        AssemblyError::Core(capsheet_core::Error::RoundNotFound(_))
    ));
}

/// An original_round pointing at a *later* round is an assembly-order
/// violation, reported as the distinct ordering class rather than an unknown
/// symbol
#[test]
fn test_forward_original_round_is_ordering_error() {
    let mut doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Alice", "class": "Preferred Seed",
            "dilution_method": "full_ratchet", "original_round": "Series B"}"#,
    );
    // A further round that exists but is assembled after Series A
    doc.rounds.push(Round {
        name: "Series B".to_string(),
        date: doc.rounds[2].date,
        calculation_type: CalculationType::ValuationBased,
        pre_money_valuation: None,
        price_per_share: None,
        instruments: Vec::new(),
    });

    let err = compile(&doc, &AssemblyOptions::default()).unwrap_err();
    match err {
        AssemblyError::Formula(FormulaError::Reference { source, .. }) => {
            assert!(matches!(
                source,
                capsheet_core::Error::RoundNotRegistered { .. }
            ));
        }
        other => panic!("expected ordering violation, got {other}"),
    }
}

/// An unknown holder on an anti-dilution row surfaces with full context
#[test]
fn test_unknown_holder_is_contextual_error() {
    let doc = down_round_doc(
        r#"{"id": "a-2", "holder": "Nobody", "class": "Preferred Seed",
            "dilution_method": "full_ratchet", "original_round": "Seed"}"#,
    );
    let err = compile(&doc, &AssemblyOptions::default()).unwrap_err();
    match err {
        AssemblyError::Formula(FormulaError::Reference { context, .. }) => {
            assert_eq!(context.holder.as_deref(), Some("Nobody"));
            assert_eq!(context.round.as_deref(), Some("Series A"));
        }
        other => panic!("expected contextual reference error, got {other}"),
    }
}
