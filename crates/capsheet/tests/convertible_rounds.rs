//! Convertible note and SAFE compilation

use capsheet::assembly::AssemblyOptions;
use capsheet::prelude::*;

fn note_doc() -> Document {
    serde_json::from_str(
        r#"{
            "holders": [
                {"name": "Founders"},
                {"name": "Angel One"},
                {"name": "Angel Two"}
            ],
            "rounds": [
                {
                    "name": "Founding",
                    "date": "2022-01-01",
                    "calculation_type": "fixed_shares",
                    "price_per_share": "0.10",
                    "instruments": [
                        {"id": "f-1", "holder": "Founders", "class": "Common", "shares": 9000000}
                    ]
                },
                {
                    "name": "Bridge",
                    "date": "2022-09-01",
                    "calculation_type": "convertible",
                    "instruments": [
                        {"id": "b-1", "holder": "Angel One", "class": "Note",
                         "investment_amount": "250000", "discount_rate": "0.2",
                         "valuation_cap": "4000000"},
                        {"id": "b-2", "holder": "Angel Two", "class": "Note",
                         "investment_amount": "100000", "discount_rate": "0.2"}
                    ]
                }
            ]
        }"#,
    )
    .unwrap()
}

/// A note round's reference price is the last priced round's price
#[test]
fn test_note_round_carries_reference_price() {
    let model = compile(&note_doc(), &AssemblyOptions::default()).unwrap();

    assert_eq!(
        model.formula_at("Bridge", "B4"),
        Some("=Founding_PricePerShare")
    );
}

/// With both a cap and a discount, conversion takes the lower implied price
#[test]
fn test_cap_and_discount_take_the_minimum() {
    let model = compile(&note_doc(), &AssemblyOptions::default()).unwrap();

    let formula = model.formula_at("Bridge", "H17").unwrap();
    assert_eq!(
        formula,
        "=IFERROR(ROUND(Bridge_Instruments[[#This Row],[Amount]]/\
(MIN((4000000/Bridge_PreRoundShares),Bridge_PricePerShare*(1-0.2))),0),0)"
    );
}

/// Discount-only notes convert straight off the discounted reference price
#[test]
fn test_discount_only_note() {
    let model = compile(&note_doc(), &AssemblyOptions::default()).unwrap();

    let formula = model.formula_at("Bridge", "H18").unwrap();
    assert_eq!(
        formula,
        "=IFERROR(ROUND(Bridge_Instruments[[#This Row],[Amount]]/\
(Bridge_PricePerShare*(1-0.2)),0),0)"
    );
}
