//! SKU price index tests — normalization, containment, tie-break.

use restock_core::{
    diagnostic::Diagnostic,
    price_index::{category_token, normalize, PriceIndex},
    tier::PriceRecord,
};

fn index(names: &[&str]) -> PriceIndex {
    PriceIndex::new(
        names
            .iter()
            .enumerate()
            .map(|(i, n)| PriceRecord::new(format!("rec-{i}"), *n))
            .collect(),
    )
}

#[test]
fn normalize_strips_accents_and_case() {
    assert_eq!(normalize("Bonté"), "bonte");
    assert_eq!(normalize("  Crème BRÛLÉE "), "creme brulee");
    assert_eq!(normalize("ÉPICES"), "epices");
}

#[test]
fn category_token_is_prefix_before_first_dash() {
    assert_eq!(category_token("BNT-LOTUS"), "BNT");
    assert_eq!(category_token("BONTE-VANILLE-XL"), "BONTE");
    assert_eq!(category_token("SOLO"), "SOLO");
}

#[test]
fn accent_insensitive_match() {
    let idx = index(&["Lotus Biscoff", "Bonté"]);
    let record = idx.find("BONTE-VANILLE").unwrap();
    assert_eq!(record.category_name, "Bonté");
}

#[test]
fn containment_works_in_both_directions() {
    // Token inside the name.
    let idx = index(&["BNT Bonté Classic"]);
    assert!(idx.find("BNT-LOTUS").is_ok());

    // Name inside the token.
    let idx = index(&["Bon"]);
    assert!(idx.find("BONTE-1").is_ok());
}

#[test]
fn unrelated_token_matches_nothing() {
    let idx = index(&["Bonté", "Lotus Biscoff"]);
    let err = idx.find("XYZ-FOO").unwrap_err();
    assert_eq!(
        err,
        Diagnostic::NoMatchingPriceRecord {
            sku:   "XYZ-FOO".into(),
            token: "XYZ".into(),
        }
    );
}

#[test]
fn empty_token_matches_nothing() {
    let idx = index(&["Bonté"]);
    assert!(idx.find("-VANILLE").is_err());
    assert!(PriceIndex::default().find("BONTE-1").is_err());
}

#[test]
fn exact_name_beats_earlier_partial_match() {
    let idx = index(&["Lotus Biscoff", "Lotus"]);
    assert_eq!(idx.find("LOTUS-ORIGINAL").unwrap().id, "rec-1");
}

#[test]
fn closest_length_wins_among_partial_matches() {
    let idx = index(&["Chocolat Noir Intense", "Chocolat Noir"]);
    assert_eq!(idx.find("CHOCOLAT-70").unwrap().id, "rec-1");
}

#[test]
fn input_order_breaks_remaining_ties() {
    let idx = index(&["Lotus A", "Lotus B"]);
    assert_eq!(idx.find("LOTUS-1").unwrap().id, "rec-0");
    // Same answer on every call.
    assert_eq!(idx.find("LOTUS-1").unwrap().id, "rec-0");
}
