//! Number helpers shared by the simulator, the store and the runner.
//!
//! Money is rounded to 2 decimal places, half away from zero.

use crate::{diagnostic::Diagnostic, types::Money};
use rust_decimal::prelude::*;

const MONEY_DP: u32 = 2;

pub fn round_money(value: Money) -> Money {
    value.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// `1234567.5` -> `1,234,567.50`
pub fn format_money(value: Money) -> String {
    let rounded = round_money(value);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = format!("{:.2}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if negative {
        format!("-{grouped}.{frac_part}")
    } else {
        format!("{grouped}.{frac_part}")
    }
}

/// `50` -> `50.0%`
pub fn format_percent(value: Decimal) -> String {
    let rounded = value.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.1}%")
}

/// Parse a free-text quantity field. Accepts `_`, `,` and spaces as
/// digit group separators. Zero, negatives and non-numeric input are
/// rejected with `InvalidQuantity`.
pub fn parse_quantity(input: &str) -> Result<u64, Diagnostic> {
    let invalid = || Diagnostic::InvalidQuantity { input: input.to_string() };
    let cleaned: String = input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '_' | ',' | ' '))
        .collect();
    if cleaned.is_empty() || !cleaned.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    match cleaned.parse::<u64>() {
        Ok(q) if q > 0 => Ok(q),
        _ => Err(invalid()),
    }
}

/// Parse a decimal stored as TEXT.
pub fn parse_money(text: &str) -> Option<Money> {
    Decimal::from_str(text.trim()).ok()
}
