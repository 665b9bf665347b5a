//! Tier resolver — maps (price record, order quantity) to a unit price.
//!
//! Prices are case-pack breaks, not a curve: a quantity between two
//! priced tiers takes the lower tier's price (floor), a quantity above
//! the highest priced tier keeps the highest tier's price (plateau).
//! There is no interpolation.

use crate::{
    diagnostic::Diagnostic,
    error::{BudgetError, BudgetResult},
    types::{Money, RecordId},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The six fixed order quantities a price can be defined at.
/// Declaration order is ascending quantity; `Ord` relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "1000")]
    Q1000,
    #[serde(rename = "2000")]
    Q2000,
    #[serde(rename = "3000")]
    Q3000,
    #[serde(rename = "4000")]
    Q4000,
    #[serde(rename = "5000")]
    Q5000,
    #[serde(rename = "8000")]
    Q8000,
}

impl Tier {
    pub const ALL: [Tier; 6] = [
        Tier::Q1000,
        Tier::Q2000,
        Tier::Q3000,
        Tier::Q4000,
        Tier::Q5000,
        Tier::Q8000,
    ];

    /// The bulk tier. A record priced only here is bulk-only.
    pub const BULK: Tier = Tier::Q8000;

    pub fn quantity(self) -> u64 {
        match self {
            Self::Q1000 => 1000,
            Self::Q2000 => 2000,
            Self::Q3000 => 3000,
            Self::Q4000 => 4000,
            Self::Q5000 => 5000,
            Self::Q8000 => 8000,
        }
    }

    pub fn from_quantity(quantity: u64) -> Option<Tier> {
        Self::ALL.into_iter().find(|t| t.quantity() == quantity)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.quantity())
    }
}

/// One row per product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub id:            RecordId,
    pub category_name: String,
    /// Sparse: a missing or zero entry means "no price at this tier".
    #[serde(default)]
    pub tier_prices:   BTreeMap<Tier, Money>,
}

impl PriceRecord {
    pub fn new(id: impl Into<RecordId>, category_name: impl Into<String>) -> Self {
        Self {
            id:            id.into(),
            category_name: category_name.into(),
            tier_prices:   BTreeMap::new(),
        }
    }

    pub fn with_price(mut self, tier: Tier, price: Money) -> Self {
        self.tier_prices.insert(tier, price);
        self
    }

    /// Price defined at `tier`, treating zero as undefined.
    pub fn price_at(&self, tier: Tier) -> Option<Money> {
        self.tier_prices
            .get(&tier)
            .copied()
            .filter(|p| *p > Decimal::ZERO)
    }

    /// Priced tiers in ascending quantity order.
    pub fn priced_tiers(&self) -> Vec<(Tier, Money)> {
        Tier::ALL
            .into_iter()
            .filter_map(|t| self.price_at(t).map(|p| (t, p)))
            .collect()
    }

    pub fn is_bulk_only(&self) -> bool {
        let priced = self.priced_tiers();
        priced.len() == 1 && priced[0].0 == Tier::BULK
    }

    /// Hard validation for data coming in from outside the core.
    /// An unpriced record is valid (it resolves to NoPriceAvailable);
    /// a negative price or an empty name is not.
    pub fn validate(&self) -> BudgetResult<()> {
        if self.category_name.trim().is_empty() {
            return Err(BudgetError::MalformedPriceRecord {
                id:     self.id.clone(),
                reason: "empty category name".into(),
            });
        }
        if let Some((tier, price)) = self.tier_prices.iter().find(|(_, p)| **p < Decimal::ZERO) {
            return Err(BudgetError::MalformedPriceRecord {
                id:     self.id.clone(),
                reason: format!("negative price {price} at tier {tier}"),
            });
        }
        Ok(())
    }
}

/// Outcome of a tier lookup. `unit_price` is zero whenever `diagnostic` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierResolution {
    pub unit_price: Money,
    /// The priced tier the unit price was taken from.
    pub tier:       Option<Tier>,
    pub diagnostic: Option<Diagnostic>,
}

impl TierResolution {
    fn priced(tier: Tier, unit_price: Money) -> Self {
        Self { unit_price, tier: Some(tier), diagnostic: None }
    }

    fn unpriced(diagnostic: Diagnostic) -> Self {
        Self { unit_price: Decimal::ZERO, tier: None, diagnostic: Some(diagnostic) }
    }

    pub fn is_priced(&self) -> bool {
        self.diagnostic.is_none()
    }
}

/// Resolve the unit price for `quantity` against `record`.
pub fn resolve_unit_price(record: &PriceRecord, quantity: u64) -> TierResolution {
    if quantity == 0 {
        return TierResolution::unpriced(Diagnostic::InvalidQuantity { input: "0".into() });
    }

    if let Some(tier) = Tier::from_quantity(quantity) {
        if let Some(price) = record.price_at(tier) {
            return TierResolution::priced(tier, price);
        }
    }

    let priced = record.priced_tiers();
    let (Some(&(min_tier, _)), Some(&(max_tier, max_price))) = (priced.first(), priced.last())
    else {
        return TierResolution::unpriced(Diagnostic::NoPriceAvailable);
    };

    // Exact 8000 was handled above; anything else on a bulk-only record is refused.
    if record.is_bulk_only() {
        return TierResolution::unpriced(Diagnostic::BulkOnlyQuantityMismatch {
            required: Tier::BULK.quantity(),
        });
    }

    if quantity < min_tier.quantity() {
        return TierResolution::unpriced(Diagnostic::QuantityBelowMinimum {
            minimum: min_tier.quantity(),
        });
    }

    if quantity > max_tier.quantity() {
        return TierResolution::priced(max_tier, max_price);
    }

    // min <= quantity <= max, so a floor tier always exists.
    priced
        .iter()
        .rev()
        .find(|(t, _)| t.quantity() <= quantity)
        .map(|&(t, p)| TierResolution::priced(t, p))
        .unwrap_or_else(|| TierResolution::unpriced(Diagnostic::NoPriceAvailable))
}

/// Initial quantity for a newly selected SKU: the lowest priced tier
/// (8000 for a bulk-only record). None when nothing is priced.
pub fn default_quantity(record: &PriceRecord) -> Option<u64> {
    record.priced_tiers().first().map(|(t, _)| t.quantity())
}
