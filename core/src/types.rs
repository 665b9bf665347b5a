//! Shared primitive types used across the budget simulation.

use rust_decimal::Decimal;

/// Key a selection list is grouped under (category or product label).
pub type GroupKey = String;

/// A SKU identifier, conventionally `CATEGORY-VARIANT`.
pub type Sku = String;

/// Opaque price record identifier.
pub type RecordId = String;

/// Monetary amount. Money never travels as f64 inside the core.
pub type Money = Decimal;
