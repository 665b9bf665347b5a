//! Non-fatal diagnostics surfaced next to the affected SKU.
//!
//! RULE: Nothing in the pricing core returns Err for a pricing or
//! selection problem. A rejected operation returns the unchanged state
//! plus one of these. Hard errors live in `error.rs`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    // ── Tier resolution ────────────────────────────
    #[error("no price available for this record")]
    NoPriceAvailable,

    #[error("quantity below minimum order of {minimum} units")]
    QuantityBelowMinimum { minimum: u64 },

    #[error("must order exactly {required} units")]
    BulkOnlyQuantityMismatch { required: u64 },

    // ── Price index ────────────────────────────────
    #[error("no matching price record for {sku} (category '{token}')")]
    NoMatchingPriceRecord { sku: String, token: String },

    // ── Selection ──────────────────────────────────
    #[error("{sku} is already selected in {group}")]
    DuplicateSelection { group: String, sku: String },

    #[error("{sku} is not selected in {group}")]
    SelectionNotFound { group: String, sku: String },

    #[error("invalid quantity '{input}'")]
    InvalidQuantity { input: String },

    #[error("invalid {setting}: {value}")]
    InvalidBudgetSetting { setting: String, value: String },

    // ── Write-through ──────────────────────────────
    #[error("could not {operation}: {reason}")]
    PersistenceFailed { operation: String, reason: String },
}
