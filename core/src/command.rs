use crate::{budget::DepositBasis, types::Money};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// All buyer-issued commands accepted by a session.
/// Variants are only ever appended, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum BudgetCommand {
    // ── Selection ─────────────────────────────────
    SelectSku {
        group_key: String,
        sku:       String,
    },
    RemoveSku {
        group_key: String,
        sku:       String,
    },
    /// Signed so that a negative entry reaches validation instead of
    /// failing to deserialize.
    SetQuantity {
        group_key: String,
        sku:       String,
        quantity:  i64,
    },
    Reset,
    ResetAll,

    // ── Budget ────────────────────────────────────
    SetBudgetCap {
        value: Money,
    },
    SetDepositPercentage {
        value: Decimal,
    },
    SetDepositBasis {
        basis: DepositBasis,
    },
}
