//! Session events — one per accepted mutation, appended to the event log.
//!
//! Variants are only ever appended, never removed or reordered.

use crate::{
    budget::DepositBasis,
    types::{GroupKey, Money, Sku},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BudgetEvent {
    // ── Session ─────────────────────────────────────
    SessionOpened {
        price_records: usize,
        selections:    usize,
    },

    // ── Selection ───────────────────────────────────
    SkuSelected {
        group_key:  GroupKey,
        sku:        Sku,
        quantity:   u64,
        unit_price: Money,
    },
    SkuRemoved {
        group_key: GroupKey,
        sku:       Sku,
    },
    QuantityChanged {
        group_key:  GroupKey,
        sku:        Sku,
        quantity:   u64,
        unit_price: Money,
    },
    SimulationReset {
        settings_restored: bool,
    },

    // ── Budget ──────────────────────────────────────
    BudgetCapChanged {
        budget_cap: Money,
    },
    DepositPercentageChanged {
        deposit_percentage: Decimal,
    },
    DepositBasisChanged {
        deposit_basis: DepositBasis,
    },
}

impl BudgetEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SessionOpened { .. }            => "session_opened",
            Self::SkuSelected { .. }              => "sku_selected",
            Self::SkuRemoved { .. }               => "sku_removed",
            Self::QuantityChanged { .. }          => "quantity_changed",
            Self::SimulationReset { .. }          => "simulation_reset",
            Self::BudgetCapChanged { .. }         => "budget_cap_changed",
            Self::DepositPercentageChanged { .. } => "deposit_percentage_changed",
            Self::DepositBasisChanged { .. }      => "deposit_basis_changed",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:          Option<i64>,
    pub session_id:  String,
    pub event_type:  String,
    pub payload:     String, // JSON-serialized BudgetEvent
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
