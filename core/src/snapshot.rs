//! Snapshot view — the state handed to the presentation layer.
//!
//! Everything a dashboard needs to render the simulation in one
//! serializable value: selections grouped by key, per-line totals,
//! the per-tier comparison row and the budget figures.

use crate::{
    budget::{BudgetSettings, BudgetSummary},
    diagnostic::Diagnostic,
    simulation::{LineTotal, SimulationState, SkuSelection},
    tier::Tier,
    types::{GroupKey, Money},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSnapshot {
    pub session_id:     String,
    pub selections:     BTreeMap<GroupKey, Vec<SkuSelection>>,
    pub settings:       BudgetSettings,
    pub line_totals:    Vec<LineTotal>,
    pub grand_total:    Money,
    pub per_tier_total: BTreeMap<Tier, Money>,
    pub budget:         BudgetSummary,
    pub over_budget:    bool,
    /// Diagnostics from the most recent operation.
    pub diagnostics:    Vec<Diagnostic>,
}

impl SimulationSnapshot {
    pub fn capture(
        session_id: &str,
        state: &SimulationState,
        diagnostics: &[Diagnostic],
    ) -> Self {
        let aggregates = state.aggregates();
        Self {
            session_id:     session_id.to_string(),
            selections:     state.selections().clone(),
            settings:       state.settings().clone(),
            line_totals:    aggregates.line_totals.clone(),
            grand_total:    aggregates.grand_total,
            per_tier_total: aggregates.per_tier_total.clone(),
            budget:         aggregates.budget.clone(),
            over_budget:    aggregates.budget.is_over_budget(),
            diagnostics:    diagnostics.to_vec(),
        }
    }
}
