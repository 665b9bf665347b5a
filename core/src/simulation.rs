//! Simulation aggregator — owns the selection state and recomputes totals.
//!
//! RULE: Every operation takes the current `SimulationState` by value and
//! returns the next one inside an `Outcome`. A rejected operation returns
//! the state it was given, untouched, plus a diagnostic. There is no error
//! state: Empty and Populated are the only two.
//!
//! After every accepted mutation the aggregates are recomputed from the
//! cached unit prices. Arithmetic is checked: a mutation whose totals do
//! not fit in a `Decimal` is rejected like any other invalid input.
//!   line_total        = unit_price × quantity
//!   grand_total       = Σ line_total
//!   per_tier_total[q] = Σ over distinct matched records of price_at(q)
//!   budget            = BudgetSummary::compute(grand_total, settings)

use crate::{
    budget::{BudgetSettings, BudgetSummary, DepositBasis},
    diagnostic::Diagnostic,
    format::round_money,
    price_index::PriceIndex,
    tier::{default_quantity, resolve_unit_price, PriceRecord, Tier},
    types::{GroupKey, Money, RecordId, Sku},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One SKU chosen for the simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkuSelection {
    pub sku:             Sku,
    pub product_id:      String,
    pub quantity:        u64,
    /// Cached result of the tier resolver for `quantity`.
    pub unit_price:      Money,
    #[serde(default)]
    pub price_record_id: Option<RecordId>,
    /// Inline indicator for the last price resolution of this line.
    #[serde(default)]
    pub diagnostic:      Option<Diagnostic>,
}

impl SkuSelection {
    /// None when the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTotal {
    pub group_key:  GroupKey,
    pub sku:        Sku,
    pub quantity:   u64,
    pub unit_price: Money,
    pub total:      Money,
}

/// Derived figures. Never edited directly; rebuilt by `recompute`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Aggregates {
    pub line_totals:    Vec<LineTotal>,
    pub grand_total:    Money,
    /// "What if every selected category were ordered at exactly this tier."
    pub per_tier_total: BTreeMap<Tier, Money>,
    pub budget:         BudgetSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    selections: BTreeMap<GroupKey, Vec<SkuSelection>>,
    settings:   BudgetSettings,
    aggregates: Aggregates,
}

impl SimulationState {
    /// An empty simulation with the given budget settings.
    pub fn new(settings: BudgetSettings) -> Self {
        let aggregates = Aggregates {
            per_tier_total: Tier::ALL.into_iter().map(|t| (t, Decimal::ZERO)).collect(),
            budget: BudgetSummary::compute(Decimal::ZERO, &settings).unwrap_or_default(),
            ..Aggregates::default()
        };
        Self {
            selections: BTreeMap::new(),
            settings,
            aggregates,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.selections.is_empty()
    }

    pub fn selections(&self) -> &BTreeMap<GroupKey, Vec<SkuSelection>> {
        &self.selections
    }

    pub fn group(&self, group_key: &str) -> Option<&[SkuSelection]> {
        self.selections.get(group_key).map(Vec::as_slice)
    }

    pub fn selection(&self, group_key: &str, sku: &str) -> Option<&SkuSelection> {
        self.group(group_key)?.iter().find(|s| s.sku == sku)
    }

    /// Number of selected SKUs across all groups.
    pub fn selection_count(&self) -> usize {
        self.selections.values().map(Vec::len).sum()
    }

    pub fn settings(&self) -> &BudgetSettings {
        &self.settings
    }

    pub fn aggregates(&self) -> &Aggregates {
        &self.aggregates
    }

    pub fn grand_total(&self) -> Money {
        self.aggregates.grand_total
    }

    fn contains(&self, group_key: &str, sku: &str) -> bool {
        self.selection(group_key, sku).is_some()
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self::new(BudgetSettings::default())
    }
}

/// Result of one aggregator operation.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub state:       SimulationState,
    pub diagnostics: Vec<Diagnostic>,
    /// False when the operation was rejected and `state` is the input state.
    pub changed:     bool,
}

impl Outcome {
    fn applied(state: SimulationState, diagnostics: Vec<Diagnostic>) -> Self {
        Self { state, diagnostics, changed: true }
    }

    fn rejected(state: SimulationState, diagnostic: Diagnostic) -> Self {
        Self { state, diagnostics: vec![diagnostic], changed: false }
    }

    pub fn is_rejected(&self) -> bool {
        !self.changed
    }
}

struct PricedLine {
    record_id:  Option<RecordId>,
    unit_price: Money,
    diagnostic: Option<Diagnostic>,
}

/// Stateless aggregator over a fixed set of price records.
#[derive(Debug, Clone)]
pub struct BudgetSimulator {
    index:    PriceIndex,
    defaults: BudgetSettings,
}

impl BudgetSimulator {
    pub fn new(records: Vec<PriceRecord>, defaults: BudgetSettings) -> Self {
        Self {
            index: PriceIndex::new(records),
            defaults,
        }
    }

    pub fn index(&self) -> &PriceIndex {
        &self.index
    }

    pub fn defaults(&self) -> &BudgetSettings {
        &self.defaults
    }

    /// A fresh, empty state using the configured default budget settings.
    pub fn empty_state(&self) -> SimulationState {
        SimulationState::new(self.defaults.clone())
    }

    fn price_line(&self, sku: &str, quantity: u64) -> PricedLine {
        match self.index.find(sku) {
            Ok(record) => {
                let resolution = resolve_unit_price(record, quantity);
                PricedLine {
                    record_id:  Some(record.id.clone()),
                    unit_price: resolution.unit_price,
                    diagnostic: resolution.diagnostic,
                }
            }
            Err(diagnostic) => PricedLine {
                record_id:  None,
                unit_price: Decimal::ZERO,
                diagnostic: Some(diagnostic),
            },
        }
    }

    fn initial_quantity(&self, sku: &str) -> u64 {
        self.index
            .find(sku)
            .ok()
            .and_then(default_quantity)
            .unwrap_or_else(|| Tier::Q1000.quantity())
    }

    /// Add `sku` to `group_key`. Re-adding a selected SKU is a no-op.
    pub fn select_sku(&self, state: SimulationState, group_key: &str, sku: &str) -> Outcome {
        if state.contains(group_key, sku) {
            log::debug!("simulation: {sku} already selected in {group_key}");
            return Outcome::rejected(
                state,
                Diagnostic::DuplicateSelection {
                    group: group_key.to_string(),
                    sku:   sku.to_string(),
                },
            );
        }

        let quantity = self.initial_quantity(sku);
        let line = self.price_line(sku, quantity);
        let diagnostics: Vec<Diagnostic> = line.diagnostic.iter().cloned().collect();

        let mut next = state.clone();
        next.selections
            .entry(group_key.to_string())
            .or_default()
            .push(SkuSelection {
                sku:             sku.to_string(),
                product_id:      group_key.to_string(),
                quantity,
                unit_price:      line.unit_price,
                price_record_id: line.record_id,
                diagnostic:      line.diagnostic,
            });

        log::debug!("simulation: selected {sku} in {group_key} qty={quantity}");
        let overflow = Diagnostic::InvalidQuantity { input: quantity.to_string() };
        self.settle(state, next, diagnostics, overflow)
    }

    /// Drop `sku` from `group_key`; an emptied group loses its key.
    pub fn remove_sku(&self, state: SimulationState, group_key: &str, sku: &str) -> Outcome {
        if !state.contains(group_key, sku) {
            return Outcome::rejected(state, not_found(group_key, sku));
        }

        let mut state = state;
        if let Some(list) = state.selections.get_mut(group_key) {
            list.retain(|s| s.sku != sku);
            if list.is_empty() {
                state.selections.remove(group_key);
            }
        }

        log::debug!("simulation: removed {sku} from {group_key}");
        Outcome::applied(self.recompute(state), Vec::new())
    }

    /// Change the order quantity of a selected SKU and re-resolve its price.
    pub fn set_quantity(
        &self,
        state: SimulationState,
        group_key: &str,
        sku: &str,
        quantity: i64,
    ) -> Outcome {
        let quantity = match u64::try_from(quantity) {
            Ok(q) if q > 0 => q,
            _ => {
                log::debug!("simulation: rejected quantity {quantity} for {sku}");
                return Outcome::rejected(
                    state,
                    Diagnostic::InvalidQuantity { input: quantity.to_string() },
                );
            }
        };
        if !state.contains(group_key, sku) {
            return Outcome::rejected(state, not_found(group_key, sku));
        }

        let line = self.price_line(sku, quantity);
        let diagnostics: Vec<Diagnostic> = line.diagnostic.iter().cloned().collect();

        let mut next = state.clone();
        if let Some(selection) = next
            .selections
            .get_mut(group_key)
            .and_then(|list| list.iter_mut().find(|s| s.sku == sku))
        {
            selection.quantity = quantity;
            selection.unit_price = line.unit_price;
            selection.price_record_id = line.record_id;
            selection.diagnostic = line.diagnostic;
        }

        log::debug!("simulation: {sku} in {group_key} qty={quantity}");
        let overflow = Diagnostic::InvalidQuantity { input: quantity.to_string() };
        self.settle(state, next, diagnostics, overflow)
    }

    /// `set_quantity` for raw text from an input field.
    pub fn set_quantity_text(
        &self,
        state: SimulationState,
        group_key: &str,
        sku: &str,
        input: &str,
    ) -> Outcome {
        match crate::format::parse_quantity(input) {
            Ok(q) => match i64::try_from(q) {
                Ok(q) => self.set_quantity(state, group_key, sku, q),
                Err(_) => Outcome::rejected(
                    state,
                    Diagnostic::InvalidQuantity { input: input.to_string() },
                ),
            },
            Err(diagnostic) => Outcome::rejected(state, diagnostic),
        }
    }

    pub fn set_budget_cap(&self, state: SimulationState, value: Money) -> Outcome {
        let invalid = invalid_setting("budget cap", value);
        if !BudgetSettings::valid_cap(value) {
            return Outcome::rejected(state, invalid);
        }
        let settings = BudgetSettings { budget_cap: value, ..state.settings.clone() };
        with_settings(state, settings, invalid)
    }

    pub fn set_deposit_percentage(&self, state: SimulationState, value: Decimal) -> Outcome {
        let invalid = invalid_setting("deposit percentage", value);
        if !BudgetSettings::valid_deposit_percentage(value) {
            return Outcome::rejected(state, invalid);
        }
        let settings = BudgetSettings { deposit_percentage: value, ..state.settings.clone() };
        with_settings(state, settings, invalid)
    }

    pub fn set_deposit_basis(&self, state: SimulationState, basis: DepositBasis) -> Outcome {
        let invalid = invalid_setting("deposit basis", basis);
        let settings = BudgetSettings { deposit_basis: basis, ..state.settings.clone() };
        with_settings(state, settings, invalid)
    }

    /// Clear every selection. Budget settings are kept.
    pub fn reset(&self, state: SimulationState) -> Outcome {
        let settings = state.settings;
        log::debug!("simulation: reset");
        Outcome::applied(SimulationState::new(settings), Vec::new())
    }

    /// Clear every selection and restore the default budget settings.
    pub fn reset_all(&self, _state: SimulationState) -> Outcome {
        log::debug!("simulation: reset with default budget settings");
        Outcome::applied(self.empty_state(), Vec::new())
    }

    /// Rebuild a state from persisted selections. Unit prices are
    /// re-resolved against the current records; a repeated (group, sku)
    /// pair keeps its first occurrence and a line whose total does not
    /// fit is dropped. Settings that cannot be reconciled fall back to
    /// the defaults.
    pub fn rehydrate(
        &self,
        persisted: Vec<(GroupKey, SkuSelection)>,
        settings: BudgetSettings,
    ) -> Outcome {
        let mut diagnostics = Vec::new();
        let settings = if BudgetSummary::compute(Decimal::ZERO, &settings).is_some() {
            settings
        } else {
            diagnostics.push(invalid_setting("budget cap", settings.budget_cap));
            self.defaults.clone()
        };
        let mut state = SimulationState::new(settings);

        for (group_key, mut selection) in persisted {
            if state.contains(&group_key, &selection.sku) {
                diagnostics.push(Diagnostic::DuplicateSelection {
                    group: group_key,
                    sku:   selection.sku,
                });
                continue;
            }
            let line = self.price_line(&selection.sku, selection.quantity);
            selection.unit_price = line.unit_price;
            selection.price_record_id = line.record_id;
            selection.diagnostic = line.diagnostic;
            let quantity = selection.quantity;
            state.selections.entry(group_key.clone()).or_default().push(selection);

            if self.aggregate(&state).is_none() {
                drop_last(&mut state, &group_key);
                diagnostics.push(Diagnostic::InvalidQuantity { input: quantity.to_string() });
            }
        }

        log::info!(
            "simulation: rehydrated {} selections in {} groups",
            state.selection_count(),
            state.selections.len()
        );
        Outcome::applied(self.recompute(state), diagnostics)
    }

    /// Re-resolve every line, e.g. after the price records changed.
    /// Rejected as a whole when the new totals do not fit.
    pub fn reprice(&self, state: SimulationState) -> Outcome {
        let mut next = state.clone();
        let mut diagnostics = Vec::new();
        for selection in next.selections.values_mut().flatten() {
            let line = self.price_line(&selection.sku, selection.quantity);
            selection.unit_price = line.unit_price;
            selection.price_record_id = line.record_id;
            if let Some(d) = &line.diagnostic {
                diagnostics.push(d.clone());
            }
            selection.diagnostic = line.diagnostic;
        }
        let overflow = overflowing_line(&next);
        self.settle(state, next, diagnostics, overflow)
    }

    /// Rebuild all derived figures from the cached unit prices.
    /// Operations never produce a state whose totals overflow; if one is
    /// passed in anyway its previous aggregates are kept.
    pub fn recompute(&self, state: SimulationState) -> SimulationState {
        let mut state = state;
        match self.aggregate(&state) {
            Some(aggregates) => state.aggregates = aggregates,
            None => log::warn!("simulation: totals out of range, keeping previous aggregates"),
        }
        state
    }

    /// None when any total does not fit in a `Decimal`.
    fn aggregate(&self, state: &SimulationState) -> Option<Aggregates> {
        let mut line_totals = Vec::with_capacity(state.selection_count());
        let mut grand_total = Decimal::ZERO;
        let mut categories: BTreeSet<&str> = BTreeSet::new();

        for (group_key, list) in &state.selections {
            for selection in list {
                let total = selection.line_total()?;
                grand_total = grand_total.checked_add(total)?;
                line_totals.push(LineTotal {
                    group_key:  group_key.clone(),
                    sku:        selection.sku.clone(),
                    quantity:   selection.quantity,
                    unit_price: selection.unit_price,
                    total,
                });
                if let Some(id) = &selection.price_record_id {
                    categories.insert(id.as_str());
                }
            }
        }

        let per_tier_total = Tier::ALL
            .into_iter()
            .map(|tier| {
                categories
                    .iter()
                    .filter_map(|id| self.index.get(id))
                    .filter_map(|record| record.price_at(tier))
                    .try_fold(Decimal::ZERO, |sum, price| sum.checked_add(price))
                    .map(|sum| (tier, sum))
            })
            .collect::<Option<BTreeMap<_, _>>>()?;

        let grand_total = round_money(grand_total);
        Some(Aggregates {
            line_totals,
            grand_total,
            per_tier_total,
            budget: BudgetSummary::compute(grand_total, &state.settings)?,
        })
    }

    /// Accept `next` if its totals fit, otherwise hand back `previous`.
    fn settle(
        &self,
        previous: SimulationState,
        mut next: SimulationState,
        diagnostics: Vec<Diagnostic>,
        overflow: Diagnostic,
    ) -> Outcome {
        match self.aggregate(&next) {
            Some(aggregates) => {
                next.aggregates = aggregates;
                Outcome::applied(next, diagnostics)
            }
            None => {
                log::warn!("simulation: totals out of range, rejected: {overflow}");
                Outcome::rejected(previous, overflow)
            }
        }
    }
}

fn with_settings(state: SimulationState, settings: BudgetSettings, invalid: Diagnostic) -> Outcome {
    match BudgetSummary::compute(state.aggregates.grand_total, &settings) {
        Some(budget) => {
            let mut state = state;
            state.settings = settings;
            state.aggregates.budget = budget;
            Outcome::applied(state, Vec::new())
        }
        None => Outcome::rejected(state, invalid),
    }
}

fn drop_last(state: &mut SimulationState, group_key: &str) {
    if let Some(list) = state.selections.get_mut(group_key) {
        list.pop();
        if list.is_empty() {
            state.selections.remove(group_key);
        }
    }
}

/// `InvalidQuantity` naming the first line at which the running total overflows.
fn overflowing_line(state: &SimulationState) -> Diagnostic {
    let mut running = Some(Decimal::ZERO);
    let culprit = state.selections.values().flatten().find(|s| {
        running = running.and_then(|sum| s.line_total().and_then(|t| sum.checked_add(t)));
        running.is_none()
    });
    Diagnostic::InvalidQuantity {
        input: culprit.map(|s| s.quantity.to_string()).unwrap_or_default(),
    }
}

fn not_found(group_key: &str, sku: &str) -> Diagnostic {
    Diagnostic::SelectionNotFound {
        group: group_key.to_string(),
        sku:   sku.to_string(),
    }
}

fn invalid_setting(setting: &str, value: impl std::fmt::Display) -> Diagnostic {
    Diagnostic::InvalidBudgetSetting {
        setting: setting.to_string(),
        value:   value.to_string(),
    }
}
