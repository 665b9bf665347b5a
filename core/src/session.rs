//! Budget session — the aggregator plus optimistic write-through.
//!
//! POLICY: the in-memory state is the source of truth for the session.
//! Every accepted mutation is applied first, then written through to the
//! repository. A failed write is logged and reported as
//! `Diagnostic::PersistenceFailed`; the in-memory state is never rolled
//! back and storage is not reconciled automatically.
//!
//! Callers serialize mutations: every operation takes `&mut self`.

use crate::{
    budget::DepositBasis,
    command::BudgetCommand,
    config::BudgetConfig,
    diagnostic::Diagnostic,
    error::BudgetResult,
    event::{BudgetEvent, EventLogEntry},
    repository::SelectionRepository,
    simulation::{BudgetSimulator, Outcome, SimulationState},
    snapshot::SimulationSnapshot,
    tier::PriceRecord,
    types::{GroupKey, Money, Sku},
};
use rust_decimal::Decimal;

/// What an accepted mutation has to write through.
enum WriteThrough {
    Selected { group_key: GroupKey, sku: Sku },
    Removed { group_key: GroupKey, sku: Sku },
    QuantityChanged { group_key: GroupKey, sku: Sku },
    BudgetCap,
    DepositPercentage,
    DepositBasis,
    Reset { settings_restored: bool },
}

impl WriteThrough {
    fn operation(&self) -> &'static str {
        match self {
            Self::Selected { .. }        => "persist selection",
            Self::Removed { .. }         => "delete selection",
            Self::QuantityChanged { .. } => "persist selection",
            Self::BudgetCap
            | Self::DepositPercentage
            | Self::DepositBasis         => "save budget settings",
            Self::Reset { .. }           => "clear selections",
        }
    }
}

pub struct BudgetSession<R: SelectionRepository> {
    session_id:       String,
    simulator:        BudgetSimulator,
    state:            SimulationState,
    repo:             R,
    /// Config price list, used whenever the repository has none.
    seed_records:     Vec<PriceRecord>,
    last_diagnostics: Vec<Diagnostic>,
}

impl<R: SelectionRepository> BudgetSession<R> {
    /// Load price records and persisted selections and rebuild the state.
    ///
    /// The repository's price records win; when it has none the config's
    /// seed list is used. A malformed record is a hard error.
    pub fn open(repo: R, config: &BudgetConfig) -> BudgetResult<Self> {
        let session_id = config.session_id.clone();

        let records = price_records(&repo, &config.price_records, &session_id)?;

        let settings = repo
            .load_budget_settings(&session_id)?
            .unwrap_or_else(|| config.defaults.clone());
        let persisted = repo.list_analysis_selections(&session_id)?;

        let simulator = BudgetSimulator::new(records, config.defaults.clone());
        let outcome = simulator.rehydrate(persisted, settings);

        let mut session = Self {
            session_id,
            simulator,
            state: outcome.state,
            repo,
            seed_records: config.price_records.clone(),
            last_diagnostics: outcome.diagnostics,
        };

        let opened = BudgetEvent::SessionOpened {
            price_records: session.simulator.index().len(),
            selections:    session.state.selection_count(),
        };
        if let Err(e) = session.record(&opened) {
            log::warn!("session={}: could not log session open: {e}", session.session_id);
            session.last_diagnostics.push(persistence_failed("append event", &e));
        }

        log::info!(
            "session={}: opened with {} price records, {} selections",
            session.session_id,
            session.simulator.index().len(),
            session.state.selection_count()
        );
        Ok(session)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn simulator(&self) -> &BudgetSimulator {
        &self.simulator
    }

    /// Diagnostics produced by the most recent operation.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.last_diagnostics
    }

    pub fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot::capture(&self.session_id, &self.state, &self.last_diagnostics)
    }

    // ── Mutations ──────────────────────────────────────────────

    pub fn select_sku(&mut self, group_key: &str, sku: &str) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.select_sku(state, group_key, sku);
        self.commit(outcome, WriteThrough::Selected {
            group_key: group_key.to_string(),
            sku:       sku.to_string(),
        })
    }

    pub fn remove_sku(&mut self, group_key: &str, sku: &str) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.remove_sku(state, group_key, sku);
        self.commit(outcome, WriteThrough::Removed {
            group_key: group_key.to_string(),
            sku:       sku.to_string(),
        })
    }

    pub fn set_quantity(&mut self, group_key: &str, sku: &str, quantity: i64) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.set_quantity(state, group_key, sku, quantity);
        self.commit(outcome, WriteThrough::QuantityChanged {
            group_key: group_key.to_string(),
            sku:       sku.to_string(),
        })
    }

    pub fn set_quantity_text(&mut self, group_key: &str, sku: &str, input: &str) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.set_quantity_text(state, group_key, sku, input);
        self.commit(outcome, WriteThrough::QuantityChanged {
            group_key: group_key.to_string(),
            sku:       sku.to_string(),
        })
    }

    pub fn set_budget_cap(&mut self, value: Money) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.set_budget_cap(state, value);
        self.commit(outcome, WriteThrough::BudgetCap)
    }

    pub fn set_deposit_percentage(&mut self, value: Decimal) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.set_deposit_percentage(state, value);
        self.commit(outcome, WriteThrough::DepositPercentage)
    }

    pub fn set_deposit_basis(&mut self, basis: DepositBasis) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.set_deposit_basis(state, basis);
        self.commit(outcome, WriteThrough::DepositBasis)
    }

    pub fn reset(&mut self) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.reset(state);
        self.commit(outcome, WriteThrough::Reset { settings_restored: false })
    }

    pub fn reset_all(&mut self) -> Vec<Diagnostic> {
        let state = self.take_state();
        let outcome = self.simulator.reset_all(state);
        self.commit(outcome, WriteThrough::Reset { settings_restored: true })
    }

    pub fn apply(&mut self, command: BudgetCommand) -> Vec<Diagnostic> {
        match command {
            BudgetCommand::SelectSku { group_key, sku } => self.select_sku(&group_key, &sku),
            BudgetCommand::RemoveSku { group_key, sku } => self.remove_sku(&group_key, &sku),
            BudgetCommand::SetQuantity { group_key, sku, quantity } => {
                self.set_quantity(&group_key, &sku, quantity)
            }
            BudgetCommand::Reset => self.reset(),
            BudgetCommand::ResetAll => self.reset_all(),
            BudgetCommand::SetBudgetCap { value } => self.set_budget_cap(value),
            BudgetCommand::SetDepositPercentage { value } => self.set_deposit_percentage(value),
            BudgetCommand::SetDepositBasis { basis } => self.set_deposit_basis(basis),
        }
    }

    /// Re-read price records from the repository (falling back to the
    /// config list like `open`) and re-resolve every line. On a read or
    /// validation error, or when the new totals do not fit, the current
    /// prices and state are kept as is.
    pub fn reload_prices(&mut self) -> BudgetResult<Vec<Diagnostic>> {
        let records = price_records(&self.repo, &self.seed_records, &self.session_id)?;
        let simulator = BudgetSimulator::new(records, self.simulator.defaults().clone());
        let outcome = simulator.reprice(self.state.clone());
        if outcome.is_rejected() {
            log::warn!("session={}: reprice rejected, keeping current prices", self.session_id);
            self.last_diagnostics = outcome.diagnostics.clone();
            return Ok(outcome.diagnostics);
        }
        self.simulator = simulator;
        self.state = outcome.state;

        let mut diagnostics = outcome.diagnostics;
        for (group_key, list) in self.state.selections() {
            for selection in list {
                if let Err(e) = self.repo.persist_selection(&self.session_id, group_key, selection) {
                    log::warn!("session={}: reprice write-through failed: {e}", self.session_id);
                    diagnostics.push(persistence_failed("persist selection", &e));
                }
            }
        }
        log::info!(
            "session={}: repriced {} selections against {} records",
            self.session_id,
            self.state.selection_count(),
            self.simulator.index().len()
        );
        self.last_diagnostics = diagnostics.clone();
        Ok(diagnostics)
    }

    // ── Internals ──────────────────────────────────────────────

    fn take_state(&mut self) -> SimulationState {
        std::mem::take(&mut self.state)
    }

    fn commit(&mut self, outcome: Outcome, write: WriteThrough) -> Vec<Diagnostic> {
        let Outcome { state, mut diagnostics, changed } = outcome;
        self.state = state;

        if changed {
            if let Err(e) = self.write_through(&write) {
                log::warn!(
                    "session={}: {} failed, keeping in-memory state: {e}",
                    self.session_id,
                    write.operation()
                );
                diagnostics.push(persistence_failed(write.operation(), &e));
            }
            if let Some(event) = self.event_for(&write) {
                if let Err(e) = self.record(&event) {
                    log::warn!("session={}: could not log {}: {e}", self.session_id, event.type_name());
                    diagnostics.push(persistence_failed("append event", &e));
                }
            }
        }

        self.last_diagnostics = diagnostics.clone();
        diagnostics
    }

    fn write_through(&self, write: &WriteThrough) -> BudgetResult<()> {
        let id = self.session_id.as_str();
        match write {
            WriteThrough::Selected { group_key, sku }
            | WriteThrough::QuantityChanged { group_key, sku } => {
                match self.state.selection(group_key, sku) {
                    Some(selection) => self.repo.persist_selection(id, group_key, selection),
                    None => Ok(()),
                }
            }
            WriteThrough::Removed { group_key, sku } => {
                self.repo.delete_selection(id, group_key, sku)
            }
            WriteThrough::BudgetCap
            | WriteThrough::DepositPercentage
            | WriteThrough::DepositBasis => {
                self.repo.save_budget_settings(id, self.state.settings())
            }
            WriteThrough::Reset { settings_restored } => {
                self.repo.clear_selections(id)?;
                if *settings_restored {
                    self.repo.save_budget_settings(id, self.state.settings())?;
                }
                Ok(())
            }
        }
    }

    fn event_for(&self, write: &WriteThrough) -> Option<BudgetEvent> {
        let settings = self.state.settings();
        let event = match write {
            WriteThrough::Selected { group_key, sku } => {
                let selection = self.state.selection(group_key, sku)?;
                BudgetEvent::SkuSelected {
                    group_key:  group_key.clone(),
                    sku:        sku.clone(),
                    quantity:   selection.quantity,
                    unit_price: selection.unit_price,
                }
            }
            WriteThrough::Removed { group_key, sku } => BudgetEvent::SkuRemoved {
                group_key: group_key.clone(),
                sku:       sku.clone(),
            },
            WriteThrough::QuantityChanged { group_key, sku } => {
                let selection = self.state.selection(group_key, sku)?;
                BudgetEvent::QuantityChanged {
                    group_key:  group_key.clone(),
                    sku:        sku.clone(),
                    quantity:   selection.quantity,
                    unit_price: selection.unit_price,
                }
            }
            WriteThrough::BudgetCap => BudgetEvent::BudgetCapChanged {
                budget_cap: settings.budget_cap,
            },
            WriteThrough::DepositPercentage => BudgetEvent::DepositPercentageChanged {
                deposit_percentage: settings.deposit_percentage,
            },
            WriteThrough::DepositBasis => BudgetEvent::DepositBasisChanged {
                deposit_basis: settings.deposit_basis,
            },
            WriteThrough::Reset { settings_restored } => BudgetEvent::SimulationReset {
                settings_restored: *settings_restored,
            },
        };
        Some(event)
    }

    fn record(&self, event: &BudgetEvent) -> BudgetResult<()> {
        let entry = EventLogEntry {
            id:          None,
            session_id:  self.session_id.clone(),
            event_type:  event.type_name().to_string(),
            payload:     serde_json::to_string(event)?,
            recorded_at: chrono::Utc::now(),
        };
        self.repo.append_event(&entry)
    }
}

/// The repository's records, or `seed` when it has none. A malformed
/// record is a hard error.
fn price_records<R: SelectionRepository>(
    repo: &R,
    seed: &[PriceRecord],
    session_id: &str,
) -> BudgetResult<Vec<PriceRecord>> {
    let mut records = repo.list_price_records()?;
    if records.is_empty() {
        log::info!(
            "session={session_id}: store has no price records, using {} from config",
            seed.len()
        );
        records = seed.to_vec();
    }
    for record in &records {
        record.validate()?;
    }
    Ok(records)
}

fn persistence_failed(operation: &str, error: &crate::error::BudgetError) -> Diagnostic {
    Diagnostic::PersistenceFailed {
        operation: operation.to_string(),
        reason:    error.to_string(),
    }
}
