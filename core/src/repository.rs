//! Persistence seam for a budget session.
//!
//! The session only ever talks to storage through this trait, so tests
//! can swap in a repository that fails on purpose.

use crate::{
    budget::BudgetSettings,
    error::BudgetResult,
    event::EventLogEntry,
    simulation::SkuSelection,
    store::SimStore,
    tier::PriceRecord,
    types::GroupKey,
};

pub trait SelectionRepository {
    fn list_price_records(&self) -> BudgetResult<Vec<PriceRecord>>;

    fn list_analysis_selections(
        &self,
        session_id: &str,
    ) -> BudgetResult<Vec<(GroupKey, SkuSelection)>>;

    fn persist_selection(
        &self,
        session_id: &str,
        group_key: &str,
        selection: &SkuSelection,
    ) -> BudgetResult<()>;

    fn delete_selection(&self, session_id: &str, group_key: &str, sku: &str) -> BudgetResult<()>;

    fn clear_selections(&self, session_id: &str) -> BudgetResult<()>;

    fn save_budget_settings(&self, session_id: &str, settings: &BudgetSettings) -> BudgetResult<()>;

    fn load_budget_settings(&self, session_id: &str) -> BudgetResult<Option<BudgetSettings>>;

    fn append_event(&self, entry: &EventLogEntry) -> BudgetResult<()>;
}

impl SelectionRepository for SimStore {
    fn list_price_records(&self) -> BudgetResult<Vec<PriceRecord>> {
        SimStore::list_price_records(self)
    }

    fn list_analysis_selections(
        &self,
        session_id: &str,
    ) -> BudgetResult<Vec<(GroupKey, SkuSelection)>> {
        self.selection_rows(session_id)
    }

    fn persist_selection(
        &self,
        session_id: &str,
        group_key: &str,
        selection: &SkuSelection,
    ) -> BudgetResult<()> {
        self.upsert_selection(session_id, group_key, selection)
    }

    fn delete_selection(&self, session_id: &str, group_key: &str, sku: &str) -> BudgetResult<()> {
        self.delete_selection_row(session_id, group_key, sku)?;
        Ok(())
    }

    fn clear_selections(&self, session_id: &str) -> BudgetResult<()> {
        self.clear_selection_rows(session_id)?;
        Ok(())
    }

    fn save_budget_settings(&self, session_id: &str, settings: &BudgetSettings) -> BudgetResult<()> {
        self.save_settings(session_id, settings)
    }

    fn load_budget_settings(&self, session_id: &str) -> BudgetResult<Option<BudgetSettings>> {
        self.load_settings(session_id)
    }

    fn append_event(&self, entry: &EventLogEntry) -> BudgetResult<()> {
        SimStore::append_event(self, entry)
    }
}

impl<R: SelectionRepository + ?Sized> SelectionRepository for &R {
    fn list_price_records(&self) -> BudgetResult<Vec<PriceRecord>> {
        (**self).list_price_records()
    }

    fn list_analysis_selections(
        &self,
        session_id: &str,
    ) -> BudgetResult<Vec<(GroupKey, SkuSelection)>> {
        (**self).list_analysis_selections(session_id)
    }

    fn persist_selection(
        &self,
        session_id: &str,
        group_key: &str,
        selection: &SkuSelection,
    ) -> BudgetResult<()> {
        (**self).persist_selection(session_id, group_key, selection)
    }

    fn delete_selection(&self, session_id: &str, group_key: &str, sku: &str) -> BudgetResult<()> {
        (**self).delete_selection(session_id, group_key, sku)
    }

    fn clear_selections(&self, session_id: &str) -> BudgetResult<()> {
        (**self).clear_selections(session_id)
    }

    fn save_budget_settings(&self, session_id: &str, settings: &BudgetSettings) -> BudgetResult<()> {
        (**self).save_budget_settings(session_id, settings)
    }

    fn load_budget_settings(&self, session_id: &str) -> BudgetResult<Option<BudgetSettings>> {
        (**self).load_budget_settings(session_id)
    }

    fn append_event(&self, entry: &EventLogEntry) -> BudgetResult<()> {
        (**self).append_event(entry)
    }
}
