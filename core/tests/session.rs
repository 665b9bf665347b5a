//! Session tests — write-through to SQLite, rehydration, failure policy.

use std::cell::Cell;

use restock_core::{
    budget::{BudgetSettings, DepositBasis},
    command::BudgetCommand,
    config::BudgetConfig,
    diagnostic::Diagnostic,
    error::{BudgetError, BudgetResult},
    event::{BudgetEvent, EventLogEntry},
    repository::SelectionRepository,
    session::BudgetSession,
    simulation::SkuSelection,
    store::SimStore,
    tier::{PriceRecord, Tier},
    types::GroupKey,
};
use rust_decimal_macros::dec;

const SESSION: &str = "test-session";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn seeded_store(config: &BudgetConfig) -> SimStore {
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
        .import_price_records(&config.price_records)
        .expect("import price records");
    store
}

#[test]
fn accepted_mutations_are_written_through() {
    init_logging();
    let config = BudgetConfig::default_test();
    let store = seeded_store(&config);
    let mut session = BudgetSession::open(&store, &config).expect("open session");

    assert!(session.select_sku("Bonté", "BONTE-VANILLE").is_empty());
    assert_eq!(store.selection_count(SESSION).expect("count"), 1);

    assert!(session.set_quantity("Bonté", "BONTE-VANILLE", 5000).is_empty());
    let rows = store.selection_rows(SESSION).expect("rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0, "Bonté");
    assert_eq!(rows[0].1.quantity, 5000);
    assert_eq!(rows[0].1.unit_price, dec!(8));
    assert_eq!(rows[0].1.price_record_id.as_deref(), Some("rec-bonte"));

    session.remove_sku("Bonté", "BONTE-VANILLE");
    assert_eq!(store.selection_count(SESSION).expect("count"), 0);
}

#[test]
fn rejected_mutations_write_nothing() {
    let config = BudgetConfig::default_test();
    let store = seeded_store(&config);
    let mut session = BudgetSession::open(&store, &config).expect("open session");
    session.select_sku("g", "LOTUS-1");
    let events_before = store.event_count(SESSION).expect("events");

    let diagnostics = session.select_sku("g", "LOTUS-1");
    assert!(matches!(
        diagnostics.as_slice(),
        [Diagnostic::DuplicateSelection { .. }]
    ));
    let diagnostics = session.set_quantity("g", "LOTUS-1", 0);
    assert!(matches!(
        diagnostics.as_slice(),
        [Diagnostic::InvalidQuantity { .. }]
    ));
    let diagnostics = session.set_deposit_percentage(dec!(150));
    assert!(matches!(
        diagnostics.as_slice(),
        [Diagnostic::InvalidBudgetSetting { .. }]
    ));

    assert_eq!(store.event_count(SESSION).expect("events"), events_before);
    assert_eq!(store.load_settings(SESSION).expect("settings"), None);
    let rows = store.selection_rows(SESSION).expect("rows");
    assert_eq!(rows[0].1.quantity, 2000);
}

#[test]
fn reopening_rehydrates_selections_and_settings() {
    let config = BudgetConfig::default_test();
    let store = seeded_store(&config);

    {
        let mut session = BudgetSession::open(&store, &config).expect("open session");
        session.select_sku("Bonté", "BONTE-VANILLE");
        session.select_sku("Lotus", "LOTUS-ORIGINAL");
        session.set_quantity("Lotus", "LOTUS-ORIGINAL", 4000);
        session.set_budget_cap(dec!(80000));
        session.set_deposit_basis(DepositBasis::Allocation);
        assert_eq!(session.state().grand_total(), dec!(56000));
    }

    let session = BudgetSession::open(&store, &config).expect("reopen session");
    let state = session.state();
    assert_eq!(state.selection_count(), 2);
    assert_eq!(state.selection("Lotus", "LOTUS-ORIGINAL").expect("lotus").quantity, 4000);
    assert_eq!(state.grand_total(), dec!(56000));
    assert_eq!(state.settings().budget_cap, dec!(80000));
    assert_eq!(state.settings().deposit_basis, DepositBasis::Allocation);
    assert_eq!(state.aggregates().budget.deposit_amount, dec!(32000));
    assert_eq!(state.aggregates().budget.percent_used, dec!(70));
}

#[test]
fn reset_clears_rows_and_reset_all_saves_defaults() {
    let config = BudgetConfig::default_test();
    let store = seeded_store(&config);
    let mut session = BudgetSession::open(&store, &config).expect("open session");
    session.select_sku("Bonté", "BONTE-1");
    session.select_sku("Crate", "CRATE-1");
    session.set_budget_cap(dec!(25000));

    session.reset();
    assert!(session.state().is_empty());
    assert_eq!(store.selection_count(SESSION).expect("count"), 0);
    let saved = store.load_settings(SESSION).expect("settings").expect("saved row");
    assert_eq!(saved.budget_cap, dec!(25000));

    session.reset_all();
    let saved = store.load_settings(SESSION).expect("settings").expect("saved row");
    assert_eq!(saved, config.defaults);
    assert_eq!(session.state().settings(), &config.defaults);
}

#[test]
fn session_opened_with_empty_store_uses_config_records() {
    let config = BudgetConfig::default_test();
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");

    let mut session = BudgetSession::open(&store, &config).expect("open session");
    assert_eq!(session.simulator().index().len(), config.price_records.len());
    session.select_sku("Crate", "CRATE-XL");
    assert_eq!(session.state().grand_total(), dec!(40000));
}

#[test]
fn malformed_price_record_fails_open() {
    let mut config = BudgetConfig::default_test();
    config
        .price_records
        .push(PriceRecord::new("rec-bad", "Broken").with_price(Tier::Q1000, dec!(-3)));
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");

    match BudgetSession::open(&store, &config) {
        Err(BudgetError::MalformedPriceRecord { id, .. }) => assert_eq!(id, "rec-bad"),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("session should not open with a negative price"),
    }
}

#[test]
fn commands_apply_from_json() {
    let config = BudgetConfig::default_test();
    let store = seeded_store(&config);
    let mut session = BudgetSession::open(&store, &config).expect("open session");

    let script = [
        r#"{"cmd":"select_sku","group_key":"Bonté","sku":"BONTE-1"}"#,
        r#"{"cmd":"set_quantity","group_key":"Bonté","sku":"BONTE-1","quantity":3000}"#,
        r#"{"cmd":"set_budget_cap","value":"60000"}"#,
        r#"{"cmd":"set_deposit_percentage","value":"25"}"#,
    ];
    for line in script {
        let command: BudgetCommand = serde_json::from_str(line).expect("parse command");
        assert!(session.apply(command).is_empty(), "{line} should apply cleanly");
    }

    let snap = session.snapshot();
    assert_eq!(snap.grand_total, dec!(30000));
    assert_eq!(snap.budget.remaining_budget, dec!(30000));
    assert_eq!(snap.budget.percent_used, dec!(50));
    assert_eq!(snap.budget.deposit_amount, dec!(7500));
    assert!(!snap.over_budget);

    let negative: BudgetCommand = serde_json::from_str(
        r#"{"cmd":"set_quantity","group_key":"Bonté","sku":"BONTE-1","quantity":-1}"#,
    )
    .expect("parse command");
    assert!(!session.apply(negative).is_empty());
    assert_eq!(session.snapshot().diagnostics.len(), 1);
    assert_eq!(session.state().grand_total(), dec!(30000));
}

#[test]
fn reload_prices_reprices_existing_lines() {
    let config = BudgetConfig::default_test();
    let store = seeded_store(&config);
    let mut session = BudgetSession::open(&store, &config).expect("open session");
    session.select_sku("Bonté", "BONTE-1");
    assert_eq!(session.state().grand_total(), dec!(10000));

    store
        .upsert_price_record(
            &PriceRecord::new("rec-bonte", "Bonté").with_price(Tier::Q1000, dec!(11.25)),
        )
        .expect("update record");
    let diagnostics = session.reload_prices().expect("reload");
    assert!(diagnostics.is_empty());

    assert_eq!(session.state().grand_total(), dec!(11250));
    let rows = store.selection_rows(SESSION).expect("rows");
    assert_eq!(rows[0].1.unit_price, dec!(11.25));
    // Update kept the record's original position.
    let ids: Vec<String> = store
        .list_price_records()
        .expect("records")
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids[0], "rec-bonte");
}

#[test]
fn event_log_records_each_accepted_mutation() {
    let config = BudgetConfig::default_test();
    let store = seeded_store(&config);
    let mut session = BudgetSession::open(&store, &config).expect("open session");
    session.select_sku("Lotus", "LOTUS-1");
    session.select_sku("Lotus", "LOTUS-1");
    session.set_quantity("Lotus", "LOTUS-1", 3000);
    session.reset();

    let events = store.events_for_session(SESSION).expect("events");
    let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(
        types,
        vec!["session_opened", "sku_selected", "quantity_changed", "simulation_reset"]
    );

    let changed: BudgetEvent = serde_json::from_str(&events[2].payload).expect("payload");
    assert_eq!(
        changed,
        BudgetEvent::QuantityChanged {
            group_key:  "Lotus".into(),
            sku:        "LOTUS-1".into(),
            quantity:   3000,
            unit_price: dec!(12),
        }
    );
}

// ── Failing repository ─────────────────────────────────────────

/// Reads from an in-memory store; writes fail while `broken` is set.
struct FlakyRepository {
    inner:  SimStore,
    broken: Cell<bool>,
}

impl FlakyRepository {
    fn fail_if_broken(&self) -> BudgetResult<()> {
        if self.broken.get() {
            Err(BudgetError::Other(anyhow::anyhow!("disk unavailable")))
        } else {
            Ok(())
        }
    }
}

impl SelectionRepository for FlakyRepository {
    fn list_price_records(&self) -> BudgetResult<Vec<PriceRecord>> {
        self.inner.list_price_records()
    }

    fn list_analysis_selections(
        &self,
        session_id: &str,
    ) -> BudgetResult<Vec<(GroupKey, SkuSelection)>> {
        self.inner.selection_rows(session_id)
    }

    fn persist_selection(
        &self,
        session_id: &str,
        group_key: &str,
        selection: &SkuSelection,
    ) -> BudgetResult<()> {
        self.fail_if_broken()?;
        self.inner.upsert_selection(session_id, group_key, selection)
    }

    fn delete_selection(&self, session_id: &str, group_key: &str, sku: &str) -> BudgetResult<()> {
        self.fail_if_broken()?;
        self.inner.delete_selection_row(session_id, group_key, sku)?;
        Ok(())
    }

    fn clear_selections(&self, session_id: &str) -> BudgetResult<()> {
        self.fail_if_broken()?;
        self.inner.clear_selection_rows(session_id)?;
        Ok(())
    }

    fn save_budget_settings(&self, session_id: &str, settings: &BudgetSettings) -> BudgetResult<()> {
        self.fail_if_broken()?;
        self.inner.save_settings(session_id, settings)
    }

    fn load_budget_settings(&self, session_id: &str) -> BudgetResult<Option<BudgetSettings>> {
        self.inner.load_settings(session_id)
    }

    fn append_event(&self, entry: &EventLogEntry) -> BudgetResult<()> {
        self.fail_if_broken()?;
        self.inner.append_event(entry)
    }
}

fn is_persistence_failure(d: &Diagnostic) -> bool {
    matches!(d, Diagnostic::PersistenceFailed { .. })
}

#[test]
fn failed_write_keeps_in_memory_state() {
    init_logging();
    let config = BudgetConfig::default_test();
    let repo = FlakyRepository {
        inner:  seeded_store(&config),
        broken: Cell::new(false),
    };
    let mut session = BudgetSession::open(&repo, &config).expect("open session");

    repo.broken.set(true);
    let diagnostics = session.select_sku("Bonté", "BONTE-1");
    // One for the selection row, one for the event.
    assert_eq!(diagnostics.iter().filter(|d| is_persistence_failure(d)).count(), 2);
    assert_eq!(session.state().selection_count(), 1);
    assert_eq!(session.state().grand_total(), dec!(10000));
    assert_eq!(repo.inner.selection_count(SESSION).expect("count"), 0);

    let diagnostics = session.set_budget_cap(dec!(5000));
    assert!(diagnostics.iter().any(is_persistence_failure));
    assert_eq!(session.state().settings().budget_cap, dec!(5000));
    assert!(session.snapshot().over_budget);

    // Storage is not reconciled once writes work again.
    repo.broken.set(false);
    assert!(session.set_quantity("Bonté", "BONTE-1", 2000).is_empty());
    assert_eq!(repo.inner.selection_count(SESSION).expect("count"), 1);
    assert_eq!(repo.inner.load_settings(SESSION).expect("settings"), None);
    assert_eq!(session.state().aggregates().budget.remaining_budget, dec!(-15000));
    assert_eq!(session.state().grand_total(), dec!(20000));
    assert_eq!(session.state().selection("Bonté", "BONTE-1").map(|s| s.unit_price), Some(dec!(10)));
    assert_eq!(repo.inner.event_count(SESSION).expect("events"), 2);
}

#[test]
fn overflowing_quantity_keeps_session_state() {
    let mut config = BudgetConfig::default_test();
    config
        .price_records
        .push(PriceRecord::new("rec-gold", "Gold").with_price(Tier::Q1000, dec!(10000000000)));
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let mut session = BudgetSession::open(&store, &config).expect("open session");
    session.select_sku("Gold", "GOLD-1");
    let events_before = store.event_count(SESSION).expect("events");

    let diagnostics = session.set_quantity("Gold", "GOLD-1", i64::MAX);
    assert_eq!(
        diagnostics,
        vec![Diagnostic::InvalidQuantity { input: i64::MAX.to_string() }]
    );
    assert_eq!(session.state().selection("Gold", "GOLD-1").expect("gold").quantity, 1000);
    assert_eq!(session.state().grand_total(), dec!(10000000000000));
    assert_eq!(store.selection_rows(SESSION).expect("rows")[0].1.quantity, 1000);
    assert_eq!(store.event_count(SESSION).expect("events"), events_before);

    let diagnostics = session.set_budget_cap(rust_decimal::Decimal::new(1, 28));
    assert!(matches!(
        diagnostics.as_slice(),
        [Diagnostic::InvalidBudgetSetting { .. }]
    ));
    assert_eq!(session.state().settings().budget_cap, dec!(100000));
}

#[test]
fn reload_prices_without_stored_records_uses_config() {
    let config = BudgetConfig::default_test();
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let mut session = BudgetSession::open(&store, &config).expect("open session");
    session.select_sku("Bonté", "BONTE-1");

    let diagnostics = session.reload_prices().expect("reload");
    assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
    let line = session.state().selection("Bonté", "BONTE-1").expect("line");
    assert_eq!(line.unit_price, dec!(10));
    assert_eq!(line.price_record_id.as_deref(), Some("rec-bonte"));
    assert_eq!(session.state().grand_total(), dec!(10000));
    assert_eq!(session.simulator().index().len(), config.price_records.len());
}

#[test]
fn failed_import_writes_no_records() {
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let records = vec![
        PriceRecord::new("ok", "Fine").with_price(Tier::Q1000, dec!(1)),
        PriceRecord::new("bad", "Broken").with_price(Tier::Q1000, dec!(-1)),
    ];

    assert!(store.import_price_records(&records).is_err());
    assert_eq!(store.price_record_count().expect("count"), 0);

    assert_eq!(store.import_price_records(&records[..1]).expect("import"), 1);
    assert_eq!(store.price_record_count().expect("count"), 1);
}
