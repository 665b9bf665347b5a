use crate::{
    budget::{BudgetSettings, BudgetSummary, DepositBasis},
    tier::{PriceRecord, Tier},
    types::Money,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Price record as written in `prices/price_records.json`.
/// `id` may be omitted; a v4 UUID is assigned on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceRecordEntry {
    #[serde(default)]
    pub id: Option<String>,
    pub category_name: String,
    #[serde(default)]
    pub tier_prices: BTreeMap<Tier, Money>,
}

impl PriceRecordEntry {
    pub fn into_record(self) -> PriceRecord {
        PriceRecord {
            id: self
                .id
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            category_name: self.category_name,
            tier_prices: self.tier_prices,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct PriceRecordsFile {
    records: Vec<PriceRecordEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct BudgetConfigFile {
    session_id: String,
    budget_cap: Money,
    deposit_percentage: Decimal,
    #[serde(default)]
    deposit_basis: DepositBasis,
}

#[derive(Debug, Clone)]
pub struct BudgetConfig {
    /// Event log and snapshots are keyed by this.
    pub session_id: String,
    /// Settings a fresh (or fully reset) simulation starts with.
    pub defaults: BudgetSettings,
    /// Seed price list; the store is the source of truth once imported.
    pub price_records: Vec<PriceRecord>,
}

impl BudgetConfig {
    /// Load from the data/ directory.
    /// In tests, use BudgetConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let budget_path = format!("{data_dir}/budget/budget_config.json");
        let budget_content = std::fs::read_to_string(&budget_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {budget_path}: {e}"))?;
        let budget_file: BudgetConfigFile = serde_json::from_str(&budget_content)?;

        let defaults = BudgetSettings {
            budget_cap: budget_file.budget_cap,
            deposit_percentage: budget_file.deposit_percentage,
            deposit_basis: budget_file.deposit_basis,
        };
        if !BudgetSettings::valid_cap(defaults.budget_cap) {
            anyhow::bail!("{budget_path}: budget_cap must be >= 0");
        }
        if !BudgetSettings::valid_deposit_percentage(defaults.deposit_percentage) {
            anyhow::bail!("{budget_path}: deposit_percentage must be within 0..=100");
        }
        if BudgetSummary::compute(Decimal::ZERO, &defaults).is_none() {
            anyhow::bail!("{budget_path}: budget figures do not fit in a decimal");
        }

        let price_path = format!("{data_dir}/prices/price_records.json");
        let price_content = std::fs::read_to_string(&price_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {price_path}: {e}"))?;
        let price_file: PriceRecordsFile = serde_json::from_str(&price_content)?;
        let price_records: Vec<PriceRecord> = price_file
            .records
            .into_iter()
            .map(PriceRecordEntry::into_record)
            .collect();
        for record in &price_records {
            record.validate()?;
        }

        log::info!(
            "config: loaded {} price records from {price_path}",
            price_records.len()
        );

        Ok(Self {
            session_id: budget_file.session_id,
            defaults,
            price_records,
        })
    }

    /// A small, fixed configuration for tests.
    pub fn default_test() -> Self {
        let d = |v: i64, scale: u32| Decimal::new(v, scale);
        Self {
            session_id: "test-session".into(),
            defaults: BudgetSettings {
                budget_cap: d(100_000, 0),
                deposit_percentage: d(40, 0),
                deposit_basis: DepositBasis::Order,
            },
            price_records: vec![
                PriceRecord::new("rec-bonte", "Bonté")
                    .with_price(Tier::Q1000, d(10, 0))
                    .with_price(Tier::Q5000, d(8, 0)),
                PriceRecord::new("rec-lotus", "Lotus Biscoff")
                    .with_price(Tier::Q2000, d(1250, 2))
                    .with_price(Tier::Q3000, d(1200, 2))
                    .with_price(Tier::Q4000, d(1150, 2)),
                PriceRecord::new("rec-crate", "Crate Bulk").with_price(Tier::Q8000, d(5, 0)),
                PriceRecord::new("rec-empty", "Unpriced Sample"),
            ],
        }
    }
}
