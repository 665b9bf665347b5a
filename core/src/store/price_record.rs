//! Store methods for category price records.

use crate::{
    error::BudgetResult,
    tier::{PriceRecord, Tier},
    types::Money,
};
use rusqlite::params;
use std::collections::BTreeMap;

use super::{decode_money, SimStore};

type RawPriceRow = (String, String, [Option<String>; 6]);

fn encode(record: &PriceRecord, tier: Tier) -> Option<String> {
    record.tier_prices.get(&tier).map(Money::to_string)
}

impl SimStore {
    /// Insert a record, or overwrite name and prices of an existing id.
    /// Insertion order is kept across updates.
    pub fn upsert_price_record(&self, record: &PriceRecord) -> BudgetResult<()> {
        record.validate()?;
        self.conn.execute(
            "INSERT INTO price_record (
                id, category_name,
                price_1000, price_2000, price_3000, price_4000, price_5000, price_8000
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(id) DO UPDATE SET
                category_name = excluded.category_name,
                price_1000    = excluded.price_1000,
                price_2000    = excluded.price_2000,
                price_3000    = excluded.price_3000,
                price_4000    = excluded.price_4000,
                price_5000    = excluded.price_5000,
                price_8000    = excluded.price_8000",
            params![
                record.id,
                record.category_name,
                encode(record, Tier::Q1000),
                encode(record, Tier::Q2000),
                encode(record, Tier::Q3000),
                encode(record, Tier::Q4000),
                encode(record, Tier::Q5000),
                encode(record, Tier::Q8000),
            ],
        )?;
        Ok(())
    }

    /// Upsert a batch in one transaction. Returns the number written.
    /// Nothing is written if any record fails.
    pub fn import_price_records(&self, records: &[PriceRecord]) -> BudgetResult<usize> {
        // Rolls back on drop unless committed.
        let tx = self.conn.unchecked_transaction()?;
        for record in records {
            self.upsert_price_record(record)?;
        }
        tx.commit()?;
        log::info!("store: imported {} price records", records.len());
        Ok(records.len())
    }

    /// All price records in insertion order.
    pub fn list_price_records(&self) -> BudgetResult<Vec<PriceRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, category_name,
                    price_1000, price_2000, price_3000, price_4000, price_5000, price_8000
             FROM price_record ORDER BY seq ASC",
        )?;
        let rows: Vec<RawPriceRow> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    [
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                    ],
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, category_name, prices)| -> BudgetResult<PriceRecord> {
                let mut tier_prices = BTreeMap::new();
                // Column order matches Tier::ALL.
                for (tier, text) in Tier::ALL.into_iter().zip(prices) {
                    if let Some(text) = text {
                        tier_prices.insert(tier, decode_money("price_record.price", &text)?);
                    }
                }
                Ok(PriceRecord { id, category_name, tier_prices })
            })
            .collect()
    }

    pub fn price_record_count(&self) -> BudgetResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM price_record", [], |row| row.get(0))?;
        Ok(count)
    }
}
