//! Store methods for persisted simulation selections.

use crate::{
    error::BudgetResult,
    simulation::SkuSelection,
    types::GroupKey,
};
use rusqlite::params;

use super::{decode_money, SimStore};

impl SimStore {
    /// Insert or update one selection line. Row order (first insert) is kept.
    pub fn upsert_selection(
        &self,
        session_id: &str,
        group_key: &str,
        selection: &SkuSelection,
    ) -> BudgetResult<()> {
        self.conn.execute(
            "INSERT INTO analysis_selection (
                session_id, group_key, sku, product_id,
                quantity, unit_price, price_record_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(session_id, group_key, sku) DO UPDATE SET
                product_id      = excluded.product_id,
                quantity        = excluded.quantity,
                unit_price      = excluded.unit_price,
                price_record_id = excluded.price_record_id",
            params![
                session_id,
                group_key,
                selection.sku,
                selection.product_id,
                selection.quantity as i64,
                selection.unit_price.to_string(),
                selection.price_record_id,
            ],
        )?;
        Ok(())
    }

    pub fn delete_selection_row(
        &self,
        session_id: &str,
        group_key: &str,
        sku: &str,
    ) -> BudgetResult<bool> {
        let n = self.conn.execute(
            "DELETE FROM analysis_selection
             WHERE session_id = ?1 AND group_key = ?2 AND sku = ?3",
            params![session_id, group_key, sku],
        )?;
        Ok(n > 0)
    }

    pub fn clear_selection_rows(&self, session_id: &str) -> BudgetResult<usize> {
        let n = self.conn.execute(
            "DELETE FROM analysis_selection WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(n)
    }

    /// Selections of a session in the order they were first persisted.
    pub fn selection_rows(&self, session_id: &str) -> BudgetResult<Vec<(GroupKey, SkuSelection)>> {
        let mut stmt = self.conn.prepare(
            "SELECT group_key, sku, product_id, quantity, unit_price, price_record_id
             FROM analysis_selection
             WHERE session_id = ?1
             ORDER BY seq ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(group_key, sku, product_id, quantity, unit_price, price_record_id)|
                 -> BudgetResult<(GroupKey, SkuSelection)> {
                    let selection = SkuSelection {
                        sku,
                        product_id,
                        // CHECK (quantity > 0) in the schema.
                        quantity: quantity.max(1) as u64,
                        unit_price: decode_money("analysis_selection.unit_price", &unit_price)?,
                        price_record_id,
                        diagnostic: None,
                    };
                    Ok((group_key, selection))
                },
            )
            .collect()
    }

    pub fn selection_count(&self, session_id: &str) -> BudgetResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM analysis_selection WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
