//! Store methods for per-session budget settings.

use crate::{
    budget::{BudgetSettings, DepositBasis},
    error::{BudgetError, BudgetResult},
};
use rusqlite::{params, OptionalExtension};

use super::{decode_money, SimStore};

fn parse_basis(name: &str) -> BudgetResult<DepositBasis> {
    match name {
        "order"      => Ok(DepositBasis::Order),
        "allocation" => Ok(DepositBasis::Allocation),
        other => Err(BudgetError::Other(anyhow::anyhow!(
            "unknown deposit basis '{other}'"
        ))),
    }
}

impl SimStore {
    pub fn save_settings(&self, session_id: &str, settings: &BudgetSettings) -> BudgetResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO budget_settings
                (session_id, budget_cap, deposit_percentage, deposit_basis)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session_id,
                settings.budget_cap.to_string(),
                settings.deposit_percentage.to_string(),
                settings.deposit_basis.to_string(),
            ],
        )?;
        Ok(())
    }

    /// None when the session never saved settings.
    pub fn load_settings(&self, session_id: &str) -> BudgetResult<Option<BudgetSettings>> {
        let row = self
            .conn
            .query_row(
                "SELECT budget_cap, deposit_percentage, deposit_basis
                 FROM budget_settings WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((cap, pct, basis)) = row else {
            return Ok(None);
        };
        Ok(Some(BudgetSettings {
            budget_cap:         decode_money("budget_settings.budget_cap", &cap)?,
            deposit_percentage: decode_money("budget_settings.deposit_percentage", &pct)?,
            deposit_basis:      parse_basis(&basis)?,
        }))
    }
}
