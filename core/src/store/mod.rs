//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The session calls store methods through `SelectionRepository`;
//! the pricing core never sees SQL.

use crate::{
    error::{BudgetError, BudgetResult},
    event::EventLogEntry,
    format::parse_money,
    types::Money,
};
use rusqlite::{params, Connection};

mod price_record;
mod selection;
mod settings;

pub struct SimStore {
    conn: Connection,
}

impl SimStore {
    pub fn open(path: &str) -> BudgetResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> BudgetResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> BudgetResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> BudgetResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (session_id, event_type, payload, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.session_id,
                entry.event_type,
                entry.payload,
                entry.recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_session(&self, session_id: &str) -> BudgetResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, event_type, payload, recorded_at
             FROM event_log WHERE session_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, session_id, event_type, payload, recorded_at)| -> BudgetResult<EventLogEntry> {
                let recorded_at = chrono::DateTime::parse_from_rfc3339(&recorded_at)
                    .map_err(|e| anyhow::anyhow!("bad recorded_at '{recorded_at}': {e}"))?
                    .with_timezone(&chrono::Utc);
                Ok(EventLogEntry {
                    id: Some(id),
                    session_id,
                    event_type,
                    payload,
                    recorded_at,
                })
            })
            .collect()
    }

    pub fn event_count(&self, session_id: &str) -> BudgetResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Decode a TEXT money column.
pub(crate) fn decode_money(column: &'static str, text: &str) -> BudgetResult<Money> {
    parse_money(text).ok_or_else(|| BudgetError::InvalidDecimal {
        column,
        value: text.to_string(),
    })
}
