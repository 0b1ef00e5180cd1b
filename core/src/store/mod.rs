//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The allocator works on an `OrgSnapshot`; it never executes SQL.

use crate::{
    error::CommissionResult,
    event::{EventLogEntry, LedgerEvent},
    model::{CommissionEvent, CommissionRecord, SplitEntry},
};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection};

mod directory;
mod ledger;

/// Sink for computed splits.
///
/// Implementations write one PENDING record per split. They do not
/// de-duplicate: callers must record a given (case, commission type) at
/// most once.
pub trait CommissionRecordWriter {
    fn persist(
        &mut self,
        event: &CommissionEvent,
        splits: &[SplitEntry],
    ) -> CommissionResult<Vec<CommissionRecord>>;
}

pub struct CommissionStore {
    conn: Connection,
}

impl CommissionStore {
    pub fn open(path: &str) -> CommissionResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (:memory: ignores it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CommissionResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CommissionResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_commission.sql"))?;
        Ok(())
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn events(&self) -> CommissionResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, event_type, payload, created_at
             FROM event_log ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    event_type: row.get(1)?,
                    payload:    row.get(2)?,
                    created_at: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

/// Append to `event_log` on any connection or open transaction.
fn append_event(conn: &Connection, event: &LedgerEvent, at: DateTime<Utc>) -> CommissionResult<()> {
    conn.execute(
        "INSERT INTO event_log (event_type, payload, created_at) VALUES (?1, ?2, ?3)",
        params![event.type_name(), serde_json::to_string(event)?, format_timestamp(at)],
    )?;
    Ok(())
}

// ── Column codecs ──────────────────────────────────────────────
// Timestamps are RFC 3339 text, dates are ISO yyyy-mm-dd.

/// Fixed-width UTC form, so text order matches time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn parse_timestamp(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, format!("bad timestamp '{raw}': {e}")))
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    raw.parse::<NaiveDate>()
        .map_err(|e| conversion_error(idx, format!("bad date '{raw}': {e}")))
}

fn parse_code<T>(idx: usize, raw: &str, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| conversion_error(idx, format!("unknown code '{raw}'")))
}
