//! Store methods for the commission ledger.

use super::{
    append_event, conversion_error, format_timestamp, parse_code, parse_date, parse_timestamp,
    CommissionRecordWriter, CommissionStore,
};
use crate::{
    error::{CommissionError, CommissionResult},
    event::LedgerEvent,
    model::{
        CommissionEvent, CommissionRecord, CommissionStatus, CommissionType, MemberRole,
        SplitEntry,
    },
    types::Level,
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;

const RECORD_COLUMNS: &str = "record_id, case_id, payee_id, payee_name, org_id, org_name, role,
    carrier, policy_number, commission_type, gross_premium, commission_rate,
    split_percentage, amount, level, status, period_start, period_end, created_at, paid_at";

impl CommissionRecordWriter for CommissionStore {
    /// All records for the event are written in one transaction, or none are.
    fn persist(
        &mut self,
        event: &CommissionEvent,
        splits: &[SplitEntry],
    ) -> CommissionResult<Vec<CommissionRecord>> {
        let now = Utc::now();
        let records: Vec<CommissionRecord> = splits
            .iter()
            .map(|split| new_record(event, split, now))
            .collect();

        let tx = self.conn.transaction()?;
        for r in &records {
            insert_record(&tx, r)?;
        }
        append_event(
            &tx,
            &LedgerEvent::AllocationRecorded {
                case_id:         event.case_id.clone(),
                payee_id:        event.payee_id.clone(),
                commission_type: event.commission_type,
                total_amount:    event.total_amount(),
                allocated:       records.iter().map(|r| r.amount).sum(),
                record_ids:      records.iter().map(|r| r.id.clone()).collect(),
            },
            now,
        )?;
        tx.commit()?;

        Ok(records)
    }
}

impl CommissionStore {
    // ── Queries ───────────────────────────────────────────────────

    pub fn record(&self, record_id: &str) -> CommissionResult<Option<CommissionRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM commission WHERE record_id = ?1");
        let record = self
            .conn
            .query_row(&sql, params![record_id], map_record)
            .optional()?;
        Ok(record)
    }

    /// Records for a case, agent level first.
    pub fn records_for_case(&self, case_id: &str) -> CommissionResult<Vec<CommissionRecord>> {
        self.query_records(
            "WHERE case_id = ?1 ORDER BY commission_type ASC, level ASC",
            params![case_id],
        )
    }

    pub fn records_for_payee(&self, payee_id: &str) -> CommissionResult<Vec<CommissionRecord>> {
        self.query_records(
            "WHERE payee_id = ?1 ORDER BY period_start ASC, created_at ASC",
            params![payee_id],
        )
    }

    /// Records whose period starts within [start, end].
    pub fn records_in_period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> CommissionResult<Vec<CommissionRecord>> {
        self.query_records(
            "WHERE period_start >= ?1 AND period_start <= ?2
             ORDER BY period_start ASC, case_id ASC, level ASC",
            params![start.to_string(), end.to_string()],
        )
    }

    pub fn all_records(&self) -> CommissionResult<Vec<CommissionRecord>> {
        self.query_records("ORDER BY created_at ASC, case_id ASC, level ASC", params![])
    }

    /// Number of records already written for (case, type). Lets callers
    /// uphold the record-at-most-once precondition.
    pub fn commission_count_for(
        &self,
        case_id: &str,
        commission_type: CommissionType,
    ) -> CommissionResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM commission WHERE case_id = ?1 AND commission_type = ?2",
            params![case_id, commission_type.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn query_records(
        &self,
        clause: &str,
        args: &[&dyn rusqlite::ToSql],
    ) -> CommissionResult<Vec<CommissionRecord>> {
        let sql = format!("SELECT {RECORD_COLUMNS} FROM commission {clause}");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(args, map_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Status transitions ────────────────────────────────────────

    /// Move a record to `status`. PAID stamps `paid_at`.
    pub fn set_status(
        &mut self,
        record_id: &str,
        status: CommissionStatus,
        at: DateTime<Utc>,
    ) -> CommissionResult<CommissionRecord> {
        let tx = self.conn.transaction()?;
        let record = transition(&tx, record_id, status, at)?;
        tx.commit()?;
        Ok(record)
    }

    pub fn mark_paid(
        &mut self,
        record_id: &str,
        at: DateTime<Utc>,
    ) -> CommissionResult<CommissionRecord> {
        self.set_status(record_id, CommissionStatus::Paid, at)
    }

    /// Mark every listed record paid. All-or-nothing: an unknown id or a
    /// record that can't be paid rolls the whole batch back.
    /// Repeated ids are paid once. Returns the number of distinct records updated.
    pub fn bulk_mark_paid(
        &mut self,
        record_ids: &[String],
        at: DateTime<Utc>,
    ) -> CommissionResult<usize> {
        let mut seen = HashSet::new();
        let tx = self.conn.transaction()?;
        for id in record_ids {
            if seen.insert(id.as_str()) {
                transition(&tx, id, CommissionStatus::Paid, at)?;
            }
        }
        tx.commit()?;
        Ok(seen.len())
    }
}

fn new_record(event: &CommissionEvent, split: &SplitEntry, now: DateTime<Utc>) -> CommissionRecord {
    CommissionRecord {
        id:                uuid::Uuid::new_v4().to_string(),
        case_id:           event.case_id.clone(),
        payee_id:          split.payee_id.clone(),
        payee_name:        split.payee_name.clone(),
        organization_id:   split.organization_id.clone(),
        organization_name: split.organization_name.clone(),
        role:              split.role,
        carrier:           event.carrier.clone(),
        policy_number:     event.policy_number.clone(),
        commission_type:   event.commission_type,
        gross_premium:     event.gross_premium,
        commission_rate:   event.commission_rate,
        split_percentage:  split.split_percentage,
        amount:            split.amount,
        level:             split.level,
        status:            CommissionStatus::Pending,
        period_start:      event.period_start,
        period_end:        event.period_end,
        created_at:        now,
        paid_at:           None,
    }
}

fn insert_record(conn: &Connection, r: &CommissionRecord) -> CommissionResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO commission ({RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                     ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)"
        ),
        params![
            r.id,
            r.case_id,
            r.payee_id,
            r.payee_name,
            r.organization_id,
            r.organization_name,
            r.role.as_str(),
            r.carrier,
            r.policy_number,
            r.commission_type.as_str(),
            r.gross_premium,
            r.commission_rate,
            r.split_percentage,
            r.amount,
            r.level as i64,
            r.status.as_str(),
            r.period_start.to_string(),
            r.period_end.to_string(),
            format_timestamp(r.created_at),
            r.paid_at.map(format_timestamp),
        ],
    )?;
    Ok(())
}

fn transition(
    conn: &Connection,
    record_id: &str,
    status: CommissionStatus,
    at: DateTime<Utc>,
) -> CommissionResult<CommissionRecord> {
    let sql = format!("SELECT {RECORD_COLUMNS} FROM commission WHERE record_id = ?1");
    let mut record = conn
        .query_row(&sql, params![record_id], map_record)
        .optional()?
        .ok_or_else(|| CommissionError::RecordNotFound {
            record_id: record_id.to_string(),
        })?;

    let from = record.status;
    if !from.can_transition_to(status) {
        return Err(CommissionError::InvalidStatusTransition {
            record_id: record_id.to_string(),
            from,
            to: status,
        });
    }

    record.status = status;
    if status == CommissionStatus::Paid {
        record.paid_at = Some(at);
    }
    conn.execute(
        "UPDATE commission SET status = ?1, paid_at = ?2 WHERE record_id = ?3",
        params![record.status.as_str(), record.paid_at.map(format_timestamp), record_id],
    )?;
    append_event(
        conn,
        &LedgerEvent::StatusChanged {
            record_id: record_id.to_string(),
            from,
            to: status,
        },
        at,
    )?;

    log::debug!("commission {record_id}: {from} -> {status}");
    Ok(record)
}

fn parse_level(idx: usize, raw: i64) -> rusqlite::Result<Level> {
    Level::try_from(raw).map_err(|_| conversion_error(idx, format!("bad level {raw}")))
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<CommissionRecord> {
    Ok(CommissionRecord {
        id:                row.get(0)?,
        case_id:           row.get(1)?,
        payee_id:          row.get(2)?,
        payee_name:        row.get(3)?,
        organization_id:   row.get(4)?,
        organization_name: row.get(5)?,
        role:              parse_code(6, &row.get::<_, String>(6)?, MemberRole::from_code)?,
        carrier:           row.get(7)?,
        policy_number:     row.get(8)?,
        commission_type:   parse_code(9, &row.get::<_, String>(9)?, CommissionType::from_code)?,
        gross_premium:     row.get(10)?,
        commission_rate:   row.get(11)?,
        split_percentage:  row.get(12)?,
        amount:            row.get(13)?,
        level:             parse_level(14, row.get(14)?)?,
        status:            parse_code(15, &row.get::<_, String>(15)?, CommissionStatus::from_code)?,
        period_start:      parse_date(16, &row.get::<_, String>(16)?)?,
        period_end:        parse_date(17, &row.get::<_, String>(17)?)?,
        created_at:        parse_timestamp(18, &row.get::<_, String>(18)?)?,
        paid_at:           row
            .get::<_, Option<String>>(19)?
            .map(|raw| parse_timestamp(19, &raw))
            .transpose()?,
    })
}
