//! The commission engine: snapshot -> allocate -> persist.
//!
//! FLOW (per event):
//!   1. Load an `OrgSnapshot` from the store.
//!   2. `SplitAllocator::allocate` computes the splits (pure).
//!   3. `CommissionRecordWriter::persist` writes one PENDING row per split.
//!
//! RULES:
//!   - Nothing is written when allocation fails.
//!   - The engine does not de-duplicate. Record a given (case, type) at most
//!     once; a repeat is logged as a warning and written anyway.

use crate::{
    aggregate::{self, DateRange, PeriodSummary},
    allocator::SplitAllocator,
    config::SplitConfig,
    error::CommissionResult,
    model::{Allocation, CommissionEvent, CommissionRecord, CommissionStatus, CommissionType},
    store::{CommissionRecordWriter, CommissionStore},
    types::{CaseId, OrgId, PersonId},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Notification that a case reached issued status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCase {
    pub case_id:         CaseId,
    pub writing_agent:   PersonId,
    pub carrier:         String,
    pub policy_number:   String,
    pub annual_premium:  f64,
    pub commission_rate: f64,
    pub issued_on:       NaiveDate,
    #[serde(default)]
    pub home_organization_id: Option<OrgId>,
}

impl IssuedCase {
    /// First-year commission event covering the policy year from issue.
    pub fn first_year_event(&self) -> CommissionEvent {
        let period_end = self
            .issued_on
            .checked_add_months(chrono::Months::new(12))
            .and_then(|d| d.pred_opt())
            .unwrap_or(self.issued_on);

        CommissionEvent {
            payee_id:        self.writing_agent.clone(),
            case_id:         self.case_id.clone(),
            carrier:         self.carrier.clone(),
            policy_number:   self.policy_number.clone(),
            gross_premium:   self.annual_premium,
            commission_rate: self.commission_rate,
            commission_type: CommissionType::FirstYear,
            period_start:    self.issued_on,
            period_end,
            home_organization_id: self.home_organization_id.clone(),
        }
    }
}

/// An allocation together with the ledger rows written for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedAllocation {
    pub allocation: Allocation,
    pub records:    Vec<CommissionRecord>,
}

pub struct CommissionEngine {
    store:     CommissionStore,
    allocator: SplitAllocator,
}

impl CommissionEngine {
    pub fn new(store: CommissionStore, config: SplitConfig) -> CommissionResult<Self> {
        config.validate()?;
        Ok(Self {
            store,
            allocator: SplitAllocator::new(config),
        })
    }

    /// Fresh in-memory store with default rates. Used in tests.
    pub fn in_memory() -> CommissionResult<Self> {
        let store = CommissionStore::in_memory()?;
        store.migrate()?;
        Self::new(store, SplitConfig::default())
    }

    pub fn config(&self) -> &SplitConfig {
        self.allocator.config()
    }

    /// Read access for queries and directory maintenance.
    pub fn store(&self) -> &CommissionStore {
        &self.store
    }

    /// Compute the splits without writing anything.
    pub fn preview(&self, event: &CommissionEvent) -> CommissionResult<Allocation> {
        let directory = self.store.load_directory()?;
        self.allocator.allocate(&directory, event)
    }

    /// Compute the splits and write one PENDING record per split.
    ///
    /// Precondition: called at most once per (case, commission type).
    pub fn calculate_and_record(
        &mut self,
        event: &CommissionEvent,
    ) -> CommissionResult<RecordedAllocation> {
        let allocation = self.preview(event)?;

        let existing = self
            .store
            .commission_count_for(&event.case_id, event.commission_type)?;
        if existing > 0 {
            log::warn!(
                "case={} type={}: {existing} records already exist; recording again",
                event.case_id, event.commission_type
            );
        }

        let records = self.store.persist(event, &allocation.splits)?;
        log::info!(
            "case={} type={} payee={}: recorded {} splits, {:.2} of {:.2}",
            event.case_id,
            event.commission_type,
            event.payee_id,
            records.len(),
            allocation.allocated(),
            allocation.total_amount
        );

        Ok(RecordedAllocation { allocation, records })
    }

    /// Entry point for the case workflow once a case is issued.
    pub fn on_case_issued(&mut self, case: &IssuedCase) -> CommissionResult<RecordedAllocation> {
        self.calculate_and_record(&case.first_year_event())
    }

    /// Dispute, cancel or reopen a record.
    pub fn set_status(
        &mut self,
        record_id: &str,
        status: CommissionStatus,
        at: DateTime<Utc>,
    ) -> CommissionResult<CommissionRecord> {
        self.store.set_status(record_id, status, at)
    }

    pub fn mark_paid(
        &mut self,
        record_id: &str,
        at: DateTime<Utc>,
    ) -> CommissionResult<CommissionRecord> {
        self.store.mark_paid(record_id, at)
    }

    pub fn bulk_mark_paid(
        &mut self,
        record_ids: &[String],
        at: DateTime<Utc>,
    ) -> CommissionResult<usize> {
        self.store.bulk_mark_paid(record_ids, at)
    }

    /// Roll-up of records whose period starts within `range`, or of the
    /// whole ledger when `range` is `None`.
    pub fn period_summary(&self, range: Option<DateRange>) -> CommissionResult<PeriodSummary> {
        let records = match range {
            Some(r) => self.store.records_in_period(r.start, r.end)?,
            None => self.store.all_records()?,
        };
        Ok(aggregate::summarize(&records, None))
    }
}
