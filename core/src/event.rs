//! Ledger audit events.
//!
//! RULE: every ledger mutation appends exactly one event per affected
//! calculation or record to `event_log`, in the same transaction.
//! Variants are added over time, never removed or reordered.

use crate::{
    model::{CommissionStatus, CommissionType},
    types::{CaseId, PersonId, RecordId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    AllocationRecorded {
        case_id:         CaseId,
        payee_id:        PersonId,
        commission_type: CommissionType,
        total_amount:    f64,
        allocated:       f64,
        record_ids:      Vec<RecordId>,
    },
    StatusChanged {
        record_id: RecordId,
        from:      CommissionStatus,
        to:        CommissionStatus,
    },
}

impl LedgerEvent {
    /// Stable name for the `event_type` column.
    pub fn type_name(&self) -> &'static str {
        match self {
            LedgerEvent::AllocationRecorded { .. } => "allocation_recorded",
            LedgerEvent::StatusChanged { .. }      => "status_changed",
        }
    }
}

/// A row of `event_log`, payload still serialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub event_type: String,
    pub payload:    String,
    pub created_at: String,
}

impl EventLogEntry {
    pub fn decode(&self) -> serde_json::Result<LedgerEvent> {
        serde_json::from_str(&self.payload)
    }
}
