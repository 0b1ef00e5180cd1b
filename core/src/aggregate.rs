//! Period roll-ups over ledger rows, for dashboards and reports.

use crate::{
    model::{CommissionRecord, CommissionStatus, CommissionType},
    types::PersonId,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PeriodSummary {
    pub record_count: usize,
    pub total:        f64,
    pub by_status:    BTreeMap<CommissionStatus, f64>,
    pub by_type:      BTreeMap<CommissionType, f64>,
}

/// Inclusive date range, matched against a record's `period_start`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end:   NaiveDate,
}

impl DateRange {
    pub fn contains(&self, record: &CommissionRecord) -> bool {
        record.period_start >= self.start && record.period_start <= self.end
    }
}

pub fn sum_by_status(records: &[CommissionRecord]) -> BTreeMap<CommissionStatus, f64> {
    let mut sums = BTreeMap::new();
    for r in records {
        *sums.entry(r.status).or_insert(0.0) += r.amount;
    }
    sums
}

pub fn sum_by_type(records: &[CommissionRecord]) -> BTreeMap<CommissionType, f64> {
    let mut sums = BTreeMap::new();
    for r in records {
        *sums.entry(r.commission_type).or_insert(0.0) += r.amount;
    }
    sums
}

pub fn sum_in_range(records: &[CommissionRecord], range: DateRange) -> f64 {
    records
        .iter()
        .filter(|r| range.contains(r))
        .map(|r| r.amount)
        .sum()
}

pub fn totals_by_payee(records: &[CommissionRecord]) -> BTreeMap<PersonId, f64> {
    let mut sums = BTreeMap::new();
    for r in records {
        *sums.entry(r.payee_id.clone()).or_insert(0.0) += r.amount;
    }
    sums
}

/// Roll up `records`, restricted to `range` when given.
pub fn summarize(records: &[CommissionRecord], range: Option<DateRange>) -> PeriodSummary {
    let selected: Vec<CommissionRecord> = records
        .iter()
        .filter(|r| range.map_or(true, |rg| rg.contains(r)))
        .cloned()
        .collect();

    PeriodSummary {
        record_count: selected.len(),
        total:        selected.iter().map(|r| r.amount).sum(),
        by_status:    sum_by_status(&selected),
        by_type:      sum_by_type(&selected),
    }
}
