//! Domain records: the agency tree, memberships, commission events and
//! the ledger rows produced from them.
//!
//! Enum codes are stable: they are written to the ledger and accepted over
//! the runner protocol. Variants may be added, never renamed.

use crate::{
    error::{CommissionError, CommissionResult},
    types::{CaseId, Level, MembershipId, OrgId, PersonId, RecordId},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ── Organizations ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrgType {
    Agency,
    Mga,
    Imo,
    Brokerage,
    Other,
}

impl OrgType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgType::Agency    => "agency",
            OrgType::Mga       => "mga",
            OrgType::Imo       => "imo",
            OrgType::Brokerage => "brokerage",
            OrgType::Other     => "other",
        }
    }

    /// Unknown codes map to `Other` rather than failing the load.
    pub fn from_code(code: &str) -> Self {
        match code {
            "agency"    => OrgType::Agency,
            "mga"       => OrgType::Mga,
            "imo"       => OrgType::Imo,
            "brokerage" => OrgType::Brokerage,
            _           => OrgType::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Organization {
    pub id:        OrgId,
    pub name:      String,
    pub org_type:  OrgType,
    pub parent_id: Option<OrgId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    pub id:           PersonId,
    pub display_name: String,
}

// ── Memberships ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Agent,
    Manager,
    Executive,
    Administrator,
    Support,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Agent         => "agent",
            MemberRole::Manager       => "manager",
            MemberRole::Executive     => "executive",
            MemberRole::Administrator => "administrator",
            MemberRole::Support       => "support",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "agent"         => Some(MemberRole::Agent),
            "manager"       => Some(MemberRole::Manager),
            "executive"     => Some(MemberRole::Executive),
            "administrator" => Some(MemberRole::Administrator),
            "support"       => Some(MemberRole::Support),
            _               => None,
        }
    }

    /// Roles that may receive an override commission for their organization.
    pub fn receives_overrides(&self) -> bool {
        matches!(
            self,
            MemberRole::Manager | MemberRole::Executive | MemberRole::Administrator
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Membership {
    pub id:              MembershipId,
    pub person_id:       PersonId,
    pub organization_id: OrgId,
    pub role:            MemberRole,
    /// Replaces the level default when present. Fraction in [0, 1].
    pub commission_split_override: Option<f64>,
    pub is_active:       bool,
    pub joined_at:       DateTime<Utc>,
}

impl Membership {
    pub fn validate(&self) -> CommissionResult<()> {
        match self.commission_split_override {
            Some(share) if !(0.0..=1.0).contains(&share) => Err(CommissionError::InvalidConfig {
                reason: format!(
                    "membership {}: split override must be in [0, 1], got {share}",
                    self.id
                ),
            }),
            _ => Ok(()),
        }
    }
}

// ── Commission codes ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionType {
    FirstYear,
    Renewal,
    Override,
    Bonus,
    Trail,
}

impl CommissionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionType::FirstYear => "FIRST_YEAR",
            CommissionType::Renewal   => "RENEWAL",
            CommissionType::Override  => "OVERRIDE",
            CommissionType::Bonus     => "BONUS",
            CommissionType::Trail     => "TRAIL",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "FIRST_YEAR" => Some(CommissionType::FirstYear),
            "RENEWAL"    => Some(CommissionType::Renewal),
            "OVERRIDE"   => Some(CommissionType::Override),
            "BONUS"      => Some(CommissionType::Bonus),
            "TRAIL"      => Some(CommissionType::Trail),
            _            => None,
        }
    }
}

impl fmt::Display for CommissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    Pending,
    Paid,
    Cancelled,
    Disputed,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending   => "PENDING",
            CommissionStatus::Paid      => "PAID",
            CommissionStatus::Cancelled => "CANCELLED",
            CommissionStatus::Disputed  => "DISPUTED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "PENDING"   => Some(CommissionStatus::Pending),
            "PAID"      => Some(CommissionStatus::Paid),
            "CANCELLED" => Some(CommissionStatus::Cancelled),
            "DISPUTED"  => Some(CommissionStatus::Disputed),
            _           => None,
        }
    }

    /// PAID and CANCELLED are terminal.
    pub fn can_transition_to(&self, next: CommissionStatus) -> bool {
        use CommissionStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Cancelled)
                | (Pending, Disputed)
                | (Disputed, Pending)
                | (Disputed, Paid)
                | (Disputed, Cancelled)
        )
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Calculation input / output ─────────────────────────────────────

/// One premium/commission fact to be split up the hierarchy.
/// Ephemeral: computed from, then discarded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionEvent {
    pub payee_id:        PersonId,
    pub case_id:         CaseId,
    pub carrier:         String,
    pub policy_number:   String,
    pub gross_premium:   f64,
    /// Fraction in (0, 1].
    pub commission_rate: f64,
    pub commission_type: CommissionType,
    pub period_start:    NaiveDate,
    pub period_end:      NaiveDate,
    /// The payee's agent-level organization. When absent the payee's first
    /// active membership is used instead.
    #[serde(default)]
    pub home_organization_id: Option<OrgId>,
}

impl CommissionEvent {
    pub fn total_amount(&self) -> f64 {
        self.gross_premium * self.commission_rate
    }

    pub fn validate(&self) -> CommissionResult<()> {
        let invalid = |reason: String| Err(CommissionError::InvalidEvent { reason });

        if !self.gross_premium.is_finite() || self.gross_premium <= 0.0 {
            return invalid(format!(
                "gross premium must be positive, got {}",
                self.gross_premium
            ));
        }
        if !(self.commission_rate > 0.0 && self.commission_rate <= 1.0) {
            return invalid(format!(
                "commission rate must be in (0, 1], got {}",
                self.commission_rate
            ));
        }
        if self.period_end < self.period_start {
            return invalid(format!(
                "period ends ({}) before it starts ({})",
                self.period_end, self.period_start
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitEntry {
    pub payee_id:          PersonId,
    pub payee_name:        String,
    pub organization_id:   OrgId,
    pub organization_name: String,
    pub role:              MemberRole,
    pub split_percentage:  f64,
    pub amount:            f64,
    pub level:             Level,
}

/// Result of splitting one commission event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allocation {
    pub total_amount: f64,
    pub splits:       Vec<SplitEntry>,
    /// What was left of the pool when traversal ended. Reported only;
    /// it is never routed to any payee.
    pub unallocated:  f64,
}

impl Allocation {
    pub fn allocated(&self) -> f64 {
        self.splits.iter().map(|s| s.amount).sum()
    }
}

/// A persisted ledger row. One per `SplitEntry`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommissionRecord {
    pub id:                RecordId,
    pub case_id:           CaseId,
    pub payee_id:          PersonId,
    pub payee_name:        String,
    pub organization_id:   OrgId,
    pub organization_name: String,
    pub role:              MemberRole,
    pub carrier:           String,
    pub policy_number:     String,
    pub commission_type:   CommissionType,
    pub gross_premium:     f64,
    pub commission_rate:   f64,
    pub split_percentage:  f64,
    pub amount:            f64,
    pub level:             Level,
    pub status:            CommissionStatus,
    pub period_start:      NaiveDate,
    pub period_end:        NaiveDate,
    pub created_at:        DateTime<Utc>,
    pub paid_at:           Option<DateTime<Utc>>,
}
