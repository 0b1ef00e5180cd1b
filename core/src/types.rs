//! Shared primitive types used across the commission core.

/// Hierarchy level. 0 = the writing agent, increasing toward the root.
pub type Level = u32;

/// A stable identifier for an organization (agency, MGA, IMO, ...).
pub type OrgId = String;

/// A stable identifier for a person who can be paid.
pub type PersonId = String;

pub type MembershipId = String;

/// The policy case a commission event belongs to.
pub type CaseId = String;

/// A persisted commission ledger row.
pub type RecordId = String;
