//! Hierarchical commission split.
//!
//! ALGORITHM:
//!   1. total = gross premium x commission rate.
//!   2. Level 0 pays the payee at their home organization: membership
//!      override, else `agent_default_split`.
//!   3. Each ancestor (level 1, 2, ...) pays its selected recipient the
//!      recipient's override, else the level default, capped at what is
//!      left of the pool. Levels without a recipient are skipped.
//!   4. Stop when the chain ends, the pool is exhausted or `max_depth`
//!      levels have been inspected.
//!
//! Whatever is left when traversal stops is reported in
//! `Allocation::unallocated` and paid to nobody. Short or sparse chains
//! therefore under-allocate the pool; no house account receives the rest.
//!
//! Pure: reads the directory, writes nothing.

use crate::{
    config::SplitConfig,
    directory::OrgDirectory,
    error::{CommissionError, CommissionResult},
    hierarchy::HierarchyWalker,
    model::{Allocation, CommissionEvent, Membership, Organization, SplitEntry},
    recipient::select_recipient,
    types::Level,
};

/// Pool amounts below this count as exhausted.
pub const AMOUNT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct SplitAllocator {
    config: SplitConfig,
    walker: HierarchyWalker,
}

impl SplitAllocator {
    pub fn new(config: SplitConfig) -> Self {
        let walker = HierarchyWalker::new(config.max_depth);
        Self { config, walker }
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    pub fn allocate<D: OrgDirectory + ?Sized>(
        &self,
        directory: &D,
        event: &CommissionEvent,
    ) -> CommissionResult<Allocation> {
        event.validate()?;

        let total_amount = event.total_amount();
        let home = home_membership(directory, event)?;
        let chain = self.walker.walk(directory, &home.organization_id);

        let Some((&home_org, ancestors)) = chain.split_first() else {
            // Membership points at an organization the snapshot doesn't have.
            return Err(CommissionError::NoMembership {
                payee_id: event.payee_id.clone(),
            });
        };

        let mut splits = Vec::with_capacity(chain.len());
        let mut remaining = total_amount;

        let agent_share = match home.commission_split_override {
            Some(share) => bounded_share(home, share),
            None => self.config.agent_default_split,
        };
        let agent_amount = (total_amount * agent_share).min(remaining);
        splits.push(entry(directory, home, home_org, agent_share, agent_amount, 0));
        remaining -= agent_amount;

        for (offset, org) in ancestors.iter().enumerate() {
            let level = (offset + 1) as Level;
            if remaining <= AMOUNT_EPSILON {
                break;
            }

            let Some(recipient) = select_recipient(directory, &org.id) else {
                log::debug!(
                    "case={} level={level} org={}: no eligible recipient, level skipped",
                    event.case_id, org.id
                );
                continue;
            };

            let share = match recipient.commission_split_override {
                Some(share) => bounded_share(recipient, share),
                None => self.config.level_default(level),
            };
            let amount = (total_amount * share).min(remaining);
            splits.push(entry(directory, recipient, org, share, amount, level));
            remaining -= amount;
        }

        let unallocated = remaining.max(0.0);
        if unallocated > AMOUNT_EPSILON {
            log::info!(
                "case={} payee={}: {unallocated:.2} of {total_amount:.2} left unallocated",
                event.case_id, event.payee_id
            );
        }

        Ok(Allocation {
            total_amount,
            splits,
            unallocated,
        })
    }
}

/// The payee's agent-level membership.
///
/// Uses the explicitly supplied home organization when present. Otherwise
/// falls back to the first active membership in directory order.
fn home_membership<'a, D: OrgDirectory + ?Sized>(
    directory: &'a D,
    event: &CommissionEvent,
) -> CommissionResult<&'a Membership> {
    let memberships = directory.memberships_for_person(&event.payee_id);
    let mut active = memberships.into_iter().filter(|m| m.is_active);

    match &event.home_organization_id {
        Some(org_id) => active
            .find(|m| &m.organization_id == org_id)
            .ok_or_else(|| CommissionError::NotAMember {
                payee_id:        event.payee_id.clone(),
                organization_id: org_id.clone(),
            }),
        None => {
            let first = active.next().ok_or_else(|| CommissionError::NoMembership {
                payee_id: event.payee_id.clone(),
            })?;
            if active.next().is_some() {
                log::warn!(
                    "payee {} has several memberships and no home organization; using {}",
                    event.payee_id, first.organization_id
                );
            }
            Ok(first)
        }
    }
}

/// Overrides outside [0, 1] are clamped; a NaN override counts as 0.
fn bounded_share(membership: &Membership, share: f64) -> f64 {
    if (0.0..=1.0).contains(&share) {
        return share;
    }
    let bounded = if share.is_nan() { 0.0 } else { share.clamp(0.0, 1.0) };
    log::warn!(
        "membership {}: split override {share} out of range, using {bounded}",
        membership.id
    );
    bounded
}

fn entry<D: OrgDirectory + ?Sized>(
    directory: &D,
    membership: &Membership,
    org: &Organization,
    split_percentage: f64,
    amount: f64,
    level: Level,
) -> SplitEntry {
    SplitEntry {
        payee_id:          membership.person_id.clone(),
        payee_name:        directory
            .person_name(&membership.person_id)
            .unwrap_or(membership.person_id.as_str())
            .to_string(),
        organization_id:   org.id.clone(),
        organization_name: org.name.clone(),
        role:              membership.role,
        split_percentage,
        amount,
        level,
    }
}
