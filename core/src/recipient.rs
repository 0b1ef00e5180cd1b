//! Picks the member of an organization who receives its override share.

use crate::{directory::OrgDirectory, model::Membership};

/// Earliest-joined active manager, executive or administrator of `org_id`.
/// Ties on `joined_at` fall back to membership id so the choice never
/// depends on load order. `None` means the level is skipped.
pub fn select_recipient<'a, D: OrgDirectory + ?Sized>(
    directory: &'a D,
    org_id: &str,
) -> Option<&'a Membership> {
    directory
        .memberships_for_org(org_id)
        .into_iter()
        .filter(|m| m.is_active && m.role.receives_overrides())
        .min_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.id.cmp(&b.id))
        })
}
