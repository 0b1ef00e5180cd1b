//! Read-only view of the agency tree used by the calculation.
//!
//! The allocator never touches the database. Callers load an `OrgSnapshot`
//! (see `CommissionStore::load_directory`) and hand it in.

use crate::{
    model::{Membership, Organization, Person},
    types::{OrgId, PersonId},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Agency tree as shipped in `data/commission/directory.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DirectorySeed {
    pub organizations: Vec<Organization>,
    pub people:        Vec<Person>,
    pub memberships:   Vec<Membership>,
}

impl DirectorySeed {
    /// Load from the data/ directory. Fails on the first out-of-range
    /// membership override.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/commission/directory.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let seed: DirectorySeed = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        for m in &seed.memberships {
            m.validate()?;
        }
        Ok(seed)
    }
}

/// Lookups the hierarchy walk and recipient selection depend on.
pub trait OrgDirectory {
    fn organization(&self, id: &str) -> Option<&Organization>;

    /// All memberships of an organization, active or not, in load order.
    fn memberships_for_org(&self, org_id: &str) -> Vec<&Membership>;

    /// All memberships held by a person, active or not, in load order.
    fn memberships_for_person(&self, person_id: &str) -> Vec<&Membership>;

    fn person_name(&self, person_id: &str) -> Option<&str>;
}

/// Arena of organizations indexed by id, plus memberships and people.
///
/// Membership order is insertion order. The store inserts them sorted by
/// `joined_at`, so "first membership" is well defined for a loaded snapshot.
#[derive(Debug, Default, Clone)]
pub struct OrgSnapshot {
    orgs:        Vec<Organization>,
    org_index:   HashMap<OrgId, usize>,
    memberships: Vec<Membership>,
    by_org:      HashMap<OrgId, Vec<usize>>,
    by_person:   HashMap<PersonId, Vec<usize>>,
    people:      HashMap<PersonId, Person>,
}

impl OrgSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an organization.
    pub fn add_organization(&mut self, org: Organization) {
        match self.org_index.get(&org.id) {
            Some(&idx) => self.orgs[idx] = org,
            None => {
                self.org_index.insert(org.id.clone(), self.orgs.len());
                self.orgs.push(org);
            }
        }
    }

    pub fn add_person(&mut self, person: Person) {
        self.people.insert(person.id.clone(), person);
    }

    pub fn add_membership(&mut self, membership: Membership) {
        let idx = self.memberships.len();
        self.by_org
            .entry(membership.organization_id.clone())
            .or_default()
            .push(idx);
        self.by_person
            .entry(membership.person_id.clone())
            .or_default()
            .push(idx);
        self.memberships.push(membership);
    }

    pub fn organization_count(&self) -> usize {
        self.orgs.len()
    }

    pub fn membership_count(&self) -> usize {
        self.memberships.len()
    }

    fn resolve(&self, indices: Option<&Vec<usize>>) -> Vec<&Membership> {
        indices
            .map(|ids| ids.iter().map(|&i| &self.memberships[i]).collect())
            .unwrap_or_default()
    }
}

impl OrgDirectory for OrgSnapshot {
    fn organization(&self, id: &str) -> Option<&Organization> {
        self.org_index.get(id).map(|&idx| &self.orgs[idx])
    }

    fn memberships_for_org(&self, org_id: &str) -> Vec<&Membership> {
        self.resolve(self.by_org.get(org_id))
    }

    fn memberships_for_person(&self, person_id: &str) -> Vec<&Membership> {
        self.resolve(self.by_person.get(person_id))
    }

    fn person_name(&self, person_id: &str) -> Option<&str> {
        self.people.get(person_id).map(|p| p.display_name.as_str())
    }
}
