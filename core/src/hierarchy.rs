//! Ancestor chain resolution.
//!
//! RULE: the walk is bounded by `max_depth` and by a visited set.
//! Neither bound relies on the tree being well formed.

use crate::{directory::OrgDirectory, model::Organization};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy)]
pub struct HierarchyWalker {
    max_depth: usize,
}

impl HierarchyWalker {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns `start` followed by its ancestors, nearest first, at most
    /// `max_depth` entries long. Index in the result is the hierarchy level.
    ///
    /// Stops early (without error) when a parent id does not resolve or an
    /// organization repeats. An unknown `start` yields an empty chain.
    pub fn walk<'a, D: OrgDirectory + ?Sized>(
        &self,
        directory: &'a D,
        start: &str,
    ) -> Vec<&'a Organization> {
        let mut chain: Vec<&'a Organization> = Vec::with_capacity(self.max_depth);
        let mut seen: HashSet<&'a str> = HashSet::new();
        let mut next_id: Option<&str> = Some(start);

        while let Some(id) = next_id {
            if chain.len() >= self.max_depth {
                break;
            }
            let Some(org) = directory.organization(id) else {
                log::debug!("hierarchy walk from {start}: parent {id} unresolved, stopping");
                break;
            };
            if !seen.insert(org.id.as_str()) {
                log::warn!("hierarchy walk from {start}: cycle at {id}, stopping");
                break;
            }
            chain.push(org);
            next_id = org.parent_id.as_deref();
        }

        chain
    }
}
