//! Store methods for the agency tree: organizations, people, memberships.

use super::{format_timestamp, parse_code, parse_timestamp, CommissionStore};
use crate::{
    directory::{DirectorySeed, OrgSnapshot},
    error::CommissionResult,
    model::{MemberRole, Membership, OrgType, Organization, Person},
};
use rusqlite::{params, Connection};

impl CommissionStore {
    // ── Organizations ─────────────────────────────────────────────

    pub fn insert_organization(&self, org: &Organization) -> CommissionResult<()> {
        insert_organization(&self.conn, org)
    }

    // ── People ────────────────────────────────────────────────────

    pub fn insert_person(&self, person: &Person) -> CommissionResult<()> {
        insert_person(&self.conn, person)
    }

    // ── Memberships ───────────────────────────────────────────────

    /// Rejects split overrides outside [0, 1].
    pub fn insert_membership(&self, m: &Membership) -> CommissionResult<()> {
        insert_membership(&self.conn, m)
    }

    pub fn set_membership_active(&self, membership_id: &str, active: bool) -> CommissionResult<()> {
        self.conn.execute(
            "UPDATE membership SET is_active = ?1 WHERE membership_id = ?2",
            params![active as i32, membership_id],
        )?;
        Ok(())
    }

    /// Upsert a whole seed file in one transaction. A bad membership
    /// leaves the store untouched.
    pub fn import_directory(&mut self, seed: &DirectorySeed) -> CommissionResult<()> {
        let tx = self.conn.transaction()?;
        for org in &seed.organizations {
            insert_organization(&tx, org)?;
        }
        for person in &seed.people {
            insert_person(&tx, person)?;
        }
        for m in &seed.memberships {
            insert_membership(&tx, m)?;
        }
        tx.commit()?;

        log::info!(
            "imported directory: {} organizations, {} people, {} memberships",
            seed.organizations.len(),
            seed.people.len(),
            seed.memberships.len()
        );
        Ok(())
    }

    // ── Snapshot ──────────────────────────────────────────────────

    /// Load the whole tree into an `OrgSnapshot`.
    /// Memberships come back ordered by join time, then id.
    pub fn load_directory(&self) -> CommissionResult<OrgSnapshot> {
        let mut snapshot = OrgSnapshot::new();

        let mut stmt = self.conn.prepare(
            "SELECT org_id, name, org_type, parent_id FROM organization ORDER BY org_id ASC",
        )?;
        let orgs = stmt
            .query_map([], |row| {
                Ok(Organization {
                    id:        row.get(0)?,
                    name:      row.get(1)?,
                    org_type:  OrgType::from_code(&row.get::<_, String>(2)?),
                    parent_id: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for org in orgs {
            snapshot.add_organization(org);
        }

        let mut stmt = self
            .conn
            .prepare("SELECT person_id, display_name FROM person")?;
        let people = stmt
            .query_map([], |row| {
                Ok(Person {
                    id:           row.get(0)?,
                    display_name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for person in people {
            snapshot.add_person(person);
        }

        let mut stmt = self.conn.prepare(
            "SELECT membership_id, person_id, org_id, role, split_override, is_active, joined_at
             FROM membership
             ORDER BY joined_at ASC, membership_id ASC",
        )?;
        let memberships = stmt
            .query_map([], |row| {
                Ok(Membership {
                    id:              row.get(0)?,
                    person_id:       row.get(1)?,
                    organization_id: row.get(2)?,
                    role:            parse_code(3, &row.get::<_, String>(3)?, MemberRole::from_code)?,
                    commission_split_override: row.get(4)?,
                    is_active:       row.get::<_, i32>(5)? != 0,
                    joined_at:       parse_timestamp(6, &row.get::<_, String>(6)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        for membership in memberships {
            snapshot.add_membership(membership);
        }

        log::debug!(
            "loaded directory: {} organizations, {} memberships",
            snapshot.organization_count(),
            snapshot.membership_count()
        );
        Ok(snapshot)
    }
}

fn insert_organization(conn: &Connection, org: &Organization) -> CommissionResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO organization (org_id, name, org_type, parent_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![org.id, org.name, org.org_type.as_str(), org.parent_id],
    )?;
    Ok(())
}

fn insert_person(conn: &Connection, person: &Person) -> CommissionResult<()> {
    conn.execute(
        "INSERT OR REPLACE INTO person (person_id, display_name) VALUES (?1, ?2)",
        params![person.id, person.display_name],
    )?;
    Ok(())
}

fn insert_membership(conn: &Connection, m: &Membership) -> CommissionResult<()> {
    m.validate()?;
    conn.execute(
        "INSERT OR REPLACE INTO membership (
            membership_id, person_id, org_id, role, split_override, is_active, joined_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            m.id,
            m.person_id,
            m.organization_id,
            m.role.as_str(),
            m.commission_split_override,
            m.is_active as i32,
            format_timestamp(m.joined_at),
        ],
    )?;
    Ok(())
}
