//! Ledger tests: persistence, status transitions, audit log, roll-ups.
//!
//! Every test runs against a fresh in-memory SQLite store.

use chrono::{NaiveDate, TimeZone, Utc};
use commission_core::{
    aggregate::{self, DateRange},
    config::SplitConfig,
    directory::DirectorySeed,
    engine::{CommissionEngine, IssuedCase},
    error::CommissionError,
    event::LedgerEvent,
    model::{
        CommissionEvent, CommissionStatus, CommissionType, MemberRole, Membership, OrgType,
        Organization, Person,
    },
    store::{CommissionRecordWriter, CommissionStore},
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// agent@home -> agency (mgr) -> mga (exec), persisted.
fn seeded_engine() -> CommissionEngine {
    init_logging();
    let engine = CommissionEngine::in_memory().expect("in-memory engine");
    let store = engine.store();

    for (id, parent, org_type) in [
        ("home", Some("agency"), OrgType::Agency),
        ("agency", Some("mga"), OrgType::Agency),
        ("mga", None, OrgType::Mga),
    ] {
        store
            .insert_organization(&Organization {
                id:        id.into(),
                name:      format!("{id} group"),
                org_type,
                parent_id: parent.map(Into::into),
            })
            .unwrap();
    }

    for (person, org_id, role, day) in [
        ("agent", "home", MemberRole::Agent, 15),
        ("mgr", "agency", MemberRole::Manager, 1),
        ("exec", "mga", MemberRole::Executive, 1),
    ] {
        store
            .insert_person(&Person {
                id:           person.into(),
                display_name: format!("{person} name"),
            })
            .unwrap();
        store
            .insert_membership(&Membership {
                id:              format!("{person}@{org_id}"),
                person_id:       person.into(),
                organization_id: org_id.into(),
                role,
                commission_split_override: None,
                is_active:       true,
                joined_at:       Utc.with_ymd_and_hms(2022, 6, day, 8, 30, 0).unwrap(),
            })
            .unwrap();
    }
    engine
}

fn event(case_id: &str, start: NaiveDate) -> CommissionEvent {
    CommissionEvent {
        payee_id:        "agent".into(),
        case_id:         case_id.into(),
        carrier:         "Contoso Mutual".into(),
        policy_number:   format!("POL-{case_id}"),
        gross_premium:   10_000.0,
        commission_rate: 0.9,
        commission_type: CommissionType::FirstYear,
        period_start:    start,
        period_end:      date(2026, 12, 31),
        home_organization_id: None,
    }
}

#[test]
fn records_one_pending_row_per_split() {
    let mut engine = seeded_engine();
    let recorded = engine
        .calculate_and_record(&event("case-1", date(2026, 1, 1)))
        .unwrap();

    assert_eq!(recorded.records.len(), 3);
    let stored = engine.store().records_for_case("case-1").unwrap();
    assert_eq!(stored.len(), 3);
    for (record, split) in stored.iter().zip(&recorded.allocation.splits) {
        assert_eq!(record.status, CommissionStatus::Pending);
        assert_eq!(record.level, split.level);
        assert_eq!(record.payee_id, split.payee_id);
        assert_eq!(record.amount, split.amount, "amount echoed exactly");
        assert_eq!(record.split_percentage, split.split_percentage);
        assert_eq!(record.period_start, date(2026, 1, 1));
        assert_eq!(record.carrier, "Contoso Mutual");
        assert!(record.paid_at.is_none());
    }
    assert_eq!(stored[0].payee_name, "agent name");
    assert_eq!(stored[1].organization_name, "agency group");
}

#[test]
fn loaded_directory_matches_inserted_tree() {
    let engine = seeded_engine();
    let preview = engine.preview(&event("case-p", date(2026, 1, 1))).unwrap();
    let payees: Vec<&str> = preview.splits.iter().map(|s| s.payee_id.as_str()).collect();
    assert_eq!(payees, vec!["agent", "mgr", "exec"]);
    assert!((preview.unallocated - 180.0).abs() < 1e-6);

    assert!(
        engine.store().records_for_case("case-p").unwrap().is_empty(),
        "preview must not write"
    );
}

#[test]
fn failed_allocation_writes_nothing() {
    let mut engine = seeded_engine();
    let mut ev = event("case-x", date(2026, 1, 1));
    ev.payee_id = "nobody".into();

    let err = engine.calculate_and_record(&ev).unwrap_err();
    assert!(matches!(err, CommissionError::NoMembership { .. }));
    assert_eq!(engine.store().all_records().unwrap().len(), 0);
    assert!(engine.store().events().unwrap().is_empty());
}

#[test]
fn repeated_recording_is_not_deduplicated() {
    let mut engine = seeded_engine();
    let ev = event("case-dup", date(2026, 1, 1));
    engine.calculate_and_record(&ev).unwrap();
    engine.calculate_and_record(&ev).unwrap();

    let count = engine
        .store()
        .commission_count_for("case-dup", CommissionType::FirstYear)
        .unwrap();
    assert_eq!(count, 6, "caller owns de-duplication");
    assert_eq!(
        engine
            .store()
            .commission_count_for("case-dup", CommissionType::Renewal)
            .unwrap(),
        0
    );
}

#[test]
fn mark_paid_stamps_timestamp_and_logs() {
    let mut engine = seeded_engine();
    let recorded = engine
        .calculate_and_record(&event("case-2", date(2026, 1, 1)))
        .unwrap();
    let id = recorded.records[0].id.clone();
    let paid_at = Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, 0).unwrap();

    let updated = engine.mark_paid(&id, paid_at).unwrap();
    assert_eq!(updated.status, CommissionStatus::Paid);
    assert_eq!(updated.paid_at, Some(paid_at));

    let reloaded = engine.store().record(&id).unwrap().expect("record exists");
    assert_eq!(reloaded.status, CommissionStatus::Paid);
    assert_eq!(reloaded.paid_at, Some(paid_at));

    let events = engine.store().events().unwrap();
    assert_eq!(events.len(), 2, "one allocation event, one status change");
    assert_eq!(events[0].event_type, "allocation_recorded");
    match events[1].decode().unwrap() {
        LedgerEvent::StatusChanged { record_id, from, to } => {
            assert_eq!(record_id, id);
            assert_eq!(from, CommissionStatus::Pending);
            assert_eq!(to, CommissionStatus::Paid);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn terminal_status_cannot_change() {
    let mut engine = seeded_engine();
    let recorded = engine
        .calculate_and_record(&event("case-3", date(2026, 1, 1)))
        .unwrap();
    let id = recorded.records[1].id.clone();
    let now = Utc::now();

    engine.set_status(&id, CommissionStatus::Cancelled, now).unwrap();
    let err = engine.mark_paid(&id, now).unwrap_err();
    assert!(
        matches!(err, CommissionError::InvalidStatusTransition { .. }),
        "{err:?}"
    );

    let err = engine.mark_paid("no-such-record", now).unwrap_err();
    assert!(matches!(err, CommissionError::RecordNotFound { .. }));
}

#[test]
fn disputed_record_can_still_be_paid() {
    let mut engine = seeded_engine();
    let recorded = engine
        .calculate_and_record(&event("case-4", date(2026, 1, 1)))
        .unwrap();
    let id = recorded.records[0].id.clone();
    let now = Utc::now();

    engine.set_status(&id, CommissionStatus::Disputed, now).unwrap();
    let paid = engine.mark_paid(&id, now).unwrap();
    assert_eq!(paid.status, CommissionStatus::Paid);
}

#[test]
fn bulk_mark_paid_is_all_or_nothing() {
    let mut engine = seeded_engine();
    let recorded = engine
        .calculate_and_record(&event("case-5", date(2026, 1, 1)))
        .unwrap();
    let ids: Vec<String> = recorded.records.iter().map(|r| r.id.clone()).collect();
    let now = Utc::now();

    let mut with_bad = ids.clone();
    with_bad.push("missing".into());
    assert!(engine.bulk_mark_paid(&with_bad, now).is_err());
    for id in &ids {
        let r = engine.store().record(id).unwrap().unwrap();
        assert_eq!(r.status, CommissionStatus::Pending, "batch rolled back");
    }

    let updated = engine.bulk_mark_paid(&ids, now).unwrap();
    assert_eq!(updated, 3);
    assert!(engine
        .store()
        .records_for_case("case-5")
        .unwrap()
        .iter()
        .all(|r| r.status == CommissionStatus::Paid));
}

#[test]
fn bulk_mark_paid_counts_repeated_ids_once() {
    let mut engine = seeded_engine();
    let recorded = engine
        .calculate_and_record(&event("case-rep", date(2026, 1, 1)))
        .unwrap();
    let first = recorded.records[0].id.clone();
    let second = recorded.records[1].id.clone();
    let ids = vec![first.clone(), second, first.clone()];

    let updated = engine.bulk_mark_paid(&ids, Utc::now()).unwrap();
    assert_eq!(updated, 2, "distinct records, not inputs");
    let status_changes = engine
        .store()
        .events()
        .unwrap()
        .iter()
        .filter(|e| e.event_type == "status_changed")
        .count();
    assert_eq!(status_changes, 2);
    assert_eq!(
        engine.store().record(&recorded.records[2].id).unwrap().unwrap().status,
        CommissionStatus::Pending
    );
}

#[test]
fn store_rejects_out_of_range_split_override() {
    let engine = seeded_engine();
    for bad in [-0.5, 1.5, f64::NAN] {
        let err = engine
            .store()
            .insert_membership(&Membership {
                id:              "rogue@agency".into(),
                person_id:       "mgr".into(),
                organization_id: "agency".into(),
                role:            MemberRole::Manager,
                commission_split_override: Some(bad),
                is_active:       true,
                joined_at:       Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
            })
            .unwrap_err();
        assert!(matches!(err, CommissionError::InvalidConfig { .. }), "{bad}: {err:?}");
    }
    let directory = engine.store().load_directory().unwrap();
    assert_eq!(directory.membership_count(), 3, "nothing was written");
}

#[test]
fn period_summary_rolls_up_by_status_and_type() {
    let mut engine = seeded_engine();
    let jan = engine
        .calculate_and_record(&event("case-jan", date(2026, 1, 15)))
        .unwrap();
    let mut renewal = event("case-mar", date(2026, 3, 1));
    renewal.commission_type = CommissionType::Renewal;
    renewal.gross_premium = 1_000.0;
    engine.calculate_and_record(&renewal).unwrap();

    engine.mark_paid(&jan.records[0].id, Utc::now()).unwrap();

    let q1 = DateRange { start: date(2026, 1, 1), end: date(2026, 3, 31) };
    let summary = engine.period_summary(Some(q1)).unwrap();
    assert_eq!(summary.record_count, 6);
    assert!((summary.total - (8820.0 + 882.0)).abs() < 1e-6, "total {}", summary.total);
    assert!((summary.by_status[&CommissionStatus::Paid] - 7650.0).abs() < 1e-6);
    assert!((summary.by_type[&CommissionType::Renewal] - 882.0).abs() < 1e-6);

    let january = DateRange { start: date(2026, 1, 1), end: date(2026, 1, 31) };
    let jan_summary = engine.period_summary(Some(january)).unwrap();
    assert_eq!(jan_summary.record_count, 3);

    let all = engine.store().all_records().unwrap();
    assert!((aggregate::sum_in_range(&all, january) - 8820.0).abs() < 1e-6);
    let by_payee = aggregate::totals_by_payee(&all);
    assert!((by_payee["mgr"] - 990.0).abs() < 1e-6, "mgr earned {}", by_payee["mgr"]);
}

#[test]
fn issued_case_records_first_year_commission() {
    let mut engine = seeded_engine();
    let case = IssuedCase {
        case_id:         "case-issued".into(),
        writing_agent:   "agent".into(),
        carrier:         "Contoso Mutual".into(),
        policy_number:   "CM-77".into(),
        annual_premium:  2_400.0,
        commission_rate: 0.5,
        issued_on:       date(2026, 4, 10),
        home_organization_id: Some("home".into()),
    };

    let recorded = engine.on_case_issued(&case).unwrap();
    assert_eq!(recorded.records.len(), 3);
    let first = &recorded.records[0];
    assert_eq!(first.commission_type, CommissionType::FirstYear);
    assert_eq!(first.period_start, date(2026, 4, 10));
    assert_eq!(first.period_end, date(2027, 4, 9));
    assert!((first.amount - 1020.0).abs() < 1e-6);
}

#[test]
fn deactivated_manager_is_skipped_after_reload() {
    let mut engine = seeded_engine();
    engine.store().set_membership_active("mgr@agency", false).unwrap();

    let recorded = engine
        .calculate_and_record(&event("case-6", date(2026, 1, 1)))
        .unwrap();
    let levels: Vec<u32> = recorded.records.iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![0, 2]);
}

/// A writer that keeps rows in memory, to check the trait contract in
/// isolation from SQLite.
#[derive(Default)]
struct VecWriter {
    rows: Vec<(String, f64)>,
}

impl CommissionRecordWriter for VecWriter {
    fn persist(
        &mut self,
        event: &CommissionEvent,
        splits: &[commission_core::model::SplitEntry],
    ) -> commission_core::error::CommissionResult<Vec<commission_core::model::CommissionRecord>> {
        self.rows
            .extend(splits.iter().map(|s| (event.case_id.clone(), s.amount)));
        Ok(Vec::new())
    }
}

#[test]
fn writers_are_interchangeable() {
    let engine = seeded_engine();
    let ev = event("case-7", date(2026, 1, 1));
    let allocation = engine.preview(&ev).unwrap();

    let mut memory = VecWriter::default();
    memory.persist(&ev, &allocation.splits).unwrap();
    assert_eq!(memory.rows.len(), allocation.splits.len());

    let mut sqlite = CommissionStore::in_memory().unwrap();
    sqlite.migrate().unwrap();
    let rows = sqlite.persist(&ev, &allocation.splits).unwrap();
    assert_eq!(rows.len(), allocation.splits.len());
}

// ── Directory seed file ───────────────────────────────────────────

const DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");

#[test]
fn shipped_directory_seeds_a_fresh_store() {
    init_logging();
    let seed = DirectorySeed::load(DATA_DIR).expect("shipped directory.json parses");
    let mut store = CommissionStore::in_memory().unwrap();
    store.migrate().unwrap();
    store.import_directory(&seed).unwrap();
    let engine = CommissionEngine::new(store, SplitConfig::load(DATA_DIR).unwrap()).unwrap();

    let mut ev = event("case-seed", date(2026, 1, 1));
    ev.payee_id = "agent-1".into();
    let allocation = engine.preview(&ev).unwrap();
    let levels: Vec<u32> = allocation.splits.iter().map(|s| s.level).collect();
    assert_eq!(levels, vec![0, 1, 2, 3]);
    assert_eq!(allocation.splits[1].payee_name, "Sam Whitfield");
    assert!(allocation.unallocated < 1e-6, "full default chain uses the whole pool");
}

#[test]
fn import_with_bad_override_writes_nothing() {
    let mut seed = DirectorySeed::load(DATA_DIR).unwrap();
    seed.memberships[1].commission_split_override = Some(-1.0);

    let mut store = CommissionStore::in_memory().unwrap();
    store.migrate().unwrap();
    let err = store.import_directory(&seed).unwrap_err();
    assert!(matches!(err, CommissionError::InvalidConfig { .. }), "{err:?}");

    let directory = store.load_directory().unwrap();
    assert_eq!(directory.organization_count(), 0, "transaction rolled back");
    assert_eq!(directory.membership_count(), 0);
}
