//! Audit-chain tamper detection across a real mission's trail.

use skysentry_audit::{verify_entries, ChainVerdict};
use skysentry_vision::ScriptedDetector;

use crate::test_utils::*;

fn flown_rig() -> TestRig {
    let rig = provisioned_rig();
    let mut fixture = patrol_fixture(
        &rig,
        short_route(),
        ScriptedDetector::with_script(vec![vec![person(0.9)]]),
        150.0,
        false,
        100,
    );
    fixture.patrol.start().unwrap();
    rig
}

#[test]
fn flown_mission_chain_is_intact() {
    let rig = flown_rig();
    let entries = rig.store.audit_entries_asc().unwrap();
    assert!(entries.len() >= 4);
    assert_eq!(
        verify_entries(&entries),
        ChainVerdict::Intact { entries: entries.len() }
    );
}

#[test]
fn editing_a_detail_breaks_the_chain_at_the_successor() {
    let rig = flown_rig();
    rig.store
        .__test_execute_raw_sql(
            "UPDATE audit_log SET details = '{\"forged\":true}' WHERE seq = 2",
            &[],
        )
        .unwrap();
    assert_eq!(
        rig.audit.verify_chain().unwrap(),
        ChainVerdict::Broken { at: 3 }
    );
}

#[test]
fn editing_an_actor_breaks_the_chain() {
    let rig = flown_rig();
    rig.store
        .__test_execute_raw_sql(
            "UPDATE audit_log SET actor = 'intruder' WHERE seq = 1",
            &[],
        )
        .unwrap();
    assert_eq!(
        rig.audit.verify_chain().unwrap(),
        ChainVerdict::Broken { at: 2 }
    );
}

#[test]
fn reordering_entries_breaks_the_chain() {
    let rig = flown_rig();
    // Swap the payloads of entries 2 and 3 by rewriting their actions.
    let entries = rig.store.audit_entries_asc().unwrap();
    let (a2, a3) = (entries[1].action.clone(), entries[2].action.clone());
    rig.store
        .__test_execute_raw_sql(
            "UPDATE audit_log SET action = ?1 WHERE seq = 2",
            &[&a3 as &dyn rusqlite::ToSql],
        )
        .unwrap();
    rig.store
        .__test_execute_raw_sql(
            "UPDATE audit_log SET action = ?1 WHERE seq = 3",
            &[&a2 as &dyn rusqlite::ToSql],
        )
        .unwrap();
    let verdict = rig.audit.verify_chain().unwrap();
    assert!(!verdict.is_intact());
}
