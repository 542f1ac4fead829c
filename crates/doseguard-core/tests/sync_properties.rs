//! Property-based tests for sync and scheduling.
//!
//! ## Properties Verified
//!
//! - After a sync every cached dose has a unique id and a valid instant,
//!   and every id with at least one valid backend record is cached
//! - Scheduling the same dose set twice leaves at most one live alert per id

mod common;

use std::collections::HashSet;

use chrono::{Duration, TimeZone, Utc};
use common::{session, Harness};
use proptest::prelude::*;
use serde_json::{json, Value};

/// A backend record whose instant is either valid or garbage.
fn arb_record() -> impl Strategy<Value = (i64, bool, Value)> {
    (
        0i64..12,
        any::<bool>(),
        -3_000i64..3_000,
        prop_oneof![Just("not-a-date"), Just(""), Just("2024-13-40T99:00:00Z"), Just("08:00")],
    )
        .prop_map(|(id, valid, minutes, garbage)| {
            let instant = if valid {
                (Utc.with_ymd_and_hms(2030, 1, 1, 8, 0, 0).unwrap() + Duration::minutes(minutes))
                    .to_rfc3339()
            } else {
                garbage.to_string()
            };
            let record = json!({
                "id": id,
                "nombre_medicamento": format!("med-{id}"),
                "hora_programada": instant,
            });
            (id, valid, record)
        })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// Property: synced doses are unique and valid, and none are lost
    #[test]
    fn prop_sync_yields_unique_valid_doses(records in prop::collection::vec(arb_record(), 0..24)) {
        let expected: HashSet<i64> = records
            .iter()
            .filter(|(_, valid, _)| *valid)
            .map(|(id, _, _)| *id)
            .collect();
        let h = Harness::new(records.into_iter().map(|(_, _, r)| r).collect());

        let report = runtime().block_on(h.engine.refresh(&session())).unwrap();

        let ids: Vec<i64> = report.doses.iter().map(|d| d.id).collect();
        let unique: HashSet<i64> = ids.iter().copied().collect();
        prop_assert_eq!(ids.len(), unique.len(), "dose ids must be unique");
        prop_assert_eq!(unique, expected);
        for dose in &report.doses {
            prop_assert!(dose.scheduled_at.timestamp() > 0);
        }
    }

    /// Property: rescheduling never stacks alerts
    #[test]
    fn prop_double_schedule_keeps_one_alert_per_dose(
        offsets in prop::collection::vec(-600i64..600, 1..10),
    ) {
        let now = Utc::now();
        let records: Vec<Value> = offsets
            .iter()
            .enumerate()
            .map(|(i, m)| common::record(i as i64, "A", now + Duration::minutes(*m)))
            .collect();
        let h = Harness::new(records);
        let rt = runtime();

        rt.block_on(h.engine.refresh(&session())).unwrap();
        let doses = h.engine.list();
        rt.block_on(h.engine.scheduler().schedule_all(&doses));

        for i in 0..offsets.len() as i64 {
            prop_assert_eq!(h.platform.live_for(i).len(), 1);
        }
        prop_assert_eq!(h.engine.scheduler().handles().unwrap().len(), offsets.len());
    }
}
