use alarm_archive::document::{RelatedAlarmDocument, RelatedAlarmStateChange, SeverityStateChange};
use alarm_archive::model::Severity;
use alarm_archive::{AlarmDocument, AlarmDocumentView, AlarmTableView};
use proptest::prelude::*;
use std::collections::BTreeSet;

fn severity() -> impl Strategy<Value = Severity> {
    (1..=7i32).prop_map(Severity::from_id)
}

/// Strictly increasing change times with the severity recorded at each.
fn severity_log() -> impl Strategy<Value = Vec<(i64, Severity)>> {
    prop::collection::vec((1..1_000i64, severity()), 1..20).prop_map(|steps| {
        let mut time = 0;
        steps
            .into_iter()
            .map(|(gap, sev)| {
                time += gap;
                (time, sev)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn test_severity_at_matches_log(
        log in severity_log(),
        current in severity(),
        reverse in any::<bool>(),
    ) {
        let mut doc = AlarmDocument::new(1, "rk", 0);
        doc.set_severity(current);
        let mut entries: Vec<SeverityStateChange> = log
            .iter()
            .map(|(t, s)| SeverityStateChange::new(*t, Some(*s)))
            .collect();
        // Stored order must not matter
        if reverse {
            entries.reverse();
        }
        doc.severity_state_changes = entries;

        let first = log[0].0;
        let last = log[log.len() - 1].0;

        prop_assert_eq!(AlarmDocumentView::new(&doc, first - 1).severity(), Some(log[0].1));
        prop_assert_eq!(AlarmDocumentView::new(&doc, last).severity(), Some(current));
        prop_assert_eq!(AlarmDocumentView::new(&doc, last + 1_000).severity(), Some(current));

        for window in log.windows(2) {
            let (t_i, _) = window[0];
            let (t_next, expected) = window[1];
            for at in [t_i, (t_i + t_next) / 2, t_next - 1] {
                prop_assert_eq!(AlarmDocumentView::new(&doc, at).severity(), Some(expected));
            }
        }
    }

    #[test]
    fn test_related_keys_follow_toggles(
        initial in prop::collection::btree_set(0..6u8, 0..6),
        toggles in prop::collection::vec((0..6u8, 1..50i64), 0..30),
        probes in prop::collection::vec(0..2_000i64, 1..10),
    ) {
        let mut doc = AlarmDocument::new(1, "situation", 0);
        let mut members: BTreeSet<u8> = initial.clone();
        let mut history: Vec<(i64, BTreeSet<u8>)> = vec![(i64::MIN, members.clone())];
        let mut time = 0;

        for (key, gap) in toggles {
            time += gap;
            let rk = format!("r{key}");
            if members.remove(&key) {
                doc.related_alarm_state_changes
                    .push(RelatedAlarmStateChange::removal(time, key as i32, rk));
            } else {
                members.insert(key);
                doc.related_alarm_state_changes
                    .push(RelatedAlarmStateChange::addition(time, key as i32, rk));
            }
            history.push((time, members.clone()));
        }
        for key in &members {
            doc.add_related_alarm(RelatedAlarmDocument::reference(*key as i32, format!("r{key}")));
        }

        for at in probes {
            let expected: BTreeSet<String> = history
                .iter()
                .filter(|(t, _)| *t <= at)
                .last()
                .map(|(_, set)| set.iter().map(|k| format!("r{k}")).collect())
                .unwrap_or_default();
            let actual: BTreeSet<String> = AlarmDocumentView::new(&doc, at)
                .related_reduction_keys()
                .into_iter()
                .map(str::to_string)
                .collect();
            prop_assert_eq!(actual, expected, "at t={}", at);
        }
    }

    #[test]
    fn test_alarms_at_time_are_alive_and_sorted(
        lifetimes in prop::collection::vec((0..1_000i64, prop::option::of(1..1_000i64)), 0..20),
        at in 0..2_000i64,
    ) {
        let docs: Vec<AlarmDocument> = lifetimes
            .iter()
            .enumerate()
            .map(|(id, (first, ttl))| {
                let mut doc = AlarmDocument::new(id as i32, format!("rk-{id}"), *first);
                doc.deleted_time = ttl.map(|ttl| first + ttl);
                doc
            })
            .collect();
        let table = AlarmTableView::new(docs.clone());
        let alive = table.alarms_at_time(at);

        let expected = docs
            .iter()
            .filter(|d| d.first_event_time <= at && d.deleted_time.map_or(true, |t| t > at))
            .count();
        prop_assert_eq!(alive.len(), expected);
        prop_assert!(alive.windows(2).all(|w| w[0].first_event_time <= w[1].first_event_time));
    }
}
