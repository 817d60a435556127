//! Random create/delete/reschedule sequences never leave overlapping placements.

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use slotwise_core::{Calendar, EventRequest};

#[derive(Debug, Clone)]
enum Op {
    Fixed { hour: i64, minutes: i64 },
    Flexible { hour: i64, minutes: i64, span_hours: i64 },
    Recurring { hour: i64, minutes: i64, every_days: i64 },
    Delete(usize),
    Reschedule { from_hour: i64, span_hours: i64 },
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn stamp(offset_hours: i64) -> String {
    (base() + Duration::hours(offset_hours))
        .format("%Y-%m-%dT%H:%M")
        .to_string()
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0i64..96, 15i64..180).prop_map(|(hour, minutes)| Op::Fixed { hour, minutes }),
        (0i64..96, 15i64..180, 1i64..24)
            .prop_map(|(hour, minutes, span_hours)| Op::Flexible { hour, minutes, span_hours }),
        (0i64..48, 15i64..120, 1i64..4)
            .prop_map(|(hour, minutes, every_days)| Op::Recurring { hour, minutes, every_days }),
        (0usize..16).prop_map(Op::Delete),
        (0i64..96, 1i64..48)
            .prop_map(|(from_hour, span_hours)| Op::Reschedule { from_hour, span_hours }),
    ]
}

fn to_request(op: &Op) -> Option<EventRequest> {
    let mut request = EventRequest {
        title: Some("generated".into()),
        priority: Some("medium".into()),
        ..Default::default()
    };
    match *op {
        Op::Fixed { hour, minutes } => {
            let start = base() + Duration::hours(hour);
            request.kind = Some("fixed".into());
            request.start = Some(stamp(hour));
            request.end = Some((start + Duration::minutes(minutes)).format("%Y-%m-%dT%H:%M").to_string());
        }
        Op::Flexible { hour, minutes, span_hours } => {
            request.kind = Some("flexible_without_preferred_time".into());
            request.duration = Some(minutes);
            request.earliest_start = Some(stamp(hour));
            request.deadline = Some(stamp(hour + span_hours));
        }
        Op::Recurring { hour, minutes, every_days } => {
            request.kind = Some("recurring_without_preferred_time".into());
            request.duration = Some(minutes);
            request.frequency = Some(every_days);
            request.start_date = Some(stamp(hour));
        }
        Op::Delete(_) | Op::Reschedule { .. } => return None,
    }
    Some(request)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn placements_never_overlap(ops in prop::collection::vec(op_strategy(), 1..24)) {
        let calendar = Calendar::in_memory();
        let mut created = Vec::new();

        for op in &ops {
            match (op, to_request(op)) {
                (Op::Delete(n), _) if !created.is_empty() => {
                    let id = created.remove(n % created.len());
                    prop_assert!(calendar.delete_event(id).is_ok());
                }
                (Op::Reschedule { from_hour, span_hours }, _) => {
                    let from = base() + Duration::hours(*from_hour);
                    let report = calendar.reschedule(from, from + Duration::hours(*span_hours));
                    prop_assert!(report.is_ok());
                }
                (_, Some(request)) => {
                    if let Ok(scheduled) = calendar.create_event(&request) {
                        created.push(scheduled.event.id);
                    }
                }
                _ => {}
            }

            let listed = calendar.list_events(None).unwrap();
            for pair in listed.windows(2) {
                prop_assert!(pair[0].end <= pair[1].start, "{:?} overlaps {:?}", pair[0], pair[1]);
            }
        }
    }

    #[test]
    fn rejected_creates_leave_the_timeline_alone(hour in 0i64..24, minutes in 15i64..240) {
        let calendar = Calendar::in_memory();
        let request = to_request(&Op::Fixed { hour, minutes }).unwrap();
        calendar.create_event(&request).unwrap();
        let before = calendar.list_events(None).unwrap();

        prop_assert!(calendar.create_event(&request).is_err());
        prop_assert_eq!(calendar.list_events(None).unwrap(), before);
    }
}
