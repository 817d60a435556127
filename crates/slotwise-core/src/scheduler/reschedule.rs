//! Reschedule orchestration.
//!
//! A pass over `[from, to)` retracts the in-window occurrences of every
//! movable event, then re-places them one event at a time in priority order
//! (High first, creation order within a priority). Re-placement is
//! best-effort: occurrences that find no slot stay retracted as pending.
//!
//! The pass is split into steps so the caller can hold its lock around each
//! step separately: [`Rescheduler::retract`] once, then
//! [`Rescheduler::replace`] (or [`Rescheduler::restore`] after cancellation)
//! per job.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::solver::PlacementSolver;
use crate::event::{Event, EventId, Occurrence, Priority};
use crate::timeline::{Placement, TimeInterval, TimelineIndex};

/// Outcome of a reschedule pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RescheduleReport {
    /// Events whose retracted occurrences were all placed again
    pub success: usize,
    /// Events left with at least one unplaced occurrence
    pub failed: Vec<EventId>,
    /// The pass stopped early
    #[serde(default)]
    pub cancelled: bool,
}

/// Cooperative cancellation flag shared with a running pass.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One event's share of a reschedule pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleJob {
    pub event_id: EventId,
    pub priority: Priority,
    /// Occurrences to place again, with the interval each last held
    pub previous: Vec<Occurrence>,
}

impl RescheduleJob {
    pub fn occurrence_indexes(&self) -> Vec<u32> {
        self.previous.iter().map(|o| o.index).collect()
    }
}

/// Result of placing one job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobOutcome {
    pub placed: Vec<Placement>,
    pub unplaced: Vec<Occurrence>,
}

impl JobOutcome {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

/// Drives the steps of a reschedule pass.
pub struct Rescheduler<'a> {
    solver: &'a PlacementSolver,
}

impl<'a> Rescheduler<'a> {
    pub fn new(solver: &'a PlacementSolver) -> Self {
        Self { solver }
    }

    /// Select movable events touching `window`, retract their in-window
    /// occurrences, and return the jobs in placement order.
    ///
    /// Each selected event's `pending` list gains the retracted occurrences so
    /// the record stays accurate if the pass never finishes.
    pub fn retract<'e, I>(
        &self,
        index: &mut TimelineIndex,
        events: I,
        window: &TimeInterval,
    ) -> Vec<RescheduleJob>
    where
        I: IntoIterator<Item = &'e mut Event>,
    {
        let mut jobs = Vec::new();

        for event in events {
            if !event.is_movable() {
                continue;
            }

            let in_window: Vec<Placement> = index
                .placements_of(event.id)
                .into_iter()
                .filter(|p| p.interval.overlaps(window))
                .collect();
            if in_window.is_empty() && !event.has_pending_in(window) {
                continue;
            }

            for placement in &in_window {
                index.remove_occurrence(placement.event_id, placement.occurrence);
                event.pending.push(Occurrence {
                    index: placement.occurrence,
                    interval: placement.interval,
                });
            }

            let mut previous: Vec<Occurrence> = event
                .pending
                .iter()
                .filter(|o| o.interval.overlaps(window))
                .copied()
                .collect();
            previous.sort_by_key(|o| o.index);
            previous.dedup_by_key(|o| o.index);

            jobs.push(RescheduleJob {
                event_id: event.id,
                priority: event.priority,
                previous,
            });
        }

        sort_jobs_by_priority(&mut jobs);
        tracing::debug!(jobs = jobs.len(), %window, "reschedule selection retracted");
        jobs
    }

    /// Re-place a job's occurrences and update the event's pending list.
    pub fn replace(&self, index: &mut TimelineIndex, event: &mut Event, job: &RescheduleJob) -> JobOutcome {
        let report = self
            .solver
            .place_occurrences(index, event, &job.occurrence_indexes());
        let unplaced: Vec<Occurrence> = job
            .previous
            .iter()
            .filter(|o| report.failed.contains(&o.index))
            .copied()
            .collect();

        Self::settle(event, job, &unplaced);
        JobOutcome {
            placed: report.placed,
            unplaced,
        }
    }

    /// Put a job's occurrences back where they were, if still free. Pending
    /// occurrences that never held a slot stay pending.
    pub fn restore(&self, index: &mut TimelineIndex, event: &mut Event, job: &RescheduleJob) -> JobOutcome {
        let mut outcome = JobOutcome::default();
        let duration = event.kind.duration_minutes();
        for previous in &job.previous {
            if previous.interval.duration_minutes() != duration {
                outcome.unplaced.push(*previous);
                continue;
            }
            let placement = Placement::new(event.id, previous.index, previous.interval);
            match index.insert(placement, &event.title) {
                Ok(()) => outcome.placed.push(placement),
                Err(_) => outcome.unplaced.push(*previous),
            }
        }

        Self::settle(event, job, &outcome.unplaced);
        outcome
    }

    /// Replace the job's occurrences in `pending` with those still unplaced.
    fn settle(event: &mut Event, job: &RescheduleJob, unplaced: &[Occurrence]) {
        let handled = job.occurrence_indexes();
        event.pending.retain(|o| !handled.contains(&o.index));
        event.pending.extend_from_slice(unplaced);
        event.pending.sort_by_key(|o| o.index);
    }
}

/// Highest priority first; creation (id) order within a priority.
fn sort_jobs_by_priority(jobs: &mut [RescheduleJob]) {
    jobs.sort_by(|a, b| match b.priority.cmp(&a.priority) {
        std::cmp::Ordering::Equal => a.event_id.cmp(&b.event_id),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;
    use crate::scheduler::RecurrencePolicy;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, m, 0).unwrap()
    }

    fn flexible(id: u64, priority: Priority, from: DateTime<Utc>, to: DateTime<Utc>) -> Event {
        Event {
            id: EventId(id),
            title: format!("Event {id}"),
            priority,
            kind: EventKind::FlexibleWithoutPreferredTime {
                duration_minutes: 60,
                earliest_start: from,
                deadline: to,
            },
            created_at: at(1, 0, 0),
            pending: Vec::new(),
        }
    }

    fn window(from: DateTime<Utc>, to: DateTime<Utc>) -> TimeInterval {
        TimeInterval::new(from, to).unwrap()
    }

    fn run_pass(
        solver: &PlacementSolver,
        index: &mut TimelineIndex,
        events: &mut [Event],
        window: &TimeInterval,
    ) -> RescheduleReport {
        let rescheduler = Rescheduler::new(solver);
        let jobs = rescheduler.retract(index, events.iter_mut(), window);
        let mut report = RescheduleReport::default();
        for job in &jobs {
            let event = events.iter_mut().find(|e| e.id == job.event_id).unwrap();
            if rescheduler.replace(index, event, job).is_complete() {
                report.success += 1;
            } else {
                report.failed.push(job.event_id);
            }
        }
        report
    }

    #[test]
    fn jobs_are_ordered_by_priority_then_creation() {
        let mut jobs: Vec<RescheduleJob> = [
            (4, Priority::Low),
            (2, Priority::High),
            (3, Priority::Medium),
            (1, Priority::Low),
            (5, Priority::High),
        ]
        .into_iter()
        .map(|(id, priority)| RescheduleJob {
            event_id: EventId(id),
            priority,
            previous: Vec::new(),
        })
        .collect();

        sort_jobs_by_priority(&mut jobs);
        let order: Vec<u64> = jobs.iter().map(|j| j.event_id.0).collect();
        assert_eq!(order, vec![2, 5, 3, 1, 4]);
    }

    #[test]
    fn high_priority_claims_the_sole_slot() {
        let solver = PlacementSolver::new();
        let mut index = TimelineIndex::new();

        // Both events only fit 09:00-10:00.
        let mut events = vec![
            flexible(1, Priority::Low, at(1, 9, 0), at(1, 10, 0)),
            flexible(2, Priority::High, at(1, 9, 0), at(1, 10, 0)),
        ];
        solver
            .place(&mut index, &events[0], RecurrencePolicy::AllOrNothing)
            .unwrap();
        assert!(solver
            .place(&mut index, &events[1], RecurrencePolicy::AllOrNothing)
            .is_err());

        // The high-priority event is known to the pass as pending in the window.
        events[1].pending.push(Occurrence {
            index: 0,
            interval: window(at(1, 9, 0), at(1, 10, 0)),
        });

        let report = run_pass(&solver, &mut index, &mut events, &window(at(1, 0, 0), at(2, 0, 0)));
        assert_eq!(report.success, 1);
        assert_eq!(report.failed, vec![EventId(1)]);
        assert_eq!(index.placements_of(EventId(2)).len(), 1);
        assert!(index.placements_of(EventId(1)).is_empty());
        assert_eq!(events[0].pending.len(), 1);
        assert!(events[1].pending.is_empty());
    }

    #[test]
    fn only_in_window_occurrences_are_retracted() {
        let solver = PlacementSolver::new();
        let mut index = TimelineIndex::new();
        let mut events = vec![Event {
            id: EventId(1),
            title: "Daily".into(),
            priority: Priority::Medium,
            kind: EventKind::RecurringWithoutPreferredTime {
                start_date: at(1, 0, 0),
                duration_minutes: 30,
                frequency_days: 1,
            },
            created_at: at(1, 0, 0),
            pending: Vec::new(),
        }];
        let horizon = window(at(1, 0, 0), at(6, 0, 0));
        solver
            .place_within(&mut index, &events[0], horizon, RecurrencePolicy::AllOrNothing)
            .unwrap();
        assert_eq!(index.len(), 5);

        let rescheduler = Rescheduler::new(&solver);
        let jobs = rescheduler.retract(&mut index, events.iter_mut(), &window(at(2, 0, 0), at(4, 0, 0)));
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].occurrence_indexes(), vec![1, 2]);
        assert_eq!(index.len(), 3);

        let outcome = rescheduler.replace(&mut index, &mut events[0], &jobs[0]);
        assert!(outcome.is_complete());
        assert_eq!(index.len(), 5);
        assert!(events[0].pending.is_empty());
    }

    #[test]
    fn fixed_and_out_of_window_events_are_untouched() {
        let solver = PlacementSolver::new();
        let mut index = TimelineIndex::new();
        let mut events = vec![
            Event {
                id: EventId(1),
                title: "Fixed".into(),
                priority: Priority::High,
                kind: EventKind::Fixed {
                    start: at(1, 9, 0),
                    end: at(1, 10, 0),
                },
                created_at: at(1, 0, 0),
                pending: Vec::new(),
            },
            flexible(2, Priority::Low, at(3, 9, 0), at(3, 18, 0)),
        ];
        for event in &events {
            solver
                .place(&mut index, event, RecurrencePolicy::AllOrNothing)
                .unwrap();
        }

        let jobs = Rescheduler::new(&solver).retract(
            &mut index,
            events.iter_mut(),
            &window(at(1, 0, 0), at(2, 0, 0)),
        );
        assert!(jobs.is_empty());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn second_pass_reproduces_assignment() {
        let solver = PlacementSolver::new();
        let mut index = TimelineIndex::new();
        let mut events = vec![
            flexible(1, Priority::Low, at(1, 9, 0), at(1, 12, 0)),
            flexible(2, Priority::Medium, at(1, 9, 0), at(1, 12, 0)),
            flexible(3, Priority::High, at(1, 9, 0), at(1, 12, 0)),
            flexible(4, Priority::High, at(1, 9, 0), at(1, 12, 0)),
        ];
        for event in &events {
            let _ = solver.place(&mut index, event, RecurrencePolicy::AllOrNothing);
        }
        events[3].pending.push(Occurrence {
            index: 0,
            interval: window(at(1, 9, 0), at(1, 10, 0)),
        });

        let scope = window(at(1, 0, 0), at(2, 0, 0));
        let first = run_pass(&solver, &mut index, &mut events, &scope);
        let snapshot: Vec<Placement> = index.iter().map(|s| s.placement).collect();

        let second = run_pass(&solver, &mut index, &mut events, &scope);
        let again: Vec<Placement> = index.iter().map(|s| s.placement).collect();

        assert_eq!(first, second);
        assert_eq!(snapshot, again);
        assert_eq!(first.failed, vec![EventId(1)]);
    }

    #[test]
    fn restore_reclaims_previous_interval() {
        let solver = PlacementSolver::new();
        let mut index = TimelineIndex::new();
        let mut events = vec![flexible(1, Priority::Low, at(1, 9, 0), at(1, 18, 0))];
        solver
            .place(&mut index, &events[0], RecurrencePolicy::AllOrNothing)
            .unwrap();

        let rescheduler = Rescheduler::new(&solver);
        let jobs = rescheduler.retract(&mut index, events.iter_mut(), &window(at(1, 0, 0), at(2, 0, 0)));
        assert!(index.is_empty());

        let outcome = rescheduler.restore(&mut index, &mut events[0], &jobs[0]);
        assert!(outcome.is_complete());
        assert_eq!(index.placements_of(EventId(1))[0].interval.start, at(1, 9, 0));
        assert!(events[0].pending.is_empty());
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
