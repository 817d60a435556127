//! The calendar engine.
//!
//! [`Calendar`] owns the timeline index and the event repository behind one
//! mutex. Every public operation takes that lock, so a placement's scan,
//! insert and persist happen as one critical section and concurrent callers
//! can never commit overlapping intervals.
//!
//! Reschedule passes are the exception: selection and retraction take the
//! lock once, then each event is re-placed under its own acquisition so
//! other callers are not starved for the whole pass. This weakens isolation
//! on purpose. Until its turn comes, a retracted event is missing from
//! [`Calendar::list_events`], and a concurrent [`Calendar::create_event`] may
//! take the interval it used to hold. Its retracted occurrences are recorded
//! in `pending` throughout, so the record itself is never half-updated.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

use crate::api::EventView;
use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::event::{Event, EventId, EventRequest, Occurrence};
use crate::scheduler::{
    recurrence, CancelToken, PlacementSolver, RecurrencePolicy, RescheduleJob, RescheduleReport, Rescheduler,
    SolverConfig,
};
use crate::stats::{self, WeeklyStats};
use crate::storage::{EventRepository, MemoryRepository, SchedulerConfig};
use crate::timeline::{Placement, TimeGap, TimeGapDetector, TimeInterval, TimelineIndex};

/// An event together with the intervals it currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledEvent {
    #[serde(flatten)]
    pub event: Event,
    pub placements: Vec<Placement>,
    /// Occurrences that found no slot (best-effort creation only). They are
    /// also recorded in `event.pending`, so a reschedule over their day retries them.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unplaced: Vec<u32>,
}

struct CalendarState {
    index: TimelineIndex,
    repo: Box<dyn EventRepository>,
}

/// Thread-safe calendar: share it with `Arc<Calendar>`.
pub struct Calendar {
    state: Mutex<CalendarState>,
    /// Serializes reschedule passes against each other.
    pass: Mutex<()>,
    solver: PlacementSolver,
    creation_policy: RecurrencePolicy,
}

impl Calendar {
    /// Open a calendar over `repo`, rebuilding the timeline from its placements.
    ///
    /// # Errors
    /// Returns an error if the config is invalid, the repository cannot be
    /// read, or the stored placements overlap or reference unknown events.
    pub fn open(repo: Box<dyn EventRepository>, config: &SchedulerConfig) -> Result<Self> {
        let solver = config.solver_config()?;
        Self::with_solver(repo, solver, config.creation_policy)
    }

    /// Open with explicit solver settings.
    pub fn with_solver(
        repo: Box<dyn EventRepository>,
        solver: SolverConfig,
        creation_policy: RecurrencePolicy,
    ) -> Result<Self> {
        let titles: HashMap<EventId, String> = repo
            .list()?
            .into_iter()
            .map(|event| (event.id, event.title))
            .collect();

        let mut index = TimelineIndex::new();
        for placement in repo.load_placements()? {
            let title = titles.get(&placement.event_id).ok_or_else(|| {
                DatabaseError::Corrupt(format!(
                    "placement {} references unknown event",
                    placement.interval
                ))
            })?;
            index
                .insert(placement, title)
                .map_err(|e| DatabaseError::Corrupt(format!("stored placements overlap: {e}")))?;
        }
        tracing::debug!(events = titles.len(), placements = index.len(), "calendar opened");

        Ok(Self {
            state: Mutex::new(CalendarState { index, repo }),
            pass: Mutex::new(()),
            solver: PlacementSolver::with_config(solver),
            creation_policy,
        })
    }

    /// Empty calendar with default settings and in-memory storage.
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(CalendarState {
                index: TimelineIndex::new(),
                repo: Box::new(MemoryRepository::new()),
            }),
            pass: Mutex::new(()),
            solver: PlacementSolver::new(),
            creation_policy: RecurrencePolicy::AllOrNothing,
        }
    }

    pub fn solver(&self) -> &PlacementSolver {
        &self.solver
    }

    /// Validate, place and persist a new event.
    ///
    /// # Errors
    /// Validation failures leave the calendar untouched. Placement failures
    /// leave the timeline exactly as it was. A persistence failure rolls the
    /// new placements back before returning.
    pub fn create_event(&self, request: &EventRequest) -> Result<ScheduledEvent> {
        let new_event = request.validate()?;

        let mut guard = self.state.lock();
        let state = &mut *guard;
        let id = state.repo.next_id()?;
        let mut event = new_event.into_event(id, Utc::now());

        let report = self
            .solver
            .place(&mut state.index, &event, self.creation_policy)
            .inspect_err(|err| tracing::warn!(event = %id, %err, "placement rejected"))?;
        event.pending = report
            .failed
            .iter()
            .filter_map(|&index| {
                recurrence::plan_occurrence(&event.kind, index).map(|plan| Occurrence {
                    index,
                    interval: plan.search,
                })
            })
            .collect();

        if let Err(err) = state.repo.save(&event, &report.placed) {
            state.index.remove(id);
            tracing::warn!(event = %id, %err, "persist failed, placement rolled back");
            return Err(err);
        }

        tracing::info!(
            event = %id,
            kind = event.kind.type_name(),
            placed = report.placed.len(),
            "event created"
        );
        Ok(ScheduledEvent {
            event,
            placements: report.placed,
            unplaced: report.failed,
        })
    }

    /// Remove an event and every placement it holds.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] for an unknown id.
    pub fn delete_event(&self, id: EventId) -> Result<ScheduledEvent> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let event = state.repo.get(id)?.ok_or(CoreError::NotFound(id))?;

        state.repo.remove(id)?;
        let placements = state.index.remove(id);

        tracing::info!(event = %id, released = placements.len(), "event deleted");
        Ok(ScheduledEvent {
            event,
            placements,
            unplaced: Vec::new(),
        })
    }

    pub fn get_event(&self, id: EventId) -> Result<ScheduledEvent> {
        let state = self.state.lock();
        let event = state.repo.get(id)?.ok_or(CoreError::NotFound(id))?;
        let placements = state.index.placements_of(id);
        Ok(ScheduledEvent {
            event,
            placements,
            unplaced: Vec::new(),
        })
    }

    /// Placed intervals in chronological order, optionally limited to those
    /// intersecting `[from, to)`.
    pub fn list_events(&self, range: Option<(DateTime<Utc>, DateTime<Utc>)>) -> Result<Vec<EventView>> {
        let state = self.state.lock();
        let events: HashMap<EventId, Event> = state
            .repo
            .list()?
            .into_iter()
            .map(|event| (event.id, event))
            .collect();

        let slots: Vec<_> = match range {
            Some((from, to)) => state.index.query_range(from, to),
            None => state.index.iter().collect(),
        };
        Ok(slots
            .into_iter()
            .filter_map(|slot| events.get(&slot.event_id()).map(|event| EventView::new(slot, event)))
            .collect())
    }

    /// Event records in creation order, including events with nothing placed.
    pub fn events(&self) -> Result<Vec<Event>> {
        self.state.lock().repo.list()
    }

    /// Free gaps of at least `min_minutes` inside `[from, to)`.
    pub fn free_slots(&self, from: DateTime<Utc>, to: DateTime<Utc>, min_minutes: i64) -> Result<Vec<TimeGap>> {
        let window = TimeInterval::new(from, to).ok_or(ValidationError::InvalidTimeRange {
            start_field: "from",
            end_field: "to",
        })?;
        let state = self.state.lock();
        Ok(TimeGapDetector::new()
            .with_min_gap(min_minutes.max(0))
            .find_free(&state.index, window))
    }

    /// Weekly totals for the week containing `reference`.
    pub fn weekly_stats(&self, reference: DateTime<Utc>) -> WeeklyStats {
        stats::weekly_stats(&self.state.lock().index, reference)
    }

    /// Re-place every movable event touching `[from, to)`, highest priority first.
    pub fn reschedule(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<RescheduleReport> {
        self.reschedule_with_cancel(from, to, &CancelToken::new())
    }

    /// As [`Calendar::reschedule`], checking `cancel` between events. Events
    /// not yet handled when it trips try to reclaim their previous intervals.
    ///
    /// # Errors
    /// Returns a validation error for an empty window, or a storage error. A
    /// storage error during re-placement stops the pass; events already
    /// handled keep their new placements.
    pub fn reschedule_with_cancel(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        cancel: &CancelToken,
    ) -> Result<RescheduleReport> {
        let window = TimeInterval::new(from, to).ok_or(ValidationError::InvalidTimeRange {
            start_field: "start_date",
            end_field: "end_date",
        })?;
        let _pass = self.pass.lock();
        let rescheduler = Rescheduler::new(&self.solver);

        let jobs = self.retract_window(&rescheduler, &window)?;
        let mut report = RescheduleReport::default();

        for job in &jobs {
            let restoring = cancel.is_cancelled();
            report.cancelled |= restoring;

            let mut guard = self.state.lock();
            let state = &mut *guard;
            let Some(mut event) = state.repo.get(job.event_id)? else {
                tracing::debug!(event = %job.event_id, "deleted during reschedule, skipped");
                continue;
            };

            let outcome = if restoring {
                rescheduler.restore(&mut state.index, &mut event, job)
            } else {
                rescheduler.replace(&mut state.index, &mut event, job)
            };

            let placements = state.index.placements_of(event.id);
            if let Err(err) = state.repo.save(&event, &placements) {
                for placement in &outcome.placed {
                    state.index.remove_occurrence(placement.event_id, placement.occurrence);
                }
                tracing::warn!(event = %event.id, %err, "persist failed during reschedule");
                return Err(err);
            }

            if outcome.is_complete() {
                report.success += 1;
            } else {
                tracing::warn!(
                    event = %event.id,
                    unplaced = outcome.unplaced.len(),
                    "event left unscheduled"
                );
                report.failed.push(event.id);
            }
        }

        tracing::info!(
            %window,
            success = report.success,
            failed = report.failed.len(),
            cancelled = report.cancelled,
            "reschedule finished"
        );
        Ok(report)
    }

    /// Select and retract under one lock, persisting the retracted state.
    fn retract_window(&self, rescheduler: &Rescheduler<'_>, window: &TimeInterval) -> Result<Vec<RescheduleJob>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let originals = state.repo.list()?;
        let mut events = originals.clone();
        let snapshot = state.index.clone();
        let jobs = rescheduler.retract(&mut state.index, events.iter_mut(), window);

        let by_id: HashMap<EventId, &Event> = events.iter().map(|e| (e.id, e)).collect();
        for (saved, job) in jobs.iter().enumerate() {
            let Some(event) = by_id.get(&job.event_id) else {
                continue;
            };
            let placements = state.index.placements_of(job.event_id);
            if let Err(err) = state.repo.save(event, &placements) {
                state.index = snapshot;
                Self::restore_records(state, &originals, &jobs[..saved]);
                tracing::warn!(%err, "persist failed while retracting, pass aborted");
                return Err(err);
            }
        }
        Ok(jobs)
    }

    /// Best-effort rewrite of records already saved by an aborted retraction.
    fn restore_records(state: &mut CalendarState, originals: &[Event], jobs: &[RescheduleJob]) {
        for job in jobs {
            if let Some(event) = originals.iter().find(|e| e.id == job.event_id) {
                let placements = state.index.placements_of(event.id);
                if let Err(err) = state.repo.save(event, &placements) {
                    tracing::warn!(event = %event.id, %err, "could not restore record");
                }
            }
        }
    }
}
