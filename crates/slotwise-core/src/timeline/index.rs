//! Ordered index of placed intervals.
//!
//! Stored intervals never overlap, so ordering by start also orders by end.
//! That lets every overlap check look at one predecessor plus a forward range
//! instead of scanning the whole calendar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound::{Excluded, Included, Unbounded};

use super::TimeInterval;
use crate::error::PlacementError;
use crate::event::EventId;

/// A concrete interval assigned to one occurrence of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Placement {
    pub event_id: EventId,
    /// Occurrence number; always 0 for non-recurring events.
    pub occurrence: u32,
    pub interval: TimeInterval,
}

impl Placement {
    pub fn new(event_id: EventId, occurrence: u32, interval: TimeInterval) -> Self {
        Self {
            event_id,
            occurrence,
            interval,
        }
    }
}

/// Index entry: a placement plus the owning event's title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    #[serde(flatten)]
    pub placement: Placement,
    pub title: String,
}

impl Slot {
    pub fn interval(&self) -> &TimeInterval {
        &self.placement.interval
    }

    pub fn event_id(&self) -> EventId {
        self.placement.event_id
    }
}

/// The set of placed intervals, keyed by start time.
#[derive(Debug, Default, Clone)]
pub struct TimelineIndex {
    slots: BTreeMap<DateTime<Utc>, Slot>,
    by_event: HashMap<EventId, BTreeSet<DateTime<Utc>>>,
}

impl TimelineIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of placed intervals.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// All slots in chronological order.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.values()
    }

    /// Earliest placed slot intersecting `interval`.
    pub fn first_conflict(&self, interval: &TimeInterval) -> Option<&Slot> {
        if let Some((_, slot)) = self.slots.range(..=interval.start).next_back() {
            if slot.interval().end > interval.start {
                return Some(slot);
            }
        }
        self.slots
            .range((Excluded(interval.start), Excluded(interval.end)))
            .map(|(_, slot)| slot)
            .next()
    }

    /// True if any placed interval intersects `interval`.
    pub fn overlaps(&self, interval: &TimeInterval) -> bool {
        self.first_conflict(interval).is_some()
    }

    /// Record a placement unless it collides with an existing one.
    pub fn insert(&mut self, placement: Placement, title: &str) -> Result<(), PlacementError> {
        if let Some(existing) = self.first_conflict(&placement.interval) {
            return Err(PlacementError::Conflict {
                interval: placement.interval,
                existing: existing.event_id(),
            });
        }

        let start = placement.interval.start;
        self.by_event
            .entry(placement.event_id)
            .or_default()
            .insert(start);
        self.slots.insert(
            start,
            Slot {
                placement,
                title: title.to_string(),
            },
        );
        Ok(())
    }

    /// Remove every interval owned by `event_id`. Returns what was removed.
    pub fn remove(&mut self, event_id: EventId) -> Vec<Placement> {
        let Some(starts) = self.by_event.remove(&event_id) else {
            return Vec::new();
        };
        starts
            .into_iter()
            .filter_map(|start| self.slots.remove(&start))
            .map(|slot| slot.placement)
            .collect()
    }

    /// Remove a single occurrence of an event.
    pub fn remove_occurrence(&mut self, event_id: EventId, occurrence: u32) -> Option<Placement> {
        let starts = self.by_event.get_mut(&event_id)?;
        let start = *starts
            .iter()
            .find(|start| {
                self.slots
                    .get(start)
                    .is_some_and(|slot| slot.placement.occurrence == occurrence)
            })?;
        starts.remove(&start);
        if starts.is_empty() {
            self.by_event.remove(&event_id);
        }
        self.slots.remove(&start).map(|slot| slot.placement)
    }

    /// Placements owned by `event_id`, in chronological order.
    pub fn placements_of(&self, event_id: EventId) -> Vec<Placement> {
        self.by_event
            .get(&event_id)
            .map(|starts| {
                starts
                    .iter()
                    .filter_map(|start| self.slots.get(start))
                    .map(|slot| slot.placement)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Slots intersecting `[from, to)`, in chronological order.
    pub fn query_range(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&Slot> {
        if from >= to {
            return Vec::new();
        }
        let straddling = self
            .slots
            .range((Unbounded, Excluded(from)))
            .next_back()
            .map(|(_, slot)| slot)
            .filter(|slot| slot.interval().end > from);

        straddling
            .into_iter()
            .chain(
                self.slots
                    .range((Included(from), Excluded(to)))
                    .map(|(_, slot)| slot),
            )
            .collect()
    }

    /// Slots whose start lies in `[from, to)`.
    pub fn starting_within(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&Slot> {
        if from >= to {
            return Vec::new();
        }
        self.slots
            .range((Included(from), Excluded(to)))
            .map(|(_, slot)| slot)
            .collect()
    }
}
