//! Event repository abstraction.
//!
//! The calendar engine persists through [`EventRepository`]; the timeline is
//! rebuilt from `load_placements` when a calendar is opened.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::event::{Event, EventId};
use crate::timeline::Placement;

/// Storage for event records and their placements.
///
/// `save` replaces an event's record and its whole placement set in one step,
/// so a reader never sees an event with half of its occurrences.
pub trait EventRepository: Send {
    /// Reserve the next id. Ids increase monotonically and are never reused.
    fn next_id(&mut self) -> Result<EventId>;

    /// Insert or replace an event together with its placements.
    fn save(&mut self, event: &Event, placements: &[Placement]) -> Result<()>;

    /// Remove an event and its placements. Returns whether it existed.
    fn remove(&mut self, id: EventId) -> Result<bool>;

    fn get(&self, id: EventId) -> Result<Option<Event>>;

    /// All events in id order.
    fn list(&self) -> Result<Vec<Event>>;

    /// Every stored placement, in no particular order.
    fn load_placements(&self) -> Result<Vec<Placement>>;
}

/// In-process repository; state is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    last_id: u64,
    events: BTreeMap<EventId, (Event, Vec<Placement>)>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventRepository for MemoryRepository {
    fn next_id(&mut self) -> Result<EventId> {
        self.last_id += 1;
        Ok(EventId(self.last_id))
    }

    fn save(&mut self, event: &Event, placements: &[Placement]) -> Result<()> {
        self.last_id = self.last_id.max(event.id.0);
        self.events
            .insert(event.id, (event.clone(), placements.to_vec()));
        Ok(())
    }

    fn remove(&mut self, id: EventId) -> Result<bool> {
        Ok(self.events.remove(&id).is_some())
    }

    fn get(&self, id: EventId) -> Result<Option<Event>> {
        Ok(self.events.get(&id).map(|(event, _)| event.clone()))
    }

    fn list(&self) -> Result<Vec<Event>> {
        Ok(self.events.values().map(|(event, _)| event.clone()).collect())
    }

    fn load_placements(&self) -> Result<Vec<Placement>> {
        Ok(self
            .events
            .values()
            .flat_map(|(_, placements)| placements.iter().copied())
            .collect())
    }
}
