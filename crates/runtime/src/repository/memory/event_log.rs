//! In-memory event log implementation.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::events::{CombatEvent, EventContext};
use crate::repository::{EventLogRepository, RepositoryError, Result};

/// In-memory event log for testing and development.
///
/// Thread-safe but not persistent across process restarts.
#[derive(Default)]
pub struct InMemoryEventLog {
    events: RwLock<Vec<CombatEvent>>,
}

impl InMemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventLogRepository for InMemoryEventLog {
    fn append(&self, event: &CombatEvent) -> Result<()> {
        self.events
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .push(event.clone());
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn purge_older_than(&self, context: EventContext, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut events = self
            .events
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        let before = events.len();
        events.retain(|e| e.context != context || e.timestamp >= cutoff);
        Ok(before - events.len())
    }

    fn read_all(&self) -> Result<Vec<CombatEvent>> {
        let events = self
            .events
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(events.clone())
    }
}
