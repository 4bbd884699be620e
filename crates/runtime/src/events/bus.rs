//! Topic-based event bus for durable (non-battle) events.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use super::types::{CombatEvent, EventContext};

/// Topics for event routing, one per durable context.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Runtime-level notices (startup, recovery, shutdown)
    System,
    /// Account-level events published by collaborators
    Account,
    /// Match lifecycle: battle started/ended, players leaving or reconnecting
    Match,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::System, Topic::Account, Topic::Match];

    /// Topic carrying events of `context`; battle narration has none.
    pub const fn for_context(context: EventContext) -> Option<Topic> {
        match context {
            EventContext::Battle => None,
            EventContext::System => Some(Topic::System),
            EventContext::Account => Some(Topic::Account),
            EventContext::Match => Some(Topic::Match),
        }
    }
}

/// Topic-based event bus
///
/// Allows consumers to subscribe to specific topics and only receive
/// events they care about.
pub struct EventBus {
    channels: Arc<RwLock<HashMap<Topic, broadcast::Sender<CombatEvent>>>>,
}

impl EventBus {
    /// Creates a new event bus with default capacity for each topic
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Creates a new event bus with specified capacity per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let channels: HashMap<Topic, broadcast::Sender<CombatEvent>> = Topic::ALL
            .into_iter()
            .map(|topic| (topic, broadcast::channel(capacity).0))
            .collect();

        Self {
            channels: Arc::new(RwLock::new(channels)),
        }
    }

    /// Publish an event to the topic of its context.
    ///
    /// Battle-context events have no topic and are dropped here.
    pub fn publish(&self, event: CombatEvent) {
        let Some(topic) = Topic::for_context(event.context) else {
            tracing::trace!("Battle event {} not published on the bus", event.sequence);
            return;
        };

        // Use try_read to avoid blocking in async context
        // If we can't get the lock, just skip (events are best-effort)
        match self.channels.try_read() {
            Ok(channels) => {
                if let Some(tx) = channels.get(&topic)
                    && tx.send(event).is_err()
                {
                    // No subscribers for this topic - this is normal, not an error
                    tracing::trace!("No subscribers for topic {:?}", topic);
                }
            }
            Err(_) => {
                tracing::debug!("Failed to acquire event bus lock for topic {:?}", topic);
            }
        }
    }

    /// Subscribe to a specific topic
    ///
    /// Returns `None` only if the channel table is being modified concurrently.
    pub fn subscribe(&self, topic: Topic) -> Option<broadcast::Receiver<CombatEvent>> {
        let channels = self.channels.try_read().ok()?;
        channels.get(&topic).map(broadcast::Sender::subscribe)
    }

    /// Subscribe to multiple topics
    ///
    /// Returns receivers for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<CombatEvent>> {
        let Ok(channels) = self.channels.try_read() else {
            return HashMap::new();
        };
        topics
            .iter()
            .filter_map(|&topic| channels.get(&topic).map(|tx| (topic, tx.subscribe())))
            .collect()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
