//! Battle narration and event routing.
//!
//! Engine effects are narrated into [`CombatEvent`]s. Battle-context events
//! stay in each session's [`EventRing`] and are delivered per observer after a
//! fog-of-war check; the durable contexts (system, account, match) also go out
//! on the topic-based [`EventBus`] for the event log and other consumers.

mod bus;
mod narrate;
mod ring;
mod types;
mod visibility;

pub use bus::{EventBus, Topic};
pub use narrate::{narrate_effects, presence_event, rematch_event};
pub use ring::{EventPage, EventRing};
pub use types::{CombatEvent, EventContext, EventPayload, EventSeverity, Party, VisibilitySet};
pub use visibility::{can_observe, observers_of};
