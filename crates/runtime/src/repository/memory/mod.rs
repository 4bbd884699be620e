//! In-memory repository implementations for testing and development.

mod battle;
mod event_log;

pub use battle::InMemoryBattleStore;
pub use event_log::InMemoryEventLog;
