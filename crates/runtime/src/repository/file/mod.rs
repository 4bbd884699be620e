//! File-based repository implementations.

mod battle;
mod event_log;

pub use battle::FileBattleStore;
pub use event_log::FileEventLog;
