//! Repository layer for durable battle data.
//!
//! Repositories handle data that must survive a restart:
//! - Session, unit and obstacle records (for crash recovery and archival)
//! - The non-battle event log (system, account and match events)
//!
//! Battle-context narration is deliberately absent: it lives only in the
//! per-session ring buffer.

mod error;
mod file;
mod memory;
mod traits;
mod types;

pub use error::{RepositoryError, Result};
pub use file::{FileBattleStore, FileEventLog};
pub use memory::{InMemoryBattleStore, InMemoryEventLog};
pub use traits::{BattleStore, EventLogRepository};
pub use types::{ObstacleRecord, SessionRecord, StoredSession, UnitRecord};
