//! Shared record types used by the repository implementations.

mod records;

pub use records::{ObstacleRecord, SessionRecord, StoredSession, UnitRecord};
