//! Repository contracts for durable battle state and the event log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use battle_core::{SessionId, SessionStatus};

use super::error::Result;
use super::types::{ObstacleRecord, SessionRecord, StoredSession, UnitRecord};
use crate::events::{CombatEvent, EventContext};

/// Durable store for live and archived battles.
///
/// Writes are keyed by session id, so persisting different sessions never
/// contends at this level. Upserts replace the whole record group for the
/// session.
#[async_trait]
pub trait BattleStore: Send + Sync {
    async fn upsert_session(&self, record: &SessionRecord) -> Result<()>;

    async fn upsert_units(&self, session: SessionId, units: &[UnitRecord]) -> Result<()>;

    async fn upsert_obstacles(&self, session: SessionId, obstacles: &[ObstacleRecord])
    -> Result<()>;

    async fn delete_session(&self, session: SessionId) -> Result<()>;

    /// Every stored session with the given status, with its units and obstacles.
    async fn load_by_status(&self, status: SessionStatus) -> Result<Vec<StoredSession>>;

    /// Writes all three record groups.
    ///
    /// The session record goes last so a reader never sees a session whose
    /// units have not been written yet.
    async fn save(&self, stored: &StoredSession) -> Result<()> {
        let id = stored.id();
        self.upsert_units(id, &stored.units).await?;
        self.upsert_obstacles(id, &stored.obstacles).await?;
        self.upsert_session(&stored.session).await
    }
}

/// Append-only log for non-battle events with per-context retention.
pub trait EventLogRepository: Send + Sync {
    fn append(&self, event: &CombatEvent) -> Result<()>;

    /// Flush buffered writes to durable storage.
    fn flush(&self) -> Result<()>;

    /// Removes entries of `context` older than `cutoff`, returning how many went.
    fn purge_older_than(&self, context: EventContext, cutoff: DateTime<Utc>) -> Result<usize>;

    /// Every retained entry, oldest first.
    fn read_all(&self) -> Result<Vec<CombatEvent>>;
}
