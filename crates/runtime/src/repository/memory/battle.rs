//! In-memory BattleStore implementation for tests and local runs.

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use battle_core::{SessionId, SessionStatus};

use crate::repository::types::{ObstacleRecord, SessionRecord, StoredSession, UnitRecord};
use crate::repository::{BattleStore, RepositoryError, Result};

#[derive(Default)]
struct Rows {
    session: Option<SessionRecord>,
    units: Option<Vec<UnitRecord>>,
    obstacles: Option<Vec<ObstacleRecord>>,
}

/// In-memory implementation of BattleStore.
///
/// Not persistent across process restarts. Counts session writes so tests
/// can observe how often the persistence worker actually wrote.
#[derive(Default)]
pub struct InMemoryBattleStore {
    rows: RwLock<BTreeMap<SessionId, Rows>>,
    session_writes: AtomicUsize,
    failing: RwLock<BTreeSet<SessionId>>,
}

impl InMemoryBattleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `upsert_session` calls so far.
    pub fn session_writes(&self) -> usize {
        self.session_writes.load(Ordering::SeqCst)
    }

    /// Makes every write for `session` fail with an I/O error until cleared.
    pub fn fail_writes_for(&self, session: SessionId) -> Result<()> {
        self.failing
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .insert(session);
        Ok(())
    }

    pub fn clear_failures(&self) -> Result<()> {
        self.failing
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?
            .clear();
        Ok(())
    }

    /// The stored record groups for one session, if complete.
    pub fn get(&self, session: SessionId) -> Result<Option<StoredSession>> {
        let rows = self.rows.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(rows.get(&session).and_then(assemble))
    }

    fn check_writable(&self, session: SessionId) -> Result<()> {
        let failing = self
            .failing
            .read()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        if failing.contains(&session) {
            return Err(RepositoryError::Io(io::Error::other(format!(
                "store unavailable for {session}"
            ))));
        }
        Ok(())
    }
}

fn assemble(rows: &Rows) -> Option<StoredSession> {
    Some(StoredSession {
        session: rows.session.clone()?,
        units: rows.units.clone().unwrap_or_default(),
        obstacles: rows.obstacles.clone().unwrap_or_default(),
    })
}

#[async_trait]
impl BattleStore for InMemoryBattleStore {
    async fn upsert_session(&self, record: &SessionRecord) -> Result<()> {
        self.check_writable(record.id)?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        rows.entry(record.id).or_default().session = Some(record.clone());
        self.session_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn upsert_units(&self, session: SessionId, units: &[UnitRecord]) -> Result<()> {
        self.check_writable(session)?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        rows.entry(session).or_default().units = Some(units.to_vec());
        Ok(())
    }

    async fn upsert_obstacles(
        &self,
        session: SessionId,
        obstacles: &[ObstacleRecord],
    ) -> Result<()> {
        self.check_writable(session)?;
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        rows.entry(session).or_default().obstacles = Some(obstacles.to_vec());
        Ok(())
    }

    async fn delete_session(&self, session: SessionId) -> Result<()> {
        let mut rows = self
            .rows
            .write()
            .map_err(|_| RepositoryError::LockPoisoned)?;
        rows.remove(&session);
        Ok(())
    }

    async fn load_by_status(&self, status: SessionStatus) -> Result<Vec<StoredSession>> {
        let rows = self.rows.read().map_err(|_| RepositoryError::LockPoisoned)?;
        Ok(rows
            .values()
            .filter(|r| r.session.as_ref().is_some_and(|s| s.status == status))
            .filter_map(assemble)
            .collect())
    }
}
