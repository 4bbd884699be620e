//! File-based BattleStore implementation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::fs;

use battle_core::{SessionId, SessionStatus};

use crate::repository::types::{ObstacleRecord, SessionRecord, StoredSession, UnitRecord};
use crate::repository::{BattleStore, RepositoryError, Result};

const SESSION_FILE: &str = "session.bin";
const UNITS_FILE: &str = "units.bin";
const OBSTACLES_FILE: &str = "obstacles.bin";

/// File-based implementation of BattleStore.
///
/// One directory per session, one bincode file per record group:
///
/// ```text
/// base_dir/
/// ├── session_7/
/// │   ├── session.bin
/// │   ├── units.bin
/// │   └── obstacles.bin
/// └── session_8/
///     └── ...
/// ```
///
/// Every file is written to a temp file first and moved into place with an
/// atomic rename, so a crash mid-write leaves the previous version intact.
pub struct FileBattleStore {
    base_dir: PathBuf,
}

impl FileBattleStore {
    /// Opens (and creates if needed) a store rooted at `base_dir`.
    ///
    /// Fails when the directory cannot be created, which callers treat as the
    /// store being unreachable.
    pub async fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn session_dir(&self, session: SessionId) -> PathBuf {
        self.base_dir.join(format!("session_{}", session.0))
    }

    async fn write_record<T: Serialize + ?Sized>(
        &self,
        session: SessionId,
        file: &str,
        value: &T,
    ) -> Result<()> {
        let dir = self.session_dir(session);
        fs::create_dir_all(&dir).await?;

        let path = dir.join(file);
        let temp_path = path.with_extension("bin.tmp");
        let bytes = bincode::serialize(value)?;

        fs::write(&temp_path, bytes).await?;
        fs::rename(&temp_path, &path).await?;

        tracing::trace!("Wrote {} ({})", path.display(), session);
        Ok(())
    }

    async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        match fs::read(path).await {
            Ok(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_dir(dir: &Path) -> Result<Option<StoredSession>> {
        let Some(session) = Self::read_record::<SessionRecord>(&dir.join(SESSION_FILE)).await?
        else {
            return Ok(None);
        };
        let units = Self::read_record::<Vec<UnitRecord>>(&dir.join(UNITS_FILE))
            .await?
            .ok_or(RepositoryError::MissingRecord {
                session: session.id,
                part: "units",
            })?;
        let obstacles = Self::read_record::<Vec<ObstacleRecord>>(&dir.join(OBSTACLES_FILE))
            .await?
            .unwrap_or_default();

        Ok(Some(StoredSession {
            session,
            units,
            obstacles,
        }))
    }
}

#[async_trait]
impl BattleStore for FileBattleStore {
    async fn upsert_session(&self, record: &SessionRecord) -> Result<()> {
        self.write_record(record.id, SESSION_FILE, record).await
    }

    async fn upsert_units(&self, session: SessionId, units: &[UnitRecord]) -> Result<()> {
        self.write_record(session, UNITS_FILE, units).await
    }

    async fn upsert_obstacles(
        &self,
        session: SessionId,
        obstacles: &[ObstacleRecord],
    ) -> Result<()> {
        self.write_record(session, OBSTACLES_FILE, obstacles).await
    }

    async fn delete_session(&self, session: SessionId) -> Result<()> {
        match fs::remove_dir_all(self.session_dir(session)).await {
            Ok(()) => {
                tracing::debug!("Deleted stored {}", session);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn load_by_status(&self, status: SessionStatus) -> Result<Vec<StoredSession>> {
        let mut sessions = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_session_dir = path
                .file_name()
                .and_then(|s| s.to_str())
                .is_some_and(|name| name.starts_with("session_"));
            if !is_session_dir || !entry.file_type().await?.is_dir() {
                continue;
            }

            match Self::load_dir(&path).await {
                Ok(Some(stored)) if stored.session.status == status => sessions.push(stored),
                Ok(_) => {}
                // One unreadable session must not hide the others.
                Err(e) => tracing::error!("Skipping stored session at {}: {}", path.display(), e),
            }
        }

        sessions.sort_by_key(|s| s.session.id);
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_core::{
        BattleMode, BattleSession, CombatUnit, CoreStats, GridSize, ParticipantId, Position,
        PresenceState, UnitCategory, UnitId,
    };

    fn session(id: u64, status: SessionStatus) -> BattleSession {
        let unit = |uid: u32, owner: u64, x: i32| {
            CombatUnit::new(
                UnitId(uid),
                ParticipantId(owner),
                format!("unit-{uid}"),
                UnitCategory::Troop,
                1,
                CoreStats {
                    offense: 2,
                    mobility: 3,
                    ..Default::default()
                },
                Position::new(x, 0),
            )
        };
        BattleSession {
            id: SessionId(id),
            grid: GridSize::new(6, 6),
            mode: BattleMode::Standard,
            round: 1,
            current_turn_index: 0,
            action_order: vec![ParticipantId(1), ParticipantId(2)],
            participants: vec![ParticipantId(1), ParticipantId(2)],
            forfeited: Default::default(),
            status,
            outcome: None,
            ransom: None,
            units: vec![unit(1, 1, 0), unit(2, 2, 3)],
            obstacles: Vec::new(),
            active_unit: None,
            turn_serial: 1,
            turn_timer_remaining_ms: None,
            presence: PresenceState::default(),
        }
    }

    #[tokio::test]
    async fn load_by_status_filters_and_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBattleStore::open(dir.path()).await.unwrap();

        let live = session(1, SessionStatus::Active);
        store.save(&StoredSession::capture(&live)).await.unwrap();
        store
            .save(&StoredSession::capture(&session(2, SessionStatus::Ended)))
            .await
            .unwrap();

        let active = store.load_by_status(SessionStatus::Active).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].clone().into_session(), live);

        store.delete_session(SessionId(1)).await.unwrap();
        assert!(
            store
                .load_by_status(SessionStatus::Active)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn session_without_units_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileBattleStore::open(dir.path()).await.unwrap();

        let stored = StoredSession::capture(&session(3, SessionStatus::Active));
        store.upsert_session(&stored.session).await.unwrap();

        assert!(
            store
                .load_by_status(SessionStatus::Active)
                .await
                .unwrap()
                .is_empty()
        );
    }
}
