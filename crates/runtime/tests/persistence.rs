//! Persistence cycles, archival and crash recovery.
mod common;

use std::sync::Arc;

use async_trait::async_trait;
use battle_core::{Position, SessionId, SessionStatus};
use common::*;
use runtime::repository::{ObstacleRecord, SessionRecord, UnitRecord};
use runtime::{
    BattleStore, ClientMessage, EventContext, EventLogRepository, FileBattleStore,
    InMemoryBattleStore, InMemoryEventLog, RepositoryError, Runtime, RuntimeError, StoredSession,
};

#[tokio::test]
async fn unchanged_sessions_are_not_rewritten() {
    let store = Arc::new(InMemoryBattleStore::new());
    let harness = Harness::start(store.clone()).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();

    let first = harness.handle.persist_now(false).await.unwrap();
    assert_eq!((first.examined, first.written), (1, 1));
    assert_eq!(store.session_writes(), 1);

    let second = harness.handle.persist_now(false).await.unwrap();
    assert_eq!((second.written, second.skipped), (0, 1));
    assert_eq!(store.session_writes(), 1);

    // Presence is not part of the persisted state.
    harness.handle.disconnect(session, P1).await.unwrap();
    let third = harness.handle.persist_now(false).await.unwrap();
    assert_eq!(third.written, 0);

    let (holder, _) = harness.players(session).await;
    let begin = ClientMessage::BeginAction {
        unit: unit_of(holder),
    };
    harness.handle.dispatch(session, holder, begin).await.unwrap();
    let fourth = harness.handle.persist_now(false).await.unwrap();
    assert_eq!(fourth.written, 1);
    assert_eq!(store.session_writes(), 2);

    let forced = harness.handle.persist_now(true).await.unwrap();
    assert_eq!(forced.written, 1);
}

#[tokio::test]
async fn one_failing_session_does_not_block_the_others() {
    let store = Arc::new(InMemoryBattleStore::new());
    let harness = Harness::start(store.clone()).await;
    let broken = harness.handle.create_battle(adjacent()).await.unwrap();
    let healthy = harness.handle.create_battle(far_apart()).await.unwrap();
    store.fail_writes_for(broken).unwrap();

    let report = harness.handle.persist_now(false).await.unwrap();
    assert_eq!((report.written, report.failed), (1, 1));
    assert!(store.get(healthy).unwrap().is_some());
    assert!(store.get(broken).unwrap().is_none());

    // The failed session is retried on the next cycle.
    store.clear_failures().unwrap();
    let retry = harness.handle.persist_now(false).await.unwrap();
    assert_eq!((retry.written, retry.skipped), (1, 1));
    assert!(store.get(broken).unwrap().is_some());
}

#[tokio::test]
async fn ended_battles_are_archived_once_and_leave_the_registry() {
    let store = Arc::new(InMemoryBattleStore::new());
    let harness = Harness::start(store.clone()).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();
    harness.handle.persist_now(false).await.unwrap();

    harness
        .handle
        .dispatch(session, P2, ClientMessage::Surrender)
        .await
        .unwrap();
    let report = harness.handle.persist_now(false).await.unwrap();
    assert_eq!(report.archived, 1);
    assert!(!harness.handle.sessions().contains(&session));

    let archived = store.get(session).unwrap().unwrap();
    assert_eq!(archived.session.status, SessionStatus::Ended);
    assert_eq!(archived.session.outcome.and_then(|o| o.winner), Some(P1));
    assert!(store.load_by_status(SessionStatus::Active).await.unwrap().is_empty());

    let next = harness.handle.persist_now(false).await.unwrap();
    assert_eq!((next.examined, next.archived), (0, 0));
}

/// Crash recovery round trip:
/// 1. A battle is played a little and the runtime shuts down
/// 2. A new runtime over the same directory brings it back
/// 3. Everyone starts absent until they reconnect
#[tokio::test]
async fn restart_recovers_live_battles_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let sessions_dir = dir.path().join("sessions");

    let store = FileBattleStore::open(&sessions_dir).await.unwrap();
    let harness = Harness::start(Arc::new(store)).await;
    let session = harness.handle.create_battle(far_apart()).await.unwrap();
    let (holder, _) = harness.players(session).await;
    let unit = unit_of(holder);
    let to = if holder == P1 {
        Position::new(1, 0)
    } else {
        Position::new(14, 15)
    };
    for message in [
        ClientMessage::BeginAction { unit },
        ClientMessage::Move { unit, to },
    ] {
        harness.handle.dispatch(session, holder, message).await.unwrap();
    }
    let before = harness.handle.snapshot(session).await.unwrap();
    let report = harness.runtime.shutdown().await.unwrap();
    assert_eq!(report.written, 1);

    let store = FileBattleStore::open(&sessions_dir).await.unwrap();
    let log = Arc::new(InMemoryEventLog::new());
    let runtime = Runtime::builder()
        .config(config())
        .store(Arc::new(store))
        .event_log(log.clone())
        .build()
        .await
        .unwrap();
    assert_eq!(runtime.recovered_sessions(), 1);

    let handle = runtime.handle();
    let after = handle.snapshot(session).await.unwrap();
    assert_eq!(after.units, before.units);
    assert_eq!(after.round, before.round);
    assert_eq!(after.turn_serial, before.turn_serial);
    assert_eq!(after.action_order, before.action_order);
    assert_eq!(after.active_unit, Some(unit));
    assert_eq!(after.unit(unit).unwrap().position, to);
    assert!(after.turn_timer_remaining_ms.is_some());
    assert!(after.participants.iter().all(|&p| after.presence.is_absent(p)));

    assert!(handle.connect(session, holder).await.unwrap());
    let resumed = handle.snapshot(session).await.unwrap();
    assert!(!resumed.presence.is_absent(holder));

    // Fresh ids never collide with recovered ones.
    let fresh = handle.create_battle(adjacent()).await.unwrap();
    assert!(fresh > session);

    runtime.shutdown().await.unwrap();
    let logged = log.read_all().unwrap();
    assert!(logged.iter().any(|e| e.context == EventContext::System));
}

/// Store whose reads always fail.
struct Unreachable;

#[async_trait]
impl BattleStore for Unreachable {
    async fn upsert_session(&self, _: &SessionRecord) -> runtime::repository::Result<()> {
        Ok(())
    }

    async fn upsert_units(&self, _: SessionId, _: &[UnitRecord]) -> runtime::repository::Result<()> {
        Ok(())
    }

    async fn upsert_obstacles(
        &self,
        _: SessionId,
        _: &[ObstacleRecord],
    ) -> runtime::repository::Result<()> {
        Ok(())
    }

    async fn delete_session(&self, _: SessionId) -> runtime::repository::Result<()> {
        Ok(())
    }

    async fn load_by_status(
        &self,
        _: SessionStatus,
    ) -> runtime::repository::Result<Vec<StoredSession>> {
        Err(RepositoryError::Io(std::io::Error::other("connection refused")))
    }
}

#[tokio::test]
async fn unreadable_store_stops_startup() {
    let result = Runtime::builder()
        .config(config())
        .store(Arc::new(Unreachable))
        .build()
        .await;
    assert!(matches!(result, Err(RuntimeError::StoreUnavailable(_))));
}
