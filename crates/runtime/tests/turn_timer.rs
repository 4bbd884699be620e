//! Turn timer behavior under tokio's paused clock.
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use runtime::{ClientMessage, Dispatch, EventPayload, InMemoryBattleStore, Outbound};

fn timed_out_turns(messages: &[Outbound]) -> usize {
    messages
        .iter()
        .filter_map(|o| o.message.as_event())
        .filter(|e| {
            matches!(
                e.payload,
                EventPayload::UnitTurnEnded {
                    timed_out: true,
                    ..
                }
            )
        })
        .count()
}

#[tokio::test(start_paused = true)]
async fn expiry_passes_the_turn_exactly_once() {
    let mut harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();
    let (holder, next) = harness.players(session).await;
    let serial = harness.handle.snapshot(session).await.unwrap().turn_serial;
    drain(harness.inbox(holder));

    tokio::time::sleep(TURN + Duration::from_secs(1)).await;

    let snapshot = harness.handle.snapshot(session).await.unwrap();
    assert_eq!(snapshot.turn_serial, serial + 1);
    assert_eq!(snapshot.turn_holder(), Some(next));
    let remaining = snapshot.turn_timer_remaining_ms.unwrap();
    assert!(remaining < TURN.as_millis() as u64, "{remaining}");

    let delivered = drain(harness.inbox(holder));
    assert_eq!(timed_out_turns(&delivered), 1);
    assert!(event_types(&delivered).contains(&"next_player"));
}

#[tokio::test(start_paused = true)]
async fn passing_before_expiry_restarts_the_clock() {
    let harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();
    let (holder, next) = harness.players(session).await;
    let serial = harness.handle.snapshot(session).await.unwrap().turn_serial;

    tokio::time::sleep(TURN - Duration::from_secs(1)).await;
    let pass = ClientMessage::EndUnitAction {
        unit: unit_of(holder),
    };
    assert_eq!(
        harness.handle.dispatch(session, holder, pass).await.unwrap(),
        Dispatch::Applied
    );

    // The old deadline passes without effect.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let snapshot = harness.handle.snapshot(session).await.unwrap();
    assert_eq!(snapshot.turn_serial, serial + 1);
    assert_eq!(snapshot.turn_holder(), Some(next));
}

#[tokio::test(start_paused = true)]
async fn timer_waits_while_everyone_is_away() {
    let harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();
    let serial = harness.handle.snapshot(session).await.unwrap().turn_serial;

    tokio::time::sleep(Duration::from_secs(10)).await;
    harness.handle.disconnect(session, P1).await.unwrap();
    harness.handle.disconnect(session, P2).await.unwrap();
    let paused_at = harness
        .handle
        .snapshot(session)
        .await
        .unwrap()
        .turn_timer_remaining_ms;

    tokio::time::sleep(TURN * 3).await;
    let snapshot = harness.handle.snapshot(session).await.unwrap();
    assert_eq!(snapshot.turn_serial, serial);
    assert_eq!(snapshot.turn_timer_remaining_ms, paused_at);

    // One participant back is enough to restart the clock where it stopped.
    harness.handle.connect(session, P2).await.unwrap();
    tokio::time::sleep(Duration::from_millis(paused_at.unwrap() + 500)).await;
    let snapshot = harness.handle.snapshot(session).await.unwrap();
    assert_eq!(snapshot.turn_serial, serial + 1);
}
