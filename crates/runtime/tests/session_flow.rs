//! Live battle scenarios driven through the public runtime handle.
mod common;

use std::sync::Arc;

use battle_core::{EndReason, ParticipantId, Position, SessionId, SessionStatus};
use common::*;
use runtime::{ClientMessage, Dispatch, InMemoryBattleStore, RuntimeError, ServerMessage, Topic};

/// Fog of war end to end:
/// 1. Both participants receive the global `battle_started`
/// 2. The turn holder moves a unit far from the opponent
/// 3. Only the mover hears about it, live and in the state snapshot
#[tokio::test]
async fn movement_out_of_sight_reaches_only_the_mover() {
    let mut harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(far_apart()).await.unwrap();
    let (mover, watcher) = harness.players(session).await;

    for participant in [mover, watcher] {
        let types = event_types(&drain(harness.inbox(participant)));
        assert!(types.contains(&"battle_started"), "{participant}: {types:?}");
    }

    let unit = unit_of(mover);
    let to = if mover == P1 {
        Position::new(1, 1)
    } else {
        Position::new(14, 14)
    };
    let begin = ClientMessage::BeginAction { unit };
    assert_eq!(
        harness.handle.dispatch(session, mover, begin).await.unwrap(),
        Dispatch::Applied
    );
    let step = ClientMessage::Move { unit, to };
    assert_eq!(
        harness.handle.dispatch(session, mover, step).await.unwrap(),
        Dispatch::Applied
    );

    let seen_by_mover = event_types(&drain(harness.inbox(mover)));
    assert!(seen_by_mover.contains(&"action_started"));
    assert!(seen_by_mover.contains(&"unit_moved"));
    let seen_by_watcher = event_types(&drain(harness.inbox(watcher)));
    assert!(seen_by_watcher.is_empty(), "{seen_by_watcher:?}");

    // The ring replays the same filter for late state requests.
    let request = ClientMessage::GetBattleState {
        cursor: None,
        limit: None,
    };
    harness
        .handle
        .dispatch(session, watcher, request.clone())
        .await
        .unwrap();
    let Some(ServerMessage::BattleState(view)) =
        drain(harness.inbox(watcher)).pop().map(|o| o.message)
    else {
        panic!("watcher should get a battle_state");
    };
    assert!(view.events.iter().all(|e| e.message_type() != "unit_moved"));
    assert_eq!(view.turn_holder, Some(mover));

    harness.handle.dispatch(session, mover, request).await.unwrap();
    let Some(ServerMessage::BattleState(view)) =
        drain(harness.inbox(mover)).pop().map(|o| o.message)
    else {
        panic!("mover should get a battle_state");
    };
    assert!(view.events.iter().any(|e| e.message_type() == "unit_moved"));
    assert_eq!(view.active_unit, Some(unit));
}

#[tokio::test]
async fn out_of_turn_request_is_rejected_privately() {
    let mut harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();
    let (holder, waiting) = harness.players(session).await;
    drain(harness.inbox(holder));
    drain(harness.inbox(waiting));
    let before = harness.handle.snapshot(session).await.unwrap();

    let message = ClientMessage::BeginAction {
        unit: unit_of(waiting),
    };
    let outcome = harness.handle.dispatch(session, waiting, message).await.unwrap();
    assert_eq!(
        outcome,
        Dispatch::Rejected {
            code: "ACTION_NOT_YOUR_TURN"
        }
    );

    let delivered = drain(harness.inbox(waiting));
    assert_eq!(delivered.len(), 1);
    match &delivered[0].message {
        ServerMessage::Rejected { request, code, .. } => {
            assert_eq!(request, "begin_action");
            assert_eq!(code, "ACTION_NOT_YOUR_TURN");
        }
        other => panic!("expected a rejection, got {other:?}"),
    }
    assert!(drain(harness.inbox(holder)).is_empty());

    let after = harness.handle.snapshot(session).await.unwrap();
    assert_eq!(after.turn_serial, before.turn_serial);
    assert_eq!(after.units, before.units);
}

#[tokio::test]
async fn surrender_ends_the_battle_for_everyone() {
    let mut harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();
    let mut matches = harness.handle.subscribe(Topic::Match).unwrap();

    let outcome = harness
        .handle
        .dispatch(session, P1, ClientMessage::Surrender)
        .await
        .unwrap();
    assert_eq!(outcome, Dispatch::Applied);

    let snapshot = harness.handle.snapshot(session).await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Ended);
    let result = snapshot.outcome.unwrap();
    assert_eq!(result.winner, Some(P2));
    assert_eq!(result.reason, EndReason::Surrender);

    for participant in [P1, P2] {
        let types = event_types(&drain(harness.inbox(participant)));
        assert!(types.contains(&"player_left"), "{types:?}");
        assert!(types.contains(&"battle_ended"), "{types:?}");
    }

    // Match events also reach bus subscribers.
    let mut published = Vec::new();
    while let Ok(event) = matches.try_recv() {
        published.push(event.message_type());
    }
    assert!(published.contains(&"battle_ended"));

    // Nothing more can happen in an ended battle.
    let again = harness
        .handle
        .dispatch(session, P2, ClientMessage::EndUnitAction { unit: unit_of(P2) })
        .await
        .unwrap();
    assert_eq!(
        again,
        Dispatch::Rejected {
            code: "ACTION_SESSION_ENDED"
        }
    );
}

/// Rematch voting:
/// 1. Asking during the battle is refused
/// 2. A duplicate vote is refused
/// 3. The last vote starts a fresh session with the same roster
#[tokio::test]
async fn rematch_starts_once_every_participant_agrees() {
    let harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();

    let early = harness
        .handle
        .dispatch(session, P1, ClientMessage::RequestRematch)
        .await
        .unwrap();
    assert_eq!(
        early,
        Dispatch::Rejected {
            code: "REMATCH_BATTLE_ACTIVE"
        }
    );

    harness
        .handle
        .dispatch(session, P2, ClientMessage::LeaveBattle)
        .await
        .unwrap();

    let first = harness
        .handle
        .dispatch(session, P1, ClientMessage::RequestRematch)
        .await
        .unwrap();
    assert_eq!(first, Dispatch::Applied);
    let duplicate = harness
        .handle
        .dispatch(session, P1, ClientMessage::RequestRematch)
        .await
        .unwrap();
    assert_eq!(
        duplicate,
        Dispatch::Rejected {
            code: "REMATCH_ALREADY_REQUESTED"
        }
    );

    let last = harness
        .handle
        .dispatch(session, P2, ClientMessage::RequestRematch)
        .await
        .unwrap();
    let Dispatch::RematchStarted(next) = last else {
        panic!("expected a rematch, got {last:?}");
    };
    assert_ne!(next, session);
    assert!(harness.handle.sessions().contains(&next));

    let fresh = harness.handle.snapshot(next).await.unwrap();
    assert_eq!(fresh.status, SessionStatus::Active);
    assert_eq!(fresh.round, 1);
    assert_eq!(fresh.units.len(), 2);
    assert!(fresh.units.iter().all(|u| u.alive && u.health.current == u.health.maximum));

    let late = harness
        .handle
        .dispatch(session, P2, ClientMessage::RequestRematch)
        .await
        .unwrap();
    assert_eq!(
        late,
        Dispatch::Rejected {
            code: "REMATCH_ALREADY_STARTED"
        }
    );
}

#[tokio::test]
async fn presence_changes_are_announced_to_both_sides() {
    let mut harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();
    harness.players(session).await;
    drain(harness.inbox(P1));
    drain(harness.inbox(P2));

    assert!(harness.handle.disconnect(session, P2).await.unwrap());
    assert!(harness.handle.connect(session, P2).await.unwrap());
    // Unknown participants are refused without side effects.
    assert!(!harness.handle.connect(session, ParticipantId(99)).await.unwrap());

    let types = event_types(&drain(harness.inbox(P1)));
    assert_eq!(types, vec!["player_disconnected", "player_reconnected"]);
}

#[tokio::test]
async fn unknown_session_is_an_error() {
    let harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let missing = SessionId(404);
    let err = harness
        .handle
        .dispatch(missing, P1, ClientMessage::Surrender)
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::SessionNotFound(id) if id == missing));
}

#[tokio::test]
async fn channels_registered_after_startup_receive_later_events() {
    let mut harness = Harness::start(Arc::new(InMemoryBattleStore::new())).await;
    let session = harness.handle.create_battle(adjacent()).await.unwrap();
    harness.players(session).await;
    drain(harness.inbox(P2));
    assert!(harness.transport.unregister(P2));

    // Nothing reaches P2 while no channel is open.
    harness.handle.disconnect(session, P1).await.unwrap();
    assert!(drain(harness.inbox(P2)).is_empty());

    let mut attached = harness.transport.register(P2);
    harness.handle.connect(session, P1).await.unwrap();
    assert_eq!(event_types(&drain(&mut attached)), vec!["player_reconnected"]);
}
