//! Shared fixtures for the runtime integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use battle_core::{
    CombatUnit, CoreStats, GridSize, ParticipantId, Position, SessionId, UnitCategory, UnitId,
};
use runtime::{
    BattleStore, ChannelTransport, NewBattle, Outbound, Runtime, RuntimeConfig, RuntimeHandle,
};
use tokio::sync::mpsc::UnboundedReceiver;

pub const P1: ParticipantId = ParticipantId(1);
pub const P2: ParticipantId = ParticipantId(2);
pub const TURN: Duration = Duration::from_secs(30);

pub fn unit_of(participant: ParticipantId) -> UnitId {
    UnitId(participant.0 as u32)
}

/// Two troops in opposite corners of a 16x16 grid, far outside each other's
/// vision range.
pub fn far_apart() -> NewBattle {
    NewBattle::new(
        GridSize::new(16, 16),
        vec![troop(P1, Position::new(0, 0)), troop(P2, Position::new(15, 15))],
    )
}

/// Two troops standing next to each other.
pub fn adjacent() -> NewBattle {
    NewBattle::new(
        GridSize::new(8, 8),
        vec![troop(P1, Position::new(3, 3)), troop(P2, Position::new(4, 3))],
    )
}

pub fn troop(owner: ParticipantId, position: Position) -> CombatUnit {
    CombatUnit::new(
        unit_of(owner),
        owner,
        format!("Troop {owner}"),
        UnitCategory::Troop,
        1,
        CoreStats {
            offense: 3,
            mobility: 3,
            ..CoreStats::default()
        },
        position,
    )
}

/// Config with a fixed dice seed and a persistence interval long enough
/// that only explicit `persist_now` calls write.
pub fn config() -> RuntimeConfig {
    RuntimeConfig::default()
        .with_turn_duration(TURN)
        .with_persist_interval(Duration::from_secs(3600))
        .with_dice_seed(7)
}

pub struct Harness {
    pub runtime: Runtime,
    pub handle: RuntimeHandle,
    pub transport: Arc<ChannelTransport>,
    pub inbox_p1: UnboundedReceiver<Outbound>,
    pub inbox_p2: UnboundedReceiver<Outbound>,
}

impl Harness {
    pub async fn start(store: Arc<dyn BattleStore>) -> Self {
        Self::start_with(config(), store).await
    }

    pub async fn start_with(config: RuntimeConfig, store: Arc<dyn BattleStore>) -> Self {
        let transport = Arc::new(ChannelTransport::new());
        let inbox_p1 = transport.register(P1);
        let inbox_p2 = transport.register(P2);
        let runtime = Runtime::builder()
            .config(config)
            .store(store)
            .transport(transport.clone())
            .build()
            .await
            .expect("runtime should start");
        let handle = runtime.handle();
        Self {
            runtime,
            handle,
            transport,
            inbox_p1,
            inbox_p2,
        }
    }

    /// Participant whose turn it is, and the other one.
    pub async fn players(&self, session: SessionId) -> (ParticipantId, ParticipantId) {
        let snapshot = self.handle.snapshot(session).await.expect("live session");
        let holder = snapshot.turn_holder().expect("active battle has a turn holder");
        let other = if holder == P1 { P2 } else { P1 };
        (holder, other)
    }

    pub fn inbox(&mut self, participant: ParticipantId) -> &mut UnboundedReceiver<Outbound> {
        if participant == P1 {
            &mut self.inbox_p1
        } else {
            &mut self.inbox_p2
        }
    }
}

/// Everything delivered so far, without waiting.
pub fn drain(inbox: &mut UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut messages = Vec::new();
    while let Ok(message) = inbox.try_recv() {
        messages.push(message);
    }
    messages
}

/// Wire names of the events among `messages`.
pub fn event_types(messages: &[Outbound]) -> Vec<&'static str> {
    messages
        .iter()
        .filter_map(|outbound| outbound.message.as_event())
        .map(|event| event.message_type())
        .collect()
}
