//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and offers async helpers for
//! starting battles, routing client messages to their session and streaming
//! events from specific topics.
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use battle_core::{
    BattleMode, BattleSession, BattleSetup, CombatUnit, GridSize, Obstacle, ParticipantId,
    RansomTerms, SessionId, start_battle,
};

use super::errors::{Result, RuntimeError};
use super::messages::ClientMessage;
use crate::events::{CombatEvent, EventBus, Topic};
use crate::workers::{CycleReport, Dispatch, PersistenceHandle, SessionContext, SessionHandle};

/// Roster and terrain of a battle to start. The runtime assigns the id.
#[derive(Clone, Debug)]
pub struct NewBattle {
    pub grid: GridSize,
    pub mode: BattleMode,
    pub units: Vec<CombatUnit>,
    pub obstacles: Vec<Obstacle>,
    pub ransom: Option<RansomTerms>,
}

impl NewBattle {
    pub fn new(grid: GridSize, units: Vec<CombatUnit>) -> Self {
        Self {
            grid,
            mode: BattleMode::Standard,
            units,
            obstacles: Vec::new(),
            ransom: None,
        }
    }

    pub fn with_mode(mut self, mode: BattleMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_obstacles(mut self, obstacles: Vec<Obstacle>) -> Self {
        self.obstacles = obstacles;
        self
    }

    pub fn with_ransom(mut self, ransom: RansomTerms) -> Self {
        self.ransom = Some(ransom);
        self
    }
}

/// Client-facing handle to interact with the runtime
#[derive(Clone)]
pub struct RuntimeHandle {
    context: Arc<SessionContext>,
    persistence: PersistenceHandle,
}

impl RuntimeHandle {
    pub(crate) fn new(context: Arc<SessionContext>, persistence: PersistenceHandle) -> Self {
        Self {
            context,
            persistence,
        }
    }

    /// Rolls initiative, starts the battle worker and announces `battle_started`.
    pub async fn create_battle(&self, battle: NewBattle) -> Result<SessionId> {
        let id = self.context.registry.allocate_id();
        let mut dice = self.context.dice_for(id);
        let setup = BattleSetup {
            id,
            grid: battle.grid,
            mode: battle.mode,
            units: battle.units,
            obstacles: battle.obstacles,
            ransom: battle.ransom,
        };
        let (session, effects) = start_battle(setup, &self.context.config.rules, &mut dice)?;

        info!(
            session = %id,
            participants = session.participants.len(),
            units = session.units.len(),
            "Battle created"
        );
        self.context.launch(session, effects, dice);
        Ok(id)
    }

    /// Routes one client message to its session.
    ///
    /// Rejections are not errors here: the requester receives a `rejected`
    /// message and the call returns [`Dispatch::Rejected`].
    pub async fn dispatch(
        &self,
        session: SessionId,
        participant: ParticipantId,
        message: ClientMessage,
    ) -> Result<Dispatch> {
        self.session(session)?.dispatch(participant, message).await
    }

    /// A participant (re)associated with the session. Returns false when they
    /// are not part of it.
    pub async fn connect(&self, session: SessionId, participant: ParticipantId) -> Result<bool> {
        self.session(session)?.connect(participant).await
    }

    /// A participant's connection dropped; the battle goes on without them.
    pub async fn disconnect(&self, session: SessionId, participant: ParticipantId) -> Result<bool> {
        self.session(session)?.disconnect(participant).await
    }

    /// Current state of a live session (read-only copy)
    pub async fn snapshot(&self, session: SessionId) -> Result<BattleSession> {
        self.session(session)?.snapshot().await
    }

    /// Ids of every live session, ascending.
    pub fn sessions(&self) -> Vec<SessionId> {
        self.context.registry.ids()
    }

    /// Runs a persistence cycle now instead of waiting for the interval.
    pub async fn persist_now(&self, force: bool) -> Result<CycleReport> {
        self.persistence.flush(force).await
    }

    /// Subscribe to events from a specific topic
    ///
    /// # Topics
    ///
    /// - `Topic::Match` - Battle start/end, players leaving, disconnecting, reconnecting
    /// - `Topic::System` - Runtime notices such as recovery after restart
    /// - `Topic::Account` - Account-level events from collaborators
    ///
    /// Battle narration is never on the bus; it is delivered per participant
    /// through the transport.
    pub fn subscribe(&self, topic: Topic) -> Option<broadcast::Receiver<CombatEvent>> {
        self.context.event_bus.subscribe(topic)
    }

    /// Subscribe to multiple topics at once
    ///
    /// Returns a map of topic to receiver for each requested topic.
    pub fn subscribe_multiple(
        &self,
        topics: &[Topic],
    ) -> HashMap<Topic, broadcast::Receiver<CombatEvent>> {
        self.context.event_bus.subscribe_multiple(topics)
    }

    /// Get a reference to the event bus for advanced usage
    pub fn event_bus(&self) -> &EventBus {
        &self.context.event_bus
    }

    pub(crate) fn persistence(&self) -> &PersistenceHandle {
        &self.persistence
    }

    pub(crate) fn context(&self) -> &Arc<SessionContext> {
        &self.context
    }

    fn session(&self, id: SessionId) -> Result<SessionHandle> {
        self.context
            .registry
            .get(id)
            .ok_or(RuntimeError::SessionNotFound(id))
    }
}
