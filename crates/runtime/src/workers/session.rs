//! Session worker that owns one authoritative [`BattleSession`].
//!
//! Receives commands from [`SessionHandle`], runs them through
//! [`BattleEngine`], narrates the resulting effects and delivers each event to
//! the participants allowed to observe it. The worker is the only writer of
//! its session, so client requests and turn timer expiries are serialized by
//! its command loop: whichever arrives first takes effect, the other is
//! rejected by the engine.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use battle_core::{
    ActionError, BattleEffect, BattleEngine, BattleSession, GameError, ParticipantId, Presence,
    SeededDice, SessionId, TurnError, rematch,
};

use crate::api::{
    BattleStateView, ClientMessage, Request, Result, RuntimeError, ServerMessage,
    SessionRequestError, SessionRegistry, Transport,
};
use crate::config::RuntimeConfig;
use crate::events::{
    CombatEvent, EventBus, EventContext, EventRing, can_observe, narrate_effects, observers_of,
    presence_event, rematch_event,
};

use super::timer::TurnTimer;

/// How a client request was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// Accepted; the resulting events have been delivered.
    Applied,
    /// Refused with a machine-readable code; the requester got a `rejected` message.
    Rejected { code: &'static str },
    /// The last rematch vote came in and a new session was started.
    RematchStarted(SessionId),
}

/// Commands that can be sent to a session worker
pub(crate) enum SessionCommand {
    Client {
        participant: ParticipantId,
        message: ClientMessage,
        reply: oneshot::Sender<Dispatch>,
    },
    /// Returns false when the participant is not part of the battle.
    Connect {
        participant: ParticipantId,
        reply: oneshot::Sender<bool>,
    },
    Disconnect {
        participant: ParticipantId,
        reply: oneshot::Sender<bool>,
    },
    /// Copy of the session with the remaining turn time filled in.
    Snapshot {
        reply: oneshot::Sender<BattleSession>,
    },
}

/// Cloneable command handle of one session worker.
#[derive(Clone)]
pub(crate) struct SessionHandle {
    id: SessionId,
    command_tx: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn dispatch(
        &self,
        participant: ParticipantId,
        message: ClientMessage,
    ) -> Result<Dispatch> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Client {
            participant,
            message,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    pub async fn connect(&self, participant: ParticipantId) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Connect {
            participant,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    pub async fn disconnect(&self, participant: ParticipantId) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Disconnect {
            participant,
            reply: reply_tx,
        })
        .await?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    pub async fn snapshot(&self) -> Result<BattleSession> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Snapshot { reply: reply_tx })
            .await?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    async fn send(&self, command: SessionCommand) -> Result<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)
    }
}

/// Everything a session worker shares with the rest of the runtime.
pub(crate) struct SessionContext {
    pub config: RuntimeConfig,
    pub registry: SessionRegistry,
    pub transport: Arc<dyn Transport>,
    pub event_bus: EventBus,
}

impl SessionContext {
    /// Dice stream for a new session: derived from the configured seed when
    /// one is set, random otherwise.
    pub fn dice_for(&self, id: SessionId) -> SeededDice {
        let seed = match self.config.dice_seed {
            Some(base) => base ^ id.0.wrapping_mul(0x9E37_79B9_7F4A_7C15),
            None => rand::random(),
        };
        SeededDice::new(seed)
    }

    /// Spawns the worker of a freshly started battle and registers it.
    ///
    /// `effects` are the engine effects that created the session; they are
    /// narrated first thing, which announces `battle_started` and arms the
    /// turn timer.
    pub fn launch(
        self: &Arc<Self>,
        session: BattleSession,
        effects: Vec<BattleEffect>,
        dice: SeededDice,
    ) -> SessionHandle {
        self.spawn(session, dice, TurnTimer::Idle, effects)
    }

    /// Spawns the worker of a session reloaded from storage.
    ///
    /// Every participant starts absent, so the turn timer comes back paused
    /// with the stored remaining time and resumes on the first reconnect.
    pub fn restore(self: &Arc<Self>, mut session: BattleSession) -> SessionHandle {
        for participant in session.participants.clone() {
            session.presence.mark_absent(participant);
        }

        let mut timer = TurnTimer::Idle;
        if session.is_active() {
            let remaining = session
                .turn_timer_remaining_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or(self.config.turn_duration);
            timer.arm(session.turn_serial, remaining, true);
        }

        let dice = self.dice_for(session.id);
        self.spawn(session, dice, timer, Vec::new())
    }

    fn spawn(
        self: &Arc<Self>,
        session: BattleSession,
        dice: SeededDice,
        timer: TurnTimer,
        effects: Vec<BattleEffect>,
    ) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_buffer);
        let handle = SessionHandle {
            id: session.id,
            command_tx,
        };

        let worker = SessionWorker::new(session, Arc::clone(self), dice, timer, command_rx);
        let task = tokio::spawn(worker.run(effects));
        self.registry.insert(handle.clone(), task);
        handle
    }
}

enum RematchState {
    Collecting(BTreeSet<ParticipantId>),
    Started(SessionId),
}

/// Background task that owns one battle.
pub(crate) struct SessionWorker {
    session: BattleSession,
    context: Arc<SessionContext>,
    dice: SeededDice,
    timer: TurnTimer,
    ring: EventRing,
    next_sequence: u64,
    rematch: RematchState,
    command_rx: mpsc::Receiver<SessionCommand>,
}

impl SessionWorker {
    fn new(
        session: BattleSession,
        context: Arc<SessionContext>,
        dice: SeededDice,
        timer: TurnTimer,
        command_rx: mpsc::Receiver<SessionCommand>,
    ) -> Self {
        let ring = EventRing::new(context.config.event_ring_capacity);
        Self {
            session,
            context,
            dice,
            timer,
            ring,
            next_sequence: 1,
            rematch: RematchState::Collecting(BTreeSet::new()),
            command_rx,
        }
    }

    /// Main worker loop. Ends once every handle to the session is dropped.
    pub async fn run(mut self, initial: Vec<BattleEffect>) {
        let id = self.session.id;
        debug!(target: "runtime::session", session = %id, "Session worker started");
        self.apply_effects(initial);

        loop {
            let deadline = self.timer.deadline();
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_turn_timeout();
                }
            }
        }

        debug!(target: "runtime::session", session = %id, "Session worker stopped");
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Client {
                participant,
                message,
                reply,
            } => {
                let outcome = self.handle_client(participant, message);
                if reply.send(outcome).is_err() {
                    debug!("Client reply channel closed (caller dropped)");
                }
            }
            SessionCommand::Connect { participant, reply } => {
                let known = self.connect(participant);
                let _ = reply.send(known);
            }
            SessionCommand::Disconnect { participant, reply } => {
                let known = self.disconnect(participant);
                let _ = reply.send(known);
            }
            SessionCommand::Snapshot { reply } => {
                if reply.send(self.snapshot()).is_err() {
                    debug!("Snapshot reply channel closed (caller dropped)");
                }
            }
        }
    }

    fn handle_client(&mut self, participant: ParticipantId, message: ClientMessage) -> Dispatch {
        let request = message.name();
        debug!(session = %self.session.id, %participant, request, "Client request");

        match message.into_request() {
            Request::Begin(unit) => self.run_engine(participant, request, |engine| {
                engine.begin_action(participant, unit)
            }),
            Request::Act(unit, action) => self.run_engine(participant, request, |engine| {
                engine.apply(participant, unit, action)
            }),
            Request::End(unit) => self.run_engine(participant, request, |engine| {
                engine.end_unit_turn(participant, unit)
            }),
            Request::Forfeit(reason) => self.run_engine(participant, request, |engine| {
                engine.forfeit(participant, reason)
            }),
            Request::Rematch => self.request_rematch(participant),
            Request::State { cursor, limit } => self.send_state(participant, cursor, limit),
        }
    }

    fn run_engine<F>(&mut self, participant: ParticipantId, request: &'static str, op: F) -> Dispatch
    where
        F: FnOnce(&mut BattleEngine<'_>) -> std::result::Result<Vec<BattleEffect>, ActionError>,
    {
        let result = {
            let mut engine =
                BattleEngine::new(&mut self.session, &self.context.config.rules, &mut self.dice);
            op(&mut engine)
        };
        match result {
            Ok(effects) => {
                self.apply_effects(effects);
                Dispatch::Applied
            }
            Err(error) => self.reject(participant, request, &error),
        }
    }

    fn on_turn_timeout(&mut self) {
        let Some(serial) = self.timer.serial() else {
            return;
        };
        self.timer.stop();

        let result = BattleEngine::new(&mut self.session, &self.context.config.rules, &mut self.dice)
            .expire_turn(serial);
        match result {
            Ok(effects) => {
                debug!(session = %self.session.id, serial, "Turn timer expired");
                self.apply_effects(effects);
            }
            Err(error @ TurnError::StaleTimer { .. }) => {
                debug!(session = %self.session.id, %error, "Ignoring stale turn timer");
            }
            Err(error) => {
                warn!(session = %self.session.id, %error, code = error.error_code(), "Turn timer fired on an ended battle");
            }
        }
    }

    fn request_rematch(&mut self, participant: ParticipantId) -> Dispatch {
        const REQUEST: &str = "request_rematch";

        if !self.session.participants.contains(&participant) {
            return self.reject(participant, REQUEST, &SessionRequestError::NotParticipant(participant));
        }
        if self.session.is_active() {
            return self.reject(participant, REQUEST, &SessionRequestError::RematchBattleActive);
        }
        let votes = match &mut self.rematch {
            RematchState::Started(id) => {
                let error = SessionRequestError::RematchAlreadyStarted(*id);
                return self.reject(participant, REQUEST, &error);
            }
            RematchState::Collecting(votes) => {
                if !votes.insert(participant) {
                    let error = SessionRequestError::RematchAlreadyRequested(participant);
                    return self.reject(participant, REQUEST, &error);
                }
                votes.len()
            }
        };

        let needed = self.session.participants.len();
        let event = rematch_event(&self.session, participant, votes, needed);
        self.emit(event);
        if votes < needed {
            return Dispatch::Applied;
        }

        let id = self.context.registry.allocate_id();
        match rematch(&self.session, id, &self.context.config.rules, &mut self.dice) {
            Ok((session, effects)) => {
                info!(previous = %self.session.id, session = %id, "Rematch started");
                self.rematch = RematchState::Started(id);
                let dice = self.context.dice_for(id);
                self.context.launch(session, effects, dice);
                Dispatch::RematchStarted(id)
            }
            Err(error) => self.reject(participant, REQUEST, &error),
        }
    }

    fn send_state(
        &mut self,
        participant: ParticipantId,
        cursor: Option<u64>,
        limit: Option<usize>,
    ) -> Dispatch {
        if !self.session.participants.contains(&participant) {
            let error = SessionRequestError::NotParticipant(participant);
            return self.reject(participant, "get_battle_state", &error);
        }
        let view = self.battle_state(participant, cursor, limit);
        self.context.transport.send_to(
            self.session.id,
            participant,
            ServerMessage::BattleState(Box::new(view)),
        );
        Dispatch::Applied
    }

    fn battle_state(
        &self,
        participant: ParticipantId,
        cursor: Option<u64>,
        limit: Option<usize>,
    ) -> BattleStateView {
        let limit = limit.unwrap_or(self.context.config.state_event_count);
        let page = self.ring.page(cursor, limit, |event| {
            can_observe(event.visibility.as_ref(), participant, &self.session)
        });
        BattleStateView::new(&self.session, self.timer.remaining_ms(), page)
    }

    fn connect(&mut self, participant: ParticipantId) -> bool {
        if !self.session.participants.contains(&participant) {
            return false;
        }
        if self.session.presence.mark_present(participant) {
            if self.timer.is_paused() && self.session.presence_state() == Presence::Connected {
                self.timer.resume();
                debug!(session = %self.session.id, "Turn timer resumed");
            }
            let event = presence_event(&self.session, participant, true);
            self.emit(event);
        }
        true
    }

    fn disconnect(&mut self, participant: ParticipantId) -> bool {
        if !self.session.participants.contains(&participant) {
            return false;
        }
        if self.session.presence.mark_absent(participant) {
            let event = presence_event(&self.session, participant, false);
            self.emit(event);
            if self.session.presence_state() == Presence::AllAbsent {
                self.timer.pause();
                debug!(session = %self.session.id, "All participants absent, turn timer paused");
            }
        }
        true
    }

    fn snapshot(&mut self) -> BattleSession {
        self.session.turn_timer_remaining_ms = self.timer.remaining_ms();
        self.session.clone()
    }

    /// Updates the timer for turn changes, then narrates and delivers.
    fn apply_effects(&mut self, effects: Vec<BattleEffect>) {
        if effects.is_empty() {
            return;
        }

        let paused = self.session.presence_state() == Presence::AllAbsent;
        let mut ended = false;
        for effect in &effects {
            match effect {
                BattleEffect::BattleStarted { .. } => {
                    self.timer
                        .arm(self.session.turn_serial, self.context.config.turn_duration, paused);
                }
                BattleEffect::NextPlayer { turn_serial, .. } => {
                    self.timer
                        .arm(*turn_serial, self.context.config.turn_duration, paused);
                }
                BattleEffect::BattleEnded(outcome) => {
                    self.timer.stop();
                    ended = true;
                    info!(
                        session = %self.session.id,
                        winner = ?outcome.winner,
                        reason = %outcome.reason,
                        "Battle ended"
                    );
                }
                _ => {}
            }
        }

        for event in narrate_effects(&self.session, &effects) {
            self.emit(event);
        }

        if ended {
            // Narration is not kept past the end of a battle.
            self.ring.clear();
        }
        self.session.turn_timer_remaining_ms = self.timer.remaining_ms();
    }

    /// Sequences one event, delivers it to every observer and files it.
    fn emit(&mut self, mut event: CombatEvent) {
        event.sequence = self.next_sequence;
        self.next_sequence += 1;

        for participant in observers_of(&event, &self.session) {
            self.context.transport.send_to(
                self.session.id,
                participant,
                ServerMessage::Event(event.clone()),
            );
        }

        if event.context == EventContext::Battle {
            self.ring.push(event);
        } else {
            self.context.event_bus.publish(event);
        }
    }

    /// Sends a `rejected` message to the requester only.
    fn reject<E: GameError>(
        &self,
        participant: ParticipantId,
        request: &'static str,
        error: &E,
    ) -> Dispatch {
        let code = error.error_code();
        debug!(
            session = %self.session.id,
            %participant,
            request,
            code,
            severity = error.severity().as_str(),
            "Request rejected"
        );
        self.context.transport.send_to(
            self.session.id,
            participant,
            ServerMessage::Rejected {
                request: request.to_string(),
                code: code.to_string(),
                message: error.to_string(),
            },
        );
        Dispatch::Rejected { code }
    }
}
