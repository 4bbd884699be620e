//! Push side of the client connection.
//!
//! Sessions never talk to sockets. They hand each outgoing message to a
//! [`Transport`] addressed by participant, and the transport decides how (or
//! whether) it reaches a live connection.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;

use battle_core::{ParticipantId, SessionId};

use super::messages::ServerMessage;

/// Trait for delivering server messages to connected participants.
///
/// Different implementations can handle:
/// - WebSocket or TCP connections
/// - In-process channels (binary wiring, tests)
/// - Fan-out to several devices of one account
pub trait Transport: Send + Sync {
    /// Deliver `message` from `session` to `participant`. Best effort: a
    /// participant without a live connection simply misses it.
    fn send_to(&self, session: SessionId, participant: ParticipantId, message: ServerMessage);
}

/// A message as received by a [`ChannelTransport`] subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub session: SessionId,
    pub message: ServerMessage,
}

/// In-process transport backed by one unbounded channel per participant.
#[derive(Default)]
pub struct ChannelTransport {
    clients: RwLock<HashMap<ParticipantId, mpsc::UnboundedSender<Outbound>>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens (or replaces) the delivery channel for `participant`.
    pub fn register(&self, participant: ParticipantId) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(participant, tx);
        rx
    }

    /// Closes the channel for `participant`. Returns false if none was open.
    pub fn unregister(&self, participant: ParticipantId) -> bool {
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&participant)
            .is_some()
    }

    pub fn is_registered(&self, participant: ParticipantId) -> bool {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&participant)
    }
}

impl Transport for ChannelTransport {
    fn send_to(&self, session: SessionId, participant: ParticipantId, message: ServerMessage) {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = clients.get(&participant) else {
            tracing::trace!(%session, %participant, "No channel registered, message dropped");
            return;
        };
        if tx.send(Outbound { session, message }).is_err() {
            tracing::debug!(%session, %participant, "Receiver dropped, message lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected() -> ServerMessage {
        ServerMessage::Rejected {
            request: "dash".into(),
            code: "ACTION_NO_ACTIONS_LEFT".into(),
            message: "no actions left".into(),
        }
    }

    #[test]
    fn delivers_only_to_the_addressed_participant() {
        let transport = ChannelTransport::new();
        let mut first = transport.register(ParticipantId(1));
        let mut second = transport.register(ParticipantId(2));

        transport.send_to(SessionId(9), ParticipantId(2), rejected());

        assert!(first.try_recv().is_err());
        let outbound = second.try_recv().unwrap();
        assert_eq!(outbound.session, SessionId(9));
        assert_eq!(outbound.message, rejected());
    }

    #[test]
    fn unregistered_participants_are_skipped() {
        let transport = ChannelTransport::new();
        let _rx = transport.register(ParticipantId(1));
        assert!(transport.unregister(ParticipantId(1)));
        assert!(!transport.is_registered(ParticipantId(1)));
        transport.send_to(SessionId(1), ParticipantId(1), rejected());
    }
}
