//! Unified error types surfaced by the runtime API.
//!
//! Wraps failures from worker coordination, repositories, and battle setup
//! so clients can bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use battle_core::{ErrorSeverity, GameError, ParticipantId, SessionId, SetupError};

pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("{0} is not a live session")]
    SessionNotFound(SessionId),

    #[error("session worker command channel closed")]
    CommandChannelClosed,

    #[error("session worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// The durable store could not be read at startup.
    #[error("battle store unavailable at startup")]
    StoreUnavailable(#[source] RepositoryError),

    #[error("invalid battle setup")]
    Setup(#[from] SetupError),
}

/// Requests the session worker refuses on its own, outside the engine rules.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionRequestError {
    #[error("{0} is not part of this battle")]
    NotParticipant(ParticipantId),

    #[error("a rematch can only be requested once the battle has ended")]
    RematchBattleActive,

    #[error("{0} already asked for a rematch")]
    RematchAlreadyRequested(ParticipantId),

    #[error("rematch already started as {0}")]
    RematchAlreadyStarted(SessionId),
}

impl GameError for SessionRequestError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotParticipant(_) => ErrorSeverity::Validation,
            Self::RematchBattleActive => ErrorSeverity::Recoverable,
            Self::RematchAlreadyRequested(_) | Self::RematchAlreadyStarted(_) => {
                ErrorSeverity::Validation
            }
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::NotParticipant(_) => "SESSION_NOT_PARTICIPANT",
            Self::RematchBattleActive => "REMATCH_BATTLE_ACTIVE",
            Self::RematchAlreadyRequested(_) => "REMATCH_ALREADY_REQUESTED",
            Self::RematchAlreadyStarted(_) => "REMATCH_ALREADY_STARTED",
        }
    }
}
