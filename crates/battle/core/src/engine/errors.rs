//! Errors surfaced by the battle engine.
//!
//! Every variant is a rejection: the engine checks before it mutates, so a
//! returned error means the session is untouched.

use crate::error::{ErrorSeverity, GameError};
use crate::state::{ObstacleId, ParticipantId, Position, UnitId};

// ============================================================================
// Action Errors
// ============================================================================

/// Reasons a participant request is rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActionError {
    #[error("battle has already ended")]
    SessionEnded,

    #[error("{0} is not part of this battle")]
    NotParticipant(ParticipantId),

    #[error("{0} has already left the battle")]
    AlreadyForfeited(ParticipantId),

    #[error("not {participant}'s turn")]
    NotYourTurn {
        participant: ParticipantId,
        holder: Option<ParticipantId>,
    },

    #[error("unit {0} not found")]
    UnitNotFound(UnitId),

    #[error("unit {0} belongs to another participant")]
    NotYourUnit(UnitId),

    #[error("unit {0} is dead")]
    UnitDead(UnitId),

    #[error("unit {0} cannot act while stunned")]
    UnitDisabled(UnitId),

    #[error("unit {0} has no turns left this round")]
    UnitExhausted(UnitId),

    #[error("unit {0} is already acting this turn")]
    AnotherUnitActive(UnitId),

    #[error("unit {0} has not begun its action")]
    UnitNotActive(UnitId),

    #[error("no actions left")]
    NoActionsLeft,

    #[error("move needs {needed} moves, {available} left")]
    InsufficientMoves { needed: u32, available: u32 },

    #[error("spell needs {needed} mana, {available} left")]
    InsufficientMana { needed: u32, available: u32 },

    #[error("position {0} is outside the grid")]
    OutOfBounds(Position),

    #[error("position {0} is occupied")]
    Occupied(Position),

    #[error("position {0} cannot be reached")]
    Unreachable(Position),

    #[error("unit cannot move while grabbed")]
    Immobilized,

    #[error("target at distance {distance} is beyond range {range}")]
    OutOfRange { distance: u32, range: u32 },

    #[error("no unit at {0}")]
    NoTargetAt(Position),

    #[error("obstacle {0} not found")]
    ObstacleNotFound(ObstacleId),

    #[error("target {0} is dead")]
    TargetDead(UnitId),

    #[error("target {0} is on your side")]
    FriendlyTarget(UnitId),

    #[error("target {0} is not an ally")]
    NotAnAlly(UnitId),

    #[error("a unit cannot target itself with this action")]
    SelfTarget,

    #[error("unit is disarmed")]
    Disarmed,

    #[error("unit is already holding {0}")]
    AlreadyGrabbing(UnitId),

    #[error("target {0} is already held")]
    TargetAlreadyGrabbed(UnitId),

    #[error("unit is not holding {0}")]
    NotGrabbing(UnitId),

    #[error("unit is not held")]
    NotGrabbed,
}

impl GameError for ActionError {
    fn severity(&self) -> ErrorSeverity {
        use ActionError::*;
        match self {
            SessionEnded => ErrorSeverity::Fatal,
            NotParticipant(_) | UnitNotFound(_) | NotYourUnit(_) | ObstacleNotFound(_) => {
                ErrorSeverity::Validation
            }
            NotYourTurn { .. } | AnotherUnitActive(_) | UnitNotActive(_) => {
                ErrorSeverity::Recoverable
            }
            UnitDead(_) | AlreadyForfeited(_) | TargetDead(_) => ErrorSeverity::Validation,
            UnitDisabled(_) | UnitExhausted(_) | Immobilized | Disarmed => {
                ErrorSeverity::Recoverable
            }
            NoActionsLeft | InsufficientMoves { .. } | InsufficientMana { .. } => {
                ErrorSeverity::Recoverable
            }
            OutOfBounds(_) | Unreachable(_) | NoTargetAt(_) | SelfTarget => {
                ErrorSeverity::Validation
            }
            Occupied(_) | OutOfRange { .. } => ErrorSeverity::Recoverable,
            FriendlyTarget(_) | NotAnAlly(_) => ErrorSeverity::Validation,
            AlreadyGrabbing(_) | TargetAlreadyGrabbed(_) | NotGrabbing(_) | NotGrabbed => {
                ErrorSeverity::Validation
            }
        }
    }

    fn error_code(&self) -> &'static str {
        use ActionError::*;
        match self {
            SessionEnded => "ACTION_SESSION_ENDED",
            NotParticipant(_) => "ACTION_NOT_PARTICIPANT",
            AlreadyForfeited(_) => "ACTION_ALREADY_FORFEITED",
            NotYourTurn { .. } => "ACTION_NOT_YOUR_TURN",
            UnitNotFound(_) => "ACTION_UNIT_NOT_FOUND",
            NotYourUnit(_) => "ACTION_NOT_YOUR_UNIT",
            UnitDead(_) => "ACTION_UNIT_DEAD",
            UnitDisabled(_) => "ACTION_UNIT_DISABLED",
            UnitExhausted(_) => "ACTION_UNIT_EXHAUSTED",
            AnotherUnitActive(_) => "ACTION_ANOTHER_UNIT_ACTIVE",
            UnitNotActive(_) => "ACTION_UNIT_NOT_ACTIVE",
            NoActionsLeft => "ACTION_NO_ACTIONS_LEFT",
            InsufficientMoves { .. } => "ACTION_INSUFFICIENT_MOVES",
            InsufficientMana { .. } => "ACTION_INSUFFICIENT_MANA",
            OutOfBounds(_) => "ACTION_OUT_OF_BOUNDS",
            Occupied(_) => "ACTION_OCCUPIED",
            Unreachable(_) => "ACTION_UNREACHABLE",
            Immobilized => "ACTION_IMMOBILIZED",
            OutOfRange { .. } => "ACTION_OUT_OF_RANGE",
            NoTargetAt(_) => "ACTION_NO_TARGET",
            ObstacleNotFound(_) => "ACTION_OBSTACLE_NOT_FOUND",
            TargetDead(_) => "ACTION_TARGET_DEAD",
            FriendlyTarget(_) => "ACTION_FRIENDLY_TARGET",
            NotAnAlly(_) => "ACTION_NOT_AN_ALLY",
            SelfTarget => "ACTION_SELF_TARGET",
            Disarmed => "ACTION_DISARMED",
            AlreadyGrabbing(_) => "ACTION_ALREADY_GRABBING",
            TargetAlreadyGrabbed(_) => "ACTION_TARGET_ALREADY_GRABBED",
            NotGrabbing(_) => "ACTION_NOT_GRABBING",
            NotGrabbed => "ACTION_NOT_GRABBED",
        }
    }
}

// ============================================================================
// Turn Errors
// ============================================================================

/// Errors from engine-driven transitions (timer expiry, session end).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TurnError {
    #[error("battle has already ended")]
    AlreadyEnded,

    /// The turn the timer was armed for is no longer current.
    #[error("stale turn timer: armed for turn {armed}, current turn is {current}")]
    StaleTimer { armed: u64, current: u64 },
}

impl GameError for TurnError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AlreadyEnded => ErrorSeverity::Validation,
            Self::StaleTimer { .. } => ErrorSeverity::Recoverable,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::AlreadyEnded => "TURN_ALREADY_ENDED",
            Self::StaleTimer { .. } => "TURN_STALE_TIMER",
        }
    }
}

// ============================================================================
// Setup Errors
// ============================================================================

/// Reasons a battle cannot be started from a setup.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SetupError {
    #[error("grid {width}x{height} is outside 1..={max}")]
    InvalidGrid { width: u32, height: u32, max: u32 },

    #[error("battle needs at least one unit")]
    NoUnits,

    #[error("battle has {count} units, limit is {max}")]
    TooManyUnits { count: usize, max: usize },

    #[error("battle needs at least two participants")]
    NotEnoughParticipants,

    #[error("duplicate unit id {0}")]
    DuplicateUnit(UnitId),

    #[error("duplicate obstacle id {0}")]
    DuplicateObstacle(ObstacleId),

    #[error("unit {0} starts outside the grid")]
    UnitOutOfBounds(UnitId),

    #[error("unit {0} starts dead")]
    DeadUnit(UnitId),

    #[error("two entities start on {0}")]
    PositionConflict(Position),

    #[error("rematch requires an ended battle")]
    NotEnded,
}

impl GameError for SetupError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotEnded => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Validation,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidGrid { .. } => "SETUP_INVALID_GRID",
            Self::NoUnits => "SETUP_NO_UNITS",
            Self::TooManyUnits { .. } => "SETUP_TOO_MANY_UNITS",
            Self::NotEnoughParticipants => "SETUP_NOT_ENOUGH_PARTICIPANTS",
            Self::DuplicateUnit(_) => "SETUP_DUPLICATE_UNIT",
            Self::DuplicateObstacle(_) => "SETUP_DUPLICATE_OBSTACLE",
            Self::UnitOutOfBounds(_) => "SETUP_UNIT_OUT_OF_BOUNDS",
            Self::DeadUnit(_) => "SETUP_DEAD_UNIT",
            Self::PositionConflict(_) => "SETUP_POSITION_CONFLICT",
            Self::NotEnded => "SETUP_NOT_ENDED",
        }
    }
}
