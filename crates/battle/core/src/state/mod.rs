//! Battle state model.
//!
//! [`BattleSession`] is the single owner of one battle's mutable state. It
//! holds its units and obstacles by value; everything else refers to them by id.
mod types;

pub use types::{
    BattleMode, BattleOutcome, BattleSession, CategoryRules, CombatUnit, Condition,
    ConditionExpiry, ConditionKind, ConditionSet, ConditionTag, CoreStats, EndOfTurnTick, EndReason,
    GridSize, Obstacle, ObstacleId, ParticipantId, Position, Presence, PresenceState, RansomTerms,
    ResourceMeter, SessionId, SessionStatus, TurnBudget, UnitCategory, UnitId,
};
