mod common;
mod condition;
mod session;
mod unit;

pub use common::{ObstacleId, ParticipantId, Position, ResourceMeter, SessionId, UnitId};
pub use condition::{
    Condition, ConditionExpiry, ConditionKind, ConditionSet, ConditionTag, EndOfTurnTick,
};
pub use session::{
    BattleMode, BattleOutcome, BattleSession, EndReason, GridSize, Obstacle, Presence,
    PresenceState, RansomTerms, SessionStatus,
};
pub use unit::{CategoryRules, CombatUnit, CoreStats, TurnBudget, UnitCategory};
