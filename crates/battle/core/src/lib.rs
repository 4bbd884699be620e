//! Deterministic battle rules shared by the session runtime and offline tools.
//!
//! `battle-core` defines the canonical tactical-battle model (sessions, units,
//! conditions), the pure Combat Resolution Engine in [`combat`], and the turn
//! state machine in [`engine::BattleEngine`]. All state mutation flows through
//! the engine; the runtime crate only narrates, schedules, and persists what
//! the engine reports.
pub mod combat;
pub mod config;
pub mod dice;
pub mod engine;
pub mod error;
pub mod state;

pub use combat::{
    AttackResult, DamageBreakdown, DamageType, DodgeRoll, ManeuverDetail, ManeuverKind,
    ManeuverResult, MovePlan, OpposedRoll, PoolRoll, Spell, SpellHit, SpellResult,
};
pub use config::BattleRules;
pub use dice::{Dice, ScriptedDice, SeededDice};
pub use engine::{
    ActionError, BattleAction, BattleEffect, BattleEngine, BattleSetup, ExhaustionBonus,
    SetupError, TurnError, rematch, start_battle,
};
pub use error::{ErrorSeverity, GameError};
pub use state::{
    BattleMode, BattleOutcome, BattleSession, CategoryRules, CombatUnit, Condition,
    ConditionExpiry, ConditionKind, ConditionSet, ConditionTag, CoreStats, EndOfTurnTick, EndReason,
    GridSize, Obstacle, ObstacleId, ParticipantId, Position, Presence, PresenceState, RansomTerms,
    ResourceMeter, SessionId, SessionStatus, TurnBudget, UnitCategory, UnitId,
};
