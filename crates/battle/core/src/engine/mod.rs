//! Battle session state machine.
//!
//! [`BattleEngine`] is the authoritative reducer for one [`BattleSession`].
//! Every request is checked against the session before anything changes, so
//! a rejected request leaves the session untouched and never advances the
//! turn. Accepted requests return the [`BattleEffect`]s they produced, in the
//! order they happened, for the runtime to narrate.

mod actions;
mod errors;
mod lifecycle;
mod turns;

pub use errors::{ActionError, SetupError, TurnError};
pub use lifecycle::{BattleSetup, rematch, start_battle};

use crate::combat::{AttackResult, ManeuverResult, MovePlan, Spell, SpellResult};
use crate::config::BattleRules;
use crate::dice::Dice;
use crate::state::{
    BattleOutcome, BattleSession, ConditionTag, EndReason, ObstacleId, ParticipantId, Position,
    TurnBudget, UnitId,
};

/// A unit action inside an active turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BattleAction {
    Move { to: Position },
    Attack { target: UnitId },
    AttackObstacle { obstacle: ObstacleId },
    Dash,
    Dodge,
    Grab { target: UnitId },
    Throw { target: UnitId, landing: Position },
    Disarm { target: UnitId },
    Knockdown { target: UnitId },
    Protect { ally: UnitId },
    Help { ally: UnitId },
    Flee,
    Cast { spell: Spell, target: Position },
}

/// HP paid for an Arena exhaustion bonus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExhaustionBonus {
    pub hp_cost: u32,
    pub hp_after: u32,
    pub died: bool,
}

/// A state change reported by the engine.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BattleEffect {
    BattleStarted {
        order: Vec<ParticipantId>,
        initiative: Vec<(UnitId, u32)>,
    },
    ActionStarted {
        participant: ParticipantId,
        unit: UnitId,
        budget: TurnBudget,
        exhaustion: Option<ExhaustionBonus>,
        /// True when the unit had already begun and budgets were left as is.
        resumed: bool,
    },
    UnitMoved {
        unit: UnitId,
        plan: MovePlan,
        released: Option<UnitId>,
    },
    UnitAttacked(AttackResult),
    ObstacleDamaged {
        attacker: UnitId,
        obstacle: ObstacleId,
        position: Position,
        damage: u32,
        hp_after: u32,
        destroyed: bool,
    },
    UnitManeuvered(ManeuverResult),
    SpellCast(SpellResult),
    ConditionChanged {
        unit: UnitId,
        condition: ConditionTag,
        applied: bool,
    },
    UnitDefeated {
        unit: UnitId,
        owner: ParticipantId,
    },
    UnitTurnEnded {
        participant: ParticipantId,
        unit: UnitId,
        action_marks: u8,
        burn_damage: u32,
        timed_out: bool,
    },
    NextPlayer {
        participant: ParticipantId,
        turn_serial: u64,
    },
    NewRound {
        round: u32,
    },
    ParticipantForfeited {
        participant: ParticipantId,
        reason: EndReason,
    },
    BattleEnded(BattleOutcome),
}

/// Drives one battle through its turn, round and action transitions.
pub struct BattleEngine<'a> {
    session: &'a mut BattleSession,
    rules: &'a BattleRules,
    dice: &'a mut dyn Dice,
}

impl<'a> BattleEngine<'a> {
    pub fn new(session: &'a mut BattleSession, rules: &'a BattleRules, dice: &'a mut dyn Dice) -> Self {
        Self {
            session,
            rules,
            dice,
        }
    }

    pub fn session(&self) -> &BattleSession {
        self.session
    }

    pub fn rules(&self) -> &BattleRules {
        self.rules
    }
}
