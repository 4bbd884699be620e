//! Battle start, defeat handling, forfeits and the end of a battle.

use std::collections::BTreeSet;

use crate::config::BattleRules;
use crate::dice::Dice;
use crate::state::{
    BattleMode, BattleOutcome, BattleSession, CombatUnit, ConditionTag, EndReason, GridSize,
    Obstacle, ParticipantId, PresenceState, RansomTerms, SessionId, SessionStatus, UnitId,
};

use super::{ActionError, BattleEffect, BattleEngine, SetupError, TurnError};

/// Everything needed to start a battle.
#[derive(Clone, Debug)]
pub struct BattleSetup {
    pub id: SessionId,
    pub grid: GridSize,
    pub mode: BattleMode,
    pub units: Vec<CombatUnit>,
    pub obstacles: Vec<Obstacle>,
    pub ransom: Option<RansomTerms>,
}

impl BattleSetup {
    fn validate(&self) -> Result<(), SetupError> {
        let max = BattleRules::MAX_GRID_SIDE;
        let GridSize { width, height } = self.grid;
        if width == 0 || height == 0 || width > max || height > max {
            return Err(SetupError::InvalidGrid { width, height, max });
        }
        if self.units.is_empty() {
            return Err(SetupError::NoUnits);
        }
        if self.units.len() > BattleRules::MAX_UNITS {
            return Err(SetupError::TooManyUnits {
                count: self.units.len(),
                max: BattleRules::MAX_UNITS,
            });
        }

        let owners: BTreeSet<ParticipantId> = self.units.iter().map(|u| u.owner).collect();
        if owners.len() < 2 {
            return Err(SetupError::NotEnoughParticipants);
        }

        let mut unit_ids = BTreeSet::new();
        let mut occupied = BTreeSet::new();
        for unit in &self.units {
            if !unit_ids.insert(unit.id) {
                return Err(SetupError::DuplicateUnit(unit.id));
            }
            if !unit.alive {
                return Err(SetupError::DeadUnit(unit.id));
            }
            if !self.grid.contains(unit.position) {
                return Err(SetupError::UnitOutOfBounds(unit.id));
            }
            if !occupied.insert(unit.position) {
                return Err(SetupError::PositionConflict(unit.position));
            }
        }

        let mut obstacle_ids = BTreeSet::new();
        for obstacle in &self.obstacles {
            if !obstacle_ids.insert(obstacle.id) {
                return Err(SetupError::DuplicateObstacle(obstacle.id));
            }
            if !obstacle.destroyed && !occupied.insert(obstacle.position) {
                return Err(SetupError::PositionConflict(obstacle.position));
            }
        }
        Ok(())
    }
}

/// Rolls initiative and builds the initial session.
///
/// Each unit rolls `d(initiative_die) + mobility + focus / 2`. Units are
/// ordered by roll, highest first, ties going to the lower unit id; the action
/// order lists participants by the first appearance of one of their units.
pub fn start_battle(
    setup: BattleSetup,
    rules: &BattleRules,
    dice: &mut dyn Dice,
) -> Result<(BattleSession, Vec<BattleEffect>), SetupError> {
    setup.validate()?;

    let mut initiative: Vec<(UnitId, u32)> = setup
        .units
        .iter()
        .map(|unit| {
            let roll = dice.roll_die(rules.initiative_die);
            (unit.id, roll + unit.stats.mobility + unit.stats.focus / 2)
        })
        .collect();
    initiative.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut order = Vec::new();
    for (id, _) in &initiative {
        let owner = setup.units.iter().find(|u| u.id == *id).map(|u| u.owner);
        if let Some(owner) = owner
            && !order.contains(&owner)
        {
            order.push(owner);
        }
    }

    let mut participants: Vec<ParticipantId> = Vec::new();
    for unit in &setup.units {
        if !participants.contains(&unit.owner) {
            participants.push(unit.owner);
        }
    }

    let mut units = setup.units;
    for unit in &mut units {
        unit.start_position = unit.position;
        unit.began_action = false;
        unit.budget = Default::default();
    }

    let session = BattleSession {
        id: setup.id,
        grid: setup.grid,
        mode: setup.mode,
        round: 1,
        current_turn_index: 0,
        action_order: order.clone(),
        participants,
        forfeited: BTreeSet::new(),
        status: SessionStatus::Active,
        outcome: None,
        ransom: setup.ransom,
        units,
        obstacles: setup.obstacles,
        active_unit: None,
        turn_serial: 1,
        turn_timer_remaining_ms: None,
        presence: PresenceState::default(),
    };

    Ok((
        session,
        vec![BattleEffect::BattleStarted { order, initiative }],
    ))
}

/// Starts a fresh battle from an ended one's roster.
///
/// Units come back with full resources at their starting positions.
pub fn rematch(
    previous: &BattleSession,
    id: SessionId,
    rules: &BattleRules,
    dice: &mut dyn Dice,
) -> Result<(BattleSession, Vec<BattleEffect>), SetupError> {
    if previous.is_active() {
        return Err(SetupError::NotEnded);
    }

    let setup = BattleSetup {
        id,
        grid: previous.grid,
        mode: previous.mode,
        units: previous.units.iter().map(CombatUnit::fresh_copy).collect(),
        obstacles: previous
            .obstacles
            .iter()
            .map(|o| Obstacle::new(o.id, o.position, o.health.maximum))
            .collect(),
        ransom: previous.ransom,
    };
    start_battle(setup, rules, dice)
}

impl<'a> BattleEngine<'a> {
    /// Records a unit's death: releases grabs on both sides and checks victory.
    pub(super) fn handle_defeat(&mut self, unit: UnitId, effects: &mut Vec<BattleEffect>) {
        let Some(fallen) = self.session.unit_mut(unit) else {
            return;
        };
        let owner = fallen.owner;
        let held = fallen.conditions.grabbing();
        let holder = fallen.conditions.grabbed_by();
        fallen.conditions.clear();

        if let Some(other) = held.and_then(|id| self.session.unit_mut(id))
            && other.conditions.remove(ConditionTag::GrabbedBy).is_some()
        {
            effects.push(BattleEffect::ConditionChanged {
                unit: other.id,
                condition: ConditionTag::GrabbedBy,
                applied: false,
            });
        }
        if let Some(other) = holder.and_then(|id| self.session.unit_mut(id))
            && other.conditions.remove(ConditionTag::Grabbing).is_some()
        {
            effects.push(BattleEffect::ConditionChanged {
                unit: other.id,
                condition: ConditionTag::Grabbing,
                applied: false,
            });
        }
        if self.session.active_unit == Some(unit) {
            self.session.active_unit = None;
        }

        effects.push(BattleEffect::UnitDefeated { unit, owner });
        self.check_victory(EndReason::Elimination, effects);
    }

    /// Ends the battle when at most one contending participant has living units.
    pub(super) fn check_victory(&mut self, reason: EndReason, effects: &mut Vec<BattleEffect>) {
        if !self.session.is_active() {
            return;
        }
        let standing = self.session.standing_participants();
        let outcome = match standing.as_slice() {
            [] => BattleOutcome {
                winner: None,
                reason: EndReason::Draw,
            },
            [winner] => BattleOutcome {
                winner: Some(*winner),
                reason,
            },
            _ => return,
        };
        self.close(outcome, effects);
    }

    fn close(&mut self, outcome: BattleOutcome, effects: &mut Vec<BattleEffect>) {
        self.session.status = SessionStatus::Ended;
        self.session.outcome = Some(outcome);
        self.session.active_unit = None;
        self.session.turn_timer_remaining_ms = None;
        for unit in &mut self.session.units {
            unit.budget = Default::default();
            unit.began_action = false;
        }

        effects.push(BattleEffect::BattleEnded(outcome));
    }

    /// Ends the battle with an explicit outcome. Rejected once already ended.
    pub fn end_session(
        &mut self,
        winner: Option<ParticipantId>,
        reason: EndReason,
    ) -> Result<Vec<BattleEffect>, TurnError> {
        if !self.session.is_active() {
            return Err(TurnError::AlreadyEnded);
        }
        let mut effects = Vec::new();
        self.close(BattleOutcome { winner, reason }, &mut effects);
        Ok(effects)
    }

    /// A participant surrenders or leaves.
    ///
    /// The participant is removed from the action order. If one side remains
    /// it wins with `reason`; if none remains the battle is a draw; otherwise
    /// play continues and, if the leaver held the turn, control passes on.
    pub fn forfeit(
        &mut self,
        participant: ParticipantId,
        reason: EndReason,
    ) -> Result<Vec<BattleEffect>, ActionError> {
        self.ensure_active()?;
        if !self.session.participants.contains(&participant) {
            return Err(ActionError::NotParticipant(participant));
        }
        if !self.session.forfeited.insert(participant) {
            return Err(ActionError::AlreadyForfeited(participant));
        }

        let mut effects = vec![BattleEffect::ParticipantForfeited {
            participant,
            reason,
        }];

        let mut held_turn = false;
        if let Some(index) = self
            .session
            .action_order
            .iter()
            .position(|&p| p == participant)
        {
            held_turn = index == self.session.current_turn_index;
            self.session.action_order.remove(index);
            let len = self.session.action_order.len();
            if len > 0 && (index < self.session.current_turn_index || held_turn) {
                // Step back so the advance below lands on the leaver's successor.
                self.session.current_turn_index = (self.session.current_turn_index + len - 1) % len;
            } else if len == 0 {
                self.session.current_turn_index = 0;
            }
        }

        self.check_victory(reason, &mut effects);
        if self.session.is_active() && held_turn {
            if let Some(active) = self.session.active_unit.take()
                && let Some(unit) = self.session.unit_mut(active)
            {
                unit.budget = Default::default();
                unit.began_action = false;
            }
            self.advance_turn(&mut effects);
        }

        Ok(effects)
    }
}
