//! Turn, round and action-economy transitions.

use crate::state::{BattleMode, ConditionTag, ParticipantId, TurnBudget, UnitId};

use super::{ActionError, BattleEffect, BattleEngine, ExhaustionBonus, TurnError};

impl<'a> BattleEngine<'a> {
    pub(super) fn ensure_active(&self) -> Result<(), ActionError> {
        if self.session.is_active() {
            Ok(())
        } else {
            Err(ActionError::SessionEnded)
        }
    }

    pub(super) fn ensure_turn_holder(&self, participant: ParticipantId) -> Result<(), ActionError> {
        let holder = self.session.turn_holder();
        if holder == Some(participant) {
            Ok(())
        } else {
            Err(ActionError::NotYourTurn {
                participant,
                holder,
            })
        }
    }

    /// Checks that `unit` exists, belongs to `participant` and is alive.
    pub(super) fn ensure_own_living_unit(
        &self,
        participant: ParticipantId,
        unit: UnitId,
    ) -> Result<(), ActionError> {
        let found = self
            .session
            .unit(unit)
            .ok_or(ActionError::UnitNotFound(unit))?;
        if found.owner != participant {
            return Err(ActionError::NotYourUnit(unit));
        }
        if !found.alive {
            return Err(ActionError::UnitDead(unit));
        }
        Ok(())
    }

    /// Starts `unit`'s action for the current turn and grants its budgets.
    ///
    /// A repeated call for the unit that is already acting returns the current
    /// budgets unchanged. In Arena mode an exhausted unit pays HP for a bonus
    /// pair of actions instead of being rejected, and may die doing so.
    pub fn begin_action(
        &mut self,
        participant: ParticipantId,
        unit: UnitId,
    ) -> Result<Vec<BattleEffect>, ActionError> {
        self.ensure_active()?;
        self.ensure_turn_holder(participant)?;
        self.ensure_own_living_unit(participant, unit)?;

        match self.session.active_unit {
            Some(active) if active == unit => {
                let budget = self.session.unit(unit).map(|u| u.budget).unwrap_or_default();
                return Ok(vec![BattleEffect::ActionStarted {
                    participant,
                    unit,
                    budget,
                    exhaustion: None,
                    resumed: true,
                }]);
            }
            Some(active) => return Err(ActionError::AnotherUnitActive(active)),
            None => {}
        }

        let rules = self.rules;
        let mode = self.session.mode;
        let acting = self
            .session
            .unit_mut(unit)
            .ok_or(ActionError::UnitNotFound(unit))?;

        if acting.conditions.blocks_action() {
            return Err(ActionError::UnitDisabled(unit));
        }

        let mut exhaustion = None;
        let actions = if acting.is_exhausted() {
            if mode != BattleMode::Arena {
                return Err(ActionError::UnitExhausted(unit));
            }
            let died = acting.lose_hp(rules.exhaustion_hp_cost);
            acting.action_marks = 0;
            exhaustion = Some(ExhaustionBonus {
                hp_cost: rules.exhaustion_hp_cost,
                hp_after: acting.health.current,
                died,
            });
            rules.exhaustion_actions
        } else {
            1
        };

        let mut effects = Vec::new();
        if exhaustion.is_some_and(|bonus| bonus.died) {
            effects.push(BattleEffect::ActionStarted {
                participant,
                unit,
                budget: TurnBudget::default(),
                exhaustion,
                resumed: false,
            });
            self.handle_defeat(unit, &mut effects);
            if self.session.is_active() && self.session.living_units_of(participant).next().is_none() {
                self.advance_turn(&mut effects);
            }
            return Ok(effects);
        }

        acting.budget = TurnBudget {
            moves_left: acting.effective_mobility(),
            actions_left: actions,
        };
        acting.began_action = true;
        let budget = acting.budget;
        self.session.active_unit = Some(unit);

        effects.push(BattleEffect::ActionStarted {
            participant,
            unit,
            budget,
            exhaustion,
            resumed: false,
        });
        Ok(effects)
    }

    /// Ends `unit`'s turn on request of its owner and passes control on.
    ///
    /// Allowed without a prior `begin_action`, which amounts to passing. In
    /// Standard mode an exhausted unit cannot pass, since that would spend the
    /// turn without marking anything.
    pub fn end_unit_turn(
        &mut self,
        participant: ParticipantId,
        unit: UnitId,
    ) -> Result<Vec<BattleEffect>, ActionError> {
        self.ensure_active()?;
        self.ensure_turn_holder(participant)?;
        self.ensure_own_living_unit(participant, unit)?;
        match self.session.active_unit {
            Some(active) if active != unit => return Err(ActionError::AnotherUnitActive(active)),
            Some(_) => {}
            None => {
                let exhausted = self.session.unit(unit).is_some_and(|u| u.is_exhausted());
                if exhausted && self.session.mode != BattleMode::Arena {
                    return Err(ActionError::UnitExhausted(unit));
                }
            }
        }

        let mut effects = Vec::new();
        self.finish_unit_turn(participant, Some(unit), false, &mut effects);
        Ok(effects)
    }

    /// Turn timer expiry for the turn identified by `turn_serial`.
    ///
    /// Ends the active unit's turn exactly as an `end_unit_turn` would. When no
    /// unit began acting, the holder's first unexhausted living unit takes the
    /// mark (in Arena mode any living unit if all are exhausted). Expiries
    /// armed for an earlier turn are rejected as stale.
    pub fn expire_turn(&mut self, turn_serial: u64) -> Result<Vec<BattleEffect>, TurnError> {
        if !self.session.is_active() {
            return Err(TurnError::AlreadyEnded);
        }
        if turn_serial != self.session.turn_serial {
            return Err(TurnError::StaleTimer {
                armed: turn_serial,
                current: self.session.turn_serial,
            });
        }

        let mut effects = Vec::new();
        let Some(holder) = self.session.turn_holder() else {
            return Ok(effects);
        };
        let unit = self
            .session
            .active_unit
            .or_else(|| self.idle_unit(holder));

        self.finish_unit_turn(holder, unit, true, &mut effects);
        Ok(effects)
    }

    /// Unit charged with a turn that passed without anyone acting.
    fn idle_unit(&self, participant: ParticipantId) -> Option<UnitId> {
        let fresh = self
            .session
            .living_units_of(participant)
            .find(|u| !u.is_exhausted());
        match fresh {
            Some(unit) => Some(unit.id),
            None if self.session.mode == BattleMode::Arena => {
                self.session.living_units_of(participant).next().map(|u| u.id)
            }
            None => None,
        }
    }

    /// Applies end-of-turn effects to `unit` (if any) and advances the turn.
    pub(super) fn finish_unit_turn(
        &mut self,
        participant: ParticipantId,
        unit: Option<UnitId>,
        timed_out: bool,
        effects: &mut Vec<BattleEffect>,
    ) {
        let burn_damage = self.rules.burn_damage;
        let mut killed = false;

        if let Some(id) = unit
            && let Some(acting) = self.session.unit_mut(id)
        {
            let tick = acting.conditions.tick_end_of_turn(burn_damage);
            if tick.burn_damage > 0 {
                killed = acting.lose_hp(tick.burn_damage);
            }
            acting.action_marks = (acting.action_marks + 1).min(acting.max_action_marks());
            acting.budget = TurnBudget::default();
            acting.began_action = false;
            let action_marks = acting.action_marks;

            for condition in tick.expired {
                effects.push(BattleEffect::ConditionChanged {
                    unit: id,
                    condition,
                    applied: false,
                });
            }
            effects.push(BattleEffect::UnitTurnEnded {
                participant,
                unit: id,
                action_marks,
                burn_damage: tick.burn_damage,
                timed_out,
            });
        }
        self.session.active_unit = None;

        if killed && let Some(id) = unit {
            self.handle_defeat(id, effects);
        }
        if self.session.is_active() {
            self.advance_turn(effects);
        }
    }

    /// True when `participant` has a unit that may begin an action now.
    fn can_take_turn(&self, participant: ParticipantId) -> bool {
        let arena = self.session.mode == BattleMode::Arena;
        self.session
            .living_units_of(participant)
            .any(|u| arena || !u.is_exhausted())
    }

    /// Starts a new round once every contending unit is exhausted.
    fn check_round(&mut self, effects: &mut Vec<BattleEffect>) {
        let all_exhausted = self.session.contending_units().all(|u| u.is_exhausted());
        if !all_exhausted || self.session.contending_units().next().is_none() {
            return;
        }

        self.session.round += 1;
        let round = self.session.round;
        for unit in self.session.units.iter_mut().filter(|u| u.alive) {
            unit.action_marks = 0;
            for condition in unit.conditions.clear_end_of_round() {
                effects.push(BattleEffect::ConditionChanged {
                    unit: unit.id,
                    condition,
                    applied: false,
                });
            }
        }

        effects.push(BattleEffect::NewRound { round });
    }

    /// Moves the turn to the next participant who can act.
    ///
    /// The round check runs first so that a fresh round makes everyone
    /// eligible again. Participants without living units, and in Standard mode
    /// those whose living units are all exhausted, are skipped.
    pub(super) fn advance_turn(&mut self, effects: &mut Vec<BattleEffect>) {
        let len = self.session.action_order.len();
        if len == 0 {
            return;
        }

        self.check_round(effects);

        let start = self.session.current_turn_index % len;
        let next = (1..=len)
            .map(|offset| (start + offset) % len)
            .find(|&index| self.can_take_turn(self.session.action_order[index]))
            .unwrap_or((start + 1) % len);

        self.session.current_turn_index = next;
        self.session.turn_serial += 1;
        self.session.active_unit = None;

        let participant = self.session.action_order[next];
        effects.push(BattleEffect::NextPlayer {
            participant,
            turn_serial: self.session.turn_serial,
        });
    }

    /// True when `unit` carries `tag`.
    pub(super) fn unit_has(&self, unit: UnitId, tag: ConditionTag) -> bool {
        self.session
            .unit(unit)
            .is_some_and(|u| u.conditions.has(tag))
    }
}
