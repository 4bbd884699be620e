//! Unit actions inside an active turn.
//!
//! Each handler validates first and mutates only after every check passed.
//! Moves spend `moves_left`; everything else spends one action.

use crate::combat::{
    self, DamageType, ManeuverDetail, ManeuverKind, ManeuverResult, Spell, SpellHit, SpellResult,
    attack_pool_size, roll_pool,
};
use crate::state::{
    CombatUnit, ConditionKind, ConditionTag, ObstacleId, ParticipantId, Position, UnitId,
};

use super::{ActionError, BattleAction, BattleEffect, BattleEngine};

impl<'a> BattleEngine<'a> {
    /// Applies one action for the unit currently acting. Never ends the turn.
    pub fn apply(
        &mut self,
        participant: ParticipantId,
        unit: UnitId,
        action: BattleAction,
    ) -> Result<Vec<BattleEffect>, ActionError> {
        self.ensure_active()?;
        self.ensure_turn_holder(participant)?;
        self.ensure_own_living_unit(participant, unit)?;
        if self.session.active_unit != Some(unit) {
            return Err(ActionError::UnitNotActive(unit));
        }

        let mut effects = Vec::new();
        match action {
            BattleAction::Move { to } => self.move_unit(unit, to, &mut effects)?,
            BattleAction::Attack { target } => self.attack(unit, target, &mut effects)?,
            BattleAction::AttackObstacle { obstacle } => {
                self.attack_obstacle(unit, obstacle, &mut effects)?
            }
            BattleAction::Dash => self.dash(unit, &mut effects)?,
            BattleAction::Dodge => self.dodge(unit, &mut effects)?,
            BattleAction::Grab { target } => self.grab(unit, target, &mut effects)?,
            BattleAction::Throw { target, landing } => {
                self.throw(unit, target, landing, &mut effects)?
            }
            BattleAction::Disarm { target } => {
                self.contested(ManeuverKind::Disarm, unit, target, &mut effects)?
            }
            BattleAction::Knockdown { target } => {
                self.contested(ManeuverKind::Knockdown, unit, target, &mut effects)?
            }
            BattleAction::Protect { ally } => self.protect(unit, ally, &mut effects)?,
            BattleAction::Help { ally } => self.help(unit, ally, &mut effects)?,
            BattleAction::Flee => self.flee(unit, &mut effects)?,
            BattleAction::Cast { spell, target } => self.cast(unit, spell, target, &mut effects)?,
        }
        Ok(effects)
    }

    // ========================================================================
    // Shared checks
    // ========================================================================

    fn actor(&self, unit: UnitId) -> Result<&CombatUnit, ActionError> {
        self.session
            .unit(unit)
            .ok_or(ActionError::UnitNotFound(unit))
    }

    fn require_action(&self, unit: UnitId) -> Result<(), ActionError> {
        if self.actor(unit)?.budget.actions_left == 0 {
            return Err(ActionError::NoActionsLeft);
        }
        Ok(())
    }

    fn spend_action(&mut self, unit: UnitId) {
        if let Some(actor) = self.session.unit_mut(unit) {
            actor.budget.actions_left = actor.budget.actions_left.saturating_sub(1);
        }
    }

    /// A living enemy within `range` of `unit`.
    fn enemy_in_range(&self, unit: UnitId, target: UnitId, range: u32) -> Result<(), ActionError> {
        let actor = self.actor(unit)?;
        if unit == target {
            return Err(ActionError::SelfTarget);
        }
        let other = self
            .session
            .unit(target)
            .ok_or(ActionError::UnitNotFound(target))?;
        if !other.alive {
            return Err(ActionError::TargetDead(target));
        }
        if other.owner == actor.owner {
            return Err(ActionError::FriendlyTarget(target));
        }
        let distance = actor.position.distance(other.position);
        if distance > range {
            return Err(ActionError::OutOfRange { distance, range });
        }
        Ok(())
    }

    /// A living ally (another unit of the same owner) within `range` of `unit`.
    fn ally_in_range(&self, unit: UnitId, ally: UnitId, range: u32) -> Result<(), ActionError> {
        let actor = self.actor(unit)?;
        if unit == ally {
            return Err(ActionError::SelfTarget);
        }
        let other = self
            .session
            .unit(ally)
            .ok_or(ActionError::UnitNotFound(ally))?;
        if !other.alive {
            return Err(ActionError::TargetDead(ally));
        }
        if other.owner != actor.owner {
            return Err(ActionError::NotAnAlly(ally));
        }
        let distance = actor.position.distance(other.position);
        if distance > range {
            return Err(ActionError::OutOfRange { distance, range });
        }
        Ok(())
    }

    /// Removes both sides of a grab held by `grabber`. Returns the released unit.
    fn release_grab(&mut self, grabber: UnitId, effects: &mut Vec<BattleEffect>) -> Option<UnitId> {
        let held = self.session.unit_mut(grabber)?.conditions.grabbing()?;
        if let Some(actor) = self.session.unit_mut(grabber) {
            actor.conditions.remove(ConditionTag::Grabbing);
        }
        if let Some(victim) = self.session.unit_mut(held) {
            victim.conditions.remove(ConditionTag::GrabbedBy);
        }
        effects.push(BattleEffect::ConditionChanged {
            unit: grabber,
            condition: ConditionTag::Grabbing,
            applied: false,
        });
        effects.push(BattleEffect::ConditionChanged {
            unit: held,
            condition: ConditionTag::GrabbedBy,
            applied: false,
        });
        Some(held)
    }

    /// Consumes the Helped bonus after an attack or cast.
    fn consume_help(&mut self, unit: UnitId, effects: &mut Vec<BattleEffect>) {
        if let Some(actor) = self.session.unit_mut(unit)
            && actor.conditions.remove(ConditionTag::Helped).is_some()
        {
            effects.push(BattleEffect::ConditionChanged {
                unit,
                condition: ConditionTag::Helped,
                applied: false,
            });
        }
    }

    fn add_condition(&mut self, unit: UnitId, kind: ConditionKind, effects: &mut Vec<BattleEffect>) {
        let own_turn = self.session.active_unit == Some(unit);
        if let Some(target) = self.session.unit_mut(unit) {
            target.conditions.add(kind, own_turn);
            effects.push(BattleEffect::ConditionChanged {
                unit,
                condition: kind.tag(),
                applied: true,
            });
        }
    }

    // ========================================================================
    // Movement
    // ========================================================================

    fn move_unit(
        &mut self,
        unit: UnitId,
        to: Position,
        effects: &mut Vec<BattleEffect>,
    ) -> Result<(), ActionError> {
        let actor = self.actor(unit)?;
        if !self.session.grid.contains(to) {
            return Err(ActionError::OutOfBounds(to));
        }
        if actor.conditions.grabbed_by().is_some() {
            return Err(ActionError::Immobilized);
        }
        if to == actor.position || self.session.is_blocked(to) {
            return Err(ActionError::Occupied(to));
        }

        let plan = combat::plan_move(self.session, actor, to).ok_or(ActionError::Unreachable(to))?;
        let available = actor.budget.moves_left;
        if plan.cost > available {
            return Err(ActionError::InsufficientMoves {
                needed: plan.cost,
                available,
            });
        }

        let released = self.release_grab(unit, effects);
        if let Some(actor) = self.session.unit_mut(unit) {
            actor.position = to;
            actor.budget.moves_left -= plan.cost;
        }
        effects.push(BattleEffect::UnitMoved {
            unit,
            plan,
            released,
        });
        Ok(())
    }

    fn dash(&mut self, unit: UnitId, effects: &mut Vec<BattleEffect>) -> Result<(), ActionError> {
        self.require_action(unit)?;
        self.spend_action(unit);

        let mut moves_gained = 0;
        if let Some(actor) = self.session.unit_mut(unit) {
            moves_gained = actor.effective_mobility();
            actor.budget.moves_left += moves_gained;
        }
        effects.push(BattleEffect::UnitManeuvered(ManeuverResult {
            kind: ManeuverKind::Dash,
            actor: unit,
            target: None,
            success: true,
            detail: ManeuverDetail::Dash { moves_gained },
            target_defeated: false,
        }));
        Ok(())
    }

    // ========================================================================
    // Attacks
    // ========================================================================

    fn attack(
        &mut self,
        unit: UnitId,
        target: UnitId,
        effects: &mut Vec<BattleEffect>,
    ) -> Result<(), ActionError> {
        let actor = self.actor(unit)?;
        if actor.conditions.has(ConditionTag::Disarmed) {
            return Err(ActionError::Disarmed);
        }
        self.enemy_in_range(unit, target, actor.attack_range)?;
        self.require_action(unit)?;

        let (Some(attacker), Some(defender)) = (self.session.unit(unit), self.session.unit(target))
        else {
            return Err(ActionError::UnitNotFound(target));
        };
        let result = combat::resolve_attack(attacker, defender, self.rules, self.dice);

        self.spend_action(unit);
        self.consume_help(unit, effects);
        let mut killed = false;
        if let (Some(damage), Some(defender)) = (result.damage, self.session.unit_mut(target)) {
            killed = combat::apply_breakdown(defender, &damage);
        }

        effects.push(BattleEffect::UnitAttacked(result));
        if killed {
            self.handle_defeat(target, effects);
        }
        Ok(())
    }

    fn attack_obstacle(
        &mut self,
        unit: UnitId,
        obstacle: ObstacleId,
        effects: &mut Vec<BattleEffect>,
    ) -> Result<(), ActionError> {
        let actor = self.actor(unit)?;
        if actor.conditions.has(ConditionTag::Disarmed) {
            return Err(ActionError::Disarmed);
        }
        let target = self
            .session
            .obstacle(obstacle)
            .filter(|o| !o.destroyed)
            .ok_or(ActionError::ObstacleNotFound(obstacle))?;
        let distance = actor.position.distance(target.position);
        if distance > actor.attack_range {
            return Err(ActionError::OutOfRange {
                distance,
                range: actor.attack_range,
            });
        }
        self.require_action(unit)?;

        let size = attack_pool_size(actor.stats.offense, actor, None, self.rules);
        let pool = roll_pool(size, self.rules, self.dice);
        self.spend_action(unit);
        self.consume_help(unit, effects);

        if let Some(target) = self.session.obstacle_mut(obstacle) {
            let damage = target.health.drain(pool.raw_damage);
            target.destroyed = target.health.is_empty();
            effects.push(BattleEffect::ObstacleDamaged {
                attacker: unit,
                obstacle,
                position: target.position,
                damage,
                hp_after: target.health.current,
                destroyed: target.destroyed,
            });
        }
        Ok(())
    }

    // ========================================================================
    // Maneuvers
    // ========================================================================

    fn dodge(&mut self, unit: UnitId, effects: &mut Vec<BattleEffect>) -> Result<(), ActionError> {
        self.require_action(unit)?;
        self.spend_action(unit);
        self.add_condition(unit, ConditionKind::Dodging, effects);
        effects.push(BattleEffect::UnitManeuvered(ManeuverResult {
            kind: ManeuverKind::Dodge,
            actor: unit,
            target: None,
            success: true,
            detail: ManeuverDetail::Stance,
            target_defeated: false,
        }));
        Ok(())
    }

    fn grab(
        &mut self,
        unit: UnitId,
        target: UnitId,
        effects: &mut Vec<BattleEffect>,
    ) -> Result<(), ActionError> {
        self.enemy_in_range(unit, target, 1)?;
        if let Some(held) = self.actor(unit)?.conditions.grabbing() {
            return Err(ActionError::AlreadyGrabbing(held));
        }
        if self.unit_has(target, ConditionTag::GrabbedBy) {
            return Err(ActionError::TargetAlreadyGrabbed(target));
        }
        self.require_action(unit)?;

        let contest = self.contest(ManeuverKind::Grab, unit, target)?;
        self.spend_action(unit);
        let success = contest.succeeded();
        if success {
            self.add_condition(target, ConditionKind::GrabbedBy(unit), effects);
            self.add_condition(unit, ConditionKind::Grabbing(target), effects);
        }
        effects.push(BattleEffect::UnitManeuvered(ManeuverResult {
            kind: ManeuverKind::Grab,
            actor: unit,
            target: Some(target),
            success,
            detail: ManeuverDetail::Contest(contest),
            target_defeated: false,
        }));
        Ok(())
    }

    fn throw(
        &mut self,
        unit: UnitId,
        target: UnitId,
        landing: Position,
        effects: &mut Vec<BattleEffect>,
    ) -> Result<(), ActionError> {
        let actor = self.actor(unit)?;
        if actor.conditions.grabbing() != Some(target) {
            return Err(ActionError::NotGrabbing(target));
        }
        if !self.session.grid.contains(landing) {
            return Err(ActionError::OutOfBounds(landing));
        }
        if self.session.is_blocked(landing) {
            return Err(ActionError::Occupied(landing));
        }
        let range = combat::throw_range(actor);
        let distance = actor.position.distance(landing);
        if distance > range {
            return Err(ActionError::OutOfRange { distance, range });
        }
        self.require_action(unit)?;

        self.spend_action(unit);
        self.release_grab(unit, effects);

        let fall_damage = self.rules.fall_damage;
        let mut outcome = None;
        if let Some(victim) = self.session.unit_mut(target) {
            let from = victim.position;
            victim.position = landing;
            let fall = combat::compute_damage(victim, fall_damage, DamageType::Physical);
            let killed = combat::apply_breakdown(victim, &fall);
            outcome = Some((from, fall, killed));
        }
        let Some((from, fall, killed)) = outcome else {
            return Err(ActionError::UnitNotFound(target));
        };
        if !killed {
            self.add_condition(target, ConditionKind::KnockedDown, effects);
        }

        effects.push(BattleEffect::UnitManeuvered(ManeuverResult {
            kind: ManeuverKind::Throw,
            actor: unit,
            target: Some(target),
            success: true,
            detail: ManeuverDetail::Throw {
                from,
                landing,
                fall,
            },
            target_defeated: killed,
        }));
        if killed {
            self.handle_defeat(target, effects);
        }
        Ok(())
    }

    /// Disarm and knockdown: adjacent enemy, opposed roll, condition on success.
    fn contested(
        &mut self,
        kind: ManeuverKind,
        unit: UnitId,
        target: UnitId,
        effects: &mut Vec<BattleEffect>,
    ) -> Result<(), ActionError> {
        self.enemy_in_range(unit, target, 1)?;
        self.require_action(unit)?;

        let contest = self.contest(kind, unit, target)?;
        self.spend_action(unit);
        let success = contest.succeeded();
        if success {
            let condition = match kind {
                ManeuverKind::Disarm => ConditionKind::Disarmed,
                _ => ConditionKind::KnockedDown,
            };
            self.add_condition(target, condition, effects);
        }
        effects.push(BattleEffect::UnitManeuvered(ManeuverResult {
            kind,
            actor: unit,
            target: Some(target),
            success,
            detail: ManeuverDetail::Contest(contest),
            target_defeated: false,
        }));
        Ok(())
    }

    fn contest(
        &mut self,
        kind: ManeuverKind,
        unit: UnitId,
        opponent: UnitId,
    ) -> Result<combat::OpposedRoll, ActionError> {
        let (Some(actor), Some(other)) = (self.session.unit(unit), self.session.unit(opponent))
        else {
            return Err(ActionError::UnitNotFound(opponent));
        };
        combat::resolve_contest(kind, actor, other, self.rules, self.dice)
            .ok_or(ActionError::UnitNotFound(opponent))
    }

    fn protect(
        &mut self,
        unit: UnitId,
        ally: UnitId,
        effects: &mut Vec<BattleEffect>,
    ) -> Result<(), ActionError> {
        self.ally_in_range(unit, ally, 1)?;
        self.require_action(unit)?;

        let amount = self.actor(unit)?.stats.defense;
        self.spend_action(unit);
        let restored = self
            .session
            .unit_mut(ally)
            .map_or(0, |u| u.physical_protection.restore(amount));

        effects.push(BattleEffect::UnitManeuvered(ManeuverResult {
            kind: ManeuverKind::Protect,
            actor: unit,
            target: Some(ally),
            success: true,
            detail: ManeuverDetail::Protect { restored },
            target_defeated: false,
        }));
        Ok(())
    }

    fn help(&mut self, unit: UnitId, ally: UnitId, effects: &mut Vec<BattleEffect>) -> Result<(), ActionError> {
        self.ally_in_range(unit, ally, 1)?;
        self.require_action(unit)?;

        self.spend_action(unit);
        self.add_condition(ally, ConditionKind::Helped, effects);
        effects.push(BattleEffect::UnitManeuvered(ManeuverResult {
            kind: ManeuverKind::Help,
            actor: unit,
            target: Some(ally),
            success: true,
            detail: ManeuverDetail::Help,
            target_defeated: false,
        }));
        Ok(())
    }

    fn flee(&mut self, unit: UnitId, effects: &mut Vec<BattleEffect>) -> Result<(), ActionError> {
        let grabber = self
            .actor(unit)?
            .conditions
            .grabbed_by()
            .ok_or(ActionError::NotGrabbed)?;
        self.require_action(unit)?;

        let contest = self.contest(ManeuverKind::Flee, unit, grabber)?;
        self.spend_action(unit);
        let success = contest.succeeded();
        let mut moves_gained = 0;
        if success {
            self.release_grab(grabber, effects);
            if let Some(actor) = self.session.unit_mut(unit) {
                moves_gained = 1;
                actor.budget.moves_left += moves_gained;
            }
        }
        effects.push(BattleEffect::UnitManeuvered(ManeuverResult {
            kind: ManeuverKind::Flee,
            actor: unit,
            target: Some(grabber),
            success,
            detail: ManeuverDetail::Flee {
                contest,
                moves_gained,
            },
            target_defeated: false,
        }));
        Ok(())
    }

    // ========================================================================
    // Spells
    // ========================================================================

    fn cast(
        &mut self,
        unit: UnitId,
        spell: Spell,
        center: Position,
        effects: &mut Vec<BattleEffect>,
    ) -> Result<(), ActionError> {
        let caster = self.actor(unit)?;
        if !self.session.grid.contains(center) {
            return Err(ActionError::OutOfBounds(center));
        }
        let range = spell.range();
        let distance = caster.position.distance(center);
        if distance > range {
            return Err(ActionError::OutOfRange { distance, range });
        }
        let needed = spell.mana_cost();
        if caster.mana.current < needed {
            return Err(ActionError::InsufficientMana {
                needed,
                available: caster.mana.current,
            });
        }

        let targets: Vec<UnitId> = match spell {
            Spell::Fireball => self
                .session
                .units
                .iter()
                .filter(|u| u.alive && u.id != unit && u.position.distance(center) <= spell.radius())
                .map(|u| u.id)
                .collect(),
            Spell::Firebolt => {
                let target = self.session.unit_at(center).ok_or(ActionError::NoTargetAt(center))?.id;
                self.enemy_in_range(unit, target, range)?;
                vec![target]
            }
            Spell::Heal | Spell::Barrier => {
                let target = self.session.unit_at(center).ok_or(ActionError::NoTargetAt(center))?.id;
                if target != unit {
                    self.ally_in_range(unit, target, range)?;
                }
                vec![target]
            }
        };
        self.require_action(unit)?;

        self.spend_action(unit);
        if let Some(caster) = self.session.unit_mut(unit) {
            caster.mana.drain(needed);
        }

        let mut result = SpellResult {
            spell,
            caster: unit,
            center,
            mana_spent: needed,
            hits: Vec::with_capacity(targets.len()),
        };
        // Defeats are settled one at a time so the first knockout that decides
        // the battle ends it; narration for them follows the cast itself.
        let mut aftermath = Vec::new();

        match spell {
            Spell::Firebolt | Spell::Fireball => {
                for target in targets {
                    if !self.session.is_active() {
                        break;
                    }
                    let (Some(caster), Some(victim)) =
                        (self.session.unit(unit), self.session.unit(target))
                    else {
                        continue;
                    };
                    let hit = combat::resolve_spell_hit(spell, caster, victim, self.rules, self.dice);
                    if let (Some(damage), Some(victim)) = (hit.damage, self.session.unit_mut(target)) {
                        combat::apply_breakdown(victim, &damage);
                    }
                    if hit.burning {
                        let turns_left = self.rules.burn_turns;
                        self.add_condition(target, ConditionKind::Burning { turns_left }, &mut aftermath);
                    }
                    let defeated = hit.target_defeated;
                    result.hits.push(hit);
                    if defeated {
                        self.handle_defeat(target, &mut aftermath);
                    }
                }
            }
            Spell::Heal => {
                if let Some(&target) = targets.first() {
                    let amount = match self.session.unit(unit) {
                        Some(caster) => combat::heal_amount(caster, self.dice),
                        None => 0,
                    };
                    let healed = self.session.unit_mut(target).map_or(0, |u| u.heal(amount));
                    result.hits.push(SpellHit::healed(target, healed));
                }
            }
            Spell::Barrier => {
                if let Some(&target) = targets.first() {
                    let amount = self.actor(unit)?.stats.focus;
                    let restored = self
                        .session
                        .unit_mut(target)
                        .map_or(0, |u| u.magical_protection.restore(amount));
                    result.hits.push(SpellHit::shielded(target, restored));
                }
            }
        }
        self.consume_help(unit, effects);

        effects.push(BattleEffect::SpellCast(result));
        effects.extend(aftermath);
        Ok(())
    }
}
