//! Combat units and the per-category rule table.

use crate::combat::DamageType;
use crate::config::BattleRules;
use crate::state::{ConditionSet, ConditionTag, ParticipantId, Position, ResourceMeter, UnitId};

/// Unit category. Budgets and caps differ per category through [`CategoryRules`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum UnitCategory {
    /// Regular troop.
    Troop,
    /// Named hero.
    Hero,
    /// Regent-leader of a realm.
    Regent,
}

/// Static per-category parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CategoryRules {
    /// Turns a unit may take per round before it is exhausted.
    pub max_action_marks: u8,
    pub base_hp: u32,
    pub hp_per_vitality: u32,
    /// Chebyshev radius the unit sees for fog-of-war.
    pub vision_range: u32,
}

impl UnitCategory {
    pub const fn rules(self) -> CategoryRules {
        match self {
            Self::Troop => CategoryRules {
                max_action_marks: 1,
                base_hp: 10,
                hp_per_vitality: 2,
                vision_range: 4,
            },
            Self::Hero => CategoryRules {
                max_action_marks: 2,
                base_hp: 16,
                hp_per_vitality: 3,
                vision_range: 5,
            },
            Self::Regent => CategoryRules {
                max_action_marks: 3,
                base_hp: 20,
                hp_per_vitality: 3,
                vision_range: 6,
            },
        }
    }
}

/// Core stats of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoreStats {
    pub offense: u32,
    pub mobility: u32,
    pub focus: u32,
    pub defense: u32,
    pub vitality: u32,
}

/// Moves and actions remaining in the current turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TurnBudget {
    pub moves_left: u32,
    pub actions_left: u32,
}

/// A unit on the battle grid.
///
/// Health invariant: `alive == (health.current > 0)` after every mutation that
/// goes through [`CombatUnit::lose_hp`]; a dead unit is never revived.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CombatUnit {
    pub id: UnitId,
    pub owner: ParticipantId,
    pub name: String,
    pub category: UnitCategory,
    pub level: u32,
    pub stats: CoreStats,
    pub health: ResourceMeter,
    pub physical_protection: ResourceMeter,
    pub magical_protection: ResourceMeter,
    pub mana: ResourceMeter,
    pub position: Position,
    /// Where the unit stood when the battle started (used for rematches).
    pub start_position: Position,
    pub attack_range: u32,
    pub budget: TurnBudget,
    pub action_marks: u8,
    pub alive: bool,
    pub conditions: ConditionSet,
    /// Set once `begin_action` granted budgets this turn.
    pub began_action: bool,
}

impl CombatUnit {
    /// Creates a unit with resources derived from its category and stats.
    pub fn new(
        id: UnitId,
        owner: ParticipantId,
        name: impl Into<String>,
        category: UnitCategory,
        level: u32,
        stats: CoreStats,
        position: Position,
    ) -> Self {
        let rules = category.rules();
        let max_hp = rules.base_hp + stats.vitality * rules.hp_per_vitality;

        Self {
            id,
            owner,
            name: name.into(),
            category,
            level,
            stats,
            health: ResourceMeter::full(max_hp),
            physical_protection: ResourceMeter::full(stats.defense),
            magical_protection: ResourceMeter::full(stats.focus / 2),
            mana: ResourceMeter::full(stats.focus * 3),
            position,
            start_position: position,
            attack_range: 1,
            budget: TurnBudget::default(),
            action_marks: 0,
            alive: max_hp > 0,
            conditions: ConditionSet::new(),
            began_action: false,
        }
    }

    pub fn with_health(mut self, current: u32, maximum: u32) -> Self {
        self.health = ResourceMeter::new(current, maximum);
        self.alive = self.health.current > 0;
        self
    }

    pub fn with_physical_protection(mut self, current: u32, maximum: u32) -> Self {
        self.physical_protection = ResourceMeter::new(current, maximum);
        self
    }

    pub fn with_magical_protection(mut self, current: u32, maximum: u32) -> Self {
        self.magical_protection = ResourceMeter::new(current, maximum);
        self
    }

    pub fn with_mana(mut self, current: u32, maximum: u32) -> Self {
        self.mana = ResourceMeter::new(current, maximum);
        self
    }

    pub fn with_attack_range(mut self, range: u32) -> Self {
        self.attack_range = range.max(1);
        self
    }

    pub fn with_action_marks(mut self, marks: u8) -> Self {
        self.action_marks = marks.min(self.max_action_marks());
        self
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn max_action_marks(&self) -> u8 {
        self.category.rules().max_action_marks
    }

    /// True once the unit has used all its turns for this round.
    pub fn is_exhausted(&self) -> bool {
        self.action_marks >= self.max_action_marks()
    }

    pub fn vision_range(&self) -> u32 {
        self.category.rules().vision_range
    }

    /// Mobility after condition penalties.
    pub fn effective_mobility(&self) -> u32 {
        if self.conditions.has(ConditionTag::GrabbedBy) {
            return 0;
        }
        if self.conditions.has(ConditionTag::KnockedDown) {
            return self.stats.mobility / 2;
        }
        self.stats.mobility
    }

    /// Chance (percent) to dodge an incoming attack.
    pub fn dodge_chance(&self, rules: &BattleRules) -> u32 {
        if self.conditions.has(ConditionTag::KnockedDown)
            || self.conditions.has(ConditionTag::GrabbedBy)
        {
            return 0;
        }
        let mut chance = self.stats.mobility * rules.dodge_per_mobility;
        if self.conditions.has(ConditionTag::Dodging) {
            chance += rules.dodge_stance_bonus;
        }
        chance.min(rules.dodge_cap)
    }

    /// Flat damage reduction applied after the protection pool.
    pub fn flat_reduction(&self, damage_type: DamageType) -> u32 {
        match damage_type {
            DamageType::Physical => self.stats.defense / 2,
            DamageType::Magical => self.stats.focus / 2,
        }
    }

    pub fn protection(&self, damage_type: DamageType) -> &ResourceMeter {
        match damage_type {
            DamageType::Physical => &self.physical_protection,
            DamageType::Magical => &self.magical_protection,
        }
    }

    pub fn protection_mut(&mut self, damage_type: DamageType) -> &mut ResourceMeter {
        match damage_type {
            DamageType::Physical => &mut self.physical_protection,
            DamageType::Magical => &mut self.magical_protection,
        }
    }

    /// Removes HP, returning `true` if this call killed the unit.
    pub fn lose_hp(&mut self, amount: u32) -> bool {
        if !self.alive {
            return false;
        }
        self.health.drain(amount);
        if self.health.current == 0 {
            self.alive = false;
            self.budget = TurnBudget::default();
            self.began_action = false;
            return true;
        }
        false
    }

    /// Restores HP on a living unit, returning the amount healed.
    pub fn heal(&mut self, amount: u32) -> u32 {
        if !self.alive {
            return 0;
        }
        self.health.restore(amount)
    }

    /// A copy reset for a new battle: full resources, starting position, no marks.
    pub fn fresh_copy(&self) -> Self {
        let mut unit = self.clone();
        unit.health.current = unit.health.maximum;
        unit.physical_protection.current = unit.physical_protection.maximum;
        unit.magical_protection.current = unit.magical_protection.maximum;
        unit.mana.current = unit.mana.maximum;
        unit.position = unit.start_position;
        unit.budget = TurnBudget::default();
        unit.action_marks = 0;
        unit.alive = unit.health.current > 0;
        unit.conditions = ConditionSet::new();
        unit.began_action = false;
        unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ConditionKind;

    fn hero() -> CombatUnit {
        CombatUnit::new(
            UnitId(1),
            ParticipantId(1),
            "Aldric",
            UnitCategory::Hero,
            3,
            CoreStats {
                offense: 4,
                mobility: 6,
                focus: 4,
                defense: 3,
                vitality: 2,
            },
            Position::new(1, 1),
        )
    }

    #[test]
    fn derived_resources_follow_category_table() {
        let unit = hero();
        assert_eq!(unit.health, ResourceMeter::full(22));
        assert_eq!(unit.physical_protection.maximum, 3);
        assert_eq!(unit.magical_protection.maximum, 2);
        assert_eq!(unit.mana.maximum, 12);
        assert_eq!(unit.max_action_marks(), 2);
    }

    #[test]
    fn conditions_reduce_mobility_and_dodge() {
        let rules = BattleRules::default();
        let mut unit = hero();
        assert_eq!(unit.effective_mobility(), 6);
        assert_eq!(unit.dodge_chance(&rules), 18);

        unit.conditions.add(ConditionKind::Dodging, true);
        assert_eq!(unit.dodge_chance(&rules), 43);

        unit.conditions.add(ConditionKind::KnockedDown, false);
        assert_eq!(unit.effective_mobility(), 3);
        assert_eq!(unit.dodge_chance(&rules), 0);

        unit.conditions.add(ConditionKind::GrabbedBy(UnitId(9)), false);
        assert_eq!(unit.effective_mobility(), 0);
    }

    #[test]
    fn lethal_hp_loss_marks_dead_once() {
        let mut unit = hero().with_health(3, 22);
        assert!(unit.lose_hp(5));
        assert!(!unit.is_alive());
        assert_eq!(unit.health.current, 0);
        assert!(!unit.lose_hp(5));
        assert_eq!(unit.heal(10), 0);
    }

    #[test]
    fn fresh_copy_restores_starting_state() {
        let mut unit = hero();
        unit.position = Position::new(5, 5);
        unit.lose_hp(30);
        unit.action_marks = 2;

        let copy = unit.fresh_copy();
        assert!(copy.is_alive());
        assert_eq!(copy.health.current, 22);
        assert_eq!(copy.position, Position::new(1, 1));
        assert_eq!(copy.action_marks, 0);
    }
}
