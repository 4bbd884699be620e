//! Dice pools, dodge tests and single-target attack resolution.

use crate::config::BattleRules;
use crate::dice::Dice;
use crate::state::{CombatUnit, ConditionTag, UnitId};

use super::damage::{DamageBreakdown, DamageType, compute_damage};

/// A rolled dice pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolRoll {
    pub dice: Vec<u32>,
    pub hits: u32,
    pub raw_damage: u32,
}

/// Outcome of an evasion test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DodgeRoll {
    /// Chance in percent.
    pub chance: u32,
    /// The d100 roll, absent when the chance was zero.
    pub roll: Option<u32>,
    pub dodged: bool,
}

/// Result of one attack against a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttackResult {
    pub attacker: UnitId,
    pub target: UnitId,
    pub dodge: DodgeRoll,
    /// Empty when the attack was dodged.
    pub pool: PoolRoll,
    /// `None` when the attack was dodged.
    pub damage: Option<DamageBreakdown>,
    pub target_defeated: bool,
}

impl AttackResult {
    pub fn final_damage(&self) -> u32 {
        self.damage.map_or(0, |d| d.final_damage)
    }
}

/// Roll `size` dice and map hits to raw damage.
pub fn roll_pool(size: u32, rules: &BattleRules, dice: &mut dyn Dice) -> PoolRoll {
    let rolled: Vec<u32> = (0..size).map(|_| dice.roll_die(rules.dice_sides)).collect();
    let hits = rolled.iter().filter(|&&face| face >= rules.hit_threshold).count() as u32;

    PoolRoll {
        dice: rolled,
        hits,
        raw_damage: rules.damage_for_hits(hits),
    }
}

/// Run the target's dodge test. No die is rolled when the chance is zero.
pub fn roll_dodge(target: &CombatUnit, rules: &BattleRules, dice: &mut dyn Dice) -> DodgeRoll {
    let chance = target.dodge_chance(rules);
    if chance == 0 {
        return DodgeRoll {
            chance,
            roll: None,
            dodged: false,
        };
    }

    let roll = dice.roll_d100();
    DodgeRoll {
        chance,
        roll: Some(roll),
        dodged: roll <= chance,
    }
}

/// Number of attack dice for `base` (offense or focus) under current conditions.
///
/// +`help_bonus_dice` while Helped, −1 if the attacker is knocked down, +1 if
/// the target is knocked down; never fewer than one die.
pub fn attack_pool_size(
    base: u32,
    attacker: &CombatUnit,
    target: Option<&CombatUnit>,
    rules: &BattleRules,
) -> u32 {
    let mut size = base;
    if attacker.conditions.has(ConditionTag::Helped) {
        size += rules.help_bonus_dice;
    }
    if attacker.conditions.has(ConditionTag::KnockedDown) {
        size = size.saturating_sub(1);
    }
    if target.is_some_and(|t| t.conditions.has(ConditionTag::KnockedDown)) {
        size += 1;
    }
    size.max(1)
}

/// Resolve a physical attack: dodge first, then the dice pool and damage.
pub fn resolve_attack(
    attacker: &CombatUnit,
    target: &CombatUnit,
    rules: &BattleRules,
    dice: &mut dyn Dice,
) -> AttackResult {
    let dodge = roll_dodge(target, rules, dice);
    if dodge.dodged {
        return AttackResult {
            attacker: attacker.id,
            target: target.id,
            dodge,
            pool: PoolRoll::default(),
            damage: None,
            target_defeated: false,
        };
    }

    let size = attack_pool_size(attacker.stats.offense, attacker, Some(target), rules);
    let pool = roll_pool(size, rules, dice);
    let damage = compute_damage(target, pool.raw_damage, DamageType::Physical);

    AttackResult {
        attacker: attacker.id,
        target: target.id,
        dodge,
        pool,
        target_defeated: damage.defeated,
        damage: Some(damage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use crate::state::{ConditionKind, CoreStats, ParticipantId, Position, UnitCategory};

    fn unit(id: u32, owner: u64, stats: CoreStats) -> CombatUnit {
        CombatUnit::new(
            UnitId(id),
            ParticipantId(owner),
            format!("unit-{id}"),
            UnitCategory::Troop,
            1,
            stats,
            Position::new(id as i32, 0),
        )
    }

    #[test]
    fn three_hits_deal_six_damage() {
        let rules = BattleRules::default();
        let attacker = unit(
            1,
            1,
            CoreStats {
                offense: 4,
                ..CoreStats::default()
            },
        );
        let target = unit(2, 2, CoreStats::default()).with_health(10, 10);
        let mut dice = ScriptedDice::new([5, 6, 2, 5]);

        let result = resolve_attack(&attacker, &target, &rules, &mut dice);
        assert!(!result.dodge.dodged);
        assert_eq!(result.dodge.roll, None);
        assert_eq!(result.pool.hits, 3);
        assert_eq!(result.pool.raw_damage, 6);
        let damage = result.damage.unwrap();
        assert_eq!(damage.reduction(), 0);
        assert_eq!(damage.hp_after, 4);
        assert!(!result.target_defeated);
    }

    #[test]
    fn dodge_skips_damage_roll() {
        let rules = BattleRules::default();
        let attacker = unit(
            1,
            1,
            CoreStats {
                offense: 4,
                ..CoreStats::default()
            },
        );
        let target = unit(
            2,
            2,
            CoreStats {
                mobility: 5,
                ..CoreStats::default()
            },
        );
        let mut dice = ScriptedDice::new([10, 6, 6, 6, 6]);

        let result = resolve_attack(&attacker, &target, &rules, &mut dice);
        assert_eq!(result.dodge.chance, 15);
        assert!(result.dodge.dodged);
        assert!(result.damage.is_none());
        assert_eq!(dice.remaining(), 4);
    }

    #[test]
    fn pool_size_respects_conditions() {
        let rules = BattleRules::default();
        let mut attacker = unit(
            1,
            1,
            CoreStats {
                offense: 1,
                ..CoreStats::default()
            },
        );
        let mut target = unit(2, 2, CoreStats::default());

        attacker.conditions.add(ConditionKind::KnockedDown, false);
        assert_eq!(attack_pool_size(1, &attacker, Some(&target), &rules), 1);

        attacker.conditions.add(ConditionKind::Helped, false);
        target.conditions.add(ConditionKind::KnockedDown, false);
        assert_eq!(attack_pool_size(1, &attacker, Some(&target), &rules), 3);
    }
}
