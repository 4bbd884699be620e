//! Spells: mana costs, ranges and per-target resolution.

use crate::config::BattleRules;
use crate::dice::Dice;
use crate::state::{CombatUnit, Position, UnitId};

use super::attack::{DodgeRoll, PoolRoll, attack_pool_size, roll_dodge, roll_pool};
use super::damage::{DamageBreakdown, DamageType, compute_damage};

/// The closed set of castable spells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum Spell {
    /// Single enemy; magical pool of `focus` dice; sets the target burning on hit.
    Firebolt,
    /// Every unit within one cell of the target point, caster excluded.
    Fireball,
    /// One ally regains `focus + d6` HP.
    Heal,
    /// One ally regains magical protection equal to the caster's focus.
    Barrier,
}

impl Spell {
    pub const fn mana_cost(self) -> u32 {
        match self {
            Self::Firebolt => 3,
            Self::Fireball => 6,
            Self::Heal => 4,
            Self::Barrier => 3,
        }
    }

    /// Maximum distance from the caster to the target point.
    pub const fn range(self) -> u32 {
        match self {
            Self::Firebolt | Self::Fireball => 4,
            Self::Heal | Self::Barrier => 2,
        }
    }

    /// Area radius around the target point; 0 for single-target spells.
    pub const fn radius(self) -> u32 {
        match self {
            Self::Fireball => 1,
            _ => 0,
        }
    }

    pub const fn is_offensive(self) -> bool {
        matches!(self, Self::Firebolt | Self::Fireball)
    }
}

/// Effect of a spell on one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpellHit {
    pub target: UnitId,
    /// Present for offensive spells.
    pub dodge: Option<DodgeRoll>,
    pub pool: PoolRoll,
    pub damage: Option<DamageBreakdown>,
    pub burning: bool,
    pub healed: u32,
    pub protection_restored: u32,
    pub target_defeated: bool,
}

impl SpellHit {
    fn empty(target: UnitId) -> Self {
        Self {
            target,
            dodge: None,
            pool: PoolRoll::default(),
            damage: None,
            burning: false,
            healed: 0,
            protection_restored: 0,
            target_defeated: false,
        }
    }

    pub fn healed(target: UnitId, amount: u32) -> Self {
        Self {
            healed: amount,
            ..Self::empty(target)
        }
    }

    pub fn shielded(target: UnitId, amount: u32) -> Self {
        Self {
            protection_restored: amount,
            ..Self::empty(target)
        }
    }
}

/// Aggregated result of one cast, narrated as a single event.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SpellResult {
    pub spell: Spell,
    pub caster: UnitId,
    pub center: Position,
    pub mana_spent: u32,
    pub hits: Vec<SpellHit>,
}

/// Resolve an offensive spell against one unit: dodge, then a magical pool.
///
/// Firebolt sets the target burning when at least one die hits.
pub fn resolve_spell_hit(
    spell: Spell,
    caster: &CombatUnit,
    target: &CombatUnit,
    rules: &BattleRules,
    dice: &mut dyn Dice,
) -> SpellHit {
    let dodge = roll_dodge(target, rules, dice);
    if dodge.dodged {
        return SpellHit {
            dodge: Some(dodge),
            ..SpellHit::empty(target.id)
        };
    }

    let size = attack_pool_size(caster.stats.focus, caster, Some(target), rules);
    let pool = roll_pool(size, rules, dice);
    let damage = compute_damage(target, pool.raw_damage, DamageType::Magical);
    let burning = spell == Spell::Firebolt && pool.hits > 0 && !damage.defeated;

    SpellHit {
        target: target.id,
        dodge: Some(dodge),
        pool,
        target_defeated: damage.defeated,
        damage: Some(damage),
        burning,
        healed: 0,
        protection_restored: 0,
    }
}

/// HP restored by Heal before clamping: `focus + d6`.
pub fn heal_amount(caster: &CombatUnit, dice: &mut dyn Dice) -> u32 {
    caster.stats.focus + dice.roll_die(6)
}
