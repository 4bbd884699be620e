//! Damage calculation and application.

use crate::state::CombatUnit;

/// Which protection pool and flat reduction apply to incoming damage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum DamageType {
    /// Weapons, throws and falls.
    Physical,
    /// Spells.
    Magical,
}

/// How raw damage was reduced on its way to a unit's health.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageBreakdown {
    pub damage_type: DamageType,
    /// Damage before any reduction.
    pub raw: u32,
    /// Absorbed by the matching protection pool.
    pub absorbed: u32,
    /// Removed by flat reduction after the pool.
    pub reduced: u32,
    /// Damage subtracted from health.
    pub final_damage: u32,
    pub hp_after: u32,
    pub protection_after: u32,
    /// True when this damage brings a living unit to 0 HP.
    pub defeated: bool,
}

impl DamageBreakdown {
    /// Total reduction (pool + flat).
    pub fn reduction(&self) -> u32 {
        self.absorbed + self.reduced
    }
}

/// Compute how `raw` damage lands on `target` without mutating it.
///
/// # Formula
///
/// ```text
/// absorbed = min(raw, protection.current)
/// reduced  = min(raw - absorbed, flat_reduction)
/// final    = raw - absorbed - reduced
/// ```
pub fn compute_damage(target: &CombatUnit, raw: u32, damage_type: DamageType) -> DamageBreakdown {
    let protection = target.protection(damage_type);
    let absorbed = raw.min(protection.current);
    let remaining = raw - absorbed;
    let reduced = remaining.min(target.flat_reduction(damage_type));
    let final_damage = remaining - reduced;
    let hp_after = target.health.current.saturating_sub(final_damage);

    DamageBreakdown {
        damage_type,
        raw,
        absorbed,
        reduced,
        final_damage,
        hp_after,
        protection_after: protection.current - absorbed,
        defeated: target.is_alive() && hp_after == 0,
    }
}

/// Apply a computed breakdown to its target. Returns `true` if the unit died.
pub fn apply_breakdown(target: &mut CombatUnit, breakdown: &DamageBreakdown) -> bool {
    target.protection_mut(breakdown.damage_type).drain(breakdown.absorbed);
    target.lose_hp(breakdown.final_damage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CoreStats, ParticipantId, Position, UnitCategory, UnitId};

    fn target(defense: u32) -> CombatUnit {
        CombatUnit::new(
            UnitId(2),
            ParticipantId(2),
            "Target",
            UnitCategory::Troop,
            1,
            CoreStats {
                defense,
                ..CoreStats::default()
            },
            Position::ORIGIN,
        )
        .with_health(10, 10)
    }

    #[test]
    fn pool_absorbs_before_flat_reduction() {
        let unit = target(4).with_physical_protection(3, 4);
        let breakdown = compute_damage(&unit, 9, DamageType::Physical);
        assert_eq!(breakdown.absorbed, 3);
        assert_eq!(breakdown.reduced, 2);
        assert_eq!(breakdown.final_damage, 4);
        assert_eq!(breakdown.hp_after, 6);
        assert_eq!(breakdown.protection_after, 0);
        assert!(!breakdown.defeated);
    }

    #[test]
    fn small_hits_are_fully_absorbed() {
        let unit = target(2);
        let breakdown = compute_damage(&unit, 1, DamageType::Physical);
        assert_eq!(breakdown.final_damage, 0);
        assert_eq!(breakdown.hp_after, 10);
    }

    #[test]
    fn lethal_damage_clamps_to_zero() {
        let mut unit = target(0);
        let breakdown = compute_damage(&unit, 25, DamageType::Magical);
        assert_eq!(breakdown.hp_after, 0);
        assert!(breakdown.defeated);
        assert!(apply_breakdown(&mut unit, &breakdown));
        assert_eq!(unit.health.current, 0);
        assert!(!unit.is_alive());
    }
}
