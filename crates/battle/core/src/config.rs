/// Battle balance constants and tunable parameters.
///
/// One instance is shared by every session of a runtime. Tests construct the
/// default and override single fields.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleRules {
    /// Sides on each attack/contest die.
    pub dice_sides: u32,
    /// A die scores a hit when it shows at least this value.
    pub hit_threshold: u32,
    /// Raw damage by number of hits; indices past the end extend by `damage_step`.
    pub damage_table: Vec<u32>,
    /// Raw damage added per hit beyond the table.
    pub damage_step: u32,
    /// HP paid for the Arena exhaustion bonus.
    pub exhaustion_hp_cost: u32,
    /// Actions granted by the Arena exhaustion bonus.
    pub exhaustion_actions: u32,
    /// Damage dealt by Burning at the end of the owner's turn.
    pub burn_damage: u32,
    /// Number of owner turns Burning lasts.
    pub burn_turns: u8,
    /// Dodge chance per point of mobility (percent).
    pub dodge_per_mobility: u32,
    /// Extra dodge chance while in dodge stance (percent).
    pub dodge_stance_bonus: u32,
    /// Upper bound on any dodge chance (percent).
    pub dodge_cap: u32,
    /// Damage taken when landing from a throw.
    pub fall_damage: u32,
    /// Extra attack dice granted by the Helped condition.
    pub help_bonus_dice: u32,
    /// Sides on the initiative die.
    pub initiative_die: u32,
}

impl BattleRules {
    // ===== compile-time limits =====
    pub const MAX_GRID_SIDE: u32 = 64;
    pub const MAX_UNITS: usize = 128;

    // ===== defaults =====
    pub const DEFAULT_EXHAUSTION_HP_COST: u32 = 5;
    pub const DEFAULT_BURN_DAMAGE: u32 = 3;

    pub fn new() -> Self {
        Self {
            dice_sides: 6,
            hit_threshold: 5,
            damage_table: vec![0, 2, 4, 6, 9, 12, 15, 18],
            damage_step: 3,
            exhaustion_hp_cost: Self::DEFAULT_EXHAUSTION_HP_COST,
            exhaustion_actions: 2,
            burn_damage: Self::DEFAULT_BURN_DAMAGE,
            burn_turns: 2,
            dodge_per_mobility: 3,
            dodge_stance_bonus: 25,
            dodge_cap: 75,
            fall_damage: 2,
            help_bonus_dice: 2,
            initiative_die: 20,
        }
    }

    /// Raw damage for a number of hits.
    pub fn damage_for_hits(&self, hits: u32) -> u32 {
        let hits = hits as usize;
        match self.damage_table.get(hits) {
            Some(&damage) => damage,
            None => {
                let last = self.damage_table.last().copied().unwrap_or(0);
                let extra = hits + 1 - self.damage_table.len().max(1);
                last + extra as u32 * self.damage_step
            }
        }
    }
}

impl Default for BattleRules {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn damage_table_lookup_and_extension() {
        let rules = BattleRules::default();
        assert_eq!(rules.damage_for_hits(0), 0);
        assert_eq!(rules.damage_for_hits(3), 6);
        assert_eq!(rules.damage_for_hits(7), 18);
        assert_eq!(rules.damage_for_hits(8), 21);
        assert_eq!(rules.damage_for_hits(10), 27);
    }
}
