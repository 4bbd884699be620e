//! Special maneuvers and opposed rolls.

use crate::config::BattleRules;
use crate::dice::Dice;
use crate::state::{CombatUnit, Position, UnitId};

use super::damage::DamageBreakdown;

/// Maneuvers other than moving, attacking and casting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum ManeuverKind {
    Dash,
    Dodge,
    Grab,
    Throw,
    Disarm,
    Knockdown,
    Protect,
    Help,
    Flee,
}

/// Opposed roll: `score + d(dice_sides)` on both sides, the actor wins only
/// with a strictly greater total.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OpposedRoll {
    pub actor_score: u32,
    pub actor_roll: u32,
    pub opponent_score: u32,
    pub opponent_roll: u32,
}

impl OpposedRoll {
    pub fn roll(
        actor_score: u32,
        opponent_score: u32,
        rules: &BattleRules,
        dice: &mut dyn Dice,
    ) -> Self {
        let actor_roll = dice.roll_die(rules.dice_sides);
        let opponent_roll = dice.roll_die(rules.dice_sides);
        Self {
            actor_score,
            actor_roll,
            opponent_score,
            opponent_roll,
        }
    }

    pub fn actor_total(&self) -> u32 {
        self.actor_score + self.actor_roll
    }

    pub fn opponent_total(&self) -> u32 {
        self.opponent_score + self.opponent_roll
    }

    pub fn succeeded(&self) -> bool {
        self.actor_total() > self.opponent_total()
    }
}

/// Maneuver-specific detail carried into narration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ManeuverDetail {
    Dash { moves_gained: u32 },
    Stance,
    Contest(OpposedRoll),
    Throw {
        from: Position,
        landing: Position,
        fall: DamageBreakdown,
    },
    Protect { restored: u32 },
    Help,
    Flee {
        contest: OpposedRoll,
        moves_gained: u32,
    },
}

/// Outcome of one maneuver.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ManeuverResult {
    pub kind: ManeuverKind,
    pub actor: UnitId,
    pub target: Option<UnitId>,
    pub success: bool,
    pub detail: ManeuverDetail,
    pub target_defeated: bool,
}

/// Roll the contest for a contested maneuver.
///
/// | Maneuver  | Actor score | Opponent score              |
/// |-----------|-------------|-----------------------------|
/// | Grab      | offense     | max(offense, mobility)      |
/// | Disarm    | offense     | defense                     |
/// | Knockdown | offense     | max(defense, mobility)      |
/// | Flee      | mobility    | offense (of the grabber)    |
///
/// Returns `None` for maneuvers that are not contested.
pub fn resolve_contest(
    kind: ManeuverKind,
    actor: &CombatUnit,
    opponent: &CombatUnit,
    rules: &BattleRules,
    dice: &mut dyn Dice,
) -> Option<OpposedRoll> {
    let a = &actor.stats;
    let o = &opponent.stats;
    let (actor_score, opponent_score) = match kind {
        ManeuverKind::Grab => (a.offense, o.offense.max(o.mobility)),
        ManeuverKind::Disarm => (a.offense, o.defense),
        ManeuverKind::Knockdown => (a.offense, o.defense.max(o.mobility)),
        ManeuverKind::Flee => (a.mobility, o.offense),
        _ => return None,
    };
    Some(OpposedRoll::roll(actor_score, opponent_score, rules, dice))
}

/// Maximum distance from the thrower a held unit can land.
pub fn throw_range(thrower: &CombatUnit) -> u32 {
    1 + thrower.stats.offense / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use crate::state::{CoreStats, ParticipantId, UnitCategory};

    fn unit(id: u32, stats: CoreStats) -> CombatUnit {
        CombatUnit::new(
            UnitId(id),
            ParticipantId(id as u64),
            format!("unit-{id}"),
            UnitCategory::Hero,
            1,
            stats,
            Position::new(id as i32, 0),
        )
    }

    #[test]
    fn ties_go_to_the_defender() {
        let rules = BattleRules::default();
        let actor = unit(
            1,
            CoreStats {
                offense: 3,
                ..CoreStats::default()
            },
        );
        let opponent = unit(
            2,
            CoreStats {
                defense: 3,
                ..CoreStats::default()
            },
        );
        let mut dice = ScriptedDice::new([4, 4, 5, 4]);

        let tie = resolve_contest(ManeuverKind::Disarm, &actor, &opponent, &rules, &mut dice).unwrap();
        assert_eq!(tie.actor_total(), tie.opponent_total());
        assert!(!tie.succeeded());

        let win = resolve_contest(ManeuverKind::Disarm, &actor, &opponent, &rules, &mut dice).unwrap();
        assert!(win.succeeded());
    }

    #[test]
    fn grab_defender_uses_best_of_offense_and_mobility() {
        let rules = BattleRules::default();
        let actor = unit(1, CoreStats::default());
        let opponent = unit(
            2,
            CoreStats {
                offense: 2,
                mobility: 5,
                ..CoreStats::default()
            },
        );
        let mut dice = ScriptedDice::new([1, 1]);
        let contest = resolve_contest(ManeuverKind::Grab, &actor, &opponent, &rules, &mut dice).unwrap();
        assert_eq!(contest.opponent_score, 5);
        assert!(resolve_contest(ManeuverKind::Dash, &actor, &opponent, &rules, &mut dice).is_none());
    }

    #[test]
    fn throw_range_scales_with_offense() {
        let thrower = unit(
            1,
            CoreStats {
                offense: 5,
                ..CoreStats::default()
            },
        );
        assert_eq!(throw_range(&thrower), 3);
    }
}
