//! Condition tags attached to combat units.
//!
//! A condition either expires on a schedule (end of the owner's turn, after a
//! number of owner turns, at the round boundary) or persists until something
//! clears it explicitly. Grab conditions reference the other unit and come in
//! pairs: `GrabbedBy(grabber)` on the victim, `Grabbing(victim)` on the grabber.

use crate::state::UnitId;

/// Kinds of conditions a unit can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionKind {
    /// Takes fixed damage at the end of each owner turn.
    Burning { turns_left: u8 },
    /// Halved mobility; easier to hit, cannot dodge.
    KnockedDown,
    /// Dodge stance: improved dodge chance.
    Dodging,
    /// Cannot begin an action until the round resets.
    Stunned,
    /// Cannot attack.
    Disarmed,
    /// Bonus dice on the next attack or spell.
    Helped,
    /// Held in place by another unit.
    GrabbedBy(UnitId),
    /// Holding another unit.
    Grabbing(UnitId),
}

/// Payload-free discriminant of [`ConditionKind`], used for lookups and narration.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, strum::Display, strum::IntoStaticStr,
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum ConditionTag {
    Burning,
    KnockedDown,
    Dodging,
    Stunned,
    Disarmed,
    Helped,
    GrabbedBy,
    Grabbing,
}

/// When a condition goes away on its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConditionExpiry {
    /// Stripped at the end of the owner's next turn.
    EndOfTurn,
    /// Counts down once per owner turn.
    Turns,
    /// Stripped when the round counter advances.
    EndOfRound,
    /// Stays until explicitly removed.
    UntilCleared,
}

impl ConditionKind {
    pub const fn tag(&self) -> ConditionTag {
        match self {
            Self::Burning { .. } => ConditionTag::Burning,
            Self::KnockedDown => ConditionTag::KnockedDown,
            Self::Dodging => ConditionTag::Dodging,
            Self::Stunned => ConditionTag::Stunned,
            Self::Disarmed => ConditionTag::Disarmed,
            Self::Helped => ConditionTag::Helped,
            Self::GrabbedBy(_) => ConditionTag::GrabbedBy,
            Self::Grabbing(_) => ConditionTag::Grabbing,
        }
    }

    pub const fn expiry(&self) -> ConditionExpiry {
        match self {
            Self::KnockedDown | Self::Dodging | Self::Disarmed => ConditionExpiry::EndOfTurn,
            Self::Burning { .. } => ConditionExpiry::Turns,
            Self::Stunned => ConditionExpiry::EndOfRound,
            Self::Helped | Self::GrabbedBy(_) | Self::Grabbing(_) => ConditionExpiry::UntilCleared,
        }
    }

    /// True for conditions that prevent beginning an action.
    pub const fn blocks_action(&self) -> bool {
        matches!(self, Self::Stunned)
    }
}

/// A condition instance on a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Condition {
    pub kind: ConditionKind,
    /// Set when applied during the owner's own turn; such an end-of-turn
    /// condition survives that turn's end and expires at the next one.
    pub applied_in_own_turn: bool,
}

/// Result of ticking conditions at the end of the owner's turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndOfTurnTick {
    /// Total burn damage to apply.
    pub burn_damage: u32,
    /// Tags that expired.
    pub expired: Vec<ConditionTag>,
}

/// The set of conditions currently on a unit. At most one per tag.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, tag: ConditionTag) -> bool {
        self.conditions.iter().any(|c| c.kind.tag() == tag)
    }

    pub fn get(&self, tag: ConditionTag) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind.tag() == tag)
    }

    /// Adds a condition, replacing any existing one with the same tag.
    ///
    /// Burning keeps the longer of the two remaining durations.
    pub fn add(&mut self, kind: ConditionKind, applied_in_own_turn: bool) {
        let kind = match (kind, self.get(ConditionTag::Burning).map(|c| c.kind)) {
            (
                ConditionKind::Burning { turns_left },
                Some(ConditionKind::Burning {
                    turns_left: existing,
                }),
            ) => ConditionKind::Burning {
                turns_left: turns_left.max(existing),
            },
            (kind, _) => kind,
        };

        self.remove(kind.tag());
        self.conditions.push(Condition {
            kind,
            applied_in_own_turn,
        });
    }

    /// Removes a condition by tag, returning it if present.
    pub fn remove(&mut self, tag: ConditionTag) -> Option<Condition> {
        let index = self.conditions.iter().position(|c| c.kind.tag() == tag)?;
        Some(self.conditions.remove(index))
    }

    /// The unit holding this one, if grabbed.
    pub fn grabbed_by(&self) -> Option<UnitId> {
        self.conditions.iter().find_map(|c| match c.kind {
            ConditionKind::GrabbedBy(id) => Some(id),
            _ => None,
        })
    }

    /// The unit this one is holding, if any.
    pub fn grabbing(&self) -> Option<UnitId> {
        self.conditions.iter().find_map(|c| match c.kind {
            ConditionKind::Grabbing(id) => Some(id),
            _ => None,
        })
    }

    /// True when any condition prevents beginning an action.
    pub fn blocks_action(&self) -> bool {
        self.conditions.iter().any(|c| c.kind.blocks_action())
    }

    /// Applies end-of-turn expiry rules for the owner's turn that just ended.
    pub fn tick_end_of_turn(&mut self, burn_damage: u32) -> EndOfTurnTick {
        let mut tick = EndOfTurnTick::default();

        self.conditions.retain_mut(|condition| match condition.kind.expiry() {
            ConditionExpiry::EndOfTurn => {
                if condition.applied_in_own_turn {
                    condition.applied_in_own_turn = false;
                    true
                } else {
                    tick.expired.push(condition.kind.tag());
                    false
                }
            }
            ConditionExpiry::Turns => {
                if let ConditionKind::Burning { turns_left } = &mut condition.kind {
                    tick.burn_damage += burn_damage;
                    *turns_left = turns_left.saturating_sub(1);
                    if *turns_left == 0 {
                        tick.expired.push(ConditionTag::Burning);
                        return false;
                    }
                }
                true
            }
            ConditionExpiry::EndOfRound | ConditionExpiry::UntilCleared => true,
        });

        tick
    }

    /// Strips round-scoped conditions, returning the expired tags.
    pub fn clear_end_of_round(&mut self) -> Vec<ConditionTag> {
        let mut expired = Vec::new();
        self.conditions.retain(|c| {
            if c.kind.expiry() == ConditionExpiry::EndOfRound {
                expired.push(c.kind.tag());
                false
            } else {
                true
            }
        });
        expired
    }

    /// Removes every condition, returning the removed tags.
    pub fn clear(&mut self) -> Vec<ConditionTag> {
        self.conditions.drain(..).map(|c| c.kind.tag()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_turn_stance_survives_one_turn_end() {
        let mut set = ConditionSet::new();
        set.add(ConditionKind::Dodging, true);

        let first = set.tick_end_of_turn(3);
        assert!(first.expired.is_empty());
        assert!(set.has(ConditionTag::Dodging));

        let second = set.tick_end_of_turn(3);
        assert_eq!(second.expired, vec![ConditionTag::Dodging]);
        assert!(set.is_empty());
    }

    #[test]
    fn knockdown_from_enemy_expires_at_next_turn_end() {
        let mut set = ConditionSet::new();
        set.add(ConditionKind::KnockedDown, false);

        let tick = set.tick_end_of_turn(3);
        assert_eq!(tick.expired, vec![ConditionTag::KnockedDown]);
        assert_eq!(tick.burn_damage, 0);
    }

    #[test]
    fn burning_counts_down_and_deals_damage() {
        let mut set = ConditionSet::new();
        set.add(ConditionKind::Burning { turns_left: 2 }, false);

        let first = set.tick_end_of_turn(3);
        assert_eq!(first.burn_damage, 3);
        assert!(set.has(ConditionTag::Burning));

        let second = set.tick_end_of_turn(3);
        assert_eq!(second.burn_damage, 3);
        assert_eq!(second.expired, vec![ConditionTag::Burning]);
        assert!(!set.has(ConditionTag::Burning));
    }

    #[test]
    fn reapplying_burning_keeps_longer_duration() {
        let mut set = ConditionSet::new();
        set.add(ConditionKind::Burning { turns_left: 3 }, false);
        set.add(ConditionKind::Burning { turns_left: 1 }, false);
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.get(ConditionTag::Burning).map(|c| c.kind),
            Some(ConditionKind::Burning { turns_left: 3 })
        );
    }

    #[test]
    fn grab_references_are_kept_until_cleared() {
        let mut set = ConditionSet::new();
        set.add(ConditionKind::GrabbedBy(UnitId(7)), false);
        set.add(ConditionKind::Stunned, false);

        set.tick_end_of_turn(3);
        assert_eq!(set.grabbed_by(), Some(UnitId(7)));
        assert!(set.blocks_action());

        assert_eq!(set.clear_end_of_round(), vec![ConditionTag::Stunned]);
        assert!(!set.blocks_action());
        assert_eq!(set.grabbed_by(), Some(UnitId(7)));
    }
}
