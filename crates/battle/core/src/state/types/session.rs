//! Battle session state.

use std::collections::BTreeSet;

use crate::state::{CombatUnit, ObstacleId, ParticipantId, Position, ResourceMeter, SessionId, UnitId};

/// Lifecycle status. `Active → Ended` happens exactly once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    #[default]
    Active,
    Ended,
}

/// Rule variant of a battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BattleMode {
    /// Exhausted units cannot act until the round resets.
    #[default]
    Standard,
    /// Exhausted units may burn HP for a bonus action pair.
    Arena,
}

/// Grid dimensions. Cells run from `(0, 0)` to `(width - 1, height - 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridSize {
    pub width: u32,
    pub height: u32,
}

impl GridSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && (position.x as u32) < self.width
            && (position.y as u32) < self.height
    }
}

/// Destructible terrain that blocks movement until destroyed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Obstacle {
    pub id: ObstacleId,
    pub position: Position,
    pub health: ResourceMeter,
    pub destroyed: bool,
}

impl Obstacle {
    pub fn new(id: ObstacleId, position: Position, hp: u32) -> Self {
        Self {
            id,
            position,
            health: ResourceMeter::full(hp),
            destroyed: hp == 0,
        }
    }
}

/// Optional ransom agreed before the battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RansomTerms {
    pub payer: ParticipantId,
    pub amount: u32,
}

/// Why a battle ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[strum(serialize_all = "snake_case")]
pub enum EndReason {
    /// Every opposing unit was defeated.
    Elimination,
    /// An opponent surrendered.
    Surrender,
    /// An opponent left the battle.
    Abandoned,
    /// No side has living units left.
    Draw,
}

/// Recorded result of an ended battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleOutcome {
    pub winner: Option<ParticipantId>,
    pub reason: EndReason,
}

/// Connection sub-state, orthogonal to [`SessionStatus`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presence {
    /// At least one participant is connected; the turn timer runs.
    Connected,
    /// Every participant is absent; the turn timer is paused.
    AllAbsent,
}

/// Which participants are temporarily absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PresenceState {
    absent: BTreeSet<ParticipantId>,
}

impl PresenceState {
    /// Marks a participant absent. Returns false if already absent.
    pub fn mark_absent(&mut self, participant: ParticipantId) -> bool {
        self.absent.insert(participant)
    }

    /// Marks a participant present again. Returns false if it was not absent.
    pub fn mark_present(&mut self, participant: ParticipantId) -> bool {
        self.absent.remove(&participant)
    }

    pub fn is_absent(&self, participant: ParticipantId) -> bool {
        self.absent.contains(&participant)
    }

    /// Presence of the whole session given its participant list.
    pub fn state(&self, participants: &[ParticipantId]) -> Presence {
        if !participants.is_empty() && participants.iter().all(|p| self.absent.contains(p)) {
            Presence::AllAbsent
        } else {
            Presence::Connected
        }
    }
}

/// One live battle.
///
/// Owned exclusively by its session worker while active. Invariant:
/// `current_turn_index < action_order.len()` unless `action_order` is empty.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BattleSession {
    pub id: SessionId,
    pub grid: GridSize,
    pub mode: BattleMode,
    pub round: u32,
    pub current_turn_index: usize,
    /// Participants in initiative order; forfeited participants are removed.
    pub action_order: Vec<ParticipantId>,
    /// Every participant that started the battle.
    pub participants: Vec<ParticipantId>,
    pub forfeited: BTreeSet<ParticipantId>,
    pub status: SessionStatus,
    pub outcome: Option<BattleOutcome>,
    pub ransom: Option<RansomTerms>,
    pub units: Vec<CombatUnit>,
    pub obstacles: Vec<Obstacle>,
    /// Unit that began acting in the current turn, if any.
    pub active_unit: Option<UnitId>,
    /// Increments on every turn change; stale timer expiries are detected by it.
    pub turn_serial: u64,
    /// Remaining turn time captured for persistence, in milliseconds.
    pub turn_timer_remaining_ms: Option<u64>,
    pub presence: PresenceState,
}

impl BattleSession {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Participant holding the current turn slot.
    pub fn turn_holder(&self) -> Option<ParticipantId> {
        self.action_order.get(self.current_turn_index).copied()
    }

    pub fn unit(&self, id: UnitId) -> Option<&CombatUnit> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut CombatUnit> {
        self.units.iter_mut().find(|u| u.id == id)
    }

    pub fn obstacle(&self, id: ObstacleId) -> Option<&Obstacle> {
        self.obstacles.iter().find(|o| o.id == id)
    }

    pub fn obstacle_mut(&mut self, id: ObstacleId) -> Option<&mut Obstacle> {
        self.obstacles.iter_mut().find(|o| o.id == id)
    }

    /// Living unit standing on a cell.
    pub fn unit_at(&self, position: Position) -> Option<&CombatUnit> {
        self.units
            .iter()
            .find(|u| u.alive && u.position == position)
    }

    /// True when a cell holds a living unit or an intact obstacle.
    pub fn is_blocked(&self, position: Position) -> bool {
        self.unit_at(position).is_some()
            || self
                .obstacles
                .iter()
                .any(|o| !o.destroyed && o.position == position)
    }

    pub fn living_units_of(&self, participant: ParticipantId) -> impl Iterator<Item = &CombatUnit> {
        self.units
            .iter()
            .filter(move |u| u.alive && u.owner == participant)
    }

    /// True when the participant is still in the fight.
    pub fn is_contender(&self, participant: ParticipantId) -> bool {
        !self.forfeited.contains(&participant) && self.participants.contains(&participant)
    }

    /// Living units whose owners have not forfeited.
    pub fn contending_units(&self) -> impl Iterator<Item = &CombatUnit> {
        self.units
            .iter()
            .filter(|u| u.alive && !self.forfeited.contains(&u.owner))
    }

    /// Participants that still have at least one living unit and have not forfeited.
    pub fn standing_participants(&self) -> Vec<ParticipantId> {
        self.action_order
            .iter()
            .copied()
            .filter(|&p| self.living_units_of(p).next().is_some())
            .collect()
    }

    /// Presence sub-state of the session.
    pub fn presence_state(&self) -> Presence {
        let connected_pool: Vec<ParticipantId> = self
            .participants
            .iter()
            .copied()
            .filter(|p| !self.forfeited.contains(p))
            .collect();
        self.presence.state(&connected_pool)
    }
}
