//! Change detection for session persistence.
//!
//! The persistence worker fingerprints each live session once per cycle and
//! skips the write when the fingerprint matches the previous cycle's. Only the
//! fields a turn can mutate are hashed. The turn timer is left out: it ticks
//! without any gameplay change and would defeat the no-op detection.

use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use battle_core::{
    BattleOutcome, BattleSession, Condition, ObstacleId, ParticipantId, Position, SessionStatus,
    TurnBudget, UnitId,
};

/// SHA-256 of the canonical encoding of a session's mutable fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PersistenceHash([u8; 32]);

impl PersistenceHash {
    pub fn of(session: &BattleSession) -> Result<Self, bincode::Error> {
        let bytes = bincode::serialize(&HashView::from(session))?;
        Ok(Self(Sha256::digest(&bytes).into()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for PersistenceHash {
    /// First 8 bytes in hex, enough to tell cycles apart in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..8]))
    }
}

#[derive(Serialize)]
struct HashView<'a> {
    status: SessionStatus,
    round: u32,
    current_turn_index: usize,
    active_unit: Option<UnitId>,
    turn_serial: u64,
    action_order: &'a [ParticipantId],
    forfeited: Vec<ParticipantId>,
    outcome: Option<BattleOutcome>,
    units: Vec<UnitView<'a>>,
    obstacles: Vec<ObstacleView>,
}

#[derive(Serialize)]
struct UnitView<'a> {
    id: UnitId,
    position: Position,
    hp: u32,
    mana: u32,
    physical_protection: u32,
    magical_protection: u32,
    budget: TurnBudget,
    action_marks: u8,
    alive: bool,
    began_action: bool,
    conditions: Vec<&'a Condition>,
}

#[derive(Serialize)]
struct ObstacleView {
    id: ObstacleId,
    hp: u32,
    destroyed: bool,
}

impl<'a> From<&'a BattleSession> for HashView<'a> {
    fn from(session: &'a BattleSession) -> Self {
        Self {
            status: session.status,
            round: session.round,
            current_turn_index: session.current_turn_index,
            active_unit: session.active_unit,
            turn_serial: session.turn_serial,
            action_order: &session.action_order,
            forfeited: session.forfeited.iter().copied().collect(),
            outcome: session.outcome,
            units: session
                .units
                .iter()
                .map(|unit| UnitView {
                    id: unit.id,
                    position: unit.position,
                    hp: unit.health.current,
                    mana: unit.mana.current,
                    physical_protection: unit.physical_protection.current,
                    magical_protection: unit.magical_protection.current,
                    budget: unit.budget,
                    action_marks: unit.action_marks,
                    alive: unit.alive,
                    began_action: unit.began_action,
                    conditions: unit.conditions.iter().collect(),
                })
                .collect(),
            obstacles: session
                .obstacles
                .iter()
                .map(|obstacle| ObstacleView {
                    id: obstacle.id,
                    hp: obstacle.health.current,
                    destroyed: obstacle.destroyed,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_core::{
        BattleMode, CombatUnit, CoreStats, GridSize, PresenceState, SessionId, UnitCategory,
    };

    fn session() -> BattleSession {
        let unit = |id: u32, owner: u64, x: i32| {
            CombatUnit::new(
                UnitId(id),
                ParticipantId(owner),
                format!("unit-{id}"),
                UnitCategory::Troop,
                1,
                CoreStats::default(),
                Position::new(x, 0),
            )
        };
        BattleSession {
            id: SessionId(1),
            grid: GridSize::new(8, 8),
            mode: BattleMode::Standard,
            round: 1,
            current_turn_index: 0,
            action_order: vec![ParticipantId(1), ParticipantId(2)],
            participants: vec![ParticipantId(1), ParticipantId(2)],
            forfeited: Default::default(),
            status: SessionStatus::Active,
            outcome: None,
            ransom: None,
            units: vec![unit(1, 1, 0), unit(2, 2, 5)],
            obstacles: Vec::new(),
            active_unit: None,
            turn_serial: 1,
            turn_timer_remaining_ms: None,
            presence: PresenceState::default(),
        }
    }

    #[test]
    fn timer_changes_do_not_change_the_hash() {
        let mut session = session();
        let before = PersistenceHash::of(&session).unwrap();
        session.turn_timer_remaining_ms = Some(12_000);
        session.presence.mark_absent(ParticipantId(1));
        assert_eq!(PersistenceHash::of(&session).unwrap(), before);
    }

    #[test]
    fn unit_mutation_changes_the_hash() {
        let mut session = session();
        let before = PersistenceHash::of(&session).unwrap();
        session.units[1].lose_hp(3);
        let after = PersistenceHash::of(&session).unwrap();
        assert_ne!(after, before);
        assert_eq!(after.to_string().len(), 16);
    }
}
