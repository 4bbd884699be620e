//! Durable record shapes for sessions, units and obstacles.
//!
//! Records are flat on purpose: each maps to one row-like entry keyed by the
//! session id, and recovery rebuilds the in-memory session field by field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use battle_core::{
    BattleMode, BattleOutcome, BattleSession, CombatUnit, Condition, ConditionSet, CoreStats,
    GridSize, Obstacle, ObstacleId, ParticipantId, Position, PresenceState, RansomTerms,
    ResourceMeter, SessionId, SessionStatus, TurnBudget, UnitCategory, UnitId,
};

/// Session-level fields of a battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub grid: GridSize,
    pub mode: BattleMode,
    pub round: u32,
    pub current_turn_index: usize,
    pub action_order: Vec<ParticipantId>,
    pub participants: Vec<ParticipantId>,
    pub forfeited: Vec<ParticipantId>,
    pub status: SessionStatus,
    pub outcome: Option<BattleOutcome>,
    pub ransom: Option<RansomTerms>,
    pub active_unit: Option<UnitId>,
    pub turn_serial: u64,
    pub turn_timer_remaining_ms: Option<u64>,
    pub saved_at: DateTime<Utc>,
}

/// One unit of a battle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: UnitId,
    pub owner: ParticipantId,
    pub name: String,
    pub category: UnitCategory,
    pub level: u32,
    pub stats: CoreStats,
    pub current_hp: u32,
    pub max_hp: u32,
    pub physical_protection: u32,
    pub max_physical_protection: u32,
    pub magical_protection: u32,
    pub max_magical_protection: u32,
    pub mana: u32,
    pub max_mana: u32,
    pub x: i32,
    pub y: i32,
    pub start_x: i32,
    pub start_y: i32,
    pub attack_range: u32,
    pub moves_left: u32,
    pub actions_left: u32,
    pub action_marks: u8,
    pub alive: bool,
    pub began_action: bool,
    pub conditions: Vec<Condition>,
}

/// One obstacle of a battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleRecord {
    pub id: ObstacleId,
    pub x: i32,
    pub y: i32,
    pub hp: u32,
    pub max_hp: u32,
    pub destroyed: bool,
}

/// The three record groups of one session, as loaded from a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredSession {
    pub session: SessionRecord,
    pub units: Vec<UnitRecord>,
    pub obstacles: Vec<ObstacleRecord>,
}

impl SessionRecord {
    pub fn from_session(session: &BattleSession) -> Self {
        Self {
            id: session.id,
            grid: session.grid,
            mode: session.mode,
            round: session.round,
            current_turn_index: session.current_turn_index,
            action_order: session.action_order.clone(),
            participants: session.participants.clone(),
            forfeited: session.forfeited.iter().copied().collect(),
            status: session.status,
            outcome: session.outcome,
            ransom: session.ransom,
            active_unit: session.active_unit,
            turn_serial: session.turn_serial,
            turn_timer_remaining_ms: session.turn_timer_remaining_ms,
            saved_at: Utc::now(),
        }
    }
}

impl From<&CombatUnit> for UnitRecord {
    fn from(unit: &CombatUnit) -> Self {
        Self {
            id: unit.id,
            owner: unit.owner,
            name: unit.name.clone(),
            category: unit.category,
            level: unit.level,
            stats: unit.stats,
            current_hp: unit.health.current,
            max_hp: unit.health.maximum,
            physical_protection: unit.physical_protection.current,
            max_physical_protection: unit.physical_protection.maximum,
            magical_protection: unit.magical_protection.current,
            max_magical_protection: unit.magical_protection.maximum,
            mana: unit.mana.current,
            max_mana: unit.mana.maximum,
            x: unit.position.x,
            y: unit.position.y,
            start_x: unit.start_position.x,
            start_y: unit.start_position.y,
            attack_range: unit.attack_range,
            moves_left: unit.budget.moves_left,
            actions_left: unit.budget.actions_left,
            action_marks: unit.action_marks,
            alive: unit.alive,
            began_action: unit.began_action,
            conditions: unit.conditions.iter().copied().collect(),
        }
    }
}

impl UnitRecord {
    fn into_unit(self) -> CombatUnit {
        let mut conditions = ConditionSet::new();
        for condition in self.conditions {
            conditions.add(condition.kind, condition.applied_in_own_turn);
        }

        CombatUnit {
            id: self.id,
            owner: self.owner,
            name: self.name,
            category: self.category,
            level: self.level,
            stats: self.stats,
            health: ResourceMeter::new(self.current_hp, self.max_hp),
            physical_protection: ResourceMeter::new(
                self.physical_protection,
                self.max_physical_protection,
            ),
            magical_protection: ResourceMeter::new(
                self.magical_protection,
                self.max_magical_protection,
            ),
            mana: ResourceMeter::new(self.mana, self.max_mana),
            position: Position::new(self.x, self.y),
            start_position: Position::new(self.start_x, self.start_y),
            attack_range: self.attack_range,
            budget: TurnBudget {
                moves_left: self.moves_left,
                actions_left: self.actions_left,
            },
            action_marks: self.action_marks,
            // A stored HP of zero always means dead, whatever the flag says.
            alive: self.alive && self.current_hp > 0,
            conditions,
            began_action: self.began_action,
        }
    }
}

impl From<&Obstacle> for ObstacleRecord {
    fn from(obstacle: &Obstacle) -> Self {
        Self {
            id: obstacle.id,
            x: obstacle.position.x,
            y: obstacle.position.y,
            hp: obstacle.health.current,
            max_hp: obstacle.health.maximum,
            destroyed: obstacle.destroyed,
        }
    }
}

impl ObstacleRecord {
    fn into_obstacle(self) -> Obstacle {
        Obstacle {
            id: self.id,
            position: Position::new(self.x, self.y),
            health: ResourceMeter::new(self.hp, self.max_hp),
            destroyed: self.destroyed,
        }
    }
}

impl StoredSession {
    /// Splits a live session into its record groups.
    pub fn capture(session: &BattleSession) -> Self {
        Self {
            session: SessionRecord::from_session(session),
            units: session.units.iter().map(UnitRecord::from).collect(),
            obstacles: session.obstacles.iter().map(ObstacleRecord::from).collect(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.session.id
    }

    /// Rebuilds the in-memory session. Presence starts empty; recovery decides
    /// who counts as absent.
    pub fn into_session(self) -> BattleSession {
        let record = self.session;
        let mut current_turn_index = record.current_turn_index;
        if current_turn_index >= record.action_order.len() {
            current_turn_index = 0;
        }

        BattleSession {
            id: record.id,
            grid: record.grid,
            mode: record.mode,
            round: record.round,
            current_turn_index,
            action_order: record.action_order,
            participants: record.participants,
            forfeited: record.forfeited.into_iter().collect(),
            status: record.status,
            outcome: record.outcome,
            ransom: record.ransom,
            units: self.units.into_iter().map(UnitRecord::into_unit).collect(),
            obstacles: self
                .obstacles
                .into_iter()
                .map(ObstacleRecord::into_obstacle)
                .collect(),
            active_unit: record.active_unit,
            turn_serial: record.turn_serial,
            turn_timer_remaining_ms: record.turn_timer_remaining_ms,
            presence: PresenceState::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_core::ConditionKind;

    fn session() -> BattleSession {
        let mut unit = CombatUnit::new(
            UnitId(1),
            ParticipantId(1),
            "Brynn",
            UnitCategory::Hero,
            2,
            CoreStats {
                offense: 3,
                mobility: 4,
                focus: 2,
                defense: 2,
                vitality: 1,
            },
            Position::new(2, 3),
        )
        .with_health(7, 19);
        unit.position = Position::new(4, 4);
        unit.action_marks = 1;
        unit.conditions
            .add(ConditionKind::Burning { turns_left: 2 }, false);
        unit.conditions.add(ConditionKind::Dodging, true);

        BattleSession {
            id: SessionId(9),
            grid: GridSize::new(8, 8),
            mode: BattleMode::Arena,
            round: 3,
            current_turn_index: 1,
            action_order: vec![ParticipantId(2), ParticipantId(1)],
            participants: vec![ParticipantId(1), ParticipantId(2)],
            forfeited: Default::default(),
            status: SessionStatus::Active,
            outcome: None,
            ransom: Some(RansomTerms {
                payer: ParticipantId(2),
                amount: 40,
            }),
            units: vec![unit],
            obstacles: vec![Obstacle::new(ObstacleId(1), Position::new(5, 5), 6)],
            active_unit: Some(UnitId(1)),
            turn_serial: 12,
            turn_timer_remaining_ms: Some(4_500),
            presence: PresenceState::default(),
        }
    }

    #[test]
    fn capture_then_rebuild_is_lossless() {
        let original = session();
        let rebuilt = StoredSession::capture(&original).into_session();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn zero_hp_record_is_never_alive() {
        let mut stored = StoredSession::capture(&session());
        stored.units[0].current_hp = 0;
        let rebuilt = stored.into_session();
        assert!(!rebuilt.units[0].alive);
    }
}
