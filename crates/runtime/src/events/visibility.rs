//! Per-observer fog-of-war filter.
//!
//! Recomputed for every event against the session as it stands when the
//! event is delivered; there is no static subscription list.

use battle_core::{BattleSession, ParticipantId};

use super::types::{CombatEvent, VisibilitySet};

/// True when `observer` may receive an event with this visibility.
pub fn can_observe(
    visibility: Option<&VisibilitySet>,
    observer: ParticipantId,
    session: &BattleSession,
) -> bool {
    let Some(set) = visibility else {
        return true;
    };
    if set.always_include.contains(&observer) {
        return true;
    }

    session.living_units_of(observer).any(|unit| {
        let range = unit.vision_range();
        set.positions
            .iter()
            .any(|&position| unit.position.distance(position) <= range)
    })
}

/// Participants of `session` allowed to see `event`.
pub fn observers_of(event: &CombatEvent, session: &BattleSession) -> Vec<ParticipantId> {
    session
        .participants
        .iter()
        .copied()
        .filter(|&p| can_observe(event.visibility.as_ref(), p, session))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_core::{
        BattleMode, CombatUnit, CoreStats, GridSize, Position, PresenceState, SessionId,
        SessionStatus, UnitCategory, UnitId,
    };

    const NEAR: ParticipantId = ParticipantId(1);
    const FAR: ParticipantId = ParticipantId(2);
    const ACTOR: ParticipantId = ParticipantId(3);

    fn troop(id: u32, owner: ParticipantId, at: Position) -> CombatUnit {
        CombatUnit::new(
            UnitId(id),
            owner,
            format!("troop-{id}"),
            UnitCategory::Troop,
            1,
            CoreStats::default(),
            at,
        )
        .with_health(5, 10)
    }

    fn session() -> BattleSession {
        BattleSession {
            id: SessionId(1),
            grid: GridSize::new(30, 30),
            mode: BattleMode::Standard,
            round: 1,
            current_turn_index: 0,
            action_order: vec![NEAR, FAR, ACTOR],
            participants: vec![NEAR, FAR, ACTOR],
            forfeited: Default::default(),
            status: SessionStatus::Active,
            outcome: None,
            ransom: None,
            // Troop vision range is 4.
            units: vec![
                troop(1, NEAR, Position::new(2, 2)),
                troop(2, FAR, Position::new(25, 25)),
                troop(3, ACTOR, Position::new(0, 0)),
            ],
            obstacles: Vec::new(),
            active_unit: None,
            turn_serial: 1,
            turn_timer_remaining_ms: None,
            presence: PresenceState::default(),
        }
    }

    #[test]
    fn global_events_reach_everyone() {
        let session = session();
        assert!(can_observe(None, FAR, &session));
    }

    #[test]
    fn out_of_range_observer_is_filtered_but_always_include_is_not() {
        let session = session();
        let set = VisibilitySet::new().at(Position::new(5, 5)).include(ACTOR);

        assert!(can_observe(Some(&set), NEAR, &session));
        assert!(!can_observe(Some(&set), FAR, &session));
        // The actor's only unit is 5 cells away, but acting always qualifies.
        assert!(can_observe(Some(&set), ACTOR, &session));
    }

    #[test]
    fn any_listed_position_is_enough() {
        let session = session();
        let set = VisibilitySet::new()
            .at(Position::new(10, 10))
            .at(Position::new(22, 24));
        assert!(can_observe(Some(&set), FAR, &session));
        assert!(!can_observe(Some(&set), NEAR, &session));
    }

    #[test]
    fn dead_units_see_nothing() {
        let mut session = session();
        session.units[0].lose_hp(10);
        let set = VisibilitySet::new().at(Position::new(2, 3));
        assert!(!can_observe(Some(&set), NEAR, &session));
    }
}
