//! Wire messages exchanged with battle clients.
//!
//! [`ClientMessage`] is what the transport layer hands to a session;
//! [`ServerMessage`] is what the session pushes back. Both are serde-tagged
//! with snake_case names, so the JSON form reads `{"type": "move", ...}`.

use serde::{Deserialize, Serialize};

use battle_core::{
    BattleAction, BattleMode, BattleOutcome, BattleSession, CombatUnit, EndReason, GridSize,
    Obstacle, ObstacleId, ParticipantId, Position, RansomTerms, SessionId, SessionStatus, Spell,
    UnitId,
};

use crate::events::{CombatEvent, EventPage};

/// A request from one participant, addressed to one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ClientMessage {
    BeginAction {
        unit: UnitId,
    },
    Move {
        unit: UnitId,
        to: Position,
    },
    Attack {
        unit: UnitId,
        target: UnitId,
    },
    AttackObstacle {
        unit: UnitId,
        obstacle: ObstacleId,
    },
    Dash {
        unit: UnitId,
    },
    Dodge {
        unit: UnitId,
    },
    Grab {
        unit: UnitId,
        target: UnitId,
    },
    Throw {
        unit: UnitId,
        target: UnitId,
        landing: Position,
    },
    Disarm {
        unit: UnitId,
        target: UnitId,
    },
    Knockdown {
        unit: UnitId,
        target: UnitId,
    },
    Protect {
        unit: UnitId,
        ally: UnitId,
    },
    Help {
        unit: UnitId,
        ally: UnitId,
    },
    Flee {
        unit: UnitId,
    },
    Cast {
        unit: UnitId,
        spell: Spell,
        target: Position,
    },
    EndUnitAction {
        unit: UnitId,
    },
    Surrender,
    LeaveBattle,
    RequestRematch,
    GetBattleState {
        /// Only events older than this sequence id.
        #[serde(default)]
        cursor: Option<u64>,
        #[serde(default)]
        limit: Option<usize>,
    },
}

/// What a [`ClientMessage`] asks the session to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Request {
    Begin(UnitId),
    Act(UnitId, BattleAction),
    End(UnitId),
    Forfeit(EndReason),
    Rematch,
    State {
        cursor: Option<u64>,
        limit: Option<usize>,
    },
}

impl ClientMessage {
    /// Wire name, e.g. `attack_obstacle`.
    pub fn name(&self) -> &'static str {
        self.into()
    }

    pub(crate) fn into_request(self) -> Request {
        use ClientMessage::*;
        let act = Request::Act;
        match self {
            BeginAction { unit } => Request::Begin(unit),
            Move { unit, to } => act(unit, BattleAction::Move { to }),
            Attack { unit, target } => act(unit, BattleAction::Attack { target }),
            AttackObstacle { unit, obstacle } => act(unit, BattleAction::AttackObstacle { obstacle }),
            Dash { unit } => act(unit, BattleAction::Dash),
            Dodge { unit } => act(unit, BattleAction::Dodge),
            Grab { unit, target } => act(unit, BattleAction::Grab { target }),
            Throw {
                unit,
                target,
                landing,
            } => act(unit, BattleAction::Throw { target, landing }),
            Disarm { unit, target } => act(unit, BattleAction::Disarm { target }),
            Knockdown { unit, target } => act(unit, BattleAction::Knockdown { target }),
            Protect { unit, ally } => act(unit, BattleAction::Protect { ally }),
            Help { unit, ally } => act(unit, BattleAction::Help { ally }),
            Flee { unit } => act(unit, BattleAction::Flee),
            Cast {
                unit,
                spell,
                target,
            } => act(unit, BattleAction::Cast { spell, target }),
            EndUnitAction { unit } => Request::End(unit),
            Surrender => Request::Forfeit(EndReason::Surrender),
            LeaveBattle => Request::Forfeit(EndReason::Abandoned),
            RequestRematch => Request::Rematch,
            GetBattleState { cursor, limit } => Request::State { cursor, limit },
        }
    }
}

/// A message pushed from a session to one participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Narration; the payload tag names the acknowledgment (`unit_moved`, ...).
    Event(CombatEvent),
    BattleState(Box<BattleStateView>),
    /// The request was refused and nothing changed.
    Rejected {
        request: String,
        code: String,
        message: String,
    },
}

impl ServerMessage {
    pub fn as_event(&self) -> Option<&CombatEvent> {
        match self {
            Self::Event(event) => Some(event),
            _ => None,
        }
    }
}

/// Full-state snapshot for late joiners and reconnects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleStateView {
    pub session: SessionId,
    pub grid: GridSize,
    pub mode: BattleMode,
    pub round: u32,
    pub status: SessionStatus,
    pub turn_holder: Option<ParticipantId>,
    pub action_order: Vec<ParticipantId>,
    pub active_unit: Option<UnitId>,
    pub units: Vec<CombatUnit>,
    pub obstacles: Vec<Obstacle>,
    pub outcome: Option<BattleOutcome>,
    pub ransom: Option<RansomTerms>,
    pub turn_time_remaining_ms: Option<u64>,
    /// Most recent ring events this participant may see, oldest first.
    pub events: Vec<CombatEvent>,
    /// Cursor for the next older page, if any.
    pub next_cursor: Option<u64>,
}

impl BattleStateView {
    pub fn new(session: &BattleSession, turn_time_remaining_ms: Option<u64>, page: EventPage) -> Self {
        Self {
            session: session.id,
            grid: session.grid,
            mode: session.mode,
            round: session.round,
            status: session.status,
            turn_holder: session.turn_holder(),
            action_order: session.action_order.clone(),
            active_unit: session.active_unit,
            units: session.units.clone(),
            obstacles: session.obstacles.clone(),
            outcome: session.outcome,
            ransom: session.ransom,
            turn_time_remaining_ms,
            events: page.events,
            next_cursor: page.next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_messages_parse_from_tagged_json() {
        let message: ClientMessage =
            serde_json::from_str(r#"{"type":"move","unit":3,"to":{"x":4,"y":1}}"#).unwrap();
        assert_eq!(message.name(), "move");
        assert_eq!(
            message.into_request(),
            Request::Act(
                UnitId(3),
                BattleAction::Move {
                    to: Position::new(4, 1)
                }
            )
        );

        let message: ClientMessage = serde_json::from_str(r#"{"type":"get_battle_state"}"#).unwrap();
        assert_eq!(
            message.into_request(),
            Request::State {
                cursor: None,
                limit: None
            }
        );
    }

    #[test]
    fn leaving_and_surrendering_forfeit_with_distinct_reasons() {
        assert_eq!(
            ClientMessage::Surrender.into_request(),
            Request::Forfeit(EndReason::Surrender)
        );
        assert_eq!(
            ClientMessage::LeaveBattle.into_request(),
            Request::Forfeit(EndReason::Abandoned)
        );
        assert_eq!(ClientMessage::EndUnitAction { unit: UnitId(1) }.name(), "end_unit_action");
    }

    #[test]
    fn rejection_serializes_with_type_tag() {
        let message = ServerMessage::Rejected {
            request: "attack".into(),
            code: "ACTION_NOT_YOUR_TURN".into(),
            message: "not p2's turn".into(),
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "rejected");
        assert_eq!(json["code"], "ACTION_NOT_YOUR_TURN");
    }
}
