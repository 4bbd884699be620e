//! Narration events: common envelope plus a closed payload union.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use battle_core::{
    AttackResult, BattleMode, BattleOutcome, ConditionTag, EndReason, ExhaustionBonus, GridSize,
    ManeuverResult, ObstacleId, ParticipantId, Position, RansomTerms, SessionId, SpellResult,
    TurnBudget, UnitId,
};

/// Where an event belongs. Only non-battle contexts are stored durably.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventContext {
    /// Combat narration; kept only in the session's ring buffer.
    Battle,
    System,
    Account,
    Match,
}

impl EventContext {
    pub const fn is_durable(self) -> bool {
        !matches!(self, Self::Battle)
    }
}

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventSeverity {
    Info,
    Notice,
    Warning,
    Critical,
}

/// Actor or target named in an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub participant: ParticipantId,
    pub unit: Option<UnitId>,
    pub name: String,
}

/// Who may observe an event.
///
/// An observer qualifies when listed in `always_include`, or when one of
/// their living units sees at least one of `positions`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilitySet {
    pub positions: Vec<Position>,
    pub always_include: BTreeSet<ParticipantId>,
}

impl VisibilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: Position) -> Self {
        if !self.positions.contains(&position) {
            self.positions.push(position);
        }
        self
    }

    pub fn include(mut self, participant: ParticipantId) -> Self {
        self.always_include.insert(participant);
        self
    }
}

/// Structured data of an event, one variant per message type.
///
/// The serde tag doubles as the wire message name (`unit_moved`,
/// `battle_ended`, …), so the text and the payload never disagree about what
/// happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EventPayload {
    // ----- turn -----
    ActionStarted {
        participant: ParticipantId,
        unit: UnitId,
        budget: TurnBudget,
        exhaustion: Option<ExhaustionBonus>,
        resumed: bool,
    },
    UnitTurnEnded {
        participant: ParticipantId,
        unit: UnitId,
        action_marks: u8,
        burn_damage: u32,
        timed_out: bool,
    },
    NextPlayer {
        participant: ParticipantId,
        turn_serial: u64,
        round: u32,
    },
    NewRound {
        round: u32,
    },
    UnitDefeated {
        unit: UnitId,
        owner: ParticipantId,
    },

    // ----- movement -----
    UnitMoved {
        unit: UnitId,
        from: Position,
        to: Position,
        path: Vec<Position>,
        cost: u32,
        released: Option<UnitId>,
    },

    // ----- combat -----
    UnitAttacked {
        result: AttackResult,
    },
    ObstacleDamaged {
        attacker: UnitId,
        obstacle: ObstacleId,
        position: Position,
        damage: u32,
        hp_after: u32,
        destroyed: bool,
    },
    UnitManeuvered {
        result: ManeuverResult,
    },
    SpellCast {
        result: SpellResult,
    },

    // ----- condition -----
    ConditionChanged {
        unit: UnitId,
        condition: ConditionTag,
        applied: bool,
    },

    // ----- lifecycle -----
    BattleStarted {
        order: Vec<ParticipantId>,
        initiative: Vec<(UnitId, u32)>,
        grid: GridSize,
        mode: BattleMode,
    },
    BattleEnded {
        outcome: BattleOutcome,
        ransom: Option<RansomTerms>,
    },
    PlayerLeft {
        participant: ParticipantId,
        reason: EndReason,
    },
    PlayerDisconnected {
        participant: ParticipantId,
    },
    PlayerReconnected {
        participant: ParticipantId,
    },
    RematchRequested {
        participant: ParticipantId,
        votes: usize,
        needed: usize,
    },

    /// Free-form system or account notice.
    Notice {
        text: String,
    },
}

impl EventPayload {
    /// Wire message name, e.g. `unit_attacked`.
    pub fn message_type(&self) -> &'static str {
        self.into()
    }
}

/// One immutable narration record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatEvent {
    /// Per-session sequence id; also the pagination cursor for the ring.
    pub sequence: u64,
    pub session: Option<SessionId>,
    pub timestamp: DateTime<Utc>,
    pub context: EventContext,
    pub severity: EventSeverity,
    pub message: String,
    pub actor: Option<Party>,
    pub target: Option<Party>,
    pub payload: EventPayload,
    /// `None` means every session observer receives the event.
    pub visibility: Option<VisibilitySet>,
}

impl CombatEvent {
    pub fn new(
        context: EventContext,
        severity: EventSeverity,
        message: impl Into<String>,
        payload: EventPayload,
    ) -> Self {
        Self {
            sequence: 0,
            session: None,
            timestamp: Utc::now(),
            context,
            severity,
            message: message.into(),
            actor: None,
            target: None,
            payload,
            visibility: None,
        }
    }

    pub fn in_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_actor(mut self, actor: Option<Party>) -> Self {
        self.actor = actor;
        self
    }

    pub fn with_target(mut self, target: Option<Party>) -> Self {
        self.target = target;
        self
    }

    pub fn visible_to(mut self, visibility: VisibilitySet) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn message_type(&self) -> &'static str {
        self.payload.message_type()
    }

    pub fn is_global(&self) -> bool {
        self.visibility.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_tag_matches_message_type() {
        let event = CombatEvent::new(
            EventContext::Battle,
            EventSeverity::Info,
            "round 2 begins",
            EventPayload::NewRound { round: 2 },
        );
        assert_eq!(event.message_type(), "new_round");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "new_round");
        assert_eq!(json["context"], "battle");
    }

    #[test]
    fn durable_contexts_exclude_battle() {
        assert!(!EventContext::Battle.is_durable());
        assert!(EventContext::Match.is_durable());
        assert!(EventContext::System.is_durable());
    }
}
