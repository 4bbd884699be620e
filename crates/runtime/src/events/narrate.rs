//! Turns engine effects into narration events.
//!
//! Each [`BattleEffect`] becomes exactly one [`CombatEvent`]. The message text
//! embeds the same numbers as the payload (dice, dodge chance vs roll, damage
//! after reduction) so clients can show either. Visibility is computed here,
//! at emission time, from the positions the effect touched and the owners of
//! the units involved.

use battle_core::{
    AttackResult, BattleEffect, BattleSession, DamageBreakdown, DodgeRoll, EndReason,
    ManeuverDetail, ManeuverKind, ManeuverResult, ParticipantId, SpellResult, UnitId,
};

use super::types::{
    CombatEvent, EventContext, EventPayload, EventSeverity, Party, VisibilitySet,
};

/// Narrates a batch of effects against the session state they produced.
pub fn narrate_effects(session: &BattleSession, effects: &[BattleEffect]) -> Vec<CombatEvent> {
    effects
        .iter()
        .map(|effect| narrate(session, effect).in_session(session.id))
        .collect()
}

fn narrate(session: &BattleSession, effect: &BattleEffect) -> CombatEvent {
    let n = Narrator { session };
    match effect {
        BattleEffect::BattleStarted { order, initiative } => {
            let names: Vec<String> = order.iter().map(ToString::to_string).collect();
            CombatEvent::new(
                EventContext::Match,
                EventSeverity::Notice,
                format!(
                    "Battle started on a {}x{} grid, turn order: {}",
                    session.grid.width,
                    session.grid.height,
                    names.join(", ")
                ),
                EventPayload::BattleStarted {
                    order: order.clone(),
                    initiative: initiative.clone(),
                    grid: session.grid,
                    mode: session.mode,
                },
            )
        }

        BattleEffect::ActionStarted {
            participant,
            unit,
            budget,
            exhaustion,
            resumed,
        } => {
            let name = n.name(*unit);
            let message = match (exhaustion, resumed) {
                (_, true) => format!(
                    "{name} is already acting ({} moves, {} actions left)",
                    budget.moves_left, budget.actions_left
                ),
                (Some(bonus), _) if bonus.died => format!(
                    "{name} pushes past exhaustion, pays {} HP and collapses",
                    bonus.hp_cost
                ),
                (Some(bonus), _) => format!(
                    "{name} pushes past exhaustion: {} HP for {} actions (HP {})",
                    bonus.hp_cost, budget.actions_left, bonus.hp_after
                ),
                (None, false) => format!(
                    "{name} begins acting ({} moves, {} actions)",
                    budget.moves_left, budget.actions_left
                ),
            };
            CombatEvent::new(
                EventContext::Battle,
                EventSeverity::Info,
                message,
                EventPayload::ActionStarted {
                    participant: *participant,
                    unit: *unit,
                    budget: *budget,
                    exhaustion: *exhaustion,
                    resumed: *resumed,
                },
            )
            .with_actor(n.party(*unit))
            .visible_to(n.around(&[*unit]))
        }

        BattleEffect::UnitMoved {
            unit,
            plan,
            released,
        } => {
            let mut message = format!(
                "{} moves {} -> {} ({} moves)",
                n.name(*unit),
                plan.from,
                plan.to,
                plan.cost
            );
            if let Some(victim) = released {
                message.push_str(&format!(", releasing {}", n.name(*victim)));
            }
            let mut visibility = n.around(&[*unit]).at(plan.from).at(plan.to);
            if let Some(victim) = released {
                visibility = n.extend(visibility, *victim);
            }
            CombatEvent::new(
                EventContext::Battle,
                EventSeverity::Info,
                message,
                EventPayload::UnitMoved {
                    unit: *unit,
                    from: plan.from,
                    to: plan.to,
                    path: plan.path.clone(),
                    cost: plan.cost,
                    released: *released,
                },
            )
            .with_actor(n.party(*unit))
            .visible_to(visibility)
        }

        BattleEffect::UnitAttacked(result) => CombatEvent::new(
            EventContext::Battle,
            if result.target_defeated {
                EventSeverity::Notice
            } else {
                EventSeverity::Info
            },
            n.attack_text(result),
            EventPayload::UnitAttacked {
                result: result.clone(),
            },
        )
        .with_actor(n.party(result.attacker))
        .with_target(n.party(result.target))
        .visible_to(n.around(&[result.attacker, result.target])),

        BattleEffect::ObstacleDamaged {
            attacker,
            obstacle,
            position,
            damage,
            hp_after,
            destroyed,
        } => {
            let outcome = if *destroyed {
                "destroyed".to_string()
            } else {
                format!("HP {hp_after}")
            };
            CombatEvent::new(
                EventContext::Battle,
                EventSeverity::Info,
                format!(
                    "{} strikes {} at {} for {} ({})",
                    n.name(*attacker),
                    obstacle,
                    position,
                    damage,
                    outcome
                ),
                EventPayload::ObstacleDamaged {
                    attacker: *attacker,
                    obstacle: *obstacle,
                    position: *position,
                    damage: *damage,
                    hp_after: *hp_after,
                    destroyed: *destroyed,
                },
            )
            .with_actor(n.party(*attacker))
            .visible_to(n.around(&[*attacker]).at(*position))
        }

        BattleEffect::UnitManeuvered(result) => {
            let mut visibility = n.around(&[result.actor]);
            if let Some(target) = result.target {
                visibility = n.extend(visibility, target);
            }
            if let ManeuverDetail::Throw { from, landing, .. } = &result.detail {
                visibility = visibility.at(*from).at(*landing);
            }
            CombatEvent::new(
                EventContext::Battle,
                if result.target_defeated {
                    EventSeverity::Notice
                } else {
                    EventSeverity::Info
                },
                n.maneuver_text(result),
                EventPayload::UnitManeuvered {
                    result: result.clone(),
                },
            )
            .with_actor(n.party(result.actor))
            .with_target(result.target.and_then(|t| n.party(t)))
            .visible_to(visibility)
        }

        BattleEffect::SpellCast(result) => {
            let mut visibility = n.around(&[result.caster]).at(result.center);
            for hit in &result.hits {
                visibility = n.extend(visibility, hit.target);
            }
            let defeated = result.hits.iter().any(|h| h.target_defeated);
            let single_target = match result.hits.as_slice() {
                [hit] => n.party(hit.target),
                _ => None,
            };
            CombatEvent::new(
                EventContext::Battle,
                if defeated {
                    EventSeverity::Notice
                } else {
                    EventSeverity::Info
                },
                n.spell_text(result),
                EventPayload::SpellCast {
                    result: result.clone(),
                },
            )
            .with_actor(n.party(result.caster))
            .with_target(single_target)
            .visible_to(visibility)
        }

        BattleEffect::ConditionChanged {
            unit,
            condition,
            applied,
        } => {
            let verb = if *applied { "is now" } else { "is no longer" };
            CombatEvent::new(
                EventContext::Battle,
                EventSeverity::Info,
                format!("{} {verb} {}", n.name(*unit), condition.to_string().replace('_', " ")),
                EventPayload::ConditionChanged {
                    unit: *unit,
                    condition: *condition,
                    applied: *applied,
                },
            )
            .with_target(n.party(*unit))
            .visible_to(n.around(&[*unit]))
        }

        BattleEffect::UnitDefeated { unit, owner } => CombatEvent::new(
            EventContext::Battle,
            EventSeverity::Warning,
            format!("{} is defeated", n.name(*unit)),
            EventPayload::UnitDefeated {
                unit: *unit,
                owner: *owner,
            },
        )
        .with_target(n.party(*unit))
        .visible_to(n.around(&[*unit])),

        BattleEffect::UnitTurnEnded {
            participant,
            unit,
            action_marks,
            burn_damage,
            timed_out,
        } => {
            let mut message = if *timed_out {
                format!("{}'s turn ran out of time", n.name(*unit))
            } else {
                format!("{} ends its turn", n.name(*unit))
            };
            if *burn_damage > 0 {
                message.push_str(&format!(", burning for {burn_damage}"));
            }
            CombatEvent::new(
                EventContext::Battle,
                EventSeverity::Info,
                message,
                EventPayload::UnitTurnEnded {
                    participant: *participant,
                    unit: *unit,
                    action_marks: *action_marks,
                    burn_damage: *burn_damage,
                    timed_out: *timed_out,
                },
            )
            .with_actor(n.party(*unit))
            .visible_to(n.around(&[*unit]))
        }

        BattleEffect::NextPlayer {
            participant,
            turn_serial,
        } => CombatEvent::new(
            EventContext::Battle,
            EventSeverity::Info,
            format!("{participant} to act"),
            EventPayload::NextPlayer {
                participant: *participant,
                turn_serial: *turn_serial,
                round: session.round,
            },
        ),

        BattleEffect::NewRound { round } => CombatEvent::new(
            EventContext::Battle,
            EventSeverity::Info,
            format!("Round {round} begins"),
            EventPayload::NewRound { round: *round },
        ),

        BattleEffect::ParticipantForfeited {
            participant,
            reason,
        } => {
            let verb = match reason {
                EndReason::Surrender => "surrendered",
                _ => "left the battle",
            };
            CombatEvent::new(
                EventContext::Match,
                EventSeverity::Notice,
                format!("{participant} {verb}"),
                EventPayload::PlayerLeft {
                    participant: *participant,
                    reason: *reason,
                },
            )
        }

        BattleEffect::BattleEnded(outcome) => {
            let mut message = match outcome.winner {
                Some(winner) => format!("Battle over: {winner} wins ({})", outcome.reason),
                None => format!("Battle over: no winner ({})", outcome.reason),
            };
            if let Some(ransom) = session.ransom {
                message.push_str(&format!(
                    ", ransom {} owed by {}",
                    ransom.amount, ransom.payer
                ));
            }
            CombatEvent::new(
                EventContext::Match,
                EventSeverity::Critical,
                message,
                EventPayload::BattleEnded {
                    outcome: *outcome,
                    ransom: session.ransom,
                },
            )
        }
    }
}

/// Lifecycle events raised by the runtime rather than the engine.
pub fn presence_event(
    session: &BattleSession,
    participant: ParticipantId,
    connected: bool,
) -> CombatEvent {
    let (message, payload) = if connected {
        (
            format!("{participant} reconnected"),
            EventPayload::PlayerReconnected { participant },
        )
    } else {
        (
            format!("{participant} disconnected"),
            EventPayload::PlayerDisconnected { participant },
        )
    };
    CombatEvent::new(EventContext::Match, EventSeverity::Notice, message, payload)
        .in_session(session.id)
}

pub fn rematch_event(
    session: &BattleSession,
    participant: ParticipantId,
    votes: usize,
    needed: usize,
) -> CombatEvent {
    CombatEvent::new(
        EventContext::Match,
        EventSeverity::Info,
        format!("{participant} wants a rematch ({votes}/{needed})"),
        EventPayload::RematchRequested {
            participant,
            votes,
            needed,
        },
    )
    .in_session(session.id)
}

struct Narrator<'a> {
    session: &'a BattleSession,
}

impl Narrator<'_> {
    fn name(&self, unit: UnitId) -> String {
        self.session
            .unit(unit)
            .map_or_else(|| format!("unit {unit}"), |u| u.name.clone())
    }

    fn party(&self, unit: UnitId) -> Option<Party> {
        self.session.unit(unit).map(|u| Party {
            participant: u.owner,
            unit: Some(u.id),
            name: u.name.clone(),
        })
    }

    /// Positions and owners of `units`.
    fn around(&self, units: &[UnitId]) -> VisibilitySet {
        units
            .iter()
            .fold(VisibilitySet::new(), |set, &unit| self.extend(set, unit))
    }

    fn extend(&self, set: VisibilitySet, unit: UnitId) -> VisibilitySet {
        match self.session.unit(unit) {
            Some(u) => set.at(u.position).include(u.owner),
            None => set,
        }
    }

    fn attack_text(&self, result: &AttackResult) -> String {
        let attacker = self.name(result.attacker);
        let target = self.name(result.target);
        if result.dodge.dodged {
            return format!(
                "{attacker} attacks {target}: dodged ({})",
                dodge_text(&result.dodge)
            );
        }
        let mut text = format!(
            "{attacker} attacks {target}: {}, dice {:?} -> {} hits",
            dodge_text(&result.dodge),
            result.pool.dice,
            result.pool.hits
        );
        if let Some(damage) = &result.damage {
            text.push_str(", ");
            text.push_str(&damage_text(damage));
        }
        if result.target_defeated {
            text.push_str(&format!(", {target} is defeated"));
        }
        text
    }

    fn maneuver_text(&self, result: &ManeuverResult) -> String {
        let actor = self.name(result.actor);
        let target = result.target.map(|t| self.name(t)).unwrap_or_default();
        let outcome = if result.success { "succeeds" } else { "fails" };

        match (&result.detail, result.kind) {
            (ManeuverDetail::Dash { moves_gained }, _) => {
                format!("{actor} dashes (+{moves_gained} moves)")
            }
            (ManeuverDetail::Stance, _) => format!("{actor} takes a dodging stance"),
            (ManeuverDetail::Contest(roll), kind) => format!(
                "{actor} tries to {} {target}: {} + {} vs {} + {}, {outcome}",
                contest_verb(kind),
                roll.actor_score,
                roll.actor_roll,
                roll.opponent_score,
                roll.opponent_roll
            ),
            (
                ManeuverDetail::Throw {
                    from,
                    landing,
                    fall,
                },
                _,
            ) => {
                let mut text = format!(
                    "{actor} throws {target} from {from} to {landing}: {}",
                    damage_text(fall)
                );
                if result.target_defeated {
                    text.push_str(&format!(", {target} is defeated"));
                }
                text
            }
            (ManeuverDetail::Protect { restored }, _) => {
                format!("{actor} shields {target} (+{restored} protection)")
            }
            (ManeuverDetail::Help, _) => format!("{actor} helps {target}"),
            (
                ManeuverDetail::Flee {
                    contest,
                    moves_gained,
                },
                _,
            ) => {
                let mut text = format!(
                    "{actor} tries to break free: {} + {} vs {} + {}, {outcome}",
                    contest.actor_score,
                    contest.actor_roll,
                    contest.opponent_score,
                    contest.opponent_roll
                );
                if result.success && *moves_gained > 0 {
                    text.push_str(&format!(" (+{moves_gained} move)"));
                }
                text
            }
        }
    }

    fn spell_text(&self, result: &SpellResult) -> String {
        let caster = self.name(result.caster);
        let mut text = format!(
            "{caster} casts {} at {} ({} mana)",
            result.spell, result.center, result.mana_spent
        );
        if result.hits.is_empty() {
            text.push_str(", hitting nothing");
            return text;
        }

        let parts: Vec<String> = result
            .hits
            .iter()
            .map(|hit| {
                let target = self.name(hit.target);
                if hit.healed > 0 {
                    return format!("{target} heals {}", hit.healed);
                }
                if hit.protection_restored > 0 {
                    return format!("{target} gains {} warding", hit.protection_restored);
                }
                if let Some(dodge) = &hit.dodge
                    && dodge.dodged
                {
                    return format!("{target} dodges ({})", dodge_text(dodge));
                }
                let mut part = format!("{target}: dice {:?} -> {} hits", hit.pool.dice, hit.pool.hits);
                if let Some(damage) = &hit.damage {
                    part.push_str(", ");
                    part.push_str(&damage_text(damage));
                }
                if hit.burning {
                    part.push_str(", burning");
                }
                if hit.target_defeated {
                    part.push_str(", defeated");
                }
                part
            })
            .collect();
        text.push_str(": ");
        text.push_str(&parts.join("; "));
        text
    }
}

fn contest_verb(kind: ManeuverKind) -> &'static str {
    match kind {
        ManeuverKind::Grab => "grab",
        ManeuverKind::Disarm => "disarm",
        ManeuverKind::Knockdown => "knock down",
        _ => kind.into(),
    }
}

fn dodge_text(dodge: &DodgeRoll) -> String {
    match dodge.roll {
        Some(roll) => format!("dodge {}% vs roll {}", dodge.chance, roll),
        None => "no dodge".to_string(),
    }
}

fn damage_text(damage: &DamageBreakdown) -> String {
    format!(
        "{} {} raw, -{} reduced, {} damage (HP {})",
        damage.raw,
        damage.damage_type,
        damage.reduction(),
        damage.final_damage,
        damage.hp_after
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use battle_core::{
        BattleMode, CombatUnit, CoreStats, DamageType, GridSize, MovePlan, PoolRoll, Position,
        PresenceState, SessionId, SessionStatus, UnitCategory,
    };

    const P1: ParticipantId = ParticipantId(1);
    const P2: ParticipantId = ParticipantId(2);

    fn session() -> BattleSession {
        let unit = |id: u32, owner, name: &str, at| {
            CombatUnit::new(
                UnitId(id),
                owner,
                name,
                UnitCategory::Troop,
                1,
                CoreStats {
                    offense: 4,
                    ..Default::default()
                },
                at,
            )
        };
        BattleSession {
            id: SessionId(4),
            grid: GridSize::new(10, 10),
            mode: BattleMode::Standard,
            round: 1,
            current_turn_index: 0,
            action_order: vec![P1, P2],
            participants: vec![P1, P2],
            forfeited: Default::default(),
            status: SessionStatus::Active,
            outcome: None,
            ransom: None,
            units: vec![
                unit(1, P1, "Aldric", Position::new(1, 1)),
                unit(2, P2, "Mora", Position::new(2, 1)),
            ],
            obstacles: Vec::new(),
            active_unit: Some(UnitId(1)),
            turn_serial: 1,
            turn_timer_remaining_ms: None,
            presence: PresenceState::default(),
        }
    }

    #[test]
    fn attack_message_embeds_dice_and_damage() {
        let session = session();
        let result = AttackResult {
            attacker: UnitId(1),
            target: UnitId(2),
            dodge: DodgeRoll {
                chance: 9,
                roll: Some(40),
                dodged: false,
            },
            pool: PoolRoll {
                dice: vec![5, 6, 5, 2],
                hits: 3,
                raw_damage: 6,
            },
            damage: Some(DamageBreakdown {
                damage_type: DamageType::Physical,
                raw: 6,
                absorbed: 0,
                reduced: 0,
                final_damage: 6,
                hp_after: 4,
                protection_after: 0,
                defeated: false,
            }),
            target_defeated: false,
        };

        let events = narrate_effects(&session, &[BattleEffect::UnitAttacked(result)]);
        let event = &events[0];
        assert_eq!(event.message_type(), "unit_attacked");
        assert_eq!(event.session, Some(SessionId(4)));
        assert!(event.message.contains("dodge 9% vs roll 40"));
        assert!(event.message.contains("[5, 6, 5, 2] -> 3 hits"));
        assert!(event.message.contains("6 damage (HP 4)"));

        let visibility = event.visibility.as_ref().unwrap();
        assert!(visibility.always_include.contains(&P1));
        assert!(visibility.always_include.contains(&P2));
        assert!(visibility.positions.contains(&Position::new(2, 1)));
    }

    #[test]
    fn move_visibility_covers_origin_and_destination() {
        let mut session = session();
        session.units[0].position = Position::new(4, 1);
        let plan = MovePlan {
            from: Position::new(1, 1),
            to: Position::new(4, 1),
            path: vec![Position::new(2, 2), Position::new(3, 1), Position::new(4, 1)],
            cost: 4,
        };

        let events = narrate_effects(
            &session,
            &[BattleEffect::UnitMoved {
                unit: UnitId(1),
                plan,
                released: None,
            }],
        );
        let visibility = events[0].visibility.as_ref().unwrap();
        assert!(visibility.positions.contains(&Position::new(1, 1)));
        assert!(visibility.positions.contains(&Position::new(4, 1)));
        assert_eq!(visibility.always_include.len(), 1);
    }

    #[test]
    fn turn_and_lifecycle_events_are_global() {
        let session = session();
        let events = narrate_effects(
            &session,
            &[
                BattleEffect::NextPlayer {
                    participant: P2,
                    turn_serial: 2,
                },
                BattleEffect::ParticipantForfeited {
                    participant: P1,
                    reason: EndReason::Surrender,
                },
            ],
        );
        assert!(events.iter().all(CombatEvent::is_global));
        assert_eq!(events[0].context, EventContext::Battle);
        assert_eq!(events[1].context, EventContext::Match);
        assert_eq!(events[1].message_type(), "player_left");
        assert_eq!(events[1].message, "p1 surrendered");
    }
}
