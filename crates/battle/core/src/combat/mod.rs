//! Combat resolution.
//!
//! Pure functions computing the outcome of one action from unit snapshots,
//! battle geometry and a dice stream. Nothing in here mutates a session; the
//! engine applies the returned results.
//!
//! # Core Functions
//!
//! - `roll_pool`: dice pool rolled against the hit threshold
//! - `roll_dodge`: evasion test resolved before any damage
//! - `compute_damage`: protection pool, then flat reduction, then HP
//! - `resolve_attack`: dodge + pool + damage for a single target
//! - `plan_move`: cheapest path under engagement costs
//! - `resolve_contest`: opposed rolls for grab, disarm, knockdown and flee
//! - `resolve_spell_hit`: per-target dodge and damage for offensive spells

pub mod attack;
pub mod damage;
pub mod maneuver;
pub mod movement;
pub mod spell;

pub use attack::{AttackResult, DodgeRoll, PoolRoll, attack_pool_size, resolve_attack, roll_dodge, roll_pool};
pub use damage::{DamageBreakdown, DamageType, apply_breakdown, compute_damage};
pub use maneuver::{ManeuverDetail, ManeuverKind, ManeuverResult, OpposedRoll, resolve_contest, throw_range};
pub use movement::{MovePlan, plan_move};
pub use spell::{Spell, SpellHit, SpellResult, heal_amount, resolve_spell_hit};
