//! Grid pathing under engagement costs.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use crate::state::{BattleSession, CombatUnit, Position};

/// A validated path for one move.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MovePlan {
    pub from: Position,
    pub to: Position,
    /// Cells entered, in order, ending at `to`.
    pub path: Vec<Position>,
    /// Moves consumed.
    pub cost: u32,
}

/// Cost of stepping out of `cell` for `mover`.
///
/// Leaving a cell adjacent to a living enemy costs one extra move.
fn step_cost(session: &BattleSession, mover: &CombatUnit, cell: Position) -> u32 {
    let engaged = session
        .units
        .iter()
        .any(|u| u.alive && u.owner != mover.owner && u.position.is_adjacent(cell));
    if engaged { 2 } else { 1 }
}

/// Cheapest path from the mover's position to `to`, or `None` if unreachable.
///
/// Obstacles and living units are impassable. The budget is not applied here;
/// callers compare `cost` against the unit's remaining moves.
pub fn plan_move(session: &BattleSession, mover: &CombatUnit, to: Position) -> Option<MovePlan> {
    let from = mover.position;
    if from == to || !session.grid.contains(to) || session.is_blocked(to) {
        return None;
    }

    let mut best: BTreeMap<Position, u32> = BTreeMap::new();
    let mut previous: BTreeMap<Position, Position> = BTreeMap::new();
    let mut frontier = BinaryHeap::new();

    best.insert(from, 0);
    frontier.push(Reverse((0u32, from)));

    while let Some(Reverse((cost, cell))) = frontier.pop() {
        if cell == to {
            break;
        }
        if best.get(&cell).is_some_and(|&known| cost > known) {
            continue;
        }

        let leave = step_cost(session, mover, cell);
        for next in cell.neighbors() {
            if !session.grid.contains(next) || session.is_blocked(next) {
                continue;
            }
            let next_cost = cost + leave;
            if best.get(&next).is_none_or(|&known| next_cost < known) {
                best.insert(next, next_cost);
                previous.insert(next, cell);
                frontier.push(Reverse((next_cost, next)));
            }
        }
    }

    let cost = *best.get(&to)?;
    let mut path = vec![to];
    let mut cursor = to;
    while let Some(&prev) = previous.get(&cursor) {
        if prev == from {
            break;
        }
        path.push(prev);
        cursor = prev;
    }
    path.reverse();

    Some(MovePlan {
        from,
        to,
        path,
        cost,
    })
}
