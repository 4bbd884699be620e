//! Dice sources for combat resolution.
//!
//! Every random value in a battle (initiative, attack pools, dodge, contests)
//! is drawn through the [`Dice`] trait so resolution stays a pure function of
//! its inputs plus the dice stream.
//!
//! # Determinism
//!
//! [`SeededDice`] produces the same sequence for the same seed, which makes
//! replays and bug reports reproducible. [`ScriptedDice`] returns a fixed
//! sequence of face values and is what scenario tests use.

use std::collections::VecDeque;

/// Source of die rolls.
pub trait Dice: Send {
    /// Generate the next raw 32-bit value.
    fn next_u32(&mut self) -> u32;

    /// Roll a die with N sides (1-N inclusive).
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        (self.next_u32() % sides) + 1
    }

    /// Roll a d100 (1-100 inclusive).
    fn roll_d100(&mut self) -> u32 {
        self.roll_die(100)
    }
}

/// PCG random stream (PCG-XSH-RR, 64-bit state, 32-bit output).
///
/// - **Deterministic**: same seed always produces the same rolls
/// - **Fast**: one multiply, one xorshift and one rotate per value
/// - **Small state**: only 64 bits, cheap to keep per session
#[derive(Clone, Copy, Debug)]
pub struct SeededDice {
    state: u64,
}

impl SeededDice {
    /// PCG multiplier constant.
    const MULTIPLIER: u64 = 6364136223846793005;

    /// PCG increment constant.
    const INCREMENT: u64 = 1442695040888963407;

    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.wrapping_add(Self::INCREMENT),
        }
    }

    /// Advance the LCG state: `state' = state × multiplier + increment (mod 2^64)`.
    #[inline]
    fn step(&mut self) -> u64 {
        let old = self.state;
        self.state = old
            .wrapping_mul(Self::MULTIPLIER)
            .wrapping_add(Self::INCREMENT);
        old
    }

    /// XSH-RR output permutation.
    #[inline]
    fn output(state: u64) -> u32 {
        let xorshifted = (((state >> 18) ^ state) >> 27) as u32;
        let rot = (state >> 59) as u32;
        xorshifted.rotate_right(rot)
    }
}

impl Dice for SeededDice {
    fn next_u32(&mut self) -> u32 {
        let state = self.step();
        Self::output(state)
    }
}

/// Dice that replay a fixed list of face values.
///
/// `roll_die` returns the next scripted value clamped into `1..=sides`; once
/// the script runs out the fallback face is returned forever.
#[derive(Clone, Debug)]
pub struct ScriptedDice {
    faces: VecDeque<u32>,
    fallback: u32,
}

impl ScriptedDice {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
            fallback: 1,
        }
    }

    /// Face returned after the script is exhausted.
    pub fn with_fallback(mut self, fallback: u32) -> Self {
        self.fallback = fallback;
        self
    }

    /// Appends more faces to the end of the script.
    pub fn push(&mut self, faces: impl IntoIterator<Item = u32>) {
        self.faces.extend(faces);
    }

    /// Number of scripted faces not yet consumed.
    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl Dice for ScriptedDice {
    fn next_u32(&mut self) -> u32 {
        self.faces.pop_front().unwrap_or(self.fallback)
    }

    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.next_u32().clamp(1, sides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_dice_are_reproducible() {
        let mut a = SeededDice::new(42);
        let mut b = SeededDice::new(42);
        let rolls_a: Vec<u32> = (0..32).map(|_| a.roll_die(6)).collect();
        let rolls_b: Vec<u32> = (0..32).map(|_| b.roll_die(6)).collect();
        assert_eq!(rolls_a, rolls_b);
        assert!(rolls_a.iter().all(|r| (1..=6).contains(r)));
    }

    #[test]
    fn different_seeds_diverge() {
        let mut a = SeededDice::new(1);
        let mut b = SeededDice::new(2);
        let rolls_a: Vec<u32> = (0..16).map(|_| a.next_u32()).collect();
        let rolls_b: Vec<u32> = (0..16).map(|_| b.next_u32()).collect();
        assert_ne!(rolls_a, rolls_b);
    }

    #[test]
    fn scripted_dice_clamp_and_fall_back() {
        let mut dice = ScriptedDice::new([9, 0, 4]).with_fallback(2);
        assert_eq!(dice.roll_die(6), 6);
        assert_eq!(dice.roll_die(6), 1);
        assert_eq!(dice.roll_die(6), 4);
        assert_eq!(dice.roll_die(6), 2);
        assert_eq!(dice.remaining(), 0);
    }
}
