//! Fixed-capacity turn history.

use crate::turn::Turn;
use std::collections::VecDeque;

/// Upper bound on the slots reserved when a window is created.
const INITIAL_SLOTS: usize = 32;

/// Keeps only the most recent `capacity` turns. Older turns fall off the
/// front as new ones are pushed.
#[derive(Debug, Clone)]
pub struct TurnWindow {
    capacity: usize,
    turns: VecDeque<Turn>,
}

impl TurnWindow {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            turns: VecDeque::with_capacity(capacity.min(INITIAL_SLOTS)),
        }
    }

    /// Push a turn, returning how many old turns were dropped.
    pub fn push(&mut self, turn: Turn) -> usize {
        self.turns.push_back(turn);
        let mut dropped = 0;
        while self.turns.len() > self.capacity {
            self.turns.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn extend(&mut self, turns: impl IntoIterator<Item = Turn>) -> usize {
        turns.into_iter().map(|t| self.push(t)).sum()
    }

    /// Copy of the retained turns, oldest first.
    pub fn to_vec(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.back()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
