//! Shuffle-bag selection engine.
//!
//! Draws walk a random permutation of the candidate set. Every candidate is
//! drawn once before any repeats; the permutation is rebuilt when it runs out
//! or when the candidate set is replaced.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::Candidate;

/// Observable state of a [`SelectionEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SelectionState {
    /// No candidates; draws return `None`.
    Empty,
    /// The next draw starts a fresh permutation.
    Unshuffled,
    /// Inside a permutation; `cursor` items of it have been drawn.
    InCycle { cursor: usize },
}

/// Non-repeating random selector over a caller-supplied candidate set.
///
/// Randomness is injected; use [`SelectionEngine::seeded`] for reproducible
/// draw orders.
pub struct SelectionEngine<T, R = StdRng> {
    candidates: Vec<T>,
    /// Indices into `candidates`, in draw order.
    order: Vec<usize>,
    cursor: usize,
    /// Set by `set_candidates`; cleared by `shuffle`.
    invalidated: bool,
    selected: Option<T>,
    rng: R,
}

impl<T: Candidate + Clone> SelectionEngine<T, StdRng> {
    /// Engine seeded from the operating system's entropy source.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Engine with a fixed seed. Same seed and same inputs give the same draws.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }
}

impl<T: Candidate + Clone> Default for SelectionEngine<T, StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Candidate + Clone, R: Rng> SelectionEngine<T, R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            candidates: Vec::new(),
            order: Vec::new(),
            cursor: 0,
            invalidated: false,
            selected: None,
            rng,
        }
    }

    /// Replace the candidate set.
    ///
    /// Does not reshuffle. The current cycle is invalidated, so the next
    /// `draw()` starts a new permutation over `items`. The previously selected
    /// item stays visible until then.
    pub fn set_candidates(&mut self, items: Vec<T>) {
        let duplicates = count_duplicate_keys(&items);
        if duplicates > 0 {
            tracing::warn!(
                candidates = items.len(),
                duplicates,
                "Candidate set contains duplicate keys"
            );
        }

        tracing::debug!(
            previous = self.candidates.len(),
            candidates = items.len(),
            "Candidate set replaced"
        );
        self.candidates = items;
        self.invalidated = true;
    }

    /// Start a new cycle with a uniformly random permutation.
    ///
    /// No-op when there are no candidates.
    pub fn shuffle(&mut self) {
        if self.candidates.is_empty() {
            return;
        }

        let mut order: Vec<usize> = (0..self.candidates.len()).collect();
        order.shuffle(&mut self.rng);

        self.order = order;
        self.cursor = 0;
        self.invalidated = false;
        tracing::trace!(candidates = self.candidates.len(), "Candidates shuffled");
    }

    fn needs_reshuffle(&self) -> bool {
        self.invalidated
            || self.order.is_empty()
            || self.order.len() != self.candidates.len()
            || self.cursor >= self.order.len()
    }

    /// Draw the next item, reshuffling first if the cycle is exhausted or stale.
    ///
    /// Returns `None` only when the candidate set is empty.
    pub fn draw(&mut self) -> Option<&T> {
        if self.candidates.is_empty() {
            return None;
        }

        if self.needs_reshuffle() {
            self.shuffle();
        }

        let index = self.order[self.cursor];
        self.cursor += 1;
        self.selected = Some(self.candidates[index].clone());
        self.selected.as_ref()
    }

    /// The most recently drawn item.
    pub fn selected(&self) -> Option<&T> {
        self.selected.as_ref()
    }

    pub fn selected_key(&self) -> Option<T::Key> {
        self.selected.as_ref().map(Candidate::key)
    }

    pub fn candidates(&self) -> &[T] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn state(&self) -> SelectionState {
        if self.candidates.is_empty() {
            SelectionState::Empty
        } else if self.needs_reshuffle() {
            SelectionState::Unshuffled
        } else {
            SelectionState::InCycle {
                cursor: self.cursor,
            }
        }
    }

    /// Draws left before the next reshuffle. Zero when the next draw reshuffles.
    pub fn remaining_in_cycle(&self) -> usize {
        if self.candidates.is_empty() || self.needs_reshuffle() {
            0
        } else {
            self.order.len() - self.cursor
        }
    }

    pub(crate) fn candidates_and_rng(&mut self) -> (&[T], &mut R) {
        (&self.candidates, &mut self.rng)
    }

    /// Make `item` the selected item without touching the cycle.
    ///
    /// Used when something other than `draw` chose the item shown to the user.
    pub(crate) fn set_selected(&mut self, item: T) {
        self.selected = Some(item);
    }
}

fn count_duplicate_keys<T: Candidate>(items: &[T]) -> usize {
    let mut seen = HashSet::with_capacity(items.len());
    items.iter().filter(|item| !seen.insert(item.key())).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_keys(engine: &mut SelectionEngine<u32>, n: usize) -> Vec<u32> {
        (0..n).map(|_| *engine.draw().unwrap()).collect()
    }

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn new_engine_is_empty() {
        let engine: SelectionEngine<u32> = SelectionEngine::seeded(1);
        assert_eq!(engine.state(), SelectionState::Empty);
        assert!(engine.selected().is_none());
        assert!(engine.is_empty());
    }

    #[test]
    fn full_cycle_draws_every_item_once() {
        for n in 1..=12u32 {
            let mut engine = SelectionEngine::seeded(u64::from(n));
            let items: Vec<u32> = (0..n).collect();
            engine.set_candidates(items.clone());

            let drawn = draw_keys(&mut engine, n as usize);
            assert_eq!(sorted(drawn), items, "cycle over {n} items");
        }
    }

    #[test]
    fn draw_on_empty_returns_none_repeatedly() {
        let mut engine: SelectionEngine<u32> = SelectionEngine::seeded(7);
        for _ in 0..5 {
            assert!(engine.draw().is_none());
        }

        engine.set_candidates(Vec::new());
        assert!(engine.draw().is_none());
        assert_eq!(engine.state(), SelectionState::Empty);
    }

    #[test]
    fn draw_after_exhaustion_reshuffles_same_set() {
        let mut engine = SelectionEngine::seeded(42);
        let items: Vec<u32> = (10..15).collect();
        engine.set_candidates(items.clone());

        let first = draw_keys(&mut engine, items.len());
        assert_eq!(sorted(first), items);
        assert_eq!(engine.remaining_in_cycle(), 0);
        assert_eq!(engine.state(), SelectionState::Unshuffled);

        let next = *engine.draw().unwrap();
        assert!(items.contains(&next));
        assert_eq!(engine.state(), SelectionState::InCycle { cursor: 1 });

        let rest = draw_keys(&mut engine, items.len() - 1);
        let mut second = vec![next];
        second.extend(rest);
        assert_eq!(sorted(second), items);
    }

    #[test]
    fn cycles_vary_between_shuffles() {
        let mut engine = SelectionEngine::seeded(2024);
        let items: Vec<u32> = (1..=6).collect();
        engine.set_candidates(items.clone());

        let mut orders = HashSet::new();
        for _ in 0..10 {
            let cycle = draw_keys(&mut engine, items.len());
            assert_eq!(sorted(cycle.clone()), items);
            orders.insert(cycle);
        }

        assert!(orders.len() >= 2, "expected distinct orders, got {orders:?}");
    }

    #[test]
    fn same_seed_gives_same_sequence() {
        let items: Vec<u32> = (0..8).collect();

        let mut a = SelectionEngine::seeded(99);
        a.set_candidates(items.clone());
        let mut b = SelectionEngine::seeded(99);
        b.set_candidates(items.clone());

        assert_eq!(draw_keys(&mut a, 20), draw_keys(&mut b, 20));
    }

    #[test]
    fn shrinking_candidates_mid_cycle_forces_reshuffle() {
        let mut engine = SelectionEngine::seeded(5);
        engine.set_candidates((0..10).collect());
        draw_keys(&mut engine, 3);

        let smaller: Vec<u32> = vec![2, 4, 6, 8];
        engine.set_candidates(smaller.clone());
        assert_eq!(engine.state(), SelectionState::Unshuffled);

        let cycle = draw_keys(&mut engine, smaller.len());
        assert_eq!(sorted(cycle), smaller);
    }

    #[test]
    fn growing_candidates_mid_cycle_forces_reshuffle() {
        let mut engine = SelectionEngine::seeded(6);
        engine.set_candidates(vec![1, 2, 3]);
        draw_keys(&mut engine, 1);

        let larger: Vec<u32> = (1..=7).collect();
        engine.set_candidates(larger.clone());

        let cycle = draw_keys(&mut engine, larger.len());
        assert_eq!(sorted(cycle), larger);
    }

    #[test]
    fn same_length_new_membership_starts_new_cycle() {
        let mut engine = SelectionEngine::seeded(11);
        engine.set_candidates(vec![1, 2, 3, 4]);
        draw_keys(&mut engine, 2);

        let replaced = vec![5, 6, 7, 8];
        engine.set_candidates(replaced.clone());

        let cycle = draw_keys(&mut engine, 4);
        assert_eq!(sorted(cycle), replaced);
    }

    #[test]
    fn selected_survives_set_candidates_until_next_draw() {
        let mut engine = SelectionEngine::seeded(3);
        engine.set_candidates(vec![100]);
        assert_eq!(engine.draw(), Some(&100));

        engine.set_candidates(vec![200]);
        assert_eq!(engine.selected(), Some(&100));

        assert_eq!(engine.draw(), Some(&200));
        assert_eq!(engine.selected_key(), Some(200));
    }

    #[test]
    fn shuffle_on_empty_is_noop() {
        let mut engine: SelectionEngine<u32> = SelectionEngine::seeded(8);
        engine.shuffle();
        assert_eq!(engine.state(), SelectionState::Empty);
        assert_eq!(engine.remaining_in_cycle(), 0);
    }

    #[test]
    fn explicit_shuffle_resets_cursor() {
        let mut engine = SelectionEngine::seeded(12);
        engine.set_candidates((0..5).collect());
        draw_keys(&mut engine, 3);
        assert_eq!(engine.state(), SelectionState::InCycle { cursor: 3 });

        engine.shuffle();
        assert_eq!(engine.state(), SelectionState::InCycle { cursor: 0 });
        assert_eq!(engine.remaining_in_cycle(), 5);
    }

    #[test]
    fn state_transitions_through_a_cycle() {
        let mut engine = SelectionEngine::seeded(13);
        engine.set_candidates(vec![1, 2]);
        assert_eq!(engine.state(), SelectionState::Unshuffled);

        engine.draw();
        assert_eq!(engine.state(), SelectionState::InCycle { cursor: 1 });
        assert_eq!(engine.remaining_in_cycle(), 1);

        engine.draw();
        assert_eq!(engine.state(), SelectionState::Unshuffled);
    }

    #[test]
    fn set_selected_leaves_cycle_alone() {
        let mut engine = SelectionEngine::seeded(21);
        engine.set_candidates(vec![1u32, 2, 3]);
        let first = *engine.draw().unwrap();

        engine.set_selected(99);
        assert_eq!(engine.selected(), Some(&99));
        assert_eq!(engine.state(), SelectionState::InCycle { cursor: 1 });

        let mut rest = draw_keys(&mut engine, 2);
        rest.push(first);
        assert_eq!(sorted(rest), vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_keys_are_counted() {
        assert_eq!(count_duplicate_keys(&[1u32, 2, 3]), 0);
        assert_eq!(count_duplicate_keys(&[1u32, 2, 1, 1]), 2);
    }

    #[test]
    fn state_serializes_tagged() {
        insta::assert_json_snapshot!(
            [
                SelectionState::Empty,
                SelectionState::Unshuffled,
                SelectionState::InCycle { cursor: 2 },
            ],
            @r#"
        [
          {
            "state": "empty"
          },
          {
            "state": "unshuffled"
          },
          {
            "state": "in_cycle",
            "cursor": 2
          }
        ]
        "#
        );
    }
}
