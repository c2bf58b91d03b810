//! Low-accuracy-first member selection.
//!
//! Prefers members the player answers badly or has rarely seen, skipping the
//! last few picks. Falls back to any non-excluded member when no such member
//! is available.

use std::collections::{HashSet, VecDeque};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::history::AnswerHistory;
use crate::member::{Group, Member};

/// Recent picks remembered to avoid immediate repeats.
pub const DEFAULT_HISTORY_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowAccuracyOptions {
    /// Members below this accuracy are targeted.
    pub accuracy_threshold: f64,
    /// Members with fewer answers than this are always targeted.
    pub min_answer_threshold: u32,
    pub max_count: Option<usize>,
    pub exclude_ids: Vec<u32>,
}

impl Default for LowAccuracyOptions {
    fn default() -> Self {
        Self {
            accuracy_threshold: 0.6,
            min_answer_threshold: 3,
            max_count: None,
            exclude_ids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LowAccuracySelector {
    enabled: bool,
    options: LowAccuracyOptions,
    /// Newest first.
    recent: VecDeque<u32>,
    history_size: usize,
}

impl Default for LowAccuracySelector {
    fn default() -> Self {
        Self::new()
    }
}

impl LowAccuracySelector {
    /// Disabled selector with default options.
    pub fn new() -> Self {
        Self {
            enabled: false,
            options: LowAccuracyOptions::default(),
            recent: VecDeque::with_capacity(DEFAULT_HISTORY_SIZE),
            history_size: DEFAULT_HISTORY_SIZE,
        }
    }

    pub fn with_options(mut self, options: LowAccuracyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_history_size(mut self, history_size: usize) -> Self {
        self.history_size = history_size;
        self.recent.truncate(history_size);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
        tracing::info!("Low-accuracy mode enabled");
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        tracing::info!("Low-accuracy mode disabled");
    }

    pub fn toggle(&mut self) {
        if self.enabled {
            self.disable();
        } else {
            self.enable();
        }
    }

    pub fn options(&self) -> &LowAccuracyOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: LowAccuracyOptions) {
        tracing::debug!(?options, "Low-accuracy options updated");
        self.options = options;
    }

    /// Recently picked member ids, newest first.
    pub fn recent(&self) -> impl Iterator<Item = u32> + '_ {
        self.recent.iter().copied()
    }

    pub fn record(&mut self, member_id: u32) {
        if self.history_size == 0 {
            return;
        }
        self.recent.push_front(member_id);
        self.recent.truncate(self.history_size);
    }

    pub fn clear_recent(&mut self) {
        self.recent.clear();
    }

    /// Back to a disabled selector with default options and empty history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Pick a member from `members`, favoring low-accuracy ones.
    ///
    /// Returns `None` when disabled or when every member is excluded.
    pub fn pick<'a, R: Rng>(
        &mut self,
        group: Group,
        members: &'a [Member],
        history: &AnswerHistory,
        rng: &mut R,
    ) -> Option<&'a Member> {
        if !self.enabled {
            tracing::debug!("Low-accuracy mode disabled - skipping selection");
            return None;
        }

        let excluded: HashSet<u32> = self
            .options
            .exclude_ids
            .iter()
            .copied()
            .chain(self.recent.iter().copied())
            .collect();

        // `max_count` applies after exclusion so recent picks don't eat the quota.
        let targeting = LowAccuracyOptions {
            max_count: None,
            ..self.options.clone()
        };
        let mut candidates: Vec<&Member> = history
            .low_accuracy_ids(group, &targeting)
            .into_iter()
            .filter(|id| !excluded.contains(id))
            .filter_map(|id| members.iter().find(|m| m.id == id))
            .take(self.options.max_count.unwrap_or(usize::MAX))
            .collect();

        if candidates.is_empty() {
            tracing::debug!(%group, "No low-accuracy members - falling back to all members");
            candidates = members
                .iter()
                .filter(|m| !excluded.contains(&m.id))
                .collect();
        }

        if candidates.is_empty() {
            tracing::debug!(%group, "No selectable members");
            return None;
        }

        let picked = candidates[rng.random_range(0..candidates.len())];
        self.record(picked.id);
        tracing::debug!(%group, member_id = picked.id, "Low-accuracy member selected");
        Some(picked)
    }
}
