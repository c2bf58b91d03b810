//! Quiz session: roster, filter, and the shuffle-bag that picks the next member.
//!
//! One session per quiz; nothing here is process-global, so independent
//! sessions (or tests) never share selection state.

use rand::Rng;
use rand::rngs::StdRng;

use crate::filter::MemberFilter;
use crate::history::AnswerHistory;
use crate::member::{Group, Member};
use crate::selection::{LowAccuracySelector, SelectionEngine, SelectionMode, SelectionOutcome};
use crate::streak::{StreakRecord, StreakTracker};

/// Verdict for one submitted answer.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct AnswerResult {
    pub member_id: u32,
    pub correct: bool,
    /// Streak ended by this answer, when long enough to keep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_streak: Option<StreakRecord>,
}

pub struct QuizSession<R = StdRng> {
    group: Option<Group>,
    members: Vec<Member>,
    filter: MemberFilter,
    has_invalid_filter: bool,
    engine: SelectionEngine<Member, R>,
    /// Fall back to the shuffle-bag when low-accuracy selection finds nobody.
    fallback_to_random: bool,
}

impl QuizSession<StdRng> {
    pub fn new() -> Self {
        Self::with_engine(SelectionEngine::new())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_engine(SelectionEngine::seeded(seed))
    }
}

impl Default for QuizSession<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> QuizSession<R> {
    pub fn with_engine(engine: SelectionEngine<Member, R>) -> Self {
        Self {
            group: None,
            members: Vec::new(),
            filter: MemberFilter::default(),
            has_invalid_filter: false,
            engine,
            fallback_to_random: true,
        }
    }

    pub fn with_fallback_to_random(mut self, fallback: bool) -> Self {
        self.fallback_to_random = fallback;
        self
    }

    /// Install a freshly loaded roster and draw the first member.
    pub fn load_members(&mut self, group: Group, members: Vec<Member>) -> Option<&Member> {
        tracing::info!(%group, members = members.len(), "Members loaded");
        self.group = Some(group);
        self.members = members;
        self.apply_filter();
        self.engine.draw()
    }

    pub fn set_filter(&mut self, filter: MemberFilter) {
        self.filter = filter;
        self.apply_filter();
    }

    fn apply_filter(&mut self) {
        let outcome = self.filter.apply(&self.members);
        self.has_invalid_filter = outcome.has_invalid_filter;
        if outcome.has_invalid_filter {
            tracing::warn!(filter = ?self.filter, "Filter matched no members");
        }
        self.engine.set_candidates(outcome.members);
    }

    /// Next member from the shuffle-bag over the filtered roster.
    pub fn pick_next(&mut self) -> Option<&Member> {
        self.engine.draw()
    }

    /// Choose the next member according to `mode`.
    ///
    /// Low-accuracy selection draws from the filtered roster. When it finds
    /// nobody and fallback is on, the shuffle-bag is used instead.
    pub fn select(
        &mut self,
        mode: SelectionMode,
        selector: &mut LowAccuracySelector,
        history: &AnswerHistory,
    ) -> SelectionOutcome {
        match mode.resolve(selector.is_enabled()) {
            SelectionMode::LowAccuracy => self.select_low_accuracy(selector, history),
            _ => self.select_random(),
        }
    }

    fn select_random(&mut self) -> SelectionOutcome {
        match self.engine.draw() {
            Some(member) => SelectionOutcome::selected(member.clone(), SelectionMode::Random),
            None => SelectionOutcome::failed(SelectionMode::Random, "no member available"),
        }
    }

    fn select_low_accuracy(
        &mut self,
        selector: &mut LowAccuracySelector,
        history: &AnswerHistory,
    ) -> SelectionOutcome {
        let picked = match self.group {
            Some(group) => {
                let (candidates, rng) = self.engine.candidates_and_rng();
                selector.pick(group, candidates, history, rng).cloned()
            }
            None => None,
        };

        if let Some(member) = picked {
            self.engine.set_selected(member.clone());
            return SelectionOutcome::selected(member, SelectionMode::LowAccuracy);
        }

        if !self.fallback_to_random {
            return SelectionOutcome::failed(
                SelectionMode::LowAccuracy,
                "no low-accuracy member found",
            );
        }

        tracing::debug!("Low-accuracy selection found nobody - falling back to random");
        match self.engine.draw() {
            Some(member) => SelectionOutcome::selected(member.clone(), SelectionMode::Random),
            None => SelectionOutcome::failed(
                SelectionMode::Random,
                "both low-accuracy and random selection failed",
            ),
        }
    }

    /// Judge the two chosen penlight colors against the selected member and
    /// record the answer.
    ///
    /// Returns `None` when no member has been selected yet.
    pub fn submit_answer(
        &self,
        left: u32,
        right: u32,
        history: &mut AnswerHistory,
        streak: &mut StreakTracker,
    ) -> Option<AnswerResult> {
        let (Some(group), Some(member)) = (self.group, self.engine.selected()) else {
            tracing::debug!("Answer submitted with no member selected");
            return None;
        };

        let correct = member.is_penlight_match(left, right);
        history.record(group, member.id, correct);
        let finished_streak = if correct {
            streak.record_correct();
            None
        } else {
            streak.record_incorrect()
        };

        tracing::info!(%group, member_id = member.id, correct, "Answer judged");
        Some(AnswerResult {
            member_id: member.id,
            correct,
            finished_streak,
        })
    }

    pub fn group(&self) -> Option<Group> {
        self.group
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn filter(&self) -> &MemberFilter {
        &self.filter
    }

    /// Members passing the current filter, in roster order.
    pub fn filtered(&self) -> &[Member] {
        self.engine.candidates()
    }

    pub fn has_invalid_filter(&self) -> bool {
        self.has_invalid_filter
    }

    pub fn selected(&self) -> Option<&Member> {
        self.engine.selected()
    }

    pub fn engine(&self) -> &SelectionEngine<Member, R> {
        &self.engine
    }
}
