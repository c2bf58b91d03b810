//! Per-member answer history and accuracy statistics.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::member::Group;
use crate::selection::LowAccuracyOptions;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
struct MemberRecord {
    correct: u32,
    incorrect: u32,
    last_answered_at: Option<DateTime<Utc>>,
}

/// Derived statistics for one member.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MemberStatistics {
    pub member_id: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub total_count: u32,
    /// `correct / total`, or 0 when never answered.
    pub accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_answered_at: Option<DateTime<Utc>>,
}

impl MemberStatistics {
    fn from_record(member_id: u32, record: &MemberRecord) -> Self {
        let total_count = record.correct + record.incorrect;
        let accuracy = if total_count > 0 {
            f64::from(record.correct) / f64::from(total_count)
        } else {
            0.0
        };

        Self {
            member_id,
            correct_count: record.correct,
            incorrect_count: record.incorrect,
            total_count,
            accuracy,
            last_answered_at: record.last_answered_at,
        }
    }
}

/// Answer counts per group and member.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerHistory {
    groups: HashMap<Group, BTreeMap<u32, MemberRecord>>,
}

impl AnswerHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, group: Group, member_id: u32, correct: bool) {
        self.record_at(group, member_id, correct, Utc::now());
    }

    pub fn record_at(&mut self, group: Group, member_id: u32, correct: bool, at: DateTime<Utc>) {
        let record = self
            .groups
            .entry(group)
            .or_default()
            .entry(member_id)
            .or_default();

        if correct {
            record.correct += 1;
        } else {
            record.incorrect += 1;
        }
        record.last_answered_at = Some(at);

        tracing::debug!(%group, member_id, correct, "Answer recorded");
    }

    /// Statistics for one member; all zeros when the member was never answered.
    pub fn statistics(&self, group: Group, member_id: u32) -> MemberStatistics {
        let record = self
            .groups
            .get(&group)
            .and_then(|members| members.get(&member_id))
            .copied()
            .unwrap_or_default();
        MemberStatistics::from_record(member_id, &record)
    }

    /// Statistics for every answered member, lowest accuracy first.
    ///
    /// Ties are broken by fewer answers, then by member id.
    pub fn all_statistics(&self, group: Group) -> Vec<MemberStatistics> {
        let Some(members) = self.groups.get(&group) else {
            return Vec::new();
        };

        let mut stats: Vec<MemberStatistics> = members
            .iter()
            .map(|(id, record)| MemberStatistics::from_record(*id, record))
            .collect();

        stats.sort_by(|a, b| {
            a.accuracy
                .total_cmp(&b.accuracy)
                .then(a.total_count.cmp(&b.total_count))
                .then(a.member_id.cmp(&b.member_id))
        });
        stats
    }

    /// Members worth practicing: fewer than `min_answer_threshold` answers, or
    /// accuracy below `accuracy_threshold`. Ordered as [`all_statistics`](Self::all_statistics).
    pub fn low_accuracy_ids(&self, group: Group, options: &LowAccuracyOptions) -> Vec<u32> {
        let ids: Vec<u32> = self
            .all_statistics(group)
            .into_iter()
            .filter(|s| {
                s.total_count < options.min_answer_threshold
                    || s.accuracy < options.accuracy_threshold
            })
            .map(|s| s.member_id)
            .take(options.max_count.unwrap_or(usize::MAX))
            .collect();

        tracing::debug!(
            %group,
            threshold = options.accuracy_threshold,
            targets = ids.len(),
            "Low-accuracy members computed"
        );
        ids
    }

    /// Clear one group's history, or everything when `group` is `None`.
    pub fn clear(&mut self, group: Option<Group>) {
        match group {
            Some(group) => {
                self.groups.remove(&group);
            }
            None => self.groups.clear(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.values().all(BTreeMap::is_empty)
    }
}
