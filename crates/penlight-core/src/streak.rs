//! Consecutive-correct streaks and overall answer totals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Streaks shorter than this are not kept when broken by a wrong answer.
pub const MIN_SAVED_STREAK: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakRecord {
    pub count: u32,
    pub started_at: DateTime<Utc>,
    /// Set once the streak is over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub last_correct_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreakTracker {
    current_streak: u32,
    best_streak: u32,
    total_correct: u32,
    total_answers: u32,
    current_record: Option<StreakRecord>,
    history: Vec<StreakRecord>,
}

impl StreakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_correct(&mut self) {
        self.record_correct_at(Utc::now());
    }

    pub fn record_correct_at(&mut self, at: DateTime<Utc>) {
        self.current_streak += 1;
        self.best_streak = self.best_streak.max(self.current_streak);
        self.total_correct += 1;
        self.total_answers += 1;

        let count = self.current_streak;
        let record = self.current_record.get_or_insert_with(|| StreakRecord {
            count,
            started_at: at,
            ended_at: None,
            last_correct_at: at,
        });
        record.count = count;
        record.last_correct_at = at;

        if count > 1 && count == self.best_streak {
            tracing::info!(streak = count, "New best streak");
        } else {
            tracing::debug!(streak = count, "Streak extended");
        }
    }

    /// Break the current streak.
    ///
    /// Returns the finished record when it reached [`MIN_SAVED_STREAK`]; that
    /// record is also appended to [`history`](Self::history).
    pub fn record_incorrect(&mut self) -> Option<StreakRecord> {
        self.record_incorrect_at(Utc::now())
    }

    pub fn record_incorrect_at(&mut self, at: DateTime<Utc>) -> Option<StreakRecord> {
        self.total_answers += 1;
        let streak = std::mem::take(&mut self.current_streak);
        let record = self.current_record.take();

        tracing::debug!(streak, "Streak reset by incorrect answer");

        if streak < MIN_SAVED_STREAK {
            return None;
        }
        let finished = record.map(|r| StreakRecord {
            ended_at: Some(at),
            ..r
        })?;
        self.history.push(finished.clone());
        Some(finished)
    }

    /// End the running streak on request and keep it, whatever its length.
    ///
    /// Returns `None` when no streak is running.
    pub fn save_current(&mut self) -> Option<StreakRecord> {
        self.save_current_at(Utc::now())
    }

    pub fn save_current_at(&mut self, at: DateTime<Utc>) -> Option<StreakRecord> {
        if self.current_streak == 0 {
            return None;
        }
        let record = self.current_record.take()?;
        self.current_streak = 0;

        let finished = StreakRecord {
            ended_at: Some(at),
            ..record
        };
        tracing::info!(streak = finished.count, "Streak saved");
        self.history.push(finished.clone());
        Some(finished)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
        tracing::info!("Streak statistics reset");
    }

    /// `total_correct / total_answers`, or 0 before the first answer.
    pub fn accuracy(&self) -> f64 {
        if self.total_answers == 0 {
            0.0
        } else {
            f64::from(self.total_correct) / f64::from(self.total_answers)
        }
    }

    pub fn current(&self) -> u32 {
        self.current_streak
    }

    pub fn best(&self) -> u32 {
        self.best_streak
    }

    pub fn total_correct(&self) -> u32 {
        self.total_correct
    }

    pub fn total_answers(&self) -> u32 {
        self.total_answers
    }

    pub fn current_record(&self) -> Option<&StreakRecord> {
        self.current_record.as_ref()
    }

    /// Finished streaks, oldest first.
    pub fn history(&self) -> &[StreakRecord] {
        &self.history
    }
}
