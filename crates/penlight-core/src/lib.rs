//! penlight-core: member selection and batch fetching for the penlight color quiz.

mod config;
mod filter;
mod history;
mod member;
mod session;
mod streak;

pub mod batch;
pub mod logging;
pub mod permit;
pub mod selection;
pub mod source;

pub use batch::{
    BatchError, BatchId, BatchResult, BoundedConcurrencyRunner, TaskFailure, TaskOutcome, TaskSet,
};
pub use config::{BatchConfig, DEFAULT_MAX_CONCURRENCY};
pub use filter::{FilterOutcome, MemberFilter};
pub use history::{AnswerHistory, MemberStatistics};
pub use member::{Generation, Group, Member, PenlightColor};
pub use selection::{
    Candidate, LowAccuracyOptions, LowAccuracySelector, SelectionEngine, SelectionMode,
    SelectionOutcome, SelectionState,
};
pub use session::{AnswerResult, QuizSession};
pub use source::{GroupData, MemberSource, RowSource, TableSource, fetch_group_data};
pub use streak::{MIN_SAVED_STREAK, StreakRecord, StreakTracker};
