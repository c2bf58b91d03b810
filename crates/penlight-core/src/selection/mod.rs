//! Member selection: the shuffle-bag engine and the low-accuracy selector.

mod engine;
mod low_accuracy;
mod mode;

pub use engine::{SelectionEngine, SelectionState};
pub use low_accuracy::{DEFAULT_HISTORY_SIZE, LowAccuracyOptions, LowAccuracySelector};
pub use mode::{SelectionMode, SelectionOutcome};

/// An item with a stable identity the selector can compare.
pub trait Candidate {
    type Key: Eq + std::hash::Hash + Clone + std::fmt::Debug;

    fn key(&self) -> Self::Key;
}

macro_rules! candidate_by_value {
    ($($ty:ty),*) => {
        $(impl Candidate for $ty {
            type Key = $ty;

            fn key(&self) -> Self::Key {
                *self
            }
        })*
    };
}

candidate_by_value!(u8, u16, u32, u64, usize, i32, i64, char);

impl Candidate for String {
    type Key = String;

    fn key(&self) -> Self::Key {
        self.clone()
    }
}
