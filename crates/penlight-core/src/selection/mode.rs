//! Selection modes and the outcome of one selection request.

use serde::{Deserialize, Serialize};

use crate::member::Member;

/// How the next quiz member is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionMode {
    /// Shuffle-bag over the filtered members.
    Random,
    /// Members with poor accuracy first.
    LowAccuracy,
    /// `LowAccuracy` when the low-accuracy selector is enabled, else `Random`.
    #[default]
    Auto,
}

impl SelectionMode {
    /// Resolve `Auto` against the low-accuracy selector's enabled flag.
    pub fn resolve(self, low_accuracy_enabled: bool) -> SelectionMode {
        match self {
            Self::Auto if low_accuracy_enabled => Self::LowAccuracy,
            Self::Auto => Self::Random,
            other => other,
        }
    }
}

/// Result of one selection request. `mode` is the mode that actually produced
/// the member, which differs from the requested one after a fallback.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    pub member: Option<Member>,
    pub mode: SelectionMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SelectionOutcome {
    pub(crate) fn selected(member: Member, mode: SelectionMode) -> Self {
        Self {
            member: Some(member),
            mode,
            error: None,
        }
    }

    pub(crate) fn failed(mode: SelectionMode, error: impl Into<String>) -> Self {
        Self {
            member: None,
            mode,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.member.is_some()
    }
}
