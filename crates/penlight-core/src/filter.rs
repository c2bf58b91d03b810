//! Generation and graduation filters over the member roster.

use serde::{Deserialize, Serialize};

use crate::member::{Generation, Member};

/// Filter chosen by the user.
///
/// `gens: None` matches every generation. `Some(vec![])` matches nothing and
/// is treated as "no filter chosen" for invalid-filter reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gens: Option<Vec<Generation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graduated: Option<bool>,
}

/// Members that passed a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub members: Vec<Member>,
    /// An active filter matched nobody.
    pub has_invalid_filter: bool,
}

impl MemberFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_gens<I, G>(mut self, gens: I) -> Self
    where
        I: IntoIterator<Item = G>,
        G: Into<Generation>,
    {
        self.gens = Some(gens.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_graduated(mut self, graduated: bool) -> Self {
        self.graduated = Some(graduated);
        self
    }

    pub fn matches(&self, member: &Member) -> bool {
        let gen_ok = self
            .gens
            .as_ref()
            .is_none_or(|gens| gens.contains(&member.generation));
        let graduated_ok = self.graduated.is_none_or(|g| member.graduated == g);
        gen_ok && graduated_ok
    }

    fn is_active(&self) -> bool {
        self.gens.as_ref().is_none_or(|gens| !gens.is_empty()) || self.graduated.is_some()
    }

    /// Keep matching members in roster order.
    pub fn apply(&self, members: &[Member]) -> FilterOutcome {
        let members: Vec<Member> = members
            .iter()
            .filter(|m| self.matches(m))
            .cloned()
            .collect();
        let has_invalid_filter = self.is_active() && members.is_empty();

        FilterOutcome {
            members,
            has_invalid_filter,
        }
    }
}
