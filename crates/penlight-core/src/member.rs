//! Member and penlight records as they arrive from the data source.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::selection::Candidate;

/// Idol group the quiz is running against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    Hinatazaka,
    Sakurazaka,
    Nogizaka,
}

impl Group {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hinatazaka => "hinatazaka",
            Self::Sakurazaka => "sakurazaka",
            Self::Nogizaka => "nogizaka",
        }
    }

    /// Table holding the group's member master rows.
    pub fn member_table(&self) -> String {
        format!("{}_member_master", self.as_str())
    }

    /// Table holding the group's penlight color rows.
    pub fn penlight_table(&self) -> String {
        format!("{}_penlight", self.as_str())
    }
}

impl std::fmt::Display for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generation label, e.g. `"1st"` or `"4th"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(String);

impl Generation {
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Generation {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub emoji: String,
    #[serde(rename = "gen")]
    pub generation: Generation,
    pub graduated: bool,
    pub penlight1_id: u32,
    pub penlight2_id: u32,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub url: String,
}

impl Member {
    /// Both penlight color ids, in display order.
    pub fn penlight_ids(&self) -> [u32; 2] {
        [self.penlight1_id, self.penlight2_id]
    }

    /// Whether `left` and `right` are this member's colors, in either order.
    ///
    /// Compared as sets: a member with the same color twice matches only that
    /// color chosen twice.
    pub fn is_penlight_match(&self, left: u32, right: u32) -> bool {
        BTreeSet::from([left, right]) == BTreeSet::from(self.penlight_ids())
    }
}

impl Candidate for Member {
    type Key = u32;

    fn key(&self) -> Self::Key {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PenlightColor {
    pub id: u32,
    pub name_ja: String,
    pub name_en: String,
    /// CSS color, e.g. `"#ff69b4"`.
    pub color: String,
}
