//! Runtime configuration.

/// Concurrency ceiling used when `PENLIGHT_MAX_CONCURRENCY` is unset or invalid.
pub const DEFAULT_MAX_CONCURRENCY: usize = 3;

/// Configuration for [`BoundedConcurrencyRunner`](crate::batch::BoundedConcurrencyRunner).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BatchConfig {
    /// Maximum number of tasks running at once. Must be at least 1.
    pub max_concurrency: usize,
}

impl BatchConfig {
    pub fn new(max_concurrency: usize) -> Self {
        Self { max_concurrency }
    }

    /// Parse a `PENLIGHT_MAX_CONCURRENCY` value. Zero and garbage fall back
    /// to the default.
    pub fn from_env_value(value: Option<&str>) -> Self {
        let max_concurrency = value
            .and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_CONCURRENCY);
        Self { max_concurrency }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::from_env_value(std::env::var("PENLIGHT_MAX_CONCURRENCY").ok().as_deref())
    }
}
