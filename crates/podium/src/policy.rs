//! Sort and update policies, and the per-leaderboard options built on them.

use podium_store::Order;
use serde::{Deserialize, Serialize};

/// Which end of the score range is rank 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortPolicy {
    /// Highest score is rank 1.
    #[default]
    HighToLow,
    /// Lowest score is rank 1.
    LowToHigh,
}

impl SortPolicy {
    /// The store rank direction that makes rank 0 the best entry.
    pub fn order(self) -> Order {
        match self {
            SortPolicy::HighToLow => Order::Desc,
            SortPolicy::LowToHigh => Order::Asc,
        }
    }

    /// Returns true if `candidate` strictly beats `current`.
    pub fn is_better(self, candidate: f64, current: f64) -> bool {
        match self {
            SortPolicy::HighToLow => candidate > current,
            SortPolicy::LowToHigh => candidate < current,
        }
    }
}

/// How a submitted value combines with an existing score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdatePolicy {
    /// The new value overwrites the score.
    #[default]
    Replace,
    /// The new value is added to the score (0 if absent).
    Aggregate,
    /// The new value is kept only if it beats the current score.
    Best,
}

/// Options fixed for one ranked collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LeaderboardOptions {
    pub sort_policy: SortPolicy,
    /// Default policy for updates that don't override it.
    pub update_policy: UpdatePolicy,
    /// Keep only the best N entries. `None` or `Some(0)` disables trimming.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_top_n: Option<usize>,
}

impl LeaderboardOptions {
    pub fn new(sort_policy: SortPolicy, update_policy: UpdatePolicy) -> Self {
        Self {
            sort_policy,
            update_policy,
            limit_top_n: None,
        }
    }

    pub fn with_limit(mut self, limit_top_n: usize) -> Self {
        self.limit_top_n = Some(limit_top_n);
        self
    }

    /// The effective trim bound, if trimming is on.
    pub(crate) fn limit(&self) -> Option<usize> {
        self.limit_top_n.filter(|n| *n > 0)
    }
}
