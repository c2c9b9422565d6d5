//! Time-bucketed leaderboards.
//!
//! A [`Cycle`] maps wall-clock time to a bucket key. A
//! [`PeriodicLeaderboard`] routes a time to the [`Leaderboard`] stored under
//! `<base>:<bucket>`, keeping a small cache of handles.
//!
//! Built-in bucket keys are hierarchical and sort lexicographically in
//! time order: `y2020`, `y2020-m05`, `y2020-m05-d15`, `y2020-m05-d15-h22`,
//! `y2020-m05-d15-h22-m53`. Weekly keys count whole weeks since the first
//! Monday-aligned week of the Unix epoch: `y2020-w2628`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Datelike, Timelike, Utc};
use podium_store::{OrderedSetStore, StoreRequest};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::leaderboard::Leaderboard;
use crate::policy::LeaderboardOptions;

/// Cached handles are dropped all at once when the cache reaches this size.
pub const CACHE_LIMIT: usize = 100;

/// Keys fetched per scan step in [`PeriodicLeaderboard::existing_keys`].
const SCAN_COUNT: usize = 100;

/// Source of the current time.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// The system clock.
pub fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// Built-in rotation granularities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleKind {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl CycleKind {
    /// The bucket key for `time`.
    pub fn key(self, time: DateTime<Utc>) -> String {
        let year = format!("y{:04}", time.year());
        match self {
            CycleKind::Year => year,
            CycleKind::Week => format!("{year}-w{:04}", epoch_week(time)),
            CycleKind::Month => format!("{year}-m{:02}", time.month()),
            CycleKind::Day => format!("{year}-m{:02}-d{:02}", time.month(), time.day()),
            CycleKind::Hour => format!(
                "{year}-m{:02}-d{:02}-h{:02}",
                time.month(),
                time.day(),
                time.hour()
            ),
            CycleKind::Minute => format!(
                "{year}-m{:02}-d{:02}-h{:02}-m{:02}",
                time.month(),
                time.day(),
                time.hour(),
                time.minute()
            ),
        }
    }
}

/// Weeks elapsed since Monday 1969-12-29, the Monday on or before the epoch.
/// Every instant before that Monday falls in week 0.
fn epoch_week(time: DateTime<Utc>) -> i64 {
    // 1970-01-01 was a Thursday, three days into its week
    (time.timestamp().div_euclid(86_400) + 3).div_euclid(7).max(0)
}

/// How a periodic leaderboard rotates.
#[derive(Clone)]
pub enum Cycle {
    Every(CycleKind),
    /// A caller-supplied bucket function. It must be pure and return a
    /// non-empty key without `:` for the key layout to stay unambiguous.
    Custom(Arc<dyn Fn(DateTime<Utc>) -> String + Send + Sync>),
}

impl Cycle {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(DateTime<Utc>) -> String + Send + Sync + 'static,
    {
        Cycle::Custom(Arc::new(f))
    }

    /// The bucket key for `time`.
    pub fn key(&self, time: DateTime<Utc>) -> String {
        match self {
            Cycle::Every(kind) => kind.key(time),
            Cycle::Custom(f) => f(time),
        }
    }
}

impl From<CycleKind> for Cycle {
    fn from(kind: CycleKind) -> Self {
        Cycle::Every(kind)
    }
}

impl fmt::Debug for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cycle::Every(kind) => f.debug_tuple("Every").field(kind).finish(),
            Cycle::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Routes times to the leaderboard of their bucket.
#[derive(Clone)]
pub struct PeriodicLeaderboard<S> {
    store: S,
    base_key: String,
    options: LeaderboardOptions,
    cycle: Cycle,
    clock: Clock,
    cache: Arc<RwLock<HashMap<String, Leaderboard<S>>>>,
}

impl<S> fmt::Debug for PeriodicLeaderboard<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicLeaderboard")
            .field("base_key", &self.base_key)
            .field("options", &self.options)
            .field("cycle", &self.cycle)
            .finish_non_exhaustive()
    }
}

impl<S: OrderedSetStore> PeriodicLeaderboard<S> {
    /// Creates a router reading the system clock.
    pub fn new(
        store: S,
        base_key: impl Into<String>,
        options: LeaderboardOptions,
        cycle: impl Into<Cycle>,
    ) -> Self {
        Self {
            store,
            base_key: base_key.into(),
            options,
            cycle: cycle.into(),
            clock: system_clock(),
            cache: Arc::default(),
        }
    }

    /// Replaces the clock used by [`current`](Self::current).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_key(&self) -> &str {
        &self.base_key
    }

    pub fn cycle(&self) -> &Cycle {
        &self.cycle
    }

    /// The bucket key for `time`.
    pub fn key_at(&self, time: DateTime<Utc>) -> String {
        self.cycle.key(time)
    }

    /// The bucket key for the clock's current time.
    pub fn current_key(&self) -> String {
        self.key_at((self.clock)())
    }

    /// The leaderboard of an explicit bucket.
    pub fn leaderboard(&self, bucket: &str) -> Leaderboard<S> {
        let key = format!("{}:{bucket}", self.base_key);
        self.cached(key)
    }

    /// The leaderboard of the bucket `time` falls in.
    pub fn leaderboard_at(&self, time: DateTime<Utc>) -> Leaderboard<S> {
        self.leaderboard(&self.key_at(time))
    }

    /// The leaderboard of the current bucket.
    pub fn current(&self) -> Leaderboard<S> {
        self.leaderboard(&self.current_key())
    }

    fn cached(&self, key: String) -> Leaderboard<S> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(lb) = cache.get(&key) {
                return lb.clone();
            }
        }

        let lb = Leaderboard::new(self.store.clone(), key.clone(), self.options);
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if cache.len() >= CACHE_LIMIT {
            debug!(base_key = %self.base_key, size = cache.len(), "resetting leaderboard cache");
            cache.clear();
        }
        cache.insert(key, lb.clone());
        lb
    }

    /// Number of cached handles.
    pub fn cached_len(&self) -> usize {
        self.cache.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Lists the buckets that currently hold entries, sorted.
    ///
    /// Walks every key in the store, so this is `O(total keys)`.
    pub async fn existing_keys(&self) -> Result<Vec<String>> {
        let prefix = format!("{}:", self.base_key);
        let pattern = format!("{}*", escape_glob(&prefix));
        let mut buckets = Vec::new();
        let mut cursor = 0;
        loop {
            let (next, keys) = self
                .store
                .execute(StoreRequest::Scan {
                    cursor,
                    count: SCAN_COUNT,
                    pattern: Some(pattern.clone()),
                })
                .await?
                .into_scan()?;
            buckets.extend(
                keys.iter()
                    .filter_map(|key| key.strip_prefix(&prefix))
                    .map(str::to_owned),
            );
            if next == 0 {
                break;
            }
            cursor = next;
        }
        buckets.sort();
        buckets.dedup();
        Ok(buckets)
    }
}

/// Escapes glob metacharacters so `s` matches only itself.
fn escape_glob(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
