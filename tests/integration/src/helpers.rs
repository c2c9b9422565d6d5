//! Shared setup for the integration tests.

use std::sync::{Arc, Once};

use chrono::{DateTime, TimeZone, Utc};
use podium::{Clock, Leaderboard, LeaderboardOptions, SortPolicy, UpdatePolicy};
use podium_store::{spawn_store, StoreConfig, StoreHandle};

static TRACING: Once = Once::new();

/// Spawns a fresh store task.
///
/// Log output is off unless `RUST_LOG` asks for it.
pub fn store() -> StoreHandle {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
    spawn_store(StoreConfig::default())
}

pub fn leaderboard(sort: SortPolicy, update: UpdatePolicy) -> Leaderboard<StoreHandle> {
    Leaderboard::new(store(), "it", LeaderboardOptions::new(sort, update))
}

/// The `{foo: 15, bar: 10, baz: 5}` fixture.
pub async fn three_players(sort: SortPolicy) -> Leaderboard<StoreHandle> {
    let lb = leaderboard(sort, UpdatePolicy::Replace);
    lb.update([("foo", 15.0), ("bar", 10.0), ("baz", 5.0)], None)
        .await
        .unwrap();
    lb
}

/// 21 entries, ids "0".."20", where id `i` holds rank `i` (0-based).
pub async fn twenty_one() -> Leaderboard<StoreHandle> {
    let lb = leaderboard(SortPolicy::HighToLow, UpdatePolicy::Replace);
    lb.update((0..21).map(|i| (i.to_string(), (100 - i) as f64)), None)
        .await
        .unwrap();
    lb
}

pub fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// A clock stuck at `time`.
pub fn fixed_clock(time: DateTime<Utc>) -> Clock {
    Arc::new(move || time)
}
