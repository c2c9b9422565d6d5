//! podium: ranked collections over an ordered-set store.
//!
//! - [`Leaderboard`]: one collection with policy-driven updates, top-N
//!   trimming, rank windows and paging.
//! - [`PeriodicLeaderboard`]: routes wall-clock time to per-bucket
//!   leaderboards.
//! - [`LeaderboardMatrix`]: a dimensions × features grid of leaderboards,
//!   updated and read as one unit.
//!
//! Everything talks to the store through [`OrderedSetStore`]. Updates and
//! multi-cell reads are shipped as a single script or batch, so they are
//! exactly as atomic as the store makes those.
//!
//! ```no_run
//! use podium::{Leaderboard, LeaderboardOptions, SortPolicy, UpdatePolicy};
//! use podium_store::{spawn_store, StoreConfig};
//!
//! # async fn demo() -> podium::Result<()> {
//! let store = spawn_store(StoreConfig::default());
//! let lb = Leaderboard::new(
//!     store,
//!     "highscores",
//!     LeaderboardOptions::new(SortPolicy::HighToLow, UpdatePolicy::Best),
//! );
//! lb.update([("alice", 120.0), ("bob", 95.0)], None).await?;
//! let podium = lb.top(3).await?;
//! assert_eq!(podium[0].id, "alice");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod matrix;
pub mod periodic;
pub mod policy;

mod update;
mod window;

pub use config::{DimensionConfig, FeatureConfig, MatrixConfig};
pub use error::{Error, Result};
pub use leaderboard::{Entry, Exporter, Leaderboard};
pub use matrix::{
    DimensionDef, FeatureDef, LeaderboardMatrix, MatrixCounts, MatrixEntry, MatrixUpdate,
    QueryFilter, Showcase,
};
pub use periodic::{system_clock, Clock, Cycle, CycleKind, PeriodicLeaderboard, CACHE_LIMIT};
pub use policy::{LeaderboardOptions, SortPolicy, UpdatePolicy};
pub use podium_store::{Order, OrderedSetStore};
