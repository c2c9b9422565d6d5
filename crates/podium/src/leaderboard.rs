//! A single ranked collection.
//!
//! [`Leaderboard`] is a stateless handle: a store, a key and the options
//! the collection is ranked under. Cloning it is as cheap as cloning the
//! store handle, and two handles on the same key are interchangeable.
//!
//! Ranks are 1-based throughout this API. Ties between equal scores are
//! ordered by the store (the bundled store: by id, reversed for
//! high-to-low), which is not something callers should rely on.

use podium_store::{Order, OrderedSetStore, Script, ScriptContext, StoreRequest};
use tracing::debug;

use crate::error::{Error, Result};
use crate::policy::{LeaderboardOptions, UpdatePolicy};
use crate::update::{UpdateBatch, UpdateScript};
use crate::window::AroundScript;

/// A point-in-time view of one id in a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub score: f64,
    /// 1-based position under the collection's sort policy.
    pub rank: usize,
}

impl Entry {
    pub fn new(id: impl Into<String>, score: f64, rank: usize) -> Self {
        Self {
            id: id.into(),
            score,
            rank,
        }
    }
}

/// Turns consecutive members into entries, the first at `first_rank`
/// (1-based).
fn ranked(members: Vec<(String, f64)>, first_rank: usize) -> Vec<Entry> {
    members
        .into_iter()
        .enumerate()
        .map(|(i, (id, score))| Entry {
            id,
            score,
            rank: first_rank + i,
        })
        .collect()
}

/// A ranked collection stored under one key.
#[derive(Debug, Clone)]
pub struct Leaderboard<S> {
    store: S,
    key: String,
    options: LeaderboardOptions,
}

impl<S: OrderedSetStore> Leaderboard<S> {
    /// Creates a handle. Nothing is written until the first update.
    pub fn new(store: S, key: impl Into<String>, options: LeaderboardOptions) -> Self {
        Self {
            store,
            key: key.into(),
            options,
        }
    }

    /// The store key backing this collection.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn options(&self) -> &LeaderboardOptions {
        &self.options
    }

    fn order(&self) -> Order {
        self.options.sort_policy.order()
    }

    /// Returns the score of `id`, or `None` if absent.
    pub async fn score(&self, id: &str) -> Result<Option<f64>> {
        let reply = self
            .store
            .execute(StoreRequest::ZScore {
                key: self.key.clone(),
                member: id.to_owned(),
            })
            .await?;
        Ok(reply.into_score()?)
    }

    /// Returns the 1-based rank of `id`, or `None` if absent.
    pub async fn rank(&self, id: &str) -> Result<Option<usize>> {
        let reply = self
            .store
            .execute(StoreRequest::ZRank {
                key: self.key.clone(),
                member: id.to_owned(),
                order: self.order(),
            })
            .await?;
        Ok(reply.into_rank()?.map(|r| r + 1))
    }

    /// Returns score and rank of `id` read together, or `None` if absent.
    pub async fn find(&self, id: &str) -> Result<Option<Entry>> {
        let mut replies = self
            .store
            .execute_batch(vec![
                StoreRequest::ZScore {
                    key: self.key.clone(),
                    member: id.to_owned(),
                },
                StoreRequest::ZRank {
                    key: self.key.clone(),
                    member: id.to_owned(),
                    order: self.order(),
                },
            ])
            .await?
            .into_iter();

        let score = match replies.next() {
            Some(reply) => reply.into_score()?,
            None => None,
        };
        let rank = match replies.next() {
            Some(reply) => reply.into_rank()?,
            None => None,
        };
        Ok(score.zip(rank).map(|(score, rank)| Entry::new(id, score, rank + 1)))
    }

    /// Returns the entry at a 1-based rank, or `None` past either end.
    pub async fn at(&self, rank: i64) -> Result<Option<Entry>> {
        if rank <= 0 {
            return Ok(None);
        }
        Ok(self.list(rank, rank).await?.into_iter().next())
    }

    /// Returns entries ranked `low..=high` (1-based), best first.
    ///
    /// Both bounds are clamped to at least 1. Bounds past the end of the
    /// collection shorten the result rather than failing.
    pub async fn list(&self, low: i64, high: i64) -> Result<Vec<Entry>> {
        let (low, high) = (low.max(1), high.max(1));
        if low > high {
            return Err(Error::InvalidRange { low, high });
        }
        let members = self
            .store
            .execute(StoreRequest::ZRange {
                key: self.key.clone(),
                start: low - 1,
                stop: high - 1,
                order: self.order(),
            })
            .await?
            .into_scored_array()?;
        Ok(ranked(members, low as usize))
    }

    /// Returns every entry whose score lies in `min..=max`, best first.
    pub async fn list_by_score(&self, min: f64, max: f64) -> Result<Vec<Entry>> {
        let window = self
            .store
            .eval(ScoreRangeScript {
                key: self.key.clone(),
                order: self.order(),
                min,
                max,
            })
            .await?;
        Ok(match window {
            Some((first_rank, members)) => ranked(members, first_rank + 1),
            None => Vec::new(),
        })
    }

    /// Returns the best `max` entries.
    pub async fn top(&self, max: i64) -> Result<Vec<Entry>> {
        if max <= 0 {
            return Err(Error::non_positive("max", max));
        }
        self.list(1, max).await
    }

    /// Returns the worst `max` entries, in ascending rank order.
    pub async fn bottom(&self, max: i64) -> Result<Vec<Entry>> {
        if max <= 0 {
            return Err(Error::non_positive("max", max));
        }
        let mut replies = self
            .store
            .execute_batch(vec![
                StoreRequest::ZCard {
                    key: self.key.clone(),
                },
                StoreRequest::ZRange {
                    key: self.key.clone(),
                    start: 0,
                    stop: max - 1,
                    order: self.order().reverse(),
                },
            ])
            .await?
            .into_iter();

        let count = match replies.next() {
            Some(reply) => reply.into_len()?,
            None => 0,
        };
        let mut members = match replies.next() {
            Some(reply) => reply.into_scored_array()?,
            None => Vec::new(),
        };
        members.reverse();
        let first_rank = count + 1 - members.len();
        Ok(ranked(members, first_rank))
    }

    /// Returns the entries within `distance` ranks of `id`, `id` included.
    ///
    /// Near either end the window is clipped; with `fill_borders` it is
    /// shifted inward instead. When the collection holds at least
    /// `2 * distance + 1` entries that many come back; a smaller collection
    /// can return fewer than all of its entries. An absent `id` yields an
    /// empty list.
    pub async fn around(&self, id: &str, distance: i64, fill_borders: bool) -> Result<Vec<Entry>> {
        if distance < 0 {
            return Err(Error::NegativeDistance(distance));
        }
        let window = self
            .store
            .eval(AroundScript {
                key: self.key.clone(),
                order: self.order(),
                member: id.to_owned(),
                distance: distance as usize,
                fill_borders,
            })
            .await?;
        Ok(match window {
            Some(window) => ranked(window.members, window.first_rank + 1),
            None => Vec::new(),
        })
    }

    /// Applies `entries` under `policy` (or the collection default), then
    /// trims to the configured top-N, all in one atomic submission.
    ///
    /// Returns the final score of every entry for `aggregate` and `best`,
    /// and an empty list for `replace`.
    pub async fn update<I, K>(&self, entries: I, policy: Option<UpdatePolicy>) -> Result<Vec<f64>>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        let entries: Vec<(String, f64)> = entries
            .into_iter()
            .map(|(id, value)| (id.into(), value))
            .collect();
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let update_policy = policy.unwrap_or(self.options.update_policy);
        debug!(key = %self.key, entries = entries.len(), policy = ?update_policy, "updating leaderboard");

        let batch = UpdateBatch {
            key: self.key.clone(),
            sort_policy: self.options.sort_policy,
            update_policy,
            limit: self.options.limit(),
            entries,
        };
        let scores = self
            .store
            .eval(UpdateScript {
                batches: vec![batch],
            })
            .await?;
        Ok(scores.into_iter().next().unwrap_or_default())
    }

    /// Updates a single id. Returns its final score for `aggregate` and
    /// `best`, `None` for `replace`.
    pub async fn update_one(
        &self,
        id: &str,
        value: f64,
        policy: Option<UpdatePolicy>,
    ) -> Result<Option<f64>> {
        let scores = self.update([(id, value)], policy).await?;
        Ok(scores.into_iter().next())
    }

    /// Removes ids. Missing ids are ignored.
    pub async fn remove<I, K>(&self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let members: Vec<String> = ids.into_iter().map(Into::into).collect();
        if members.is_empty() {
            return Ok(());
        }
        self.store
            .execute(StoreRequest::ZRem {
                key: self.key.clone(),
                members,
            })
            .await?
            .into_removed()?;
        Ok(())
    }

    /// Removes every entry.
    pub async fn clear(&self) -> Result<()> {
        self.store
            .execute(StoreRequest::Del {
                key: self.key.clone(),
            })
            .await?
            .into_bool()?;
        Ok(())
    }

    /// Returns the number of entries.
    pub async fn count(&self) -> Result<usize> {
        let reply = self
            .store
            .execute(StoreRequest::ZCard {
                key: self.key.clone(),
            })
            .await?;
        Ok(reply.into_len()?)
    }

    /// Returns a forward iterator over the collection in `batch_size`
    /// pages.
    ///
    /// Each page is a separate `list` call, so writes between pages can
    /// shift entries across page boundaries (skipped or repeated).
    pub fn export(&self, batch_size: i64) -> Result<Exporter<S>> {
        if batch_size <= 0 {
            return Err(Error::non_positive("batch size", batch_size));
        }
        Ok(Exporter {
            leaderboard: self.clone(),
            batch_size,
            next_rank: 1,
            done: false,
        })
    }
}

/// Reads the members scored `min..=max` and the rank of the first of them.
#[derive(Debug)]
struct ScoreRangeScript {
    key: String,
    order: Order,
    min: f64,
    max: f64,
}

impl Script for ScoreRangeScript {
    type Output = Option<(usize, Vec<(String, f64)>)>;

    fn run(self, ctx: &mut dyn ScriptContext) -> Self::Output {
        let mut members = ctx.zrangebyscore(&self.key, self.min, self.max);
        if self.order == Order::Desc {
            members.reverse();
        }
        let (first, _) = members.first()?;
        let first_rank = ctx.zrank(&self.key, first, self.order)?;
        Some((first_rank, members))
    }
}

/// Pages through a leaderboard from rank 1 down.
///
/// Created by [`Leaderboard::export`].
#[derive(Debug, Clone)]
pub struct Exporter<S> {
    leaderboard: Leaderboard<S>,
    batch_size: i64,
    next_rank: i64,
    done: bool,
}

impl<S: OrderedSetStore> Exporter<S> {
    /// Returns the next page, or `None` once the end has been reached.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Entry>>> {
        if self.done {
            return Ok(None);
        }
        let low = self.next_rank;
        let high = low.saturating_add(self.batch_size - 1);
        let page = self.leaderboard.list(low, high).await?;
        if (page.len() as i64) < self.batch_size {
            self.done = true;
        }
        if page.is_empty() {
            return Ok(None);
        }
        self.next_rank = self.next_rank.saturating_add(page.len() as i64);
        Ok(Some(page))
    }

    /// The 1-based rank the next page starts at.
    pub fn position(&self) -> i64 {
        self.next_rank
    }

    /// Moves the iterator so the next page starts at `rank` (clamped to 1).
    pub fn seek(&mut self, rank: i64) {
        self.next_rank = rank.max(1);
        self.done = false;
    }
}
