//! Sorted set data structure: dual-indexed by score and member.
//!
//! Each member has a unique name and an associated `f64` score. Members
//! are ordered by (score, member): ties in score are broken
//! lexicographically, matching Redis semantics. Descending views walk the
//! same index backwards, so ties come out in reverse lexicographic order
//! (what ZREVRANGE does).
//!
//! Implementation uses a sorted `Vec<(OrderedFloat<f64>, Arc<str>)>` for
//! O(log n) rank queries and fast iteration, plus an
//! `AHashMap<Arc<str>, OrderedFloat<f64>>` for O(1) member→score lookups.
//! Member strings are shared via `Arc<str>` between both structures,
//! so each string is stored once on the heap.

use std::sync::Arc;

use ahash::AHashMap;
use ordered_float::OrderedFloat;

use crate::Order;

/// A sorted set of unique string members, each with a floating-point score.
///
/// Members are ordered by `(score, member_name)`. Rank is determined by
/// position in this ordering (0-based, lowest score first) unless a
/// descending [`Order`] is requested.
#[derive(Debug, Clone, Default)]
pub struct SortedSet {
    /// Score-ordered index for rank queries and iteration.
    /// Kept sorted by `(score, member_name)` at all times.
    sorted: Vec<(OrderedFloat<f64>, Arc<str>)>,
    /// Member→score index for O(1) lookups.
    scores: AHashMap<Arc<str>, OrderedFloat<f64>>,
}

impl SortedSet {
    /// Creates an empty sorted set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or updates a member with the given score. Returns `true` if the
    /// member was newly added.
    pub fn add(&mut self, member: &str, score: f64) -> bool {
        let new_score = OrderedFloat(score);

        match self.scores.get_key_value(member) {
            Some((name, &old_score)) => {
                if old_score == new_score {
                    return false;
                }
                // reuse the existing Arc to avoid a new heap allocation
                let name = name.clone();
                if let Ok(old_idx) = self.search_idx(old_score, &name) {
                    self.sorted.remove(old_idx);
                }
                self.scores.insert(name.clone(), new_score);
                let new_idx = self.insertion_idx(new_score, &name);
                self.sorted.insert(new_idx, (new_score, name));
                false
            }
            None => {
                let name: Arc<str> = Arc::from(member);
                self.scores.insert(name.clone(), new_score);
                let idx = self.insertion_idx(new_score, &name);
                self.sorted.insert(idx, (new_score, name));
                true
            }
        }
    }

    /// Adds `delta` to a member's score, treating a missing member as 0.
    /// Returns the new score.
    pub fn incr(&mut self, member: &str, delta: f64) -> f64 {
        let score = self.score(member).unwrap_or(0.0) + delta;
        self.add(member, score);
        score
    }

    /// Removes a member from the sorted set. Returns `true` if it existed.
    pub fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove_entry(member) {
            Some((name, score)) => {
                if let Ok(idx) = self.search_idx(score, &name) {
                    self.sorted.remove(idx);
                }
                true
            }
            None => false,
        }
    }

    /// Removes every member whose ascending rank falls in `start..=stop`.
    /// Supports negative indices. Returns how many members were removed.
    pub fn remove_range_by_rank(&mut self, start: i64, stop: i64) -> usize {
        let Some((s, e)) = normalize_range(start, stop, self.sorted.len()) else {
            return 0;
        };
        for (_, name) in self.sorted.drain(s..=e) {
            self.scores.remove(&name);
        }
        e - s + 1
    }

    /// Returns the score for a member, or `None` if not present.
    pub fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).map(|s| s.0)
    }

    /// Returns the 0-based rank of a member under `order`.
    /// Returns `None` if the member is not present.
    ///
    /// O(log n), binary search over the sorted Vec.
    pub fn rank(&self, member: &str, order: Order) -> Option<usize> {
        let (name, &score) = self.scores.get_key_value(member)?;
        let idx = self.search_idx(score, name).ok()?;
        Some(match order {
            Order::Asc => idx,
            Order::Desc => self.sorted.len() - 1 - idx,
        })
    }

    /// Returns members in the given rank range under `order`, inclusive on
    /// both ends. Supports negative indices: -1 = last, -2 = second to last.
    pub fn range_by_rank(&self, start: i64, stop: i64, order: Order) -> Vec<(&str, f64)> {
        let len = self.sorted.len();
        let Some((s, e)) = normalize_range(start, stop, len) else {
            return Vec::new();
        };
        match order {
            Order::Asc => self.sorted[s..=e]
                .iter()
                .map(|(score, member)| (&**member, score.0))
                .collect(),
            Order::Desc => self.sorted[len - 1 - e..=len - 1 - s]
                .iter()
                .rev()
                .map(|(score, member)| (&**member, score.0))
                .collect(),
        }
    }

    /// Returns members with `min <= score <= max` in ascending order.
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(&str, f64)> {
        if min > max {
            return Vec::new();
        }
        let (min, max) = (OrderedFloat(min), OrderedFloat(max));
        let from = self.sorted.partition_point(|(s, _)| *s < min);
        self.sorted[from..]
            .iter()
            .take_while(|(s, _)| *s <= max)
            .map(|(score, member)| (&**member, score.0))
            .collect()
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns `true` if the sorted set has no members.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Returns an iterator over (member, score) pairs in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.sorted
            .iter()
            .map(|(score, member)| (&**member, score.0))
    }

    /// Finds the position of `(score, name)` in the sorted Vec.
    ///
    /// Returns `Ok(idx)` if found, `Err(insertion_point)` if not found.
    fn search_idx(&self, score: OrderedFloat<f64>, name: &str) -> Result<usize, usize> {
        self.sorted
            .binary_search_by(|(s, m)| s.cmp(&score).then_with(|| (**m).cmp(name)))
    }

    fn insertion_idx(&self, score: OrderedFloat<f64>, name: &str) -> usize {
        match self.search_idx(score, name) {
            Ok(idx) | Err(idx) => idx,
        }
    }
}

/// Resolves Redis-style `start..=stop` indices against `len`.
///
/// Negative indices count from the end. Returns `None` when the range is
/// empty after clamping.
pub(crate) fn normalize_range(start: i64, stop: i64, len: usize) -> Option<(usize, usize)> {
    let len = len as i64;
    if len == 0 {
        return None;
    }
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}
