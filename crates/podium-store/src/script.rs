//! Server-side scripts: multi-step programs run as one atomic unit.
//!
//! A [`Script`] is handed to the store whole and executed against a
//! [`ScriptContext`] without any other request interleaving. This is the
//! Rust shape of a stored procedure: read, compare and write steps that
//! must not be split across round trips.

use crate::Order;

/// Sorted-set primitives available to a running script.
///
/// Every method is a single-key operation with the same semantics as the
/// matching [`StoreRequest`](crate::StoreRequest). Writes that empty a set
/// delete its key.
pub trait ScriptContext {
    /// Adds or updates members. Returns how many were newly added.
    fn zadd(&mut self, key: &str, members: &[(f64, String)]) -> usize;

    /// Adds `delta` to a member's score (0 if absent). Returns the new score.
    fn zincrby(&mut self, key: &str, member: &str, delta: f64) -> f64;

    /// Removes members. Returns the ones that were present.
    fn zrem(&mut self, key: &str, members: &[String]) -> Vec<String>;

    /// Removes members by ascending rank, `start..=stop`, negative indices
    /// counting from the end. Returns how many were removed.
    fn zremrangebyrank(&mut self, key: &str, start: i64, stop: i64) -> usize;

    fn zscore(&self, key: &str, member: &str) -> Option<f64>;

    /// 0-based rank of `member` under `order`.
    fn zrank(&self, key: &str, member: &str, order: Order) -> Option<usize>;

    fn zcard(&self, key: &str) -> usize;

    /// Members with their scores in rank range `start..=stop` under `order`.
    fn zrange(&self, key: &str, start: i64, stop: i64, order: Order) -> Vec<(String, f64)>;

    /// Members with `min <= score <= max`, ascending.
    fn zrangebyscore(&self, key: &str, min: f64, max: f64) -> Vec<(String, f64)>;

    /// Deletes the whole key. Returns `true` if it existed.
    fn del(&mut self, key: &str) -> bool;
}

/// A program evaluated atomically by the store.
///
/// Implementors carry their parameters as fields and consume themselves
/// on execution. The output travels back to the caller unchanged.
pub trait Script: Send + 'static {
    type Output: Send + 'static;

    fn run(self, ctx: &mut dyn ScriptContext) -> Self::Output;
}
