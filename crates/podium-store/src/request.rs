//! Protocol-agnostic requests and replies.
//!
//! One [`StoreRequest`] is one single-key primitive. Requests are submitted
//! alone or as an atomic batch; each produces exactly one [`StoreResponse`].

use crate::error::StoreError;
use crate::keyspace::Keyspace;
use crate::script::ScriptContext;
use crate::Order;

/// A sorted-set command sent to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreRequest {
    ZAdd {
        key: String,
        members: Vec<(f64, String)>,
    },
    ZIncrBy {
        key: String,
        member: String,
        delta: f64,
    },
    ZRem {
        key: String,
        members: Vec<String>,
    },
    /// Removes by ascending rank; negative indices count from the end.
    ZRemRangeByRank {
        key: String,
        start: i64,
        stop: i64,
    },
    ZScore {
        key: String,
        member: String,
    },
    ZRank {
        key: String,
        member: String,
        order: Order,
    },
    ZCard {
        key: String,
    },
    ZRange {
        key: String,
        start: i64,
        stop: i64,
        order: Order,
    },
    ZRangeByScore {
        key: String,
        min: f64,
        max: f64,
    },
    Del {
        key: String,
    },
    /// Iterates keys matching a glob pattern. Not atomic across calls.
    Scan {
        cursor: u64,
        count: usize,
        pattern: Option<String>,
    },
}

/// The store's reply to a request.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreResponse {
    /// Integer length result (ZADD added count, ZCARD, ZREMRANGEBYRANK).
    Len(usize),
    /// Float score result (ZINCRBY, ZSCORE).
    Score(Option<f64>),
    /// Rank result (ZRANK).
    Rank(Option<usize>),
    /// Scored array of (member, score) pairs (ZRANGE, ZRANGEBYSCORE).
    ScoredArray(Vec<(String, f64)>),
    /// Members that were actually removed (ZREM).
    Removed(Vec<String>),
    /// Boolean result (DEL).
    Bool(bool),
    /// Scan result: next cursor and list of keys.
    Scan { cursor: u64, keys: Vec<String> },
}

impl StoreResponse {
    fn kind(&self) -> &'static str {
        match self {
            StoreResponse::Len(_) => "len",
            StoreResponse::Score(_) => "score",
            StoreResponse::Rank(_) => "rank",
            StoreResponse::ScoredArray(_) => "scored array",
            StoreResponse::Removed(_) => "removed",
            StoreResponse::Bool(_) => "bool",
            StoreResponse::Scan { .. } => "scan",
        }
    }

    fn unexpected(&self, expected: &'static str) -> StoreError {
        StoreError::UnexpectedResponse {
            expected,
            got: self.kind(),
        }
    }

    pub fn into_len(self) -> Result<usize, StoreError> {
        match self {
            StoreResponse::Len(n) => Ok(n),
            other => Err(other.unexpected("len")),
        }
    }

    pub fn into_score(self) -> Result<Option<f64>, StoreError> {
        match self {
            StoreResponse::Score(s) => Ok(s),
            other => Err(other.unexpected("score")),
        }
    }

    pub fn into_rank(self) -> Result<Option<usize>, StoreError> {
        match self {
            StoreResponse::Rank(r) => Ok(r),
            other => Err(other.unexpected("rank")),
        }
    }

    pub fn into_scored_array(self) -> Result<Vec<(String, f64)>, StoreError> {
        match self {
            StoreResponse::ScoredArray(items) => Ok(items),
            other => Err(other.unexpected("scored array")),
        }
    }

    pub fn into_removed(self) -> Result<Vec<String>, StoreError> {
        match self {
            StoreResponse::Removed(members) => Ok(members),
            other => Err(other.unexpected("removed")),
        }
    }

    pub fn into_bool(self) -> Result<bool, StoreError> {
        match self {
            StoreResponse::Bool(b) => Ok(b),
            other => Err(other.unexpected("bool")),
        }
    }

    pub fn into_scan(self) -> Result<(u64, Vec<String>), StoreError> {
        match self {
            StoreResponse::Scan { cursor, keys } => Ok((cursor, keys)),
            other => Err(other.unexpected("scan")),
        }
    }
}

/// Executes one request against the keyspace.
pub(crate) fn dispatch(ctx: &mut Keyspace, request: &StoreRequest) -> StoreResponse {
    match request {
        StoreRequest::ZAdd { key, members } => StoreResponse::Len(ctx.zadd(key, members)),
        StoreRequest::ZIncrBy { key, member, delta } => {
            StoreResponse::Score(Some(ctx.zincrby(key, member, *delta)))
        }
        StoreRequest::ZRem { key, members } => StoreResponse::Removed(ctx.zrem(key, members)),
        StoreRequest::ZRemRangeByRank { key, start, stop } => {
            StoreResponse::Len(ctx.zremrangebyrank(key, *start, *stop))
        }
        StoreRequest::ZScore { key, member } => StoreResponse::Score(ctx.zscore(key, member)),
        StoreRequest::ZRank { key, member, order } => {
            StoreResponse::Rank(ctx.zrank(key, member, *order))
        }
        StoreRequest::ZCard { key } => StoreResponse::Len(ctx.zcard(key)),
        StoreRequest::ZRange {
            key,
            start,
            stop,
            order,
        } => StoreResponse::ScoredArray(ctx.zrange(key, *start, *stop, *order)),
        StoreRequest::ZRangeByScore { key, min, max } => {
            StoreResponse::ScoredArray(ctx.zrangebyscore(key, *min, *max))
        }
        StoreRequest::Del { key } => StoreResponse::Bool(ctx.del(key)),
        StoreRequest::Scan {
            cursor,
            count,
            pattern,
        } => {
            let (cursor, keys) = ctx.scan_keys(*cursor, *count, pattern.as_deref());
            StoreResponse::Scan { cursor, keys }
        }
    }
}
