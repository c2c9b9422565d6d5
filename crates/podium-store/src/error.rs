//! Error types for the store.

use thiserror::Error;

/// Errors returned by store submissions.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store task is no longer running (channel closed), or it stopped
    /// before replying.
    #[error("store unavailable")]
    Unavailable,

    /// A reply of the wrong shape came back for a request.
    #[error("unexpected {got} reply, expected {expected}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },
}
