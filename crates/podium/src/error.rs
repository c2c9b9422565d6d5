//! Error types for leaderboard operations.

use std::path::PathBuf;

use podium_store::StoreError;

/// Errors returned by leaderboard and matrix operations.
///
/// Validation variants are raised before anything is sent to the store.
/// Absence is never an error: missing ids come back as `None` or empty.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A rank range whose lower bound sits past its upper bound.
    #[error("invalid rank range: low {low} is greater than high {high}")]
    InvalidRange { low: i64, high: i64 },

    /// A window distance below zero.
    #[error("distance must be non-negative, got {0}")]
    NegativeDistance(i64),

    /// An entry count (max, threshold, batch size) that is not positive.
    #[error("{what} must be positive, got {value}")]
    NonPositive { what: &'static str, value: i64 },

    /// A sort dimension/feature pair that is not part of the matrix.
    #[error("unknown matrix cell {dimension}:{feature}")]
    UnknownCell { dimension: String, feature: String },

    /// The store failed; passed through untouched.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Dimension or feature names that would make two cells share a key.
    #[error("invalid matrix grid: {0}")]
    InvalidGrid(String),

    /// A configuration file that could not be read.
    #[error("failed to read configuration {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A configuration document that is not valid TOML for a matrix.
    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration that could not be rendered as TOML.
    #[error("failed to write configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),
}

impl Error {
    pub(crate) fn non_positive(what: &'static str, value: i64) -> Self {
        Error::NonPositive { what, value }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
