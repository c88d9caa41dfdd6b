//! Registry error types.

use thiserror::Error;

/// Registry error type.
#[derive(Debug, Error)]
pub enum RegionError {
    /// A region with this name already exists; creation aborted with the
    /// registry unchanged.
    #[error("region '{name}' already exists")]
    DuplicateName { name: String },

    /// A persisted owners/members encoding could not be decoded. Recovered
    /// per-record during load (skip + warn).
    #[error("malformed user list: {0}")]
    RecordDecode(#[from] serde_json::Error),

    /// A derived index disagrees with the primary data. Indicates a bug, not
    /// a normal failure path; the operation that detected it aborts.
    #[error("region index out of sync: {detail}")]
    InvariantViolation { detail: String },

    /// The persistence gateway failed.
    #[error("provider error: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl RegionError {
    /// Wrap a persistence-gateway failure.
    pub fn provider(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Provider(Box::new(err))
    }

    pub(crate) fn invariant(detail: impl Into<String>) -> Self {
        Self::InvariantViolation {
            detail: detail.into(),
        }
    }
}

/// Result type for registry operations.
pub type RegionResult<T> = Result<T, RegionError>;
