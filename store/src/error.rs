//! Store error type.
//!
//! Per-key reads and writes on in-memory stores cannot fail; errors come
//! from wiring (unknown or duplicate capability tokens) and from historical
//! queries.

use basalt_primitives::{ExecError, Version};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The token was never mounted on this multistore.
    #[error("capability violation: no store mounted for key {0}")]
    UnknownStore(String),

    /// The token, or another token with the same name, is already mounted.
    #[error("store {0} is already mounted")]
    DuplicateMount(String),

    /// Sub-stores can only be mounted before the first commit.
    #[error("cannot mount store {name} after commit (version {version})")]
    MountAfterCommit { name: String, version: Version },

    /// The requested version was pruned from history.
    #[error("version {0} is pruned and no longer available")]
    VersionPruned(Version),

    /// The requested version has not been committed yet.
    #[error("version {requested} not found (latest {latest})")]
    VersionNotFound { requested: Version, latest: Version },

    /// Transient stores keep no history and cannot be queried.
    #[error("store {0} is not queryable")]
    NotQueryable(String),
}

impl StoreError {
    /// True for errors that indicate an application wiring bug.
    pub fn is_capability_violation(&self) -> bool {
        matches!(self, Self::UnknownStore(_))
    }
}

impl From<StoreError> for ExecError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownStore(name) => ExecError::CapabilityViolation(name),
            other => ExecError::Internal(other.to_string()),
        }
    }
}
