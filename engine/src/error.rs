//! Engine error type.
//!
//! These errors are returned to the consensus driver or to the code wiring
//! the application. Per-transaction failures never surface here; they are
//! reported as codes inside a `TxResult`.

use basalt_primitives::Height;
use basalt_store::StoreError;

use crate::coordinator::Phase;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// A lifecycle call arrived in the wrong phase.
    #[error("{operation} is not allowed in phase {phase:?}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    /// `begin_block` for a height other than the next one.
    #[error("invalid block height: expected {expected}, got {got}")]
    InvalidHeight { expected: Height, got: Height },

    /// A handler is already registered for this route.
    #[error("route {0} already registered")]
    DuplicateRoute(String),

    /// Routes must be non-empty and alphanumeric.
    #[error("invalid route {0:?}")]
    InvalidRoute(String),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("config: {0}")]
    Config(String),

    /// An application hook failed outside any transaction.
    #[error("{hook} hook failed: {reason}")]
    Hook { hook: &'static str, reason: String },
}
