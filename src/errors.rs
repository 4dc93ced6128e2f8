//! Lease Mutex Error Hierarchy
//!
//! Defines error types for the lease-based distributed mutex, categorized
//! by caller contract, provider boundary and operational concerns.

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-side contract violations (bad lock name, out-of-range duration)
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Failures surfaced by the lease store provider
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    /// Lock names identify the leased object and must not be empty
    #[error("Lock name must not be empty")]
    EmptyName,

    /// Requested bounded duration falls outside what the store accepts
    #[error("Lease duration of {requested:?} is outside the accepted {min:?}..={max:?} range")]
    InvalidLeaseDuration {
        requested: Duration,
        min: Duration,
        max: Duration,
    },

    /// The engine was disposed and is permanently unusable
    #[error("Mutex was disposed")]
    Disposed,
}

/// Typed outcomes at the provider boundary.
///
/// Backends fold their conflict/not-found/precondition-failed style status
/// codes into [`Conflict`](StoreError::Conflict) and
/// [`NotFound`](StoreError::NotFound) before the engine ever sees them, so
/// the swallow-vs-propagate policy never inspects numeric codes.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Another holder currently owns the lease
    #[error("Lease on {object} is held by another owner")]
    Conflict { object: String },

    /// The lease or its backing object is gone
    #[error("No lease found for {object}")]
    NotFound { object: String },

    /// The backend rejected the call for reasons other than lease state
    #[error("Lease store backend failure: {0}")]
    Backend(String),

    /// Network-level failure talking to the backend
    #[error("Lease store transport failure: {source}")]
    Transport {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Conflict and not-found responses during release/break mean the lease
    /// is already gone from the caller's point of view.
    pub fn lease_already_gone(&self) -> bool {
        matches!(self, StoreError::Conflict { .. } | StoreError::NotFound { .. })
    }
}
