//! Engine error model.
//!
//! Denial is never an error: every public check surfaces a boolean verdict or
//! a filtered query. Only infrastructure failures (the rule store being
//! unreachable, a corrupted cache) propagate as [`PolicyError`].

use thiserror::Error;

use crate::store::StoreError;

/// Result type used by the policy service.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Infrastructure failure surfaced to the caller.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// An internal cache lock was poisoned by a panicking writer.
    #[error("policy cache poisoned")]
    CachePoisoned,
}
