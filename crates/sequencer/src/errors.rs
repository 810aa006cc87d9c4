//! Error types for the reveal domain.
//!
//! [`StorageError`] is what [`crate::VisitStore`] adapters report. The state
//! machine itself never surfaces it: a failed read counts as a first visit and
//! a failed write is logged and ignored. Only administrative operations
//! (`reset`, opening a store, loading configuration) propagate errors, wrapped
//! in [`CurtainError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failure reported by a [`crate::VisitStore`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StorageError {
    /// The backing store cannot be reached (e.g. `localStorage` disabled by
    /// the browser's privacy settings).
    #[error("Storage unavailable: {reason}")]
    Unavailable {
        /// Human-readable description of why the store is unavailable.
        reason: String,
    },

    /// The backing store exists but its content could not be decoded.
    #[error("Storage content is corrupt: {reason}")]
    Corrupt {
        /// Description of the decoding failure.
        reason: String,
    },

    /// An I/O error occurred while reading or writing the store.
    #[error("Storage I/O error: {message}")]
    Io {
        /// The underlying error rendered as text.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Top-level errors
// ---------------------------------------------------------------------------

/// Errors surfaced by administrative operations and start-up.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum CurtainError {
    /// A storage port failed during an operation that must not swallow it.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The runtime configuration is invalid.
    ///
    /// Produced at load time; the sequencer never starts with invalid timings.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },

    /// A route string could not be interpreted.
    #[error("Invalid route '{route}': {reason}")]
    InvalidRoute {
        /// The offending input.
        route: String,
        /// Why it was rejected.
        reason: String,
    },
}
