//! Error types for Agrama operations.
//!
//! This module provides the error hierarchy used across the store, the
//! indices, and the primitive dispatcher. Every fallible operation in the
//! crate returns `Result<T, AgramaError>`, and every failure mode named by
//! the error taxonomy gets its own variant so callers can match
//! exhaustively instead of string-matching a message.
use thiserror::Error;

/// The kind of failure, independent of the message — this is what a
/// dispatcher response envelope serializes as `error.kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArgument,
    NotFound,
    OutOfMemory,
    Conflict,
    Cancelled,
    Internal,
}

/// The main error type for Agrama operations.
#[derive(Error, Debug)]
pub enum AgramaError {
    /// Malformed input, unknown primitive, weight sum out of range.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// A key or graph node was not found.
    #[error("not found: {what} '{id}'")]
    NotFound { what: &'static str, id: String },

    /// Allocation failure. Recovered only by aborting the primitive.
    #[error("out of memory while {during}")]
    OutOfMemory { during: String },

    /// Concurrent writer contention exceeded the retry budget.
    #[error("conflict on '{key}' after {attempts} retries")]
    Conflict { key: String, attempts: u32 },

    /// Cancellation observed before the write committed.
    #[error("cancelled before commit: {primitive}")]
    Cancelled { primitive: String },

    /// Invariant violation (assertion). Fatal for the request, not the process.
    #[error("internal invariant violated: {invariant}")]
    Internal { invariant: String },

    /// Serialization error when converting data to/from JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AgramaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgramaError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            AgramaError::NotFound { .. } => ErrorKind::NotFound,
            AgramaError::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            AgramaError::Conflict { .. } => ErrorKind::Conflict,
            AgramaError::Cancelled { .. } => ErrorKind::Cancelled,
            AgramaError::Internal { .. } => ErrorKind::Internal,
            AgramaError::Serialization(_) => ErrorKind::InvalidArgument,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        AgramaError::InvalidArgument { reason: reason.into() }
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        AgramaError::NotFound { what, id: id.into() }
    }

    pub fn internal(invariant: impl Into<String>) -> Self {
        AgramaError::Internal { invariant: invariant.into() }
    }
}

/// Result type alias for Agrama operations.
pub type AgramaResult<T> = Result<T, AgramaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        assert_eq!(AgramaError::invalid("bad").kind(), ErrorKind::InvalidArgument);
        assert_eq!(
            AgramaError::not_found("key", "a.ts").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            AgramaError::Cancelled { primitive: "store".into() }.kind(),
            ErrorKind::Cancelled
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidArgument).unwrap();
        assert_eq!(json, "\"invalid_argument\"");
    }
}
