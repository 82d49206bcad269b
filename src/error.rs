//! Error types for seyrek

use std::time::Duration;
use thiserror::Error;

/// Result type alias using seyrek's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in seyrek operations
#[derive(Error, Debug)]
pub enum Error {
    /// Stored element width or blob size disagrees with the instantiated types
    #[error("Format mismatch in '{component}': {reason}")]
    FormatMismatch {
        /// The store component being decoded
        component: &'static str,
        /// What disagreed
        reason: String,
    },

    /// Matrix store retrieval failure
    #[error("I/O error reading {what}: {source}")]
    Io {
        /// Description of the blob being read
        what: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Device buffer allocation failure
    #[error("Resource exhausted: requested {requested} bytes, {available} available")]
    ResourceExhausted {
        /// Requested size in bytes
        requested: usize,
        /// Bytes still available on the device
        available: usize,
    },

    /// An operation was invoked before its inputs were assigned, or in the wrong phase
    #[error("Precondition violated in '{op}': {reason}")]
    PreconditionViolation {
        /// The operation name
        op: &'static str,
        /// What was missing
        reason: String,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// A partition's pointer span disagrees with its claimed nonzero count
    #[error("Partition {partition} integrity error: claimed nz {claimed}, pointer span {actual}")]
    PartitionIntegrity {
        /// Partition index
        partition: usize,
        /// Nonzero count recorded in the partition metadata
        claimed: usize,
        /// `pointer[last] - pointer[0]`
        actual: usize,
    },

    /// Vector length does not cover the matrix dimension it is paired with
    #[error("Shape mismatch for {what}: expected at least {expected}, got {got}")]
    ShapeMismatch {
        /// Which operand
        what: &'static str,
        /// Required length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// The three-array representation violates its invariants
    #[error("Malformed matrix: {0}")]
    MalformedMatrix(String),

    /// A bounded wait on the finished register expired
    #[error("Timed out waiting for {what} after {polls} polls ({elapsed:?})")]
    Timeout {
        /// What was being waited on
        what: &'static str,
        /// Time spent waiting
        elapsed: Duration,
        /// Number of polls performed
        polls: u64,
    },

    /// The cancellation token was tripped
    #[error("Cancelled while {what}")]
    Cancelled {
        /// What was in progress
        what: &'static str,
    },

    /// Register bus failure other than allocation
    #[error("Bus error: {0}")]
    Bus(String),
}

impl Error {
    /// Create a precondition violation error
    pub fn precondition(op: &'static str, reason: impl Into<String>) -> Self {
        Self::PreconditionViolation {
            op,
            reason: reason.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create a format mismatch error
    pub fn format_mismatch(component: &'static str, reason: impl Into<String>) -> Self {
        Self::FormatMismatch {
            component,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::invalid_argument("n", "must be in 1..=16");
        assert_eq!(err.to_string(), "Invalid argument 'n': must be in 1..=16");

        let err = Error::PartitionIntegrity {
            partition: 2,
            claimed: 5,
            actual: 4,
        };
        assert!(err.to_string().contains("claimed nz 5"));
    }

    #[test]
    fn test_io_error_source() {
        use std::error::Error as _;
        let err = Error::Io {
            what: "m/m-meta.bin".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.source().is_some());
    }
}
