//! Error types for coopr

use thiserror::Error;

/// Result type alias using coopr's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur at coopr's public API surface
///
/// Only launch configuration and argument validation are reported here.
/// Contract violations inside group-local kernels (divergent barrier calls,
/// non-LIFO scratch frees, over-capacity bounded calls) are undefined
/// behavior by design and are documented on the individual operations, not
/// surfaced as errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Launch configuration is malformed
    #[error("Invalid launch configuration: {reason}")]
    InvalidLaunch {
        /// Reason the configuration was rejected
        reason: String,
    },

    /// Output length does not match what the operation will produce
    #[error("Length mismatch: expected output of {expected} elements, got {got}")]
    LengthMismatch {
        /// Required output length
        expected: usize,
        /// Actual output length
        got: usize,
    },
}
