// Error types for the mock fixture server
//
// This module defines the error kinds raised while answering a request,
// each carrying a numeric error code and a mapping onto an HTTP response.

mod fixture;

pub use fixture::{log_fixture_error, FixtureError, FixtureErrorCodes, IoPhase, UNKNOWN_ERROR};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so logs and tests can match on a stable number
/// instead of message text.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
