// Fixture pipeline error types and constants

use crate::body::ResponseBody;
use crate::error::ErrorCode;
use axum::http::StatusCode;
use log::error;
use std::fmt;
use std::path::PathBuf;

/// Payload used when a request fails without a typed error, e.g. a panic.
pub const UNKNOWN_ERROR: &str = "unknown error";

/// Fixture error code constants
///
/// Error code range: 3001-3004
pub struct FixtureErrorCodes {}

impl FixtureErrorCodes {
    /// No fixture file at either candidate path
    pub const NOT_FOUND: i32 = 3001;

    /// Filesystem failure other than not-found
    pub const IO_ERROR: i32 = 3002;

    /// JSON-shaped fixture failed to parse
    pub const MALFORMED_FIXTURE: i32 = 3003;

    /// Registered patch or status could not be applied
    pub const INVALID_MUTATION: i32 = 3004;
}

/// Pipeline step during which a filesystem error surfaced.
///
/// Only the read step answers with 500; errors met while probing candidate
/// paths are reported as not found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoPhase {
    Resolve,
    Read,
}

/// Log a fixture error with structured context
///
/// Logs the numeric code, the component, and the message next to the
/// request path that triggered it.
pub fn log_fixture_error(err: &FixtureError, context: &str) {
    error!(
        "Fixture error in {}: code={}, component=ResponsePipeline, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while turning a request path into a response.
///
/// Every variant maps onto a `(status, payload)` pair through
/// [`FixtureError::status`] and [`FixtureError::payload`], which is all the
/// pipeline needs to answer the client and notify the observer.
#[derive(Debug, Clone, PartialEq)]
pub enum FixtureError {
    /// Neither `<root><url>` nor `<root><url>.json` is a file
    NotFound { url: String },

    /// Filesystem failure while probing or reading a fixture
    Io {
        file: PathBuf,
        details: String,
        phase: IoPhase,
    },

    /// Fixture looks like a JSON object but does not parse
    MalformedFixture {
        message: String,
        url: String,
        file: PathBuf,
    },

    /// A registered patch or status cannot be applied to this request
    InvalidMutation {
        url: String,
        pointer: Option<String>,
        reason: String,
    },
}

impl FixtureError {
    pub fn not_found(url: impl Into<String>) -> Self {
        FixtureError::NotFound { url: url.into() }
    }

    pub fn io(file: impl Into<PathBuf>, err: &std::io::Error, phase: IoPhase) -> Self {
        FixtureError::Io {
            file: file.into(),
            details: err.to_string(),
            phase,
        }
    }

    /// HTTP status the pipeline answers with for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            FixtureError::NotFound { .. } => StatusCode::NOT_FOUND,
            FixtureError::Io {
                phase: IoPhase::Resolve,
                ..
            } => StatusCode::NOT_FOUND,
            FixtureError::Io { .. }
            | FixtureError::MalformedFixture { .. }
            | FixtureError::InvalidMutation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body the pipeline answers with for this error.
    ///
    /// Only malformed fixtures carry a structured payload; everything else is
    /// a plain message.
    pub fn payload(&self) -> ResponseBody {
        match self {
            FixtureError::MalformedFixture { message, url, file } => {
                ResponseBody::Json(serde_json::json!({
                    "message": message,
                    "url": url,
                    "file": file.display().to_string(),
                }))
            }
            _ => ResponseBody::Text(self.message()),
        }
    }
}

impl ErrorCode for FixtureError {
    fn code(&self) -> i32 {
        match self {
            FixtureError::NotFound { .. } => FixtureErrorCodes::NOT_FOUND,
            FixtureError::Io { .. } => FixtureErrorCodes::IO_ERROR,
            FixtureError::MalformedFixture { .. } => FixtureErrorCodes::MALFORMED_FIXTURE,
            FixtureError::InvalidMutation { .. } => FixtureErrorCodes::INVALID_MUTATION,
        }
    }

    fn message(&self) -> String {
        match self {
            FixtureError::NotFound { url } => format!("No fixture found for {}", url),
            FixtureError::Io { file, details, .. } => {
                format!("Failed to read fixture {}: {}", file.display(), details)
            }
            FixtureError::MalformedFixture { message, .. } => message.clone(),
            FixtureError::InvalidMutation {
                url,
                pointer: Some(pointer),
                reason,
            } => format!("Cannot apply {} to {}: {}", pointer, url, reason),
            FixtureError::InvalidMutation {
                url,
                pointer: None,
                reason,
            } => format!("Cannot apply mutation to {}: {}", url, reason),
        }
    }
}

impl fmt::Display for FixtureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixtureError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for FixtureError {}
