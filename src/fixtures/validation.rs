//! JSON validation for loaded fixtures.
//!
//! Only content whose first non-whitespace character is `{` is checked.
//! Arrays, scalars, HTML, and plain text pass through untouched, while a
//! corrupted object fixture fails here with the parser message instead of
//! surfacing later as a mutation error.

use std::path::Path;

use crate::error::FixtureError;

/// Cheap heuristic: does this content look like a JSON object?
pub fn looks_like_json(content: &str) -> bool {
    content.trim_start().starts_with('{')
}

/// Check a fixture's content, returning it unchanged when acceptable.
///
/// `url` and `file` are only used to build the diagnostic on failure.
pub fn validate<'a>(content: &'a str, url: &str, file: &Path) -> Result<&'a str, FixtureError> {
    if !looks_like_json(content) {
        return Ok(content);
    }

    match serde_json::from_str::<serde::de::IgnoredAny>(content) {
        Ok(_) => Ok(content),
        Err(err) => Err(FixtureError::MalformedFixture {
            message: err.to_string(),
            url: url.to_string(),
            file: file.to_path_buf(),
        }),
    }
}
