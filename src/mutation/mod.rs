//! Registry of per-path response mutations.
//!
//! Two ordered lists keyed on the literal request path: JSON-pointer patches
//! and status overrides. Matching is exact string equality against the raw
//! URL path, with no query string and no trailing-slash normalization.
//!
//! - every patch registered for a path is applied, in registration order,
//!   to the same decoded document;
//! - for status overrides the first registration for a path wins.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FixtureError;

pub mod pointer;

pub use pointer::{JsonPointer, PointerError, MAX_ARRAY_PADDING};

/// Status used when no override matches.
pub const DEFAULT_STATUS: u16 = 200;

/// One scheduled patch for a single request path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationEntry {
    pub path: String,
    pub pointer: String,
    pub value: Value,
}

/// One scheduled status override for a single request path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub path: String,
    pub status: u16,
}

/// Ordered patches and status overrides for one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Registry {
    mutations: Vec<MutationEntry>,
    statuses: Vec<StatusEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mutation(&mut self, entry: MutationEntry) {
        self.mutations.push(entry);
    }

    pub fn add_status(&mut self, entry: StatusEntry) {
        self.statuses.push(entry);
    }

    pub fn clear(&mut self) {
        self.mutations.clear();
        self.statuses.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty() && self.statuses.is_empty()
    }

    pub fn mutations(&self) -> &[MutationEntry] {
        &self.mutations
    }

    pub fn statuses(&self) -> &[StatusEntry] {
        &self.statuses
    }

    pub fn mutations_for<'a>(
        &'a self,
        request_path: &'a str,
    ) -> impl Iterator<Item = &'a MutationEntry> + 'a {
        self.mutations
            .iter()
            .filter(move |entry| entry.path == request_path)
    }

    pub fn has_mutations_for(&self, request_path: &str) -> bool {
        self.mutations_for(request_path).next().is_some()
    }

    /// Apply every patch registered for `request_path`, in order, to
    /// `document` and return it.
    ///
    /// The first patch that cannot be applied aborts the whole request.
    pub fn apply_mutations(
        &self,
        mut document: Value,
        request_path: &str,
    ) -> Result<Value, FixtureError> {
        for entry in self.mutations_for(request_path) {
            JsonPointer::parse(&entry.pointer)
                .and_then(|pointer| pointer.set(&mut document, entry.value.clone()))
                .map_err(|err| FixtureError::InvalidMutation {
                    url: request_path.to_string(),
                    pointer: Some(entry.pointer.clone()),
                    reason: err.to_string(),
                })?;
        }
        Ok(document)
    }

    /// Status of the first override registered for `request_path`, or 200.
    pub fn resolve_status(&self, request_path: &str) -> u16 {
        self.statuses
            .iter()
            .find(|entry| entry.path == request_path)
            .map(|entry| entry.status)
            .unwrap_or(DEFAULT_STATUS)
    }
}
