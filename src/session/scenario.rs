//! Scenario files: registrations described as JSON.
//!
//! ```json
//! { "overrides": [
//!     { "path": "/users", "status": 500 },
//!     { "path": "/profile", "replace": { "/name": "b", "/tags/-": "new" } }
//! ] }
//! ```
//!
//! Replacements keep the order they appear in the file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Session;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub overrides: Vec<ScenarioOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOverride {
    pub path: String,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub replace: Map<String, Value>,
}

impl Scenario {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("reading scenario {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("parsing {}", path.display()))
    }

    /// Register every override on `session`, returning how many entries were
    /// added.
    pub fn apply(&self, session: &Session) -> usize {
        let mut registered = 0;
        for entry in &self.overrides {
            let mut builder = session.respond_to(entry.path.as_str());
            if let Some(status) = entry.status {
                builder = builder.with_status(status);
                registered += 1;
            }
            for (pointer, value) in &entry.replace {
                builder = builder.and_replace(pointer.as_str(), value.clone());
                registered += 1;
            }
        }
        log::info!(
            "[Scenario] Registered {} override(s) across {} path(s)",
            registered,
            self.overrides.len()
        );
        registered
    }
}
