//! Configuration management for the mock fixture server
//!
//! This module provides configuration loading from JSON files with
//! environment overrides, so a test harness can point the server at a
//! fixture tree and pick a port without recompiling. Every field has a
//! default, so a partial file only overrides what it names.

use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Environment variable holding `host:port` for the listen socket.
pub const ADDR_ENV: &str = "MOCK_FIXTURE_ADDR";
/// Environment variable holding the fixture root directory.
pub const ROOT_ENV: &str = "MOCK_FIXTURE_ROOT";

/// Complete server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Root directory fixture paths are resolved against
    pub fixtures_dir: PathBuf,
    pub host: IpAddr,
    /// Listen port; 0 binds an ephemeral port
    pub port: u16,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            fixtures_dir: PathBuf::from("fixtures"),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3000,
            cors: CorsConfig::default(),
        }
    }
}

/// Cross-origin policy applied to every route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Allowed origins; `*` allows any origin
    pub origins: Vec<String>,
    pub credentials: bool,
    /// Headers allowed on preflight, also echoed on GET responses when set
    pub allowed_headers: Vec<String>,
    pub methods: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            origins: vec!["*".to_string()],
            credentials: true,
            allowed_headers: Vec::new(),
            methods: ["GET", "HEAD", "PUT", "PATCH", "POST", "DELETE"]
                .iter()
                .map(|method| method.to_string())
                .collect(),
        }
    }
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.origins.is_empty() || self.origins.iter().any(|origin| origin == "*")
    }
}

impl ServerConfig {
    /// Configuration serving `fixtures_dir` with every other field defaulted.
    pub fn new<P: Into<PathBuf>>(fixtures_dir: P) -> Self {
        Self {
            fixtures_dir: fixtures_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    pub fn with_cors(mut self, cors: CorsConfig) -> Self {
        self.cors = cors;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file is missing or
    /// its JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Apply `MOCK_FIXTURE_ADDR` and `MOCK_FIXTURE_ROOT` from the process
    /// environment.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ADDR_ENV) {
            match raw.parse::<SocketAddr>() {
                Ok(addr) => {
                    self.host = addr.ip();
                    self.port = addr.port();
                }
                Err(err) => {
                    log::warn!("[Config] Ignoring {}={:?}: {}", ADDR_ENV, raw, err);
                }
            }
        }

        if let Some(root) = lookup(ROOT_ENV) {
            self.fixtures_dir = PathBuf::from(root);
        }

        self
    }
}
