//! Fixture resolution and loading.
//!
//! A request path maps onto the fixture tree by plain concatenation:
//! `/users/1` is served from `<root>/users/1`, or from `<root>/users/1.json`
//! when the exact file does not exist. Nothing is cached; every request
//! re-reads the file, so editing a fixture is visible on the next request.

use std::ffi::OsString;
use std::fs as std_fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;

use crate::error::{FixtureError, IoPhase};

pub mod validation;

pub use validation::{looks_like_json, validate};

/// Suffix tried when the exact request path is not a file.
pub const JSON_SUFFIX: &str = ".json";

/// A fixture found on disk together with the request path that serves it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixtureMetadata {
    pub request_path: String,
    pub file: PathBuf,
}

/// Catalog of fixture files under a single root directory.
#[derive(Clone, Debug)]
pub struct FixtureCatalog {
    root: PathBuf,
}

impl FixtureCatalog {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path onto a fixture file.
    ///
    /// Tries `<root><path>` then `<root><path>.json`. Paths with a `..`
    /// segment are refused before touching the filesystem.
    pub async fn resolve(&self, request_path: &str) -> Result<PathBuf, FixtureError> {
        if escapes_root(request_path) {
            log::warn!("[Fixtures] Refusing path outside fixture root: {}", request_path);
            return Err(FixtureError::not_found(request_path));
        }

        let exact = self.candidate(request_path, "");
        if matches!(fs::metadata(&exact).await, Ok(meta) if meta.is_file()) {
            return Ok(exact);
        }

        let fallback = self.candidate(request_path, JSON_SUFFIX);
        match fs::metadata(&fallback).await {
            Ok(meta) if meta.is_file() => Ok(fallback),
            Ok(_) => Err(FixtureError::not_found(request_path)),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(FixtureError::not_found(request_path))
            }
            Err(err) => Err(FixtureError::io(fallback, &err, IoPhase::Resolve)),
        }
    }

    /// Read the full content of a resolved fixture.
    ///
    /// Bytes that are not valid UTF-8 are replaced with U+FFFD; only a
    /// failed read is an error.
    pub async fn load(&self, file: &Path) -> Result<String, FixtureError> {
        let bytes = fs::read(file)
            .await
            .map_err(|err| FixtureError::io(file, &err, IoPhase::Read))?;
        match String::from_utf8(bytes) {
            Ok(content) => Ok(content),
            Err(err) => {
                log::debug!(
                    "[Fixtures] {} is not valid UTF-8, decoding lossily",
                    file.display()
                );
                Ok(String::from_utf8_lossy(err.as_bytes()).into_owned())
            }
        }
    }

    /// List every fixture file under the root, sorted by request path.
    pub fn discover(&self) -> Result<Vec<FixtureMetadata>> {
        let mut fixtures = Vec::new();
        if !self.root.exists() {
            return Ok(fixtures);
        }

        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let entries =
                std_fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))?;
            for entry in entries {
                let entry = entry?;
                let path = entry.path();
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(request_path) = self.request_path_for(&path) {
                        fixtures.push(FixtureMetadata {
                            request_path,
                            file: path,
                        });
                    }
                }
            }
        }

        fixtures.sort_by(|a, b| a.request_path.cmp(&b.request_path));
        Ok(fixtures)
    }

    // Plain concatenation, no normalization: `/users/` stays a directory probe.
    fn candidate(&self, request_path: &str, suffix: &str) -> PathBuf {
        let mut joined = OsString::from(self.root.as_os_str());
        joined.push(request_path);
        joined.push(suffix);
        PathBuf::from(joined)
    }

    fn request_path_for(&self, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(&self.root).ok()?;
        let segments = relative
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        let joined = format!("/{}", segments.join("/"));
        Some(
            joined
                .strip_suffix(JSON_SUFFIX)
                .map(str::to_string)
                .unwrap_or(joined),
        )
    }
}

fn escapes_root(request_path: &str) -> bool {
    request_path.split(['/', '\\']).any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as std_fs;

    fn catalog_with(files: &[(&str, &str)]) -> (tempfile::TempDir, FixtureCatalog) {
        let dir = tempfile::tempdir().expect("temp dir");
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                std_fs::create_dir_all(parent).unwrap();
            }
            std_fs::write(path, content).unwrap();
        }
        let catalog = FixtureCatalog::new(dir.path());
        (dir, catalog)
    }

    #[tokio::test]
    async fn resolves_exact_file_first() {
        let (dir, catalog) = catalog_with(&[("users", "exact"), ("users.json", "{}")]);
        let resolved = catalog.resolve("/users").await.unwrap();
        assert_eq!(resolved, dir.path().join("users"));
    }

    #[tokio::test]
    async fn falls_back_to_json_suffix() {
        let (dir, catalog) = catalog_with(&[("api/users.json", "{}")]);
        let resolved = catalog.resolve("/api/users").await.unwrap();
        assert_eq!(resolved, dir.path().join("api/users.json"));
    }

    #[tokio::test]
    async fn directories_are_not_fixtures() {
        let (_dir, catalog) = catalog_with(&[("api/users.json", "{}")]);
        let err = catalog.resolve("/api").await.unwrap_err();
        assert_eq!(err, FixtureError::not_found("/api"));
    }

    #[tokio::test]
    async fn missing_fixture_is_not_found() {
        let (_dir, catalog) = catalog_with(&[]);
        let err = catalog.resolve("/nope").await.unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn trailing_slash_is_not_normalized() {
        let (_dir, catalog) = catalog_with(&[("users.json", "{}")]);
        assert!(catalog.resolve("/users/").await.is_err());
    }

    #[tokio::test]
    async fn parent_segments_are_refused() {
        let (dir, _catalog) = catalog_with(&[("inner/users.json", "{}")]);
        std_fs::write(dir.path().join("secret.json"), "{}").unwrap();
        let inner = FixtureCatalog::new(dir.path().join("inner"));

        assert!(inner.resolve("/users").await.is_ok());
        let err = inner.resolve("/../secret").await.unwrap_err();
        assert_eq!(err, FixtureError::not_found("/../secret"));
    }

    #[tokio::test]
    async fn load_reads_fresh_content_every_time() {
        let (dir, catalog) = catalog_with(&[("users.json", r#"{"v":1}"#)]);
        let file = catalog.resolve("/users").await.unwrap();
        assert_eq!(catalog.load(&file).await.unwrap(), r#"{"v":1}"#);

        std_fs::write(dir.path().join("users.json"), r#"{"v":2}"#).unwrap();
        assert_eq!(catalog.load(&file).await.unwrap(), r#"{"v":2}"#);
    }

    #[tokio::test]
    async fn load_decodes_invalid_utf8_lossily() {
        let (dir, catalog) = catalog_with(&[]);
        let file = dir.path().join("latin1.html");
        std_fs::write(&file, b"<p>caf\xe9</p>").unwrap();

        assert_eq!(catalog.load(&file).await.unwrap(), "<p>caf\u{fffd}</p>");
    }

    #[tokio::test]
    async fn load_failure_is_read_io_error() {
        let (dir, catalog) = catalog_with(&[]);
        let err = catalog.load(&dir.path().join("gone.json")).await.unwrap_err();
        match err {
            FixtureError::Io { phase, .. } => assert_eq!(phase, IoPhase::Read),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn discover_lists_request_paths() {
        let (_dir, catalog) = catalog_with(&[
            ("users.json", "{}"),
            ("pages/index.html", "<html></html>"),
            ("api/v1/items.json", "[]"),
        ]);
        let paths = catalog
            .discover()
            .unwrap()
            .into_iter()
            .map(|meta| meta.request_path)
            .collect::<Vec<_>>();
        assert_eq!(paths, vec!["/api/v1/items", "/pages/index.html", "/users"]);
    }

    #[test]
    fn discover_missing_root_is_empty() {
        let catalog = FixtureCatalog::new("/definitely/not/a/fixture/root");
        assert!(catalog.discover().unwrap().is_empty());
    }
}
