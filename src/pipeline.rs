//! Per-request response pipeline.
//!
//! `Resolving → Loading → Validating → Mutating → Responding`. Each of the
//! first four stages either hands its output to the next one or fails with
//! a [`FixtureError`]; the first failure short-circuits into a single
//! handler that turns it into a status and payload. Either way the session
//! observer sees exactly the status and body the client receives.

use std::path::Path;

use axum::http::StatusCode;
use new_mime_guess::MimeGuess;
use serde_json::Value;

use crate::body::{ResponseBody, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE};
use crate::error::{log_fixture_error, FixtureError, UNKNOWN_ERROR};
use crate::fixtures::{validate, FixtureCatalog};
use crate::session::Session;

/// Pipeline stages, for logs and failure reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Loading,
    Validating,
    Mutating,
    Responding,
    /// Absorbing state after any of the first four stages fails
    Failed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolving => "RESOLVE",
            Stage::Loading => "LOAD",
            Stage::Validating => "VALIDATE",
            Stage::Mutating => "MUTATE",
            Stage::Responding => "RESPOND",
            Stage::Failed => "FAILED",
        }
    }
}

/// Final status, body, and content type for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    pub status: StatusCode,
    pub body: ResponseBody,
    pub content_type: String,
}

impl PipelineOutcome {
    /// Outcome used when the pipeline itself could not finish, e.g. a
    /// panicking observer.
    pub fn unknown_error() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            body: ResponseBody::Text(UNKNOWN_ERROR.to_string()),
            content_type: TEXT_CONTENT_TYPE.to_string(),
        }
    }

    fn failure(err: &FixtureError) -> Self {
        let body = err.payload();
        let content_type = match body {
            ResponseBody::Json(_) => JSON_CONTENT_TYPE,
            ResponseBody::Text(_) => TEXT_CONTENT_TYPE,
        };
        Self {
            status: err.status(),
            body,
            content_type: content_type.to_string(),
        }
    }
}

type StageResult<T> = Result<T, (Stage, FixtureError)>;

fn at(stage: Stage) -> impl FnOnce(FixtureError) -> (Stage, FixtureError) {
    move |err| (stage, err)
}

#[derive(Debug, Clone)]
pub struct ResponsePipeline {
    catalog: FixtureCatalog,
    session: Session,
}

impl ResponsePipeline {
    pub fn new(catalog: FixtureCatalog, session: Session) -> Self {
        Self { catalog, session }
    }

    pub fn catalog(&self) -> &FixtureCatalog {
        &self.catalog
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Run every stage for `request_path` and notify the observer.
    pub async fn respond(&self, request_path: &str) -> PipelineOutcome {
        let outcome = match self.run(request_path).await {
            Ok(outcome) => outcome,
            Err((stage, err)) => {
                tracing::debug!(
                    "[Pipeline] {} {} at {}",
                    Stage::Failed.as_str(),
                    request_path,
                    stage.as_str()
                );
                log_fixture_error(&err, request_path);
                PipelineOutcome::failure(&err)
            }
        };

        tracing::debug!(
            "[Pipeline] {} {} {}",
            Stage::Responding.as_str(),
            request_path,
            outcome.status
        );
        self.session
            .notify(request_path, outcome.status, &outcome.body);
        outcome
    }

    async fn run(&self, request_path: &str) -> StageResult<PipelineOutcome> {
        let file = self
            .catalog
            .resolve(request_path)
            .await
            .map_err(at(Stage::Resolving))?;
        tracing::debug!(
            "[Pipeline] {} {} -> {}",
            Stage::Resolving.as_str(),
            request_path,
            file.display()
        );

        let raw = self
            .catalog
            .load(&file)
            .await
            .map_err(at(Stage::Loading))?;
        tracing::debug!(
            "[Pipeline] {} {} ({} bytes)",
            Stage::Loading.as_str(),
            request_path,
            raw.len()
        );

        let content = validate(&raw, request_path, &file).map_err(at(Stage::Validating))?;

        let (status, body) = self
            .mutate(content, request_path)
            .map_err(at(Stage::Mutating))?;
        tracing::debug!(
            "[Pipeline] {} {} -> {}",
            Stage::Mutating.as_str(),
            request_path,
            status
        );

        let content_type = match body {
            ResponseBody::Json(_) => JSON_CONTENT_TYPE.to_string(),
            ResponseBody::Text(_) => guess_content_type(&file),
        };

        Ok(PipelineOutcome {
            status,
            body,
            content_type,
        })
    }

    /// Decode the fixture, apply this path's patches, and pick the status.
    ///
    /// Content that does not parse as JSON is served verbatim, so it cannot
    /// be patched.
    fn mutate(
        &self,
        content: &str,
        request_path: &str,
    ) -> Result<(StatusCode, ResponseBody), FixtureError> {
        self.session.with_registry(|registry| {
            let body = match serde_json::from_str::<Value>(content) {
                Ok(document) => {
                    ResponseBody::Json(registry.apply_mutations(document, request_path)?)
                }
                Err(_) if registry.has_mutations_for(request_path) => {
                    return Err(FixtureError::InvalidMutation {
                        url: request_path.to_string(),
                        pointer: None,
                        reason: "fixture is not a JSON document".to_string(),
                    });
                }
                Err(_) => ResponseBody::Text(content.to_string()),
            };

            let code = registry.resolve_status(request_path);
            let status =
                StatusCode::from_u16(code).map_err(|_| FixtureError::InvalidMutation {
                    url: request_path.to_string(),
                    pointer: None,
                    reason: format!("{} is not a valid HTTP status", code),
                })?;

            Ok((status, body))
        })
    }
}

fn guess_content_type(file: &Path) -> String {
    MimeGuess::from_path(file)
        .first()
        .map(|mime| mime.to_string())
        .unwrap_or_else(|| TEXT_CONTENT_TYPE.to_string())
}
