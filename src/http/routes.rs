use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::header::{HeaderName, ACCESS_CONTROL_ALLOW_HEADERS, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::body::TEXT_CONTENT_TYPE;
use crate::config::CorsConfig;
use crate::pipeline::{PipelineOutcome, ResponsePipeline};

/// Shared state for the catch-all fixture handler.
#[derive(Clone)]
pub struct MockHttpState {
    pipeline: Arc<ResponsePipeline>,
    echo_headers: Option<HeaderValue>,
}

impl MockHttpState {
    pub fn new(pipeline: ResponsePipeline, cors: &CorsConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            echo_headers: echo_headers(cors),
        }
    }

    pub fn pipeline(&self) -> &ResponsePipeline {
        &self.pipeline
    }
}

/// Build the Axum router: every method and path goes to [`serve_fixture`].
pub fn build_router(state: MockHttpState, cors: &CorsConfig) -> Router {
    Router::new()
        .fallback(serve_fixture)
        .with_state(state)
        .layer(cors_layer(cors))
        .layer(TraceLayer::new_for_http())
}

/// Serve `router` on `listener` until `shutdown` fires or its sender drops.
pub async fn run_http_server(
    listener: TcpListener,
    router: Router,
    shutdown: oneshot::Receiver<()>,
) -> anyhow::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.await;
        })
        .await
        .context("serving mock fixture router")?;
    Ok(())
}

pub async fn serve_fixture(
    State(state): State<MockHttpState>,
    method: Method,
    uri: Uri,
) -> Response {
    let path = uri.path().to_string();
    let pipeline = Arc::clone(&state.pipeline);

    // A panicking observer must not take the connection down with it.
    let outcome = match tokio::spawn(async move { pipeline.respond(&path).await }).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!("[Http] Pipeline task for {} failed: {}", uri.path(), err);
            PipelineOutcome::unknown_error()
        }
    };

    let mut response = into_http_response(outcome);
    if method == Method::GET {
        if let Some(value) = &state.echo_headers {
            response
                .headers_mut()
                .insert(ACCESS_CONTROL_ALLOW_HEADERS, value.clone());
        }
    }
    response
}

fn into_http_response(outcome: PipelineOutcome) -> Response {
    let content_type = HeaderValue::from_str(&outcome.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(TEXT_CONTENT_TYPE));
    (
        outcome.status,
        [(CONTENT_TYPE, content_type)],
        outcome.body.render(),
    )
        .into_response()
}

/// Translate [`CorsConfig`] into a tower-http layer.
///
/// `*` together with credentials is not a legal CORS answer, so the request
/// origin is mirrored instead. An empty header list mirrors whatever the
/// preflight asks for.
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origin = if cors.allows_any_origin() {
        if cors.credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        }
    } else {
        AllowOrigin::list(
            cors.origins
                .iter()
                .filter_map(|origin| parse_or_warn(origin, "origin", HeaderValue::from_str)),
        )
    };

    let headers = if cors.allowed_headers.is_empty() {
        AllowHeaders::mirror_request()
    } else {
        AllowHeaders::list(cors.allowed_headers.iter().filter_map(|name| {
            parse_or_warn(name, "header", |raw| HeaderName::from_bytes(raw.as_bytes()))
        }))
    };

    let methods = AllowMethods::list(cors.methods.iter().filter_map(|method| {
        parse_or_warn(method, "method", |raw| {
            Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        })
    }));

    CorsLayer::new()
        .allow_origin(origin)
        .allow_headers(headers)
        .allow_methods(methods)
        .allow_credentials(cors.credentials)
}

fn echo_headers(cors: &CorsConfig) -> Option<HeaderValue> {
    if cors.allowed_headers.is_empty() {
        return None;
    }
    parse_or_warn(
        &cors.allowed_headers.join(","),
        "allowed headers",
        HeaderValue::from_str,
    )
}

fn parse_or_warn<T, E: std::fmt::Display>(
    raw: &str,
    what: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Option<T> {
    match parse(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("[Http] Ignoring CORS {} {:?}: {}", what, raw, err);
            None
        }
    }
}
