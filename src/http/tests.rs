use super::*;
use crate::config::CorsConfig;
use axum::body::{to_bytes, Body};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD,
    CONTENT_TYPE, ORIGIN,
};
use axum::http::{Method, Request};
use axum::response::Response;
use serde_json::{json, Value};
use std::path::PathBuf;
use tower::ServiceExt;

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn make_server() -> MockServer {
    MockServer::new(ServerConfig::new(fixtures_dir()))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("GET request")
}

async fn response_text(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    (status, String::from_utf8(bytes.to_vec()).expect("UTF-8 body"))
}

async fn response_json(response: Response) -> (StatusCode, Value) {
    let (status, text) = response_text(response).await;
    let json = serde_json::from_str::<Value>(&text).expect("JSON body");
    (status, json)
}

#[tokio::test]
async fn serves_fixture_with_json_suffix_fallback() {
    let response = make_server()
        .router()
        .oneshot(get("/users"))
        .await
        .expect("users call");

    assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
    let (status, text) = response_text(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, r#"{"id":1,"name":"a"}"#);
}

#[tokio::test]
async fn exact_file_wins_over_suffix() {
    let response = make_server()
        .router()
        .oneshot(get("/users.json"))
        .await
        .expect("users.json call");
    let (status, json) = response_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"id": 1, "name": "a"}));
}

#[tokio::test]
async fn nested_paths_map_onto_subdirectories() {
    let server = make_server();
    server
        .respond_to("/nested/profile")
        .and_replace("/settings/theme", "dark");

    let (status, json) = response_json(
        server
            .router()
            .oneshot(get("/nested/profile"))
            .await
            .expect("profile call"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["settings"]["theme"], "dark");
    assert_eq!(json["user"]["id"], 7);
}

#[tokio::test]
async fn unknown_path_is_404() {
    let (status, _) = response_text(
        make_server()
            .router()
            .oneshot(get("/does/not/exist"))
            .await
            .expect("missing call"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn traversal_outside_root_is_404() {
    let (status, _) = response_text(
        make_server()
            .router()
            .oneshot(get("/nested/../../Cargo.toml"))
            .await
            .expect("traversal call"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_fixture_is_500_with_details() {
    let (status, json) = response_json(
        make_server()
            .router()
            .oneshot(get("/broken"))
            .await
            .expect("broken call"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["url"], "/broken");
    assert!(json["file"].as_str().unwrap().ends_with("broken.json"));
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn every_method_is_served() {
    let server = make_server();
    for method in [Method::POST, Method::PUT, Method::DELETE, Method::PATCH] {
        let request = Request::builder()
            .method(method.clone())
            .uri("/users")
            .body(Body::from("ignored"))
            .expect("request");
        let (status, json) =
            response_json(server.router().oneshot(request).await.expect("call")).await;
        assert_eq!(status, StatusCode::OK, "{method} /users");
        assert_eq!(json["id"], 1);
    }
}

#[tokio::test]
async fn query_string_does_not_affect_matching() {
    let server = make_server();
    server.respond_to("/users").with_status(503);

    let (status, _) = response_text(
        server
            .router()
            .oneshot(get("/users?page=2"))
            .await
            .expect("query call"),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn text_fixture_keeps_its_content_type() {
    let response = make_server()
        .router()
        .oneshot(get("/page.html"))
        .await
        .expect("page call");
    assert_eq!(response.headers()[CONTENT_TYPE], "text/html");
    let (status, text) = response_text(response).await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("<h1>Mock fixture</h1>"));
}

#[tokio::test]
async fn panicking_observer_yields_unknown_error() {
    let server = make_server();
    server.on_response(|_, _| panic!("observer blew up"));

    let (status, text) = response_text(
        server
            .router()
            .oneshot(get("/users"))
            .await
            .expect("users call"),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(text, crate::error::UNKNOWN_ERROR);
}

#[tokio::test]
async fn default_cors_mirrors_origin_with_credentials() {
    let request = Request::builder()
        .uri("/users")
        .header(ORIGIN, "http://app.test")
        .body(Body::empty())
        .expect("request");
    let response = make_server()
        .router()
        .oneshot(request)
        .await
        .expect("cors call");

    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://app.test"
    );
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).is_none());
}

#[tokio::test]
async fn preflight_mirrors_requested_headers() {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/users")
        .header(ORIGIN, "http://app.test")
        .header(ACCESS_CONTROL_REQUEST_METHOD, "PATCH")
        .header(ACCESS_CONTROL_REQUEST_HEADERS, "x-trace-id")
        .body(Body::empty())
        .expect("preflight request");
    let response = make_server()
        .router()
        .oneshot(request)
        .await
        .expect("preflight call");

    assert!(response.status().is_success());
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_HEADERS], "x-trace-id");
    let methods = response.headers()[ACCESS_CONTROL_ALLOW_METHODS]
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("PATCH"), "{methods}");
}

#[tokio::test]
async fn configured_headers_are_echoed_on_get() {
    let cors = CorsConfig {
        origins: vec!["http://app.test".to_string()],
        credentials: false,
        allowed_headers: vec!["x-api-key".to_string(), "content-type".to_string()],
        ..CorsConfig::default()
    };
    let server = MockServer::new(ServerConfig::new(fixtures_dir()).with_cors(cors));

    let request = Request::builder()
        .uri("/users")
        .header(ORIGIN, "http://app.test")
        .body(Body::empty())
        .expect("request");
    let response = server.router().oneshot(request).await.expect("get call");
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://app.test"
    );
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_HEADERS],
        "x-api-key,content-type"
    );

    let post = Request::builder()
        .method(Method::POST)
        .uri("/users")
        .body(Body::empty())
        .expect("request");
    let response = server.router().oneshot(post).await.expect("post call");
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_HEADERS).is_none());
}

#[tokio::test]
async fn unlisted_origin_gets_no_cors_headers() {
    let cors = CorsConfig {
        origins: vec!["http://app.test".to_string()],
        ..CorsConfig::default()
    };
    let server = MockServer::new(ServerConfig::new(fixtures_dir()).with_cors(cors));
    let request = Request::builder()
        .uri("/users")
        .header(ORIGIN, "http://evil.test")
        .body(Body::empty())
        .expect("request");

    let response = server.router().oneshot(request).await.expect("call");
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
}
