use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{header as header_matcher, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cardfill_core::AppConfig;

use super::*;

fn mock_config(upstream: &str) -> AppConfig {
    AppConfig {
        use_mock: true,
        debug: false,
        bind_addr: "127.0.0.1:0".parse().expect("addr"),
        log_level: "info".to_string(),
        public_base_url: "http://localhost:8787/".to_string(),
        api_base_url: format!("{upstream}/api"),
        site_base_url: upstream.to_string(),
        request_timeout_secs: 5,
        user_agent: "cardfill-test/0.1".to_string(),
        cache_ttl_secs: 60,
        chrome_path: None,
        headless: true,
        max_pages: 1,
        batch_concurrency: 2,
    }
}

fn test_app(upstream: &str) -> Router {
    let config = mock_config(upstream);
    let (service, _session) =
        cardfill_lookup::build_live_service(&config).expect("build mock service");
    build_app(AppState::new(Arc::new(service), Arc::new(config)))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.expect("response")
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn json_body(response: Response) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    serde_json::from_slice(&body).expect("json parse")
}

// -------------------------------------------------------------------------
// Errors
// -------------------------------------------------------------------------

#[test]
fn api_error_status_follows_code() {
    let cases = [
        (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
        (ApiError::lookup_failed("x", "Nike"), StatusCode::INTERNAL_SERVER_ERROR),
        (ApiError::upstream_status(404, "x"), StatusCode::NOT_FOUND),
        (ApiError::new("image_fetch_failed", "x"), StatusCode::BAD_GATEWAY),
    ];
    for (error, expected) in cases {
        assert_eq!(error.into_response().status(), expected);
    }
}

#[test]
fn lookup_failed_body_names_the_merchant() {
    let json = serde_json::to_value(ApiError::lookup_failed("browser gone", "Nike")).unwrap();
    assert_eq!(
        json,
        json!({"error": "lookup_failed", "message": "browser gone", "merchantName": "Nike"})
    );
}

// -------------------------------------------------------------------------
// Lookup
// -------------------------------------------------------------------------

#[tokio::test]
async fn lookup_without_name_is_bad_request() {
    let app = test_app("http://127.0.0.1:9");

    for uri in ["/lookup", "/lookup?name=", "/lookup?name=%20%20"] {
        let response = send(&app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        let json = json_body(response).await;
        assert_eq!(json["error"], "bad_request");
        assert_eq!(json["message"], "Missing name query param");
        assert_eq!(json["usage"], "/lookup?name=MerchantName");
    }
}

#[tokio::test]
async fn mock_lookup_returns_placeholder_record() {
    let app = test_app("http://127.0.0.1:9");

    let response = send(&app, get("/lookup?name=Nike")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    let json = json_body(response).await;
    assert_eq!(json["name"], "Nike");
    assert!(json["logoUrl"].as_str().unwrap().contains("Nike+logo"));
    assert!(json["heroUrl"].as_str().unwrap().contains("Nike+hero"));
    assert_eq!(json["merchantAri"], "MOCK123");
}

#[tokio::test]
async fn batch_lookup_keeps_order_and_reports_bad_items() {
    let app = test_app("http://127.0.0.1:9");

    let response = send(
        &app,
        post_json("/lookup", &json!({"queries": ["Nike", "  ", 42, "Casper"]})),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let results = json["results"].as_array().expect("results array");
    assert_eq!(results.len(), 4);

    assert_eq!(results[0]["query"], "Nike");
    assert_eq!(results[0]["merchantAri"], "MOCK123");
    assert!(results[0].get("error").is_none());
    assert_eq!(
        results[0]["proxiedLogoUrl"],
        "http://localhost:8787/image?url=https%3A%2F%2Fvia.placeholder.com%2F128%3Ftext%3DNike%2Blogo"
    );

    assert_eq!(results[1]["query"], "  ");
    assert_eq!(results[1]["error"], "merchant name must not be empty");
    assert!(results[1]["proxiedHeroUrl"].is_null());

    assert_eq!(results[2]["query"], "42");
    assert_eq!(results[2]["error"], "query must be a string");

    assert_eq!(results[3]["name"], "Casper");
}

#[tokio::test]
async fn batch_lookup_rejects_non_array_queries() {
    let app = test_app("http://127.0.0.1:9");

    let response = send(&app, post_json("/lookup", &json!({"queries": "Nike"}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "bad_request");
    assert!(json["usage"].as_str().unwrap().starts_with("POST /lookup"));

    let response = send(&app, post_json("/lookup", &json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn batch_lookup_rejects_malformed_json() {
    let app = test_app("http://127.0.0.1:9");

    let request = Request::builder()
        .method("POST")
        .uri("/lookup")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = send(&app, request).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "bad_request");
}

// -------------------------------------------------------------------------
// Health and cache admin
// -------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_cache_counters() {
    let app = test_app("http://127.0.0.1:9");
    send(&app, get("/lookup?name=Nike")).await;

    let json = json_body(send(&app, get("/health")).await).await;

    assert_eq!(json["ok"], true);
    assert_eq!(json["cacheSize"], 1);
    assert_eq!(json["inFlight"], 0);
    assert!(json["uptime"].as_f64().unwrap() >= 0.0);
}

#[tokio::test]
async fn clear_cache_reports_and_drops_entries() {
    let app = test_app("http://127.0.0.1:9");
    for name in ["Nike", "nike", "Casper", "Wayfair"] {
        let response = send(&app, get(&format!("/lookup?name={name}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let clear = Request::builder()
        .method("POST")
        .uri("/clear-cache")
        .body(Body::empty())
        .expect("request");
    let json = json_body(send(&app, clear).await).await;
    assert_eq!(json, json!({"ok": true, "cleared": 3}));

    let health = json_body(send(&app, get("/health")).await).await;
    assert_eq!(health["cacheSize"], 0);
}

// -------------------------------------------------------------------------
// Image proxy
// -------------------------------------------------------------------------

#[tokio::test]
async fn image_proxy_rejects_missing_or_non_http_urls() {
    let app = test_app("http://127.0.0.1:9");

    for uri in [
        "/image",
        "/image?url=",
        "/image?url=ftp%3A%2F%2Fexample.com%2Fa.png",
        "/image?url=%2Frelative.png",
        "/image?url=javascript%3Aalert(1)",
    ] {
        let response = send(&app, get(uri)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[tokio::test]
async fn image_proxy_streams_upstream_bytes_with_referer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/m/nike/hero.png"))
        .and(header_matcher("referer", format!("{}/shopping", server.uri()).as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(vec![0x89, b'P', b'N', b'G']),
        )
        .expect(1)
        .mount(&server)
        .await;
    let app = test_app(&server.uri());

    let target = cardfill_core::encode_component(&format!("{}/m/nike/hero.png", server.uri()));
    let response = send(&app, get(&format!("/image?url={target}"))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/png");
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    assert_eq!(body.as_ref(), &[0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn image_proxy_accepts_uppercase_scheme() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/m/nike/hero.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8]),
        )
        .expect(1)
        .mount(&server)
        .await;
    let app = test_app(&server.uri());

    let shouted = format!("{}/m/nike/hero.jpg", server.uri()).replacen("http://", "HTTP://", 1);
    let target = cardfill_core::encode_component(&shouted);
    let response = send(&app, get(&format!("/image?url={target}"))).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");
}

#[tokio::test]
async fn image_proxy_propagates_upstream_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let app = test_app(&server.uri());

    let target = cardfill_core::encode_component(&format!("{}/missing.jpg", server.uri()));
    let response = send(&app, get(&format!("/image?url={target}"))).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["error"], "upstream_status");
}

#[tokio::test]
async fn image_proxy_network_failure_is_bad_gateway() {
    let app = test_app("http://127.0.0.1:9");

    // Port 9 (discard) is not expected to be listening.
    let response = send(&app, get("/image?url=http%3A%2F%2F127.0.0.1%3A9%2Fa.png")).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["error"], "image_fetch_failed");
}
