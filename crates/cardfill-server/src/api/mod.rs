mod image;
mod lookup;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use cardfill_core::{encode_component, AppConfig};
use cardfill_lookup::LiveLookupService;

use crate::middleware::{request_id, RequestId, REQUEST_ID_HEADER};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LiveLookupService>,
    pub config: Arc<AppConfig>,
    pub started_at: Instant,
}

impl AppState {
    #[must_use]
    pub fn new(service: Arc<LiveLookupService>, config: Arc<AppConfig>) -> Self {
        Self {
            service,
            config,
            started_at: Instant::now(),
        }
    }

    /// `{public_base}/image?url=<encoded>` for an upstream asset URL.
    pub(super) fn proxied_image_url(&self, url: &str) -> String {
        format!(
            "{}/image?url={}",
            self.config.public_base_url.trim_end_matches('/'),
            encode_component(url)
        )
    }
}

/// JSON error body; the HTTP status is derived from `error`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
    #[serde(skip)]
    upstream_status: Option<u16>,
}

impl ApiError {
    pub fn new(error: &'static str, message: impl Into<String>) -> Self {
        Self {
            error,
            message: message.into(),
            usage: None,
            merchant_name: None,
            upstream_status: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    #[must_use]
    pub fn with_usage(mut self, usage: &'static str) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn lookup_failed(message: impl Into<String>, merchant_name: impl Into<String>) -> Self {
        Self {
            merchant_name: Some(merchant_name.into()),
            ..Self::new("lookup_failed", message)
        }
    }

    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            upstream_status: Some(status),
            ..Self::new("upstream_status", message)
        }
    }

    fn status(&self) -> StatusCode {
        match self.error {
            "bad_request" => StatusCode::BAD_REQUEST,
            "upstream_status" => self
                .upstream_status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            "image_fetch_failed" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status(), Json(self)).into_response()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthData {
    ok: bool,
    cache_size: usize,
    in_flight: usize,
    uptime: f64,
}

#[derive(Debug, Serialize)]
struct ClearCacheData {
    ok: bool,
    cleared: usize,
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, REQUEST_ID_HEADER])
        .expose_headers([REQUEST_ID_HEADER])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route(
            "/lookup",
            get(lookup::lookup_one).post(lookup::lookup_batch),
        )
        .route("/image", get(image::proxy_image))
        .route("/health", get(health))
        .route("/clear-cache", post(clear_cache))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(build_cors()),
        )
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthData {
        ok: true,
        cache_size: state.service.cache_size().await,
        in_flight: state.service.in_flight().await,
        uptime: state.started_at.elapsed().as_secs_f64(),
    })
}

async fn clear_cache(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let cleared = state.service.clear_cache().await;
    tracing::debug!(request_id = %req_id.0, cleared, "clear-cache handled");
    Json(ClearCacheData { ok: true, cleared })
}

#[cfg(test)]
mod tests;
