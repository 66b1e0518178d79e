//! `GET /image?url=` re-fetches a remote image with browser-like headers and
//! streams it back, so the design tool can load assets whose host rejects
//! cross-origin requests without a matching referer.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use cardfill_scraper::ScraperError;

use crate::middleware::RequestId;

use super::{ApiError, AppState};

const IMAGE_USAGE: &str = "/image?url=https://host/path.jpg";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub(super) struct ImageParams {
    url: Option<String>,
}

pub(super) async fn proxy_image(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ImageParams>,
) -> Result<Response, ApiError> {
    let url = params
        .url
        .as_deref()
        .and_then(|u| reqwest::Url::parse(u.trim()).ok())
        .filter(|u| matches!(u.scheme(), "http" | "https"))
        .map(String::from)
        .ok_or_else(|| {
            ApiError::bad_request("url must be an absolute http(s) URL").with_usage(IMAGE_USAGE)
        })?;

    let upstream = state
        .service
        .resolver()
        .directory()
        .fetch_image(&url)
        .await
        .map_err(|e| {
            tracing::warn!(request_id = %req_id.0, %url, error = %e, "image proxy failed");
            map_fetch_error(&e)
        })?;

    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    let status = upstream.status();

    Ok((
        status,
        [
            (header::CONTENT_TYPE, content_type),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("public, max-age=86400"),
            ),
        ],
        Body::from_stream(upstream.bytes_stream()),
    )
        .into_response())
}

fn map_fetch_error(error: &ScraperError) -> ApiError {
    match error {
        ScraperError::InvalidUrl { .. } => ApiError::bad_request(error.to_string()),
        ScraperError::UnexpectedStatus { status, .. } => {
            ApiError::upstream_status(*status, error.to_string())
        }
        _ => ApiError::new("image_fetch_failed", error.to_string()),
    }
}
