//! `GET /lookup?name=` for a single merchant and `POST /lookup` for batches.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Extension, Json,
};
use futures::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use cardfill_core::{LookupQuery, MerchantRecord};

use crate::middleware::RequestId;

use super::{ApiError, AppState};

const LOOKUP_USAGE: &str = "/lookup?name=MerchantName";
const BATCH_USAGE: &str = "POST /lookup {\"queries\": [\"MerchantName\"]}";

#[derive(Debug, Deserialize)]
pub(super) struct LookupParams {
    name: Option<String>,
}

pub(super) async fn lookup_one(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<LookupParams>,
) -> Result<Json<MerchantRecord>, ApiError> {
    let query = params
        .name
        .as_deref()
        .and_then(|raw| LookupQuery::parse(raw).ok())
        .ok_or_else(|| ApiError::bad_request("Missing name query param").with_usage(LOOKUP_USAGE))?;

    match state.service.lookup(&query).await {
        Ok(record) => Ok(Json(record)),
        Err(e) => {
            tracing::error!(request_id = %req_id.0, %query, error = %e, "lookup failed");
            Err(ApiError::lookup_failed(e.to_string(), query.as_str()))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BatchItem {
    query: String,
    #[serde(flatten)]
    record: MerchantRecord,
    proxied_logo_url: Option<String>,
    proxied_hero_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct BatchResponse {
    results: Vec<BatchItem>,
}

/// Resolves every entry of `{queries: [...]}` with bounded concurrency.
///
/// Results keep input order. A failed or malformed entry carries its own
/// `error` instead of failing the whole batch.
pub(super) async fn lookup_batch(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(body) =
        body.map_err(|e| ApiError::bad_request(e.body_text()).with_usage(BATCH_USAGE))?;
    let queries = body
        .get("queries")
        .and_then(Value::as_array)
        .cloned()
        .ok_or_else(|| {
            ApiError::bad_request("queries must be an array of merchant names")
                .with_usage(BATCH_USAGE)
        })?;

    tracing::info!(request_id = %req_id.0, count = queries.len(), "batch lookup");

    let concurrency = state.config.batch_concurrency.max(1);
    let state = &state;
    let results = stream::iter(queries)
        .map(move |raw| resolve_item(state, raw))
        .buffered(concurrency)
        .collect::<Vec<_>>()
        .await;

    let with_errors = results
        .iter()
        .filter(|item| item.record.error.is_some())
        .count();
    tracing::info!(request_id = %req_id.0, with_errors, "batch lookup complete");

    Ok(Json(BatchResponse { results }))
}

async fn resolve_item(state: &AppState, raw: Value) -> BatchItem {
    let text = match &raw {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let record = match raw.as_str().map(LookupQuery::parse) {
        Some(Ok(query)) => match state.service.lookup(&query).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(%query, error = %e, "batch item failed");
                failed_record(e.to_string())
            }
        },
        Some(Err(e)) => failed_record(e.to_string()),
        None => failed_record("query must be a string"),
    };

    BatchItem {
        proxied_logo_url: record.logo_url.as_deref().map(|u| state.proxied_image_url(u)),
        proxied_hero_url: record.hero_url.as_deref().map(|u| state.proxied_image_url(u)),
        query: text,
        record,
    }
}

fn failed_record(error: impl Into<String>) -> MerchantRecord {
    MerchantRecord {
        error: Some(error.into()),
        ..MerchantRecord::default()
    }
}
