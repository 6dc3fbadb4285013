//! HTTP handlers for telemetry ingestion.

use std::collections::BTreeMap;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
};
use binlevel_core::{BinId, IngestionService, validate_submission};
use serde::Serialize;
use serde_json::{Map, Value, value::RawValue};
use tracing::debug;

use crate::error::ApiError;

/// Message returned for accepted submissions.
pub const SAVED_MESSAGE: &str = "Distance and fill level saved.";

/// Body of a successful submission.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    /// Human-readable confirmation.
    pub message: &'static str,
    /// Bin the reading was stored for.
    pub bin_id: BinId,
    /// Computed fill level.
    pub fill_level_percentage: f64,
}

/// Handle POST /api/bin
///
/// Bodies that are not sent as `application/json`, or do not parse, are
/// validated like an empty object, so the client gets the full list of
/// expected fields back.
#[tracing::instrument(skip_all)]
pub async fn submit_telemetry(
    State(service): State<IngestionService>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ApiError> {
    let body = if is_json(&headers) {
        parse_body(&body)
    } else {
        Value::Null
    };
    let submission = validate_submission(&body)?;
    debug!(?submission, "Received submission");

    let ingested = service.ingest(submission).await?;

    Ok(Json(SubmitResponse {
        message: SAVED_MESSAGE,
        bin_id: ingested.bin_id,
        fill_level_percentage: ingested.fill_level_percentage,
    }))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

fn parse_body(body: &[u8]) -> Value {
    if let Ok(value) = serde_json::from_slice(body) {
        return value;
    }

    // A number outside the f64 range fails the whole document; keep every field that parses.
    serde_json::from_slice::<BTreeMap<String, Box<RawValue>>>(body).map_or(Value::Null, |fields| {
        let fields: Map<String, Value> = fields
            .into_iter()
            .map(|(name, raw)| (name, serde_json::from_str(raw.get()).unwrap_or(Value::Null)))
            .collect();
        Value::Object(fields)
    })
}

/// Handle GET /health
#[tracing::instrument]
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
