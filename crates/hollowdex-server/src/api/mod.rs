// ABOUTME: API module containing the HTTP handlers for the hollowdex REST API.
// ABOUTME: Shared helpers build the `{ success, ... }` response envelope every endpoint returns.

pub mod catalog;
pub mod dual_storage;
pub mod storage;

use std::sync::Arc;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hollowdex_core::{Collection, ValidationError};
use hollowdex_store::{CatalogError, CollectionReport, StagingError};
use serde_json::{Map, Value, json};

use crate::app_state::{AppState, SharedState};

/// Build a `{ success, ...payload }` response. Fields of an object payload
/// are merged into the envelope.
pub(crate) fn envelope(status: StatusCode, success: bool, payload: Value) -> Response {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(success));
    if let Value::Object(fields) = payload {
        body.extend(fields);
    }
    (status, Json(Value::Object(body))).into_response()
}

pub(crate) fn ok(payload: Value) -> Response {
    envelope(StatusCode::OK, true, payload)
}

pub(crate) fn fail(status: StatusCode, message: impl Into<String>) -> Response {
    envelope(status, false, json!({ "message": message.into() }))
}

/// Parse a collection path segment, or build the 400 listing valid names.
pub(crate) fn parse_collection(raw: &str) -> Result<Collection, Response> {
    raw.parse::<Collection>().map_err(|e| {
        envelope(
            StatusCode::BAD_REQUEST,
            false,
            json!({
                "message": e.to_string(),
                "validCollections": Collection::names(),
            }),
        )
    })
}

pub(crate) fn validation_failure(err: &ValidationError) -> Response {
    envelope(
        StatusCode::BAD_REQUEST,
        false,
        json!({ "message": err.to_string(), "errors": err.messages() }),
    )
}

pub(crate) fn staging_failure(context: &str, err: &StagingError) -> Response {
    match err {
        StagingError::Validation(v) => validation_failure(v),
        other => internal_failure(context, other),
    }
}

/// Log an I/O-side failure and return it as a 500.
pub(crate) fn internal_failure(context: &str, err: &dyn std::fmt::Display) -> Response {
    tracing::error!("{}: {}", context, err);
    fail(StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {err}"))
}

pub(crate) fn catalog_failure(context: &str, err: &CatalogError) -> Response {
    match err {
        CatalogError::UnknownLookupKind(_)
        | CatalogError::UnknownLookup { .. }
        | CatalogError::MissingField(_) => fail(StatusCode::BAD_REQUEST, err.to_string()),
        CatalogError::DuplicateLookup { .. } => fail(StatusCode::CONFLICT, err.to_string()),
        CatalogError::Sqlite(_) | CatalogError::Mirror(_) => internal_failure(context, err),
    }
}

/// Run a staging call on the blocking pool. Staging holds per-collection
/// `std::sync` locks across file I/O, which must not park an async worker.
pub(crate) async fn blocking<T, F>(state: &SharedState, call: F) -> Result<T, Response>
where
    F: FnOnce(&AppState) -> T + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || call(&state))
        .await
        .map_err(|e| internal_failure("staging task failed", &e))
}

/// Respond with a per-collection report. A report with any failed
/// collection is a 207 with `success: false` so callers cannot mistake a
/// finished call for a complete one.
pub(crate) fn report_response(message: &str, key: &str, report: &CollectionReport) -> Response {
    report_response_with(message, key, report, Map::new())
}

/// `report_response` plus extra top-level fields.
pub(crate) fn report_response_with(
    message: &str,
    key: &str,
    report: &CollectionReport,
    mut payload: Map<String, Value>,
) -> Response {
    let complete = report.is_complete();
    let status = if complete {
        StatusCode::OK
    } else {
        StatusCode::MULTI_STATUS
    };

    let message = if complete {
        message.to_string()
    } else {
        let failed: Vec<&str> = report.failures().iter().map(|c| c.as_str()).collect();
        format!("{message} with failures: {}", failed.join(", "))
    };
    payload.insert("message".to_string(), Value::String(message));
    payload.insert(key.to_string(), json!(report));

    envelope(status, complete, Value::Object(payload))
}
