// ABOUTME: Legacy single-store API handlers operating directly on the published side.
// ABOUTME: Writes here apply per-collection schema checks and bypass the draft session.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use hollowdex_core::validate::{check_schema, parse_items};
use hollowdex_core::{Collection, Item, Side, ValidationError};
use serde_json::{Map, Value, json};

use super::{
    blocking, envelope, fail, internal_failure, ok, parse_collection, report_response,
    report_response_with, staging_failure, validation_failure,
};
use crate::app_state::SharedState;

/// Parse and schema-check one collection's payload.
fn validated_items(collection: Collection, payload: &Value) -> Result<Vec<Item>, ValidationError> {
    let items = parse_items(payload)?;
    check_schema(collection, &items)?;
    Ok(items)
}

/// GET /api/storage/data - Every collection's published items.
pub async fn all_data(State(state): State<SharedState>) -> impl IntoResponse {
    ok(json!({ "data": state.staging.all_items(Side::Web) }))
}

/// GET /api/storage/status - File status for both sides.
pub async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    ok(json!({ "status": state.staging.status() }))
}

/// POST /api/storage/reset - Back up everything, then restore seed data.
pub async fn reset(State(state): State<SharedState>) -> impl IntoResponse {
    let reset = match blocking(&state, |s| s.staging.reset_published()).await {
        Ok(reset) => reset,
        Err(resp) => return resp,
    };

    match reset {
        Ok(summary) => {
            let mut extra = Map::new();
            extra.insert(
                "backupDir".to_string(),
                Value::String(summary.backup_dir.display().to_string()),
            );
            report_response_with("published stores reset", "collections", &summary.collections, extra)
        }
        Err(e) => staging_failure("failed to reset published stores", &e),
    }
}

/// PUT /api/storage/batch/update - Replace several collections at once.
/// Body: `{ "data": { "<collection>": [ ...items ], ... } }`. Every entry is
/// validated before any collection is written.
pub async fn batch_update(
    State(state): State<SharedState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let Some(entries) = body.get("data").and_then(Value::as_object) else {
        return fail(StatusCode::BAD_REQUEST, "data must be an object keyed by collection");
    };

    let mut batch = BTreeMap::new();
    for (name, payload) in entries {
        let collection = match parse_collection(name) {
            Ok(c) => c,
            Err(resp) => return resp,
        };
        match validated_items(collection, payload) {
            Ok(items) => {
                batch.insert(collection, items);
            }
            Err(e) => {
                return envelope(
                    StatusCode::BAD_REQUEST,
                    false,
                    json!({
                        "message": format!("{collection} failed validation"),
                        "errors": e.messages(),
                    }),
                );
            }
        }
    }

    let applied = blocking(&state, move |s| s.staging.replace_published_batch(batch)).await;
    let applied = match applied {
        Ok(applied) => applied,
        Err(resp) => return resp,
    };

    match applied {
        Ok(report) => report_response("batch update applied", "results", &report),
        Err(e) => staging_failure("batch update failed", &e),
    }
}

/// GET /api/storage/{collection} - One collection's published items.
pub async fn get_collection(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
) -> impl IntoResponse {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    match state.staging.read(Side::Web, collection) {
        Ok(items) => ok(json!({
            "collection": collection,
            "count": items.len(),
            "data": items,
        })),
        Err(e) => internal_failure(&format!("failed to read {collection}"), &e),
    }
}

/// PUT /api/storage/{collection} - Replace one collection's published items.
/// Body: `{ "data": [ ...items ] }`.
pub async fn put_collection(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let items = match validated_items(collection, body.get("data").unwrap_or(&Value::Null)) {
        Ok(items) => items,
        Err(e) => return validation_failure(&e),
    };

    let replaced = blocking(&state, move |s| s.staging.replace_published(collection, items)).await;
    let replaced = match replaced {
        Ok(replaced) => replaced,
        Err(resp) => return resp,
    };

    match replaced {
        Ok(doc) => ok(json!({
            "message": format!("{collection} updated"),
            "collection": collection,
            "count": doc.count,
            "lastUpdated": doc.last_updated,
        })),
        Err(e) => staging_failure(&format!("failed to update {collection}"), &e),
    }
}
