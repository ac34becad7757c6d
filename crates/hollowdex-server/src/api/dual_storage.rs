// ABOUTME: Dual-storage API handlers driving the admin draft session and publishing.
// ABOUTME: Covers initialization, session start/end, draft saves, sync, status, and backup listing.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use hollowdex_core::Side;
use hollowdex_core::validate::parse_items;
use serde_json::{Value, json};

use super::{
    blocking, internal_failure, ok, parse_collection, report_response, staging_failure,
    validation_failure,
};
use crate::app_state::SharedState;

/// POST /api/dual-storage/initialize - Seed any missing published stores.
pub async fn initialize(State(state): State<SharedState>) -> impl IntoResponse {
    let report = match blocking(&state, |s| s.staging.initialize()).await {
        Ok(report) => report,
        Err(resp) => return resp,
    };
    report_response("dual storage initialized", "collections", &report)
}

/// POST /api/dual-storage/admin/session - Copy published data into drafts.
pub async fn start_session(State(state): State<SharedState>) -> impl IntoResponse {
    let report = match blocking(&state, |s| s.staging.initialize_admin_session()).await {
        Ok(report) => report,
        Err(resp) => return resp,
    };
    report_response("admin session initialized", "collections", &report)
}

/// DELETE /api/dual-storage/admin/session - Back up and delete every draft.
pub async fn end_session(State(state): State<SharedState>) -> impl IntoResponse {
    let report = match blocking(&state, |s| s.staging.cleanup_admin_session()).await {
        Ok(report) => report,
        Err(resp) => return resp,
    };
    report_response("admin session cleaned up", "collections", &report)
}

/// GET /api/dual-storage/admin/data - Every collection's draft items.
pub async fn admin_data(State(state): State<SharedState>) -> impl IntoResponse {
    ok(json!({ "data": state.staging.all_items(Side::Admin) }))
}

/// GET /api/dual-storage/web/data - Every collection's published items.
pub async fn web_data(State(state): State<SharedState>) -> impl IntoResponse {
    ok(json!({ "data": state.staging.all_items(Side::Web) }))
}

/// PUT /api/dual-storage/admin/{collection} - Replace one collection's draft.
/// Body: `{ "data": [ ...items ] }`.
pub async fn save_draft(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let items = match parse_items(body.get("data").unwrap_or(&Value::Null)) {
        Ok(items) => items,
        Err(e) => return validation_failure(&e),
    };

    let saved = match blocking(&state, move |s| s.staging.save_draft(collection, items)).await {
        Ok(saved) => saved,
        Err(resp) => return resp,
    };

    match saved {
        Ok(doc) => ok(json!({
            "message": format!("admin {collection} saved"),
            "collection": collection,
            "count": doc.count,
            "lastUpdated": doc.last_updated,
        })),
        Err(e) => staging_failure(&format!("failed to save admin {collection}"), &e),
    }
}

/// POST /api/dual-storage/sync - Publish every draft, reporting per collection.
pub async fn sync(State(state): State<SharedState>) -> impl IntoResponse {
    let report = match blocking(&state, |s| s.staging.sync_draft_to_published()).await {
        Ok(report) => report,
        Err(resp) => return resp,
    };
    report_response("drafts synced to published", "syncResults", &report)
}

/// GET /api/dual-storage/status - Per-side, per-collection file status.
pub async fn status(State(state): State<SharedState>) -> impl IntoResponse {
    ok(json!({ "status": state.staging.status() }))
}

/// GET /api/dual-storage/backups - Every backup snapshot, oldest first.
pub async fn backups(State(state): State<SharedState>) -> impl IntoResponse {
    match state.staging.backups() {
        Ok(entries) => ok(json!({ "count": entries.len(), "backups": entries })),
        Err(e) => internal_failure("failed to list backups", &e),
    }
}
