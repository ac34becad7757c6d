// ABOUTME: Catalog API handlers for entity CRUD and lookup tables backed by SQLite.
// ABOUTME: Every entity mutation is mirrored into the published store so the cache tracks the database.

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use hollowdex_core::Collection;
use hollowdex_store::{Catalog, CatalogError, LookupKind};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{catalog_failure, envelope, fail, ok, parse_collection};
use crate::app_state::SharedState;

/// Request body for adding a lookup name.
#[derive(Debug, Deserialize)]
pub struct AddLookupRequest {
    pub name: String,
}

fn parse_kind(raw: &str) -> Result<LookupKind, Response> {
    raw.parse::<LookupKind>().map_err(|e| {
        envelope(
            StatusCode::BAD_REQUEST,
            false,
            json!({
                "message": e.to_string(),
                "validKinds": LookupKind::ALL.iter().map(|k| k.as_str()).collect::<Vec<_>>(),
            }),
        )
    })
}

fn object_body(body: Value) -> Result<Map<String, Value>, Response> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(fail(StatusCode::BAD_REQUEST, "body must be a JSON object")),
    }
}

/// Re-derive the published store for `collection`. The catalog mutation has
/// already committed, so a failure here is reported but not fatal.
fn mirror(state: &SharedState, catalog: &Catalog, collection: Collection) -> bool {
    match catalog.mirror_to(&state.staging, collection) {
        Ok(doc) => {
            tracing::debug!("mirrored {} ({} items) to published", collection, doc.count);
            true
        }
        Err(e) => {
            tracing::error!("failed to mirror {} to published: {}", collection, e);
            false
        }
    }
}

fn all_lookups(catalog: &Catalog) -> Result<BTreeMap<LookupKind, Value>, CatalogError> {
    let mut lookups = BTreeMap::new();
    for kind in LookupKind::ALL {
        lookups.insert(kind, json!(catalog.list_lookups(kind)?));
    }
    Ok(lookups)
}

/// GET /api/data - Every collection from the catalog, plus all lookups.
pub async fn all_data(State(state): State<SharedState>) -> impl IntoResponse {
    let catalog = state.catalog.lock().await;

    let mut data = BTreeMap::new();
    for collection in Collection::ALL {
        match catalog.list_all(collection) {
            Ok(items) => {
                data.insert(collection, items);
            }
            Err(e) => return catalog_failure(&format!("failed to list {collection}"), &e),
        }
    }

    match all_lookups(&catalog) {
        Ok(lookups) => ok(json!({ "data": data, "lookups": lookups })),
        Err(e) => catalog_failure("failed to list lookups", &e),
    }
}

/// GET /api/base-data - Factions, roles, and rarities for the entity forms.
pub async fn base_data(State(state): State<SharedState>) -> impl IntoResponse {
    let catalog = state.catalog.lock().await;

    let lists = [
        ("factions", LookupKind::Faction),
        ("roles", LookupKind::Role),
        ("rarities", LookupKind::Rarity),
    ];
    let mut payload = Map::new();
    for (key, kind) in lists {
        match catalog.list_lookups(kind) {
            Ok(rows) => {
                payload.insert(key.to_string(), json!(rows));
            }
            Err(e) => return catalog_failure("failed to load base data", &e),
        }
    }

    ok(Value::Object(payload))
}

/// GET /api/lookups/{kind} - All names of one lookup table.
pub async fn list_lookups(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
) -> impl IntoResponse {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match state.catalog.lock().await.list_lookups(kind) {
        Ok(rows) => ok(json!({ "kind": kind, "data": rows })),
        Err(e) => catalog_failure(&format!("failed to list {kind}"), &e),
    }
}

/// POST /api/lookups/{kind} - Add a name to one lookup table.
pub async fn add_lookup(
    State(state): State<SharedState>,
    Path(kind): Path<String>,
    Json(req): Json<AddLookupRequest>,
) -> impl IntoResponse {
    let kind = match parse_kind(&kind) {
        Ok(k) => k,
        Err(resp) => return resp,
    };

    match state.catalog.lock().await.add_lookup(kind, &req.name) {
        Ok(lookup) => envelope(StatusCode::CREATED, true, json!({ "kind": kind, "lookup": lookup })),
        Err(e) => catalog_failure(&format!("failed to add {kind}"), &e),
    }
}

/// POST /api/entities/{collection} - Create a row and refresh the published store.
pub async fn create_entity(
    State(state): State<SharedState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let fields = match object_body(body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let catalog = state.catalog.lock().await;
    match catalog.create(collection, &fields) {
        Ok(item) => {
            let mirrored = mirror(&state, &catalog, collection);
            envelope(
                StatusCode::CREATED,
                true,
                json!({ "item": item, "publishedRefreshed": mirrored }),
            )
        }
        Err(e) => catalog_failure(&format!("failed to create {collection}"), &e),
    }
}

/// PUT /api/entities/{collection}/{id} - Update a row and refresh the published store.
pub async fn update_entity(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, i64)>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(resp) => return resp,
    };
    let fields = match object_body(body) {
        Ok(f) => f,
        Err(resp) => return resp,
    };

    let catalog = state.catalog.lock().await;
    match catalog.update(collection, id, &fields) {
        Ok(Some(item)) => {
            let mirrored = mirror(&state, &catalog, collection);
            ok(json!({ "item": item, "publishedRefreshed": mirrored }))
        }
        Ok(None) => fail(StatusCode::NOT_FOUND, format!("{collection} #{id} not found")),
        Err(e) => catalog_failure(&format!("failed to update {collection} #{id}"), &e),
    }
}

/// DELETE /api/entities/{collection}/{id} - Delete a row and refresh the published store.
pub async fn delete_entity(
    State(state): State<SharedState>,
    Path((collection, id)): Path<(String, i64)>,
) -> impl IntoResponse {
    let collection = match parse_collection(&collection) {
        Ok(c) => c,
        Err(resp) => return resp,
    };

    let catalog = state.catalog.lock().await;
    match catalog.delete(collection, id) {
        Ok(true) => {
            let mirrored = mirror(&state, &catalog, collection);
            ok(json!({ "id": id, "publishedRefreshed": mirrored }))
        }
        Ok(false) => fail(StatusCode::NOT_FOUND, format!("{collection} #{id} not found")),
        Err(e) => catalog_failure(&format!("failed to delete {collection} #{id}"), &e),
    }
}
