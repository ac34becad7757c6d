// ABOUTME: End-to-end smoke test for the full draft/publish lifecycle over HTTP.
// ABOUTME: Seeds one collection, edits it in an admin session, publishes, and tears the session down.

use std::sync::Arc;

use axum::body::Body;
use hollowdex_core::{Collection, Item, SeedData, Side};
use hollowdex_server::{AppState, HollowdexConfig, create_router};
use hollowdex_store::{Catalog, StagingManager, StagingOptions};
use http::Request;
use serde_json::{Value, json};
use tower::ServiceExt;

/// Helper to create a test AppState whose seed holds a single agent.
fn test_app_state(home: std::path::PathBuf) -> Arc<AppState> {
    let mut seed = SeedData::default();
    seed.collections
        .insert(Collection::Agents, vec![Item::new(1, "A")]);

    let staging = StagingManager::open(
        home.clone(),
        StagingOptions {
            backup_retain: None,
            seed,
        },
    )
    .unwrap();
    let catalog = Catalog::open_in_memory().unwrap();

    Arc::new(AppState::new(staging, catalog, HollowdexConfig::with_home(home)))
}

/// Helper to send a request and extract the status and JSON body.
async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (u16, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&b).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status().as_u16();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

/// Backups of the agents collection with the given tag.
async fn agent_backups(app: &axum::Router, tag: &str) -> usize {
    let (_, body) = send(app, "GET", "/api/dual-storage/backups", None).await;
    body["backups"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|b| b["collection"] == "agents" && b["tag"] == tag)
        .count()
}

#[tokio::test]
async fn smoke_test_full_lifecycle() {
    let dir = tempfile::TempDir::new().unwrap();
    let home = dir.path().join("storage");
    let state = test_app_state(home.clone());
    let app = create_router(Arc::clone(&state));

    // 1. Bring-up seeds the published side.
    let (status, body) = send(&app, "POST", "/api/dual-storage/initialize", None).await;
    assert_eq!(status, 200, "initialize failed: {body}");
    let (_, body) = send(&app, "GET", "/api/storage/agents", None).await;
    assert_eq!(body["data"], json!([{ "id": 1, "name": "A" }]));

    // 2. Opening a session copies published into the draft.
    let (status, _) = send(&app, "POST", "/api/dual-storage/admin/session", None).await;
    assert_eq!(status, 200);
    let (_, body) = send(&app, "GET", "/api/dual-storage/admin/data", None).await;
    assert_eq!(body["data"]["agents"], json!([{ "id": 1, "name": "A" }]));

    let draft_path = home.join("admin").join("agents.json");
    let draft: Value = serde_json::from_slice(&std::fs::read(&draft_path).unwrap()).unwrap();
    assert_eq!(draft["source"], "admin");
    assert!(draft["sessionStarted"].is_string());

    // 3. Saving the draft backs up the previous draft.
    let (status, body) = send(
        &app,
        "PUT",
        "/api/dual-storage/admin/agents",
        Some(json!({ "data": [{ "id": 1, "name": "A" }, { "id": 2, "name": "B" }] })),
    )
    .await;
    assert_eq!(status, 200, "save failed: {body}");
    assert_eq!(body["count"], 2);
    assert_eq!(agent_backups(&app, "admin").await, 1);

    // 4. Sync publishes the draft.
    let (status, body) = send(&app, "POST", "/api/dual-storage/sync", None).await;
    assert_eq!(status, 200, "sync failed: {body}");
    assert_eq!(body["syncResults"]["agents"]["success"], true);

    let published = state.staging.document(Side::Web, Collection::Agents).unwrap().unwrap();
    assert_eq!(published.data.len(), 2);
    assert_eq!(published.count, 2);
    assert_eq!(published.source, Side::Web);
    assert!(published.last_sync_from_admin.is_some());
    assert_eq!(agent_backups(&app, "web").await, 1);

    // 5. Cleanup removes the draft and keeps its final state as a backup.
    let (status, _) = send(&app, "DELETE", "/api/dual-storage/admin/session", None).await;
    assert_eq!(status, 200);
    assert!(!draft_path.exists());
    assert_eq!(agent_backups(&app, "admin_cleanup").await, 1);

    let (_, body) = send(&app, "GET", "/api/dual-storage/status", None).await;
    assert_eq!(body["status"]["initialized"], true);
    assert_eq!(body["status"]["sessionActive"], false);
    assert_eq!(body["status"]["web"]["agents"]["count"], 2);
}
