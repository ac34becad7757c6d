// ABOUTME: Route definitions for the hollowdex HTTP API.
// ABOUTME: Assembles all API routes into a single Axum Router with tracing, CORS, and body limits.

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post, put};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;

/// Build the complete Axum router with all routes and shared state.
pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    let body_limit = state.config.body_limit_bytes;

    let dual_storage = Router::new()
        .route("/initialize", post(api::dual_storage::initialize))
        .route(
            "/admin/session",
            post(api::dual_storage::start_session).delete(api::dual_storage::end_session),
        )
        .route("/admin/data", get(api::dual_storage::admin_data))
        .route("/web/data", get(api::dual_storage::web_data))
        .route("/admin/{collection}", put(api::dual_storage::save_draft))
        .route("/sync", post(api::dual_storage::sync))
        .route("/status", get(api::dual_storage::status))
        .route("/backups", get(api::dual_storage::backups));

    let storage = Router::new()
        .route("/data", get(api::storage::all_data))
        .route("/status", get(api::storage::status))
        .route("/reset", post(api::storage::reset))
        .route("/batch/update", put(api::storage::batch_update))
        .route(
            "/{collection}",
            get(api::storage::get_collection).put(api::storage::put_collection),
        );

    let api = Router::new()
        .route("/health", get(health))
        .route("/data", get(api::catalog::all_data))
        .route("/base-data", get(api::catalog::base_data))
        .route(
            "/lookups/{kind}",
            get(api::catalog::list_lookups).post(api::catalog::add_lookup),
        )
        .route("/entities/{collection}", post(api::catalog::create_entity))
        .route(
            "/entities/{collection}/{id}",
            put(api::catalog::update_entity).delete(api::catalog::delete_entity),
        )
        .nest("/dual-storage", dual_storage)
        .nest("/storage", storage);

    Router::new()
        .nest("/api", api)
        .with_state(state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Health check handler. Reports catalog connectivity alongside the status.
async fn health(State(state): State<SharedState>) -> axum::Json<serde_json::Value> {
    let database = state.catalog.lock().await.ping();
    axum::Json(serde_json::json!({
        "status": if database { "ok" } else { "degraded" },
        "database": if database { "connected" } else { "disconnected" },
        "timestamp": chrono::Utc::now(),
    }))
}
