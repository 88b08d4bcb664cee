use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use gridwatch_storage::{RetentionMonitor, SnapshotStore};
use gridwatch_sync::SyncCoordinator;

use crate::cron::{cleanup_handler, refresh_handler};
use crate::pins::{get_pins_handler, post_pins_handler, post_sync_handler};

pub struct AppState {
    pub coordinator: SyncCoordinator,
    pub snapshots: SnapshotStore,
    pub retention: Arc<RetentionMonitor>,
    pub default_limit: usize,
    pub expose_error_details: bool,
}

#[derive(serde::Serialize)]
struct HealthDto {
    status: &'static str,
}

pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/health", get(health))
        .route("/pins", get(get_pins_handler).post(post_pins_handler))
        .route("/sync", post(post_sync_handler))
        .route("/cron/cleanup", get(cleanup_handler))
        .route("/cron/refresh", get(refresh_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn health(State(_state): State<Arc<AppState>>) -> Json<HealthDto> {
    Json(HealthDto { status: "ok" })
}
