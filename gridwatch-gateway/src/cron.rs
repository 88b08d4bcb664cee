use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use gridwatch_core::DataType;
use gridwatch_storage::{CycleOutcome, StorageUsage};

use crate::app::AppState;
use crate::http::map_error;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub success: bool,
    pub before_cleanup: StorageUsage,
    pub after_cleanup: StorageUsage,
}

/// GET /cron/cleanup: run one retention cycle and report usage before/after.
pub async fn cleanup_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.retention.run_cycle().await {
        Ok(CycleOutcome::BelowThreshold(usage)) => Json(CleanupResponse {
            success: true,
            before_cleanup: usage,
            after_cleanup: usage,
        })
        .into_response(),
        Ok(CycleOutcome::Pruned { before, after, .. }) => Json(CleanupResponse {
            success: true,
            before_cleanup: before,
            after_cleanup: after,
        })
        .into_response(),
        Err(e) => map_error(e.into(), state.expose_error_details).into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResult {
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub success: bool,
    pub message: String,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<RefreshResult>,
    pub last_sync: DateTime<Utc>,
}

/// GET /cron/refresh: force a fresh sync of every data type. Per-type
/// failures are reported in the result list without aborting the sweep.
pub async fn refresh_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut results = Vec::with_capacity(DataType::ALL.len());
    for data_type in DataType::ALL {
        match state.coordinator.refresh(data_type).await {
            Ok(receipt) => {
                let message = if receipt.record_count == 0 {
                    "No updates since last sync".to_string()
                } else {
                    "Sync completed successfully".to_string()
                };
                results.push(RefreshResult {
                    data_type,
                    success: true,
                    message,
                    count: receipt.record_count,
                });
            }
            Err(e) => results.push(RefreshResult {
                data_type,
                success: false,
                message: e.to_string(),
                count: 0,
            }),
        }
    }

    let any_success = results.iter().any(|r| r.success);
    Json(RefreshResponse {
        success: any_success,
        message: if any_success {
            "Sync completed with results".to_string()
        } else {
            "All syncs failed".to_string()
        },
        results,
        last_sync: Utc::now(),
    })
}
