use axum::{http::StatusCode, Json};
use serde_json::Value;

use gridwatch_core::UnknownDataType;
use gridwatch_storage::StorageError;
use gridwatch_sync::SyncError;

/// Map subsystem failures onto HTTP status codes with a structured payload.
/// `expose_details` controls whether the full error text is included
/// (enabled outside production).
pub fn map_error(err: anyhow::Error, expose_details: bool) -> (StatusCode, Json<Value>) {
    let (status, message) = if let Some(e) = err.downcast_ref::<StorageError>() {
        match e {
            StorageError::SnapshotNotFound(_) | StorageError::NotFound(_) => {
                (StatusCode::NOT_FOUND, "snapshot not found")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "storage failure"),
        }
    } else if let Some(e) = err.downcast_ref::<SyncError>() {
        match e {
            SyncError::UpstreamFetch { .. } => (StatusCode::BAD_GATEWAY, "upstream fetch failed"),
            SyncError::MissingConfiguration(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "upstream not configured")
            }
            SyncError::Processor(_) => (StatusCode::BAD_GATEWAY, "upstream data malformed"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "sync failure"),
        }
    } else if err.downcast_ref::<UnknownDataType>().is_some() {
        (StatusCode::BAD_REQUEST, "unknown data type")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "request failed")
    };

    let body = if expose_details {
        serde_json::json!({ "error": message, "details": err.to_string() })
    } else {
        serde_json::json!({ "error": message })
    };
    (status, Json(body))
}
