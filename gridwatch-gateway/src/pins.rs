use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use gridwatch_core::{AccessLevel, DataType, PageResponse, ProcessedRecord, SnapshotRef};

use crate::app::AppState;
use crate::http::map_error;

#[derive(Debug, Deserialize)]
pub struct PinsQuery {
    #[serde(default)]
    pub fresh: Option<bool>,
    pub url: Option<String>,
    /// Data type to serve; defaults to the luminaire feed.
    #[serde(rename = "type")]
    pub data_type: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// GET /pins: serve one page of the latest (or a referenced) snapshot.
/// `fresh=true` forces a new sync; an absent `url` syncs if needed.
pub async fn get_pins_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PinsQuery>,
) -> impl IntoResponse {
    match serve_pins(&state, query).await {
        Ok(page) => Json(page).into_response(),
        Err(e) => map_error(e, state.expose_error_details).into_response(),
    }
}

async fn serve_pins(state: &AppState, query: PinsQuery) -> anyhow::Result<PageResponse> {
    let data_type: DataType = query
        .data_type
        .as_deref()
        .unwrap_or(DataType::Luminaire.as_str())
        .parse()?;
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(state.default_limit);
    let fresh = query.fresh.unwrap_or(false);

    let reference = match (&query.url, fresh) {
        (_, true) => state.coordinator.refresh(data_type).await?.reference,
        (None, false) => state.coordinator.sync_if_needed(data_type).await?.reference,
        (Some(url), false) => SnapshotRef::new(url.clone()),
    };

    let doc = state.snapshots.read(&reference).await?;
    let version = doc.last_updated;
    let total = doc.data.len();
    let data = slice_page(&doc.data, offset, limit).to_vec();
    Ok(PageResponse {
        version,
        url: reference,
        data,
        total,
        offset,
        limit,
    })
}

/// Fixed-size slicing over the snapshot's record sequence. Offsets beyond the
/// end yield an empty slice, never an error.
pub(crate) fn slice_page(records: &[ProcessedRecord], offset: usize, limit: usize) -> &[ProcessedRecord] {
    let start = offset.min(records.len());
    let end = offset.saturating_add(limit).min(records.len());
    &records[start..end]
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistRequest {
    pub data: Vec<ProcessedRecord>,
    pub data_type: DataType,
    #[serde(default)]
    pub access: AccessLevel,
}

#[derive(Debug, Serialize)]
pub struct PersistResponse {
    pub url: SnapshotRef,
}

/// POST /pins: persist an explicit snapshot (admin use).
pub async fn post_pins_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PersistRequest>,
) -> impl IntoResponse {
    match state
        .snapshots
        .write(body.data, body.data_type, body.access)
        .await
    {
        Ok(stored) => Json(PersistResponse {
            url: stored.reference,
        })
        .into_response(),
        Err(e) => map_error(e.into(), state.expose_error_details).into_response(),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub data_type: DataType,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponse {
    pub success: bool,
    pub url: SnapshotRef,
    pub version: chrono::DateTime<chrono::Utc>,
    pub records: usize,
    pub fallback: bool,
}

/// POST /sync: run (or join) the de-duplicated sync for one data type.
pub async fn post_sync_handler(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SyncRequest>,
) -> impl IntoResponse {
    match state.coordinator.sync_if_needed(body.data_type).await {
        Ok(receipt) => Json(SyncResponse {
            success: true,
            url: receipt.reference,
            version: receipt.version,
            records: receipt.record_count,
            fallback: receipt.fallback,
        })
        .into_response(),
        Err(e) => map_error(e.into(), state.expose_error_details).into_response(),
    }
}
