use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{info, warn};

use gridwatch_core::DataType;

use crate::errors::{Result, SyncError};

/// Raw coordinate pair as reported by the upstream source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: f64,
    pub y: f64,
}

/// One raw feature: an untyped attribute map plus its coordinate pair.
/// Ephemeral; normalized by the processor before anything is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeature {
    pub attributes: Map<String, Value>,
    pub geometry: RawPoint,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SpatialReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wkid: Option<u32>,
    #[serde(rename = "latestWkid", default, skip_serializing_if = "Option::is_none")]
    pub latest_wkid: Option<u32>,
}

/// The upstream query response for one data type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSet {
    #[serde(default)]
    pub features: Vec<RawFeature>,
    #[serde(rename = "geometryType", default, skip_serializing_if = "Option::is_none")]
    pub geometry_type: Option<String>,
    #[serde(
        rename = "spatialReference",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub spatial_reference: Option<SpatialReference>,
    #[serde(
        rename = "exceededTransferLimit",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub exceeded_transfer_limit: Option<bool>,
    /// True only for synthetic data, so a fallback response is never
    /// mistaken for a genuine upstream one.
    #[serde(rename = "_isFallback", default, skip_serializing_if = "is_false")]
    pub fallback: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A source of upstream feature records. `since = None` is a full fetch;
/// otherwise a delta restricted to records changed after the watermark.
/// Implementations are pure reads and perform no internal retries.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    async fn fetch(&self, data_type: DataType, since: Option<DateTime<Utc>>)
        -> Result<FeatureSet>;
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub luminaires_url: Option<String>,
    pub outage_areas_url: Option<String>,
    pub outage_points_url: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
    /// resultRecordCount sent with each query.
    pub page_record_count: u32,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            luminaires_url: None,
            outage_areas_url: None,
            outage_points_url: None,
            api_key: None,
            request_timeout_ms: 10_000,
            page_record_count: 1000,
        }
    }
}

impl UpstreamConfig {
    pub fn from_env() -> Self {
        Self {
            luminaires_url: std::env::var("EIP_LUMINAIRES_URL").ok(),
            outage_areas_url: std::env::var("EIP_OUTAGE_AREAS_URL").ok(),
            outage_points_url: std::env::var("EIP_OUTAGE_POINTS_URL").ok(),
            api_key: std::env::var("EIP_GATEWAY_API_KEY").ok(),
            ..Default::default()
        }
    }

    pub fn endpoint(&self, data_type: DataType) -> Option<&str> {
        match data_type {
            DataType::Luminaire => self.luminaires_url.as_deref(),
            DataType::OutageArea => self.outage_areas_url.as_deref(),
            DataType::OutagePoint => self.outage_points_url.as_deref(),
        }
    }

    fn has_any_endpoint(&self) -> bool {
        self.luminaires_url.is_some()
            || self.outage_areas_url.is_some()
            || self.outage_points_url.is_some()
    }
}

/// Build the delta filter for the upstream query.
/// The filter syntax only accepts whole dates, so the watermark is truncated
/// to day granularity: `last_updated > DATE '2026-08-01'`.
pub(crate) fn delta_where_clause(data_type: DataType, since: Option<DateTime<Utc>>) -> String {
    match since {
        Some(ts) => format!(
            "{} > DATE '{}'",
            data_type.delta_date_field(),
            ts.format("%Y-%m-%d")
        ),
        None => "1=1".to_string(),
    }
}

/// The real upstream client for the geographic data gateway.
#[derive(Debug, Clone)]
pub struct EipSource {
    cfg: UpstreamConfig,
    http: reqwest::Client,
}

impl EipSource {
    pub fn new(cfg: UpstreamConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(|e| SyncError::Internal(format!("http client: {}", e)))?;
        Ok(Self { cfg, http })
    }
}

#[async_trait]
impl UpstreamSource for EipSource {
    async fn fetch(
        &self,
        data_type: DataType,
        since: Option<DateTime<Utc>>,
    ) -> Result<FeatureSet> {
        let url = self
            .cfg
            .endpoint(data_type)
            .ok_or_else(|| SyncError::MissingConfiguration(format!("no endpoint for {}", data_type)))?;
        let api_key = self
            .cfg
            .api_key
            .as_deref()
            .ok_or_else(|| SyncError::MissingConfiguration("no api key".to_string()))?;

        let where_clause = delta_where_clause(data_type, since);
        let record_count = self.cfg.page_record_count.to_string();
        let query = [
            ("where", where_clause.as_str()),
            ("outFields", "*"),
            ("returnGeometry", "true"),
            ("f", "pjson"),
            // WGS84 coordinate system
            ("outSR", "4326"),
            ("returnDistinctValues", "false"),
            ("resultOffset", "0"),
            ("resultRecordCount", record_count.as_str()),
        ];

        let response = self
            .http
            .get(url)
            .header("x-Gateway-APIKey", api_key)
            .query(&query)
            .send()
            .await
            .map_err(|e| SyncError::UpstreamFetch {
                status: None,
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::UpstreamFetch {
                status: Some(status.as_u16()),
                detail: status.to_string(),
            });
        }

        let set: FeatureSet = response.json().await.map_err(|e| SyncError::UpstreamFetch {
            status: Some(status.as_u16()),
            detail: format!("decode: {}", e),
        })?;

        match since {
            Some(ts) => info!(
                target: "upstream",
                data_type = %data_type,
                records = set.features.len(),
                since = %ts,
                "delta fetch"
            ),
            None => info!(
                target: "upstream",
                data_type = %data_type,
                records = set.features.len(),
                "full fetch"
            ),
        }
        Ok(set)
    }
}

/// Deterministic fallback data, used when the upstream is not configured.
/// Keeps the downstream pipeline exercisable in development and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticSource;

// Fixed stamp so synthetic records are fully deterministic.
const SYNTHETIC_TIMESTAMP: &str = "2026-01-01T00:00:00Z";

#[async_trait]
impl UpstreamSource for SyntheticSource {
    async fn fetch(
        &self,
        data_type: DataType,
        _since: Option<DateTime<Utc>>,
    ) -> Result<FeatureSet> {
        Ok(synthetic_feature_set(data_type))
    }
}

pub(crate) fn synthetic_feature_set(data_type: DataType) -> FeatureSet {
    let (features, geometry_type) = match data_type {
        DataType::Luminaire => {
            let features = (0..5)
                .map(|i| RawFeature {
                    attributes: object(json!({
                        "OBJECTID": i + 1,
                        "GlobalID": format!("lum-{}", i + 1),
                        "name": format!("Luminaire {}", i + 1),
                        "status": if i % 2 == 0 { "active" } else { "inactive" },
                        "type": "streetlight",
                        "last_updated": SYNTHETIC_TIMESTAMP,
                        "wattage": 150 + i * 10,
                    })),
                    geometry: RawPoint {
                        x: -0.1278 + f64::from(i) * 0.01,
                        y: 51.5074 + f64::from(i) * 0.01,
                    },
                })
                .collect();
            (features, "esriGeometryPoint")
        }
        DataType::OutageArea => {
            let statuses = ["reported", "investigating", "repairing", "resolved"];
            let causes = ["equipment_failure", "weather", "accident", "maintenance"];
            let features = (0..3)
                .map(|i: i32| RawFeature {
                    attributes: object(json!({
                        "OBJECTID": i + 1,
                        "GlobalID": format!("area-{}", i + 1),
                        "name": format!("Outage Area {}", i + 1),
                        "customers_affected": (i + 1) * 20,
                        "status": statuses[i as usize % 4],
                        "last_modified": SYNTHETIC_TIMESTAMP,
                        "cause": causes[i as usize % 4],
                    })),
                    geometry: RawPoint {
                        x: -0.1278 - f64::from(i) * 0.02,
                        y: 51.5074 + f64::from(i) * 0.02,
                    },
                })
                .collect();
            (features, "esriGeometryPolygon")
        }
        DataType::OutagePoint => {
            let statuses = ["reported", "investigating", "repairing", "resolved"];
            let causes = ["equipment_failure", "weather", "accident", "maintenance"];
            let features = (0..4)
                .map(|i: i32| RawFeature {
                    attributes: object(json!({
                        "OBJECTID": i + 1,
                        "GlobalID": format!("point-{}", i + 1),
                        "status": statuses[i as usize % 4],
                        "cause": causes[i as usize % 4],
                        "reported_at": SYNTHETIC_TIMESTAMP,
                    })),
                    geometry: RawPoint {
                        x: -0.1278 - f64::from(i) * 0.01,
                        y: 51.5074 - f64::from(i) * 0.01,
                    },
                })
                .collect();
            (features, "esriGeometryPoint")
        }
    };

    FeatureSet {
        features,
        geometry_type: Some(geometry_type.to_string()),
        spatial_reference: Some(SpatialReference {
            wkid: Some(4326),
            latest_wkid: None,
        }),
        exceeded_transfer_limit: None,
        fallback: true,
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// The configured source for this process: real when the upstream is
/// reachable, synthetic otherwise. Mirrors the provider-enum dispatch used
/// for the storage backends.
#[derive(Debug, Clone)]
pub enum DataSource {
    Eip(EipSource),
    Synthetic(SyntheticSource),
}

impl DataSource {
    /// Selection happens once, at construction: the real source needs the api
    /// key and at least one endpoint; anything less falls back to synthetic
    /// data, loudly.
    pub fn from_config(cfg: UpstreamConfig) -> Result<Self> {
        if cfg.api_key.is_some() && cfg.has_any_endpoint() {
            Ok(DataSource::Eip(EipSource::new(cfg)?))
        } else {
            warn!(
                target: "upstream",
                "upstream endpoint or api key missing, serving synthetic data"
            );
            Ok(DataSource::Synthetic(SyntheticSource))
        }
    }
}

#[async_trait]
impl UpstreamSource for DataSource {
    async fn fetch(
        &self,
        data_type: DataType,
        since: Option<DateTime<Utc>>,
    ) -> Result<FeatureSet> {
        match self {
            DataSource::Eip(source) => source.fetch(data_type, since).await,
            DataSource::Synthetic(source) => source.fetch(data_type, since).await,
        }
    }
}
