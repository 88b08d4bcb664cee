use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

mod app;
mod cron;
mod http;
mod pins;

use gridwatch_storage::{
    BackendConfig, BlobStore, CloudBackend, LocalBackend, RetentionConfig, RetentionMonitor,
    SnapshotStore, WatermarkStore,
};
use gridwatch_sync::{DataSource, SyncCoordinator, UpstreamConfig};

use crate::app::{build_router, AppState};

#[derive(Parser, Debug, Clone)]
struct Config {
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen_addr: String,

    /// Storage root: memory://ns, file:///var/lib/gridwatch,
    /// s3://bucket/prefix or gcs://bucket/prefix.
    #[arg(long, default_value = "memory://gridwatch")]
    storage_root: String,

    /// Extra backend options for cloud roots, as key=value pairs
    /// (endpoint, region, credentials, ...).
    #[arg(long = "storage-option")]
    storage_options: Vec<String>,

    /// Capacity the usage percentage is computed against.
    #[arg(long, default_value_t = 100 * 1024 * 1024)]
    capacity_bytes: u64,

    #[arg(long, default_value_t = 70)]
    usage_threshold_percent: u8,

    #[arg(long, default_value_t = 300)]
    retention_interval_seconds: u64,

    /// Default page size for GET /pins.
    #[arg(long, default_value_t = 1000)]
    page_limit: usize,

    /// Omit full error text from failure payloads (set in production).
    #[arg(long)]
    hide_error_details: bool,
}

fn parse_backend(root: &str, option_pairs: &[String]) -> Result<BackendConfig> {
    let mut options = HashMap::new();
    for pair in option_pairs {
        match pair.split_once('=') {
            Some((k, v)) => {
                options.insert(k.to_string(), v.to_string());
            }
            None => anyhow::bail!("invalid storage option (expected key=value): {}", pair),
        }
    }

    let cfg = if root.starts_with("s3://") {
        BackendConfig::Cloud {
            backend: CloudBackend::S3,
            root: root.to_string(),
            options,
        }
    } else if root.starts_with("gcs://") {
        BackendConfig::Cloud {
            backend: CloudBackend::Gcs,
            root: root.to_string(),
            options,
        }
    } else if root.starts_with("memory://") {
        BackendConfig::Local {
            backend: LocalBackend::Memory,
            root: root.to_string(),
        }
    } else {
        BackendConfig::Local {
            backend: LocalBackend::Fs,
            root: root.to_string(),
        }
    };
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cfg = Config::parse();

    let blob = BlobStore::new(parse_backend(&cfg.storage_root, &cfg.storage_options)?)?;
    let snapshots = SnapshotStore::new(blob.clone());
    let watermarks = WatermarkStore::new(blob);

    let source = DataSource::from_config(UpstreamConfig::from_env())?;
    let coordinator = SyncCoordinator::new(Arc::new(source), snapshots.clone(), watermarks);

    let retention = Arc::new(RetentionMonitor::new(
        snapshots.clone(),
        RetentionConfig {
            capacity_bytes: cfg.capacity_bytes,
            usage_threshold_percent: cfg.usage_threshold_percent,
            check_interval_seconds: cfg.retention_interval_seconds,
        },
    ));
    let _retention_task = retention.clone().start();

    let app_state = Arc::new(AppState {
        coordinator,
        snapshots,
        retention,
        default_limit: cfg.page_limit,
        expose_error_details: !cfg.hide_error_details,
    });
    let app = build_router(app_state);

    let addr: SocketAddr = cfg.listen_addr.parse()?;
    info!(target: "gateway", "listening on http://{}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
