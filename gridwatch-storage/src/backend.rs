use std::collections::HashMap;

use opendal::{services, Operator, Scheme};

use crate::errors::{Result, StorageError};

#[derive(Debug, Clone)]
pub enum CloudBackend {
    S3,
    Gcs,
}

#[derive(Debug, Clone)]
pub enum LocalBackend {
    Fs,
    Memory,
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Cloud backends hosted out of process (S3, GCS)
    Cloud {
        backend: CloudBackend,
        /// A URI-like root, e.g. s3://bucket/prefix, gcs://bucket/prefix
        root: String,
        /// Optional backend-specific options (endpoint, region, credentials, etc.)
        options: HashMap<String, String>,
    },
    /// Local backends colocated with the gateway (fs, memory)
    Local {
        backend: LocalBackend,
        /// For fs: an absolute directory like file:///var/lib/gridwatch or /var/lib/gridwatch
        /// For memory: a logical namespace like memory://gridwatch
        root: String,
    },
}

impl BackendConfig {
    fn build_operator(&self) -> Result<Operator> {
        match self {
            BackendConfig::Local {
                backend: LocalBackend::Memory,
                root,
            } => {
                let builder = services::Memory::default().root(&virtual_root(root));
                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::Backend(format!("memory operator: {}", e)))?
                    .finish())
            }
            BackendConfig::Local {
                backend: LocalBackend::Fs,
                root,
            } => {
                let dir = root.strip_prefix("file://").unwrap_or(root);
                if dir.is_empty() {
                    return Err(StorageError::InvalidRoot(root.clone()));
                }
                let builder = services::Fs::default().root(dir);
                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::Backend(format!("fs operator {}: {}", dir, e)))?
                    .finish())
            }
            BackendConfig::Cloud {
                backend,
                root,
                options,
            } => {
                let scheme = match backend {
                    CloudBackend::S3 => Scheme::S3,
                    CloudBackend::Gcs => Scheme::Gcs,
                };
                let (bucket, prefix) = split_cloud_root(root)?;
                let mut opts = options.clone();
                opts.insert("bucket".to_string(), bucket);
                opts.insert("root".to_string(), prefix);
                Operator::via_iter(scheme, opts)
                    .map_err(|e| StorageError::Backend(format!("cloud operator {}: {}", root, e)))
            }
        }
    }
}

/// Memory roots like `memory://gridwatch` become the operator's virtual root.
fn virtual_root(root: &str) -> String {
    let ns = root
        .trim_start_matches("memory://")
        .trim_matches('/')
        .to_string();
    if ns.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", ns)
    }
}

/// Split `s3://bucket/prefix` into the bucket and the in-bucket root.
fn split_cloud_root(root: &str) -> Result<(String, String)> {
    let rest = root
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(root)
        .trim_matches('/');
    if rest.is_empty() {
        return Err(StorageError::InvalidRoot(root.to_string()));
    }
    match rest.split_once('/') {
        Some((bucket, prefix)) => Ok((bucket.to_string(), format!("/{}", prefix))),
        None => Ok((rest.to_string(), "/".to_string())),
    }
}

/// Size and location of one stored object, as reported by `list_objects`.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    pub path: String,
    pub size: u64,
}

/// Thin wrapper over the OpenDAL operator with uniform error mapping.
///
/// Clones share the underlying backend, so one store handed to several
/// components observes one object space.
#[derive(Debug, Clone)]
pub struct BlobStore {
    op: Operator,
}

impl BlobStore {
    pub fn new(cfg: BackendConfig) -> Result<Self> {
        let op = cfg.build_operator()?;
        Ok(Self { op })
    }

    pub async fn put_object(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
        self.op
            .write(path, bytes)
            .await
            .map_err(|e| StorageError::Backend(format!("put {}: {}", path, e)))?;
        Ok(())
    }

    pub async fn get_object(&self, path: &str) -> Result<Vec<u8>> {
        let data = self.op.read(path).await.map_err(|e| {
            if e.kind() == opendal::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::Backend(format!("get {}: {}", path, e))
            }
        })?;
        Ok(data.to_vec())
    }

    /// Delete an object by path. No-op if the object doesn't exist.
    pub async fn delete_object(&self, path: &str) -> Result<()> {
        self.op
            .delete(path)
            .await
            .map_err(|e| StorageError::Backend(format!("delete {}: {}", path, e)))
    }

    pub async fn stat_object(&self, path: &str) -> Result<u64> {
        let meta = self.op.stat(path).await.map_err(|e| {
            if e.kind() == opendal::ErrorKind::NotFound {
                StorageError::NotFound(path.to_string())
            } else {
                StorageError::Backend(format!("stat {}: {}", path, e))
            }
        })?;
        Ok(meta.content_length())
    }

    /// List objects directly under `prefix` with their sizes.
    /// Directory placeholders are skipped.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let entries = self
            .op
            .list(prefix)
            .await
            .map_err(|e| StorageError::Backend(format!("list {}: {}", prefix, e)))?;
        let mut out = Vec::new();
        for entry in entries {
            if entry.path().ends_with('/') {
                continue;
            }
            let size = self.stat_object(entry.path()).await?;
            out.push(ObjectMeta {
                path: entry.path().to_string(),
                size,
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> BlobStore {
        BlobStore::new(BackendConfig::Local {
            backend: LocalBackend::Memory,
            root: "memory://backend-test".to_string(),
        })
        .expect("memory store")
    }

    /// Tests put/get/delete over the in-memory backend
    /// Purpose: the blob primitive contract (put, get, idempotent delete)
    /// Expected: bytes round-trip; get after delete reports NotFound; a second
    ///           delete still succeeds
    #[tokio::test]
    async fn test_put_get_delete_round_trip() {
        let store = memory_store();
        store
            .put_object("snapshots/a.json", b"{\"k\":1}".to_vec())
            .await
            .unwrap();
        let body = store.get_object("snapshots/a.json").await.unwrap();
        assert_eq!(body, b"{\"k\":1}");

        store.delete_object("snapshots/a.json").await.unwrap();
        let err = store.get_object("snapshots/a.json").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        // idempotent
        store.delete_object("snapshots/a.json").await.unwrap();
    }

    /// Tests listing with sizes under a prefix
    /// Purpose: retention measures usage from list_objects
    /// Expected: both objects returned with their byte sizes, other prefixes excluded
    #[tokio::test]
    async fn test_list_objects_with_sizes() {
        let store = memory_store();
        store
            .put_object("snapshots/one.json", vec![0u8; 10])
            .await
            .unwrap();
        store
            .put_object("snapshots/two.json", vec![0u8; 25])
            .await
            .unwrap();
        store
            .put_object("watermarks/luminaire.json", vec![0u8; 5])
            .await
            .unwrap();

        let mut entries = store.list_objects("snapshots/").await.unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].path, "snapshots/one.json");
        assert_eq!(entries[0].size, 10);
        assert_eq!(entries[1].size, 25);
    }

    /// Tests cloud root parsing
    /// Purpose: s3://bucket/prefix roots split into bucket + in-bucket root
    /// Expected: bucket and prefix extracted; bare bucket maps to "/"
    #[test]
    fn test_split_cloud_root() {
        let (bucket, prefix) = split_cloud_root("s3://assets/gridwatch/prod").unwrap();
        assert_eq!(bucket, "assets");
        assert_eq!(prefix, "/gridwatch/prod");

        let (bucket, prefix) = split_cloud_root("gcs://assets").unwrap();
        assert_eq!(bucket, "assets");
        assert_eq!(prefix, "/");

        assert!(split_cloud_root("s3://").is_err());
    }
}
