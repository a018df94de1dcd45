//! Bundle blob storage using OpenDAL.
//!
//! Bundle bytes are written once and never mutated. The backend is either the
//! local filesystem, S3, or process memory, configurable via environment
//! variables.
//!
//! ## Environment Variables
//!
//! - `BUNDLE_STORAGE_BACKEND`: "fs" (default), "s3" or "memory"
//!
//! ### For filesystem backend:
//! - `BUNDLE_STORAGE_FS_ROOT`: Root directory for bundle files (default: "./uploads")
//!
//! ### For S3 backend:
//! - `BUNDLE_STORAGE_S3_BUCKET`: S3 bucket name (required)
//! - `BUNDLE_STORAGE_S3_REGION`: S3 region (required)
//! - `BUNDLE_STORAGE_S3_ENDPOINT`: S3 endpoint URL (optional, for S3-compatible services)
//! - `BUNDLE_STORAGE_S3_ACCESS_KEY_ID`: AWS access key ID (optional, uses default credentials if not set)
//! - `BUNDLE_STORAGE_S3_SECRET_ACCESS_KEY`: AWS secret access key (optional)

mod error;

pub use error::{StorageError, StorageResult};

use bon::bon;
use opendal::{FuturesBytesStream, Operator, services};
use tracing::{debug, info};
use uuid::Uuid;

const DEFAULT_FS_ROOT: &str = "./uploads";

#[derive(Debug, Clone)]
pub enum StorageConfig {
    FS {
        root: String,
    },
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
    },
    Memory,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::FS {
            root: DEFAULT_FS_ROOT.to_string(),
        }
    }
}

impl StorageConfig {
    /// Create configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns `StorageError::MissingEnvVar` if the S3 bucket or region is
    /// not set, and `StorageError::UnknownBackend` for any other backend name.
    pub fn from_env() -> StorageResult<Self> {
        let backend = std::env::var("BUNDLE_STORAGE_BACKEND")
            .unwrap_or_else(|_| "fs".to_string())
            .to_lowercase();

        match backend.as_str() {
            "s3" => {
                let bucket = std::env::var("BUNDLE_STORAGE_S3_BUCKET")
                    .map_err(|_| StorageError::MissingEnvVar("BUNDLE_STORAGE_S3_BUCKET"))?;
                let region = std::env::var("BUNDLE_STORAGE_S3_REGION")
                    .map_err(|_| StorageError::MissingEnvVar("BUNDLE_STORAGE_S3_REGION"))?;
                let endpoint = std::env::var("BUNDLE_STORAGE_S3_ENDPOINT").ok();
                let access_key_id = std::env::var("BUNDLE_STORAGE_S3_ACCESS_KEY_ID").ok();
                let secret_access_key = std::env::var("BUNDLE_STORAGE_S3_SECRET_ACCESS_KEY").ok();

                Ok(StorageConfig::S3 {
                    bucket,
                    region,
                    endpoint,
                    access_key_id,
                    secret_access_key,
                })
            }
            "memory" => Ok(StorageConfig::Memory),
            "fs" => {
                let root = std::env::var("BUNDLE_STORAGE_FS_ROOT")
                    .unwrap_or_else(|_| DEFAULT_FS_ROOT.to_string());
                Ok(StorageConfig::FS { root })
            }
            other => Err(StorageError::UnknownBackend(other.to_string())),
        }
    }
}

/// A stored blob opened for streaming
pub struct BlobStream {
    pub size: u64,
    pub stream: FuturesBytesStream,
}

#[derive(Debug, Clone)]
pub struct StorageService {
    operator: Operator,
    config: StorageConfig,
}

#[bon]
impl StorageService {
    /// Create a new storage service with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operator cannot be created.
    #[builder]
    pub fn new(config: StorageConfig) -> StorageResult<Self> {
        let operator = Self::create_operator(&config)?;
        Ok(Self { operator, config })
    }

    /// Create a new storage service using environment variables for configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the operator cannot be created.
    pub fn from_env() -> StorageResult<Self> {
        let service = Self::builder().config(StorageConfig::from_env()?).build()?;
        info!(
            "Initialized bundle storage with {} backend",
            service.get_backend_name()
        );
        Ok(service)
    }

    /// In-memory storage, mostly for tests and local runs.
    pub fn in_memory() -> StorageResult<Self> {
        Self::builder().config(StorageConfig::Memory).build()
    }

    fn create_operator(config: &StorageConfig) -> StorageResult<Operator> {
        match config {
            StorageConfig::FS { root } => {
                debug!("Creating filesystem storage operator with root: {}", root);

                std::fs::create_dir_all(root).map_err(|e| StorageError::root(root, e))?;

                let builder = services::Fs::default().root(root);

                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::backend("setup", root, e))?
                    .finish())
            }
            StorageConfig::S3 {
                bucket,
                region,
                endpoint,
                access_key_id,
                secret_access_key,
            } => {
                debug!("Creating S3 storage operator for bucket: {}", bucket);

                let mut builder = services::S3::default().bucket(bucket).region(region);

                if let Some(ep) = endpoint {
                    builder = builder.endpoint(ep);
                }

                if let Some(key_id) = access_key_id {
                    builder = builder.access_key_id(key_id);
                }

                if let Some(secret) = secret_access_key {
                    builder = builder.secret_access_key(secret);
                }

                Ok(Operator::new(builder)
                    .map_err(|e| StorageError::backend("setup", bucket, e))?
                    .finish())
            }
            StorageConfig::Memory => {
                debug!("Creating in-memory storage operator");
                Ok(Operator::new(services::Memory::default())
                    .map_err(|e| StorageError::backend("setup", "memory", e))?
                    .finish())
            }
        }
    }

    /// Blob path for a bundle. Derived from the id only, since deployment keys
    /// are opaque and may contain path separators.
    pub fn generate_path(bundle_id: &Uuid) -> String {
        format!("bundles/{}.bundle", bundle_id)
    }

    /// Upload bundle bytes and return the path they were stored at
    ///
    /// # Errors
    ///
    /// Returns an error if the write operation fails.
    pub async fn upload(&self, bundle_id: &Uuid, content: Vec<u8>) -> StorageResult<String> {
        let path = Self::generate_path(bundle_id);

        debug!(
            "Uploading bundle {} to path: {} ({} bytes)",
            bundle_id,
            path,
            content.len()
        );

        self.operator
            .write(&path, content)
            .await
            .map_err(|e| StorageError::backend("write", &path, e))?;

        info!("Successfully uploaded bundle {}", bundle_id);

        Ok(path)
    }

    /// Download bundle bytes from storage
    ///
    /// # Errors
    ///
    /// Returns an error if the read fails or nothing is stored at `path`.
    pub async fn download(&self, path: &str) -> StorageResult<Vec<u8>> {
        debug!("Downloading bundle from path: {}", path);

        let content = self
            .operator
            .read(path)
            .await
            .map_err(|e| StorageError::backend("read", path, e))?;

        let bytes = content.to_vec();

        debug!(
            "Successfully downloaded {} bytes from {}",
            bytes.len(),
            path
        );

        Ok(bytes)
    }

    /// Open a blob as a byte stream without buffering it.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::BlobNotFound` if nothing is stored at `path`, or
    /// an error if the backend cannot be read.
    pub async fn reader(&self, path: &str) -> StorageResult<BlobStream> {
        let meta = self
            .operator
            .stat(path)
            .await
            .map_err(|e| StorageError::backend("stat", path, e))?;

        let stream = self
            .operator
            .reader(path)
            .await
            .map_err(|e| StorageError::backend("read", path, e))?
            .into_bytes_stream(..)
            .await
            .map_err(|e| StorageError::backend("read", path, e))?;

        debug!(
            "Streaming {} bytes from {}",
            meta.content_length(),
            path
        );

        Ok(BlobStream {
            size: meta.content_length(),
            stream,
        })
    }

    /// Delete a blob. Only used to clean up after a failed metadata write.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    pub async fn delete(&self, path: &str) -> StorageResult<()> {
        debug!("Deleting bundle blob at path: {}", path);

        self.operator
            .delete(path)
            .await
            .map_err(|e| StorageError::backend("delete", path, e))?;

        info!("Successfully deleted bundle blob at {}", path);

        Ok(())
    }

    /// Check if a blob exists at path
    ///
    /// # Errors
    ///
    /// Returns an error if the stat operation fails (other than NotFound).
    pub async fn exists(&self, path: &str) -> StorageResult<bool> {
        match self.operator.stat(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::backend("stat", path, e)),
        }
    }

    /// Paths of every stored bundle blob
    ///
    /// # Errors
    ///
    /// Returns an error if the list operation fails.
    pub async fn list_paths(&self) -> StorageResult<Vec<String>> {
        let entries = match self.operator.list_with("bundles/").recursive(true).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::backend("list", "bundles/", e)),
        };

        Ok(entries
            .into_iter()
            .map(|entry| entry.path().to_string())
            .filter(|path| !path.ends_with('/'))
            .collect())
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn get_backend_name(&self) -> &str {
        match self.config {
            StorageConfig::S3 { .. } => "s3",
            StorageConfig::FS { .. } => "fs",
            StorageConfig::Memory => "memory",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_path() {
        let bundle_id = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();

        let path = StorageService::generate_path(&bundle_id);
        assert_eq!(path, "bundles/6ba7b810-9dad-11d1-80b4-00c04fd430c8.bundle");
    }

    #[test]
    fn test_storage_config_default() {
        let config = StorageConfig::default();
        match config {
            StorageConfig::FS { root } => {
                assert_eq!(root, "./uploads");
            }
            _ => panic!("Expected Filesystem config"),
        }
    }

    #[tokio::test]
    async fn test_memory_round_trip() {
        let storage = StorageService::in_memory().unwrap();
        assert_eq!(storage.get_backend_name(), "memory");

        let bundle_id = Uuid::now_v7();
        let path = storage
            .upload(&bundle_id, b"bundle bytes".to_vec())
            .await
            .unwrap();

        assert!(storage.exists(&path).await.unwrap());
        assert_eq!(storage.download(&path).await.unwrap(), b"bundle bytes");
        assert_eq!(storage.list_paths().await.unwrap(), vec![path.clone()]);

        storage.delete(&path).await.unwrap();
        assert!(!storage.exists(&path).await.unwrap());
        assert!(storage.list_paths().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reader_streams_stored_bytes() {
        use futures::TryStreamExt;

        let storage = StorageService::in_memory().unwrap();
        let content: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let path = storage
            .upload(&Uuid::now_v7(), content.clone())
            .await
            .unwrap();

        let blob = storage.reader(&path).await.unwrap();
        assert_eq!(blob.size, content.len() as u64);

        let chunks: Vec<_> = blob.stream.try_collect().await.unwrap();
        let streamed: Vec<u8> = chunks.iter().flat_map(|c| c.iter().copied()).collect();
        assert_eq!(streamed, content);
    }

    #[tokio::test]
    async fn test_reader_missing_is_not_found() {
        let storage = StorageService::in_memory().unwrap();
        let err = storage.reader("bundles/missing.bundle").await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let storage = StorageService::in_memory().unwrap();
        let err = storage
            .download("bundles/missing.bundle")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_fs_backend_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("blobs");
        let storage = StorageService::builder()
            .config(StorageConfig::FS {
                root: root.to_string_lossy().into_owned(),
            })
            .build()
            .unwrap();

        let bundle_id = Uuid::now_v7();
        let path = storage.upload(&bundle_id, vec![1, 2, 3]).await.unwrap();

        assert!(root.join(&path).is_file());
        assert_eq!(storage.download(&path).await.unwrap(), vec![1, 2, 3]);
    }
}
