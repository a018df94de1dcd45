//! Bundle registry: blob bytes in [`StorageService`], metadata in a [`BundleStore`].

use std::sync::Arc;

use async_trait::async_trait;
use be_remote_db::DatabaseManager;
use be_storage::{BlobStream, StorageService};
use chrono::Utc;
use ota_core::{BundleKey, BundleRecord, ContentHash};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{UpdateServiceError, UpdateServiceResult},
    types::BundleUpload,
};

/// Durable store of bundle metadata
#[async_trait]
pub trait BundleStore: Send + Sync {
    async fn insert(&self, record: &BundleRecord) -> UpdateServiceResult<()>;

    /// Record with the greatest `(created_at, id)` among exact key matches
    async fn latest(&self, key: &BundleKey) -> UpdateServiceResult<Option<BundleRecord>>;

    async fn get(&self, id: Uuid) -> UpdateServiceResult<Option<BundleRecord>>;
}

#[async_trait]
impl BundleStore for DatabaseManager {
    async fn insert(&self, record: &BundleRecord) -> UpdateServiceResult<()> {
        Ok(self.insert_bundle(record).await?)
    }

    async fn latest(&self, key: &BundleKey) -> UpdateServiceResult<Option<BundleRecord>> {
        Ok(self
            .latest_bundle()
            .app_version(&key.app_version)
            .platform(key.platform)
            .deployment_key(&key.deployment_key)
            .call()
            .await?)
    }

    async fn get(&self, id: Uuid) -> UpdateServiceResult<Option<BundleRecord>> {
        match self.get_bundle(id).await {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local metadata store, used for tests and local runs without Postgres
#[derive(Debug, Default)]
pub struct MemoryBundleStore {
    records: RwLock<Vec<BundleRecord>>,
}

impl MemoryBundleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl BundleStore for MemoryBundleStore {
    async fn insert(&self, record: &BundleRecord) -> UpdateServiceResult<()> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn latest(&self, key: &BundleKey) -> UpdateServiceResult<Option<BundleRecord>> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .filter(|r| {
                r.app_version == key.app_version
                    && r.platform == key.platform
                    && r.deployment_key == key.deployment_key
            })
            .max_by_key(|r| r.recency())
            .cloned())
    }

    async fn get(&self, id: Uuid) -> UpdateServiceResult<Option<BundleRecord>> {
        let records = self.records.read().await;
        Ok(records.iter().find(|r| r.id == id).cloned())
    }
}

#[derive(Clone)]
pub struct BundleRegistry {
    store: Arc<dyn BundleStore>,
    storage: StorageService,
}

impl BundleRegistry {
    pub fn new(store: Arc<dyn BundleStore>, storage: StorageService) -> Self {
        Self { store, storage }
    }

    /// Registry backed entirely by process memory
    pub fn in_memory() -> UpdateServiceResult<Self> {
        Ok(Self::new(
            Arc::new(MemoryBundleStore::new()),
            StorageService::in_memory()?,
        ))
    }

    pub fn storage(&self) -> &StorageService {
        &self.storage
    }

    /// Hash and store an uploaded bundle.
    ///
    /// The blob is written before the metadata, so a record never points at a
    /// missing blob. If the metadata write fails the orphaned blob is removed.
    #[instrument(skip_all, fields(
        app_version = %upload.app_version,
        platform = %upload.platform,
        deployment_key = %upload.deployment_key,
        label = %upload.label,
        size = upload.content.len()
    ))]
    pub async fn put(&self, upload: BundleUpload) -> UpdateServiceResult<BundleRecord> {
        let BundleUpload {
            app_version,
            platform,
            deployment_key,
            label,
            is_mandatory,
            update_app_version,
            content,
        } = upload;

        let id = Uuid::now_v7();
        let content_hash = ContentHash::compute(&content);
        let size = content.len() as u64;
        debug!("Computed content hash {} for bundle {}", content_hash, id);

        let storage_ref = self.storage.upload(&id, content).await?;

        let record = BundleRecord {
            id,
            app_version,
            platform,
            deployment_key,
            content_hash,
            label,
            storage_ref,
            size,
            is_mandatory,
            update_app_version,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.insert(&record).await {
            warn!("Metadata write failed for bundle {}: {}", record.id, e);
            if let Err(cleanup) = self.storage.delete(&record.storage_ref).await {
                warn!(
                    "Failed to remove orphaned blob {}: {}",
                    record.storage_ref, cleanup
                );
            }
            return Err(e);
        }

        info!(
            "Registered bundle {} ({}) for {}",
            record.id,
            record.label,
            record.key()
        );
        Ok(record)
    }

    #[instrument(skip(self), fields(key = %key))]
    pub async fn latest(&self, key: &BundleKey) -> UpdateServiceResult<Option<BundleRecord>> {
        self.store.latest(key).await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> UpdateServiceResult<BundleRecord> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| UpdateServiceError::bundle_not_found(id.to_string()))
    }

    /// Open the stored bytes of a bundle for streaming
    #[instrument(skip(self, record), fields(id = %record.id, storage_ref = %record.storage_ref))]
    pub async fn open(&self, record: &BundleRecord) -> UpdateServiceResult<BlobStream> {
        self.storage
            .reader(&record.storage_ref)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    UpdateServiceError::bundle_not_found(record.id.to_string())
                } else {
                    e.into()
                }
            })
    }
}

/// Store whose every operation fails, for exercising storage error paths
#[cfg(test)]
pub(crate) struct FailingStore;

#[cfg(test)]
#[async_trait]
impl BundleStore for FailingStore {
    async fn insert(&self, _record: &BundleRecord) -> UpdateServiceResult<()> {
        Err(UpdateServiceError::storage("metadata store unavailable"))
    }

    async fn latest(&self, _key: &BundleKey) -> UpdateServiceResult<Option<BundleRecord>> {
        Err(UpdateServiceError::storage("metadata store unavailable"))
    }

    async fn get(&self, _id: Uuid) -> UpdateServiceResult<Option<BundleRecord>> {
        Err(UpdateServiceError::storage("metadata store unavailable"))
    }
}
