//! Local update state: the installed package and the set of hashes that failed to install.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use ota_core::ContentHash;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::UpdaterResult;

const STATE_FILE_NAME: &str = "ota-state.json";

/// The bundle currently installed on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPackage {
    pub app_version: String,
    pub package_hash: ContentHash,
    pub label: String,
    pub deployment_key: String,
}

#[async_trait]
pub trait PackageStore: Send + Sync {
    async fn current_package(&self) -> UpdaterResult<Option<LocalPackage>>;
    async fn save_package(&self, package: &LocalPackage) -> UpdaterResult<()>;
}

/// Hashes of bundles that were installed and then rolled back.
#[async_trait]
pub trait FailedUpdates: Send + Sync {
    async fn contains(&self, package_hash: &ContentHash) -> UpdaterResult<bool>;
    async fn record(&self, package_hash: &ContentHash) -> UpdaterResult<()>;
    async fn clear(&self) -> UpdaterResult<()>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateState {
    #[serde(default)]
    current_package: Option<LocalPackage>,
    #[serde(default)]
    failed_hashes: BTreeSet<ContentHash>,
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<UpdateState>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(package: LocalPackage) -> Self {
        Self {
            state: Mutex::new(UpdateState {
                current_package: Some(package),
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl PackageStore for MemoryStateStore {
    async fn current_package(&self) -> UpdaterResult<Option<LocalPackage>> {
        Ok(self.state.lock().current_package.clone())
    }

    async fn save_package(&self, package: &LocalPackage) -> UpdaterResult<()> {
        self.state.lock().current_package = Some(package.clone());
        Ok(())
    }
}

#[async_trait]
impl FailedUpdates for MemoryStateStore {
    async fn contains(&self, package_hash: &ContentHash) -> UpdaterResult<bool> {
        Ok(self.state.lock().failed_hashes.contains(package_hash))
    }

    async fn record(&self, package_hash: &ContentHash) -> UpdaterResult<()> {
        self.state.lock().failed_hashes.insert(package_hash.clone());
        Ok(())
    }

    async fn clear(&self) -> UpdaterResult<()> {
        self.state.lock().failed_hashes.clear();
        Ok(())
    }
}

/// Both stores in one JSON file. Every change rewrites the file through a
/// temporary sibling and a rename, so a crash never leaves it half written.
#[derive(Debug)]
pub struct JsonStateStore {
    path: PathBuf,
    state: tokio::sync::Mutex<UpdateState>,
}

impl JsonStateStore {
    /// Open the state file at `path`, starting empty if it does not exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> UpdaterResult<Self> {
        let path = path.into();
        let state = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No update state at {}, starting empty", path.display());
                UpdateState::default()
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            state: tokio::sync::Mutex::new(state),
        })
    }

    /// `<local data dir>/<app_name>/ota-state.json`, when the platform has a data dir.
    pub fn default_location(app_name: &str) -> Option<PathBuf> {
        dirs::data_local_dir().map(|dir| dir.join(app_name).join(STATE_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, state: &UpdateState) -> UpdaterResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Apply `change` to a copy of the state and keep it only once it is on disk.
    async fn update(&self, change: impl FnOnce(&mut UpdateState)) -> UpdaterResult<()> {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        change(&mut next);
        if next == *guard {
            return Ok(());
        }
        self.persist(&next).await?;
        *guard = next;
        Ok(())
    }
}

#[async_trait]
impl PackageStore for JsonStateStore {
    async fn current_package(&self) -> UpdaterResult<Option<LocalPackage>> {
        Ok(self.state.lock().await.current_package.clone())
    }

    async fn save_package(&self, package: &LocalPackage) -> UpdaterResult<()> {
        self.update(|state| state.current_package = Some(package.clone()))
            .await
    }
}

#[async_trait]
impl FailedUpdates for JsonStateStore {
    async fn contains(&self, package_hash: &ContentHash) -> UpdaterResult<bool> {
        Ok(self.state.lock().await.failed_hashes.contains(package_hash))
    }

    async fn record(&self, package_hash: &ContentHash) -> UpdaterResult<()> {
        self.update(|state| {
            state.failed_hashes.insert(package_hash.clone());
        })
        .await
    }

    async fn clear(&self) -> UpdaterResult<()> {
        self.update(|state| state.failed_hashes.clear()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(content: &[u8]) -> LocalPackage {
        LocalPackage {
            app_version: "1.0.0".to_string(),
            package_hash: ContentHash::compute(content),
            label: "v1".to_string(),
            deployment_key: "prod".to_string(),
        }
    }

    #[tokio::test]
    async fn test_memory_store_tracks_failed_hashes() {
        let store = MemoryStateStore::new();
        let hash = ContentHash::compute(b"bad");

        assert!(!store.contains(&hash).await.unwrap());
        store.record(&hash).await.unwrap();
        assert!(store.contains(&hash).await.unwrap());
        store.clear().await.unwrap();
        assert!(!store.contains(&hash).await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_saves_package() {
        let store = MemoryStateStore::new();
        assert!(store.current_package().await.unwrap().is_none());

        store.save_package(&package(b"x")).await.unwrap();
        assert_eq!(store.current_package().await.unwrap(), Some(package(b"x")));
    }

    #[tokio::test]
    async fn test_json_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(STATE_FILE_NAME);
        let bad = ContentHash::compute(b"bad");

        {
            let store = JsonStateStore::open(&path).await.unwrap();
            assert!(store.current_package().await.unwrap().is_none());
            store.save_package(&package(b"x")).await.unwrap();
            store.record(&bad).await.unwrap();
        }

        let reopened = JsonStateStore::open(&path).await.unwrap();
        assert_eq!(
            reopened.current_package().await.unwrap(),
            Some(package(b"x"))
        );
        assert!(reopened.contains(&bad).await.unwrap());
        assert!(!path.with_extension("json.tmp").exists());

        reopened.clear().await.unwrap();
        let cleared = JsonStateStore::open(&path).await.unwrap();
        assert!(!cleared.contains(&bad).await.unwrap());
    }

    #[tokio::test]
    async fn test_json_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(STATE_FILE_NAME);
        std::fs::write(&path, b"{not json").unwrap();

        assert!(JsonStateStore::open(&path).await.is_err());
    }

    #[test]
    fn test_default_location_ends_with_state_file() {
        if let Some(path) = JsonStateStore::default_location("demo-app") {
            assert!(path.ends_with(Path::new("demo-app").join(STATE_FILE_NAME)));
        }
    }
}
