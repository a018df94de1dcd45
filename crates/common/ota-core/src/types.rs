//! Bundle records, update queries and update descriptors

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ContentHash, error::CoreError};

/// Target platforms a bundle can be published for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Ios,
    Android,
    Windows,
    Macos,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ios => "ios",
            Platform::Android => "android",
            Platform::Windows => "windows",
            Platform::Macos => "macos",
        }
    }

    /// Whether the installed binary carries the hash of the bundle it shipped with.
    /// Only iOS builds record it, so a first-run query can still report a hash.
    pub fn embeds_binary_hash(&self) -> bool {
        matches!(self, Platform::Ios)
    }
}

impl std::str::FromStr for Platform {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ios" => Ok(Platform::Ios),
            "android" => Ok(Platform::Android),
            "windows" => Ok(Platform::Windows),
            "macos" | "darwin" => Ok(Platform::Macos),
            _ => Err(CoreError::invalid_platform(s)),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The exact (appVersion, platform, deploymentKey) triple a bundle is published to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BundleKey {
    pub app_version: String,
    pub platform: Platform,
    pub deployment_key: String,
}

impl BundleKey {
    pub fn new(
        app_version: impl Into<String>,
        platform: Platform,
        deployment_key: impl Into<String>,
    ) -> Self {
        Self {
            app_version: app_version.into(),
            platform,
            deployment_key: deployment_key.into(),
        }
    }
}

impl std::fmt::Display for BundleKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.app_version, self.platform, self.deployment_key
        )
    }
}

/// A published bundle. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRecord {
    pub id: Uuid,
    pub app_version: String,
    pub platform: Platform,
    pub deployment_key: String,
    pub content_hash: ContentHash,
    pub label: String,
    pub storage_ref: String,
    pub size: u64,
    /// Publisher-set: clients must not defer installing this bundle
    pub is_mandatory: bool,
    /// Publisher-set: the update needs a store-level app release, not a patch
    pub update_app_version: bool,
    pub created_at: DateTime<Utc>,
}

impl BundleRecord {
    pub fn key(&self) -> BundleKey {
        BundleKey::new(&self.app_version, self.platform, &self.deployment_key)
    }

    /// Server-relative path the bundle bytes are served from
    pub fn download_path(&self) -> String {
        format!("/api/download/{}", self.id)
    }

    /// Ordering used to pick the latest record of a key. `id` is time ordered
    /// (UUIDv7) and breaks ties between identical timestamps.
    pub fn recency(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

/// A client's question: is there a bundle for this key that I don't already run?
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuery {
    pub app_version: String,
    pub platform: Platform,
    pub deployment_key: String,
    /// Absent on first run, or when the platform cannot report a pre-install hash
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_package_hash: Option<ContentHash>,
}

impl UpdateQuery {
    pub fn key(&self) -> BundleKey {
        BundleKey::new(&self.app_version, self.platform, &self.deployment_key)
    }
}

/// The resolver's answer when an update exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDescriptor {
    pub package_hash: ContentHash,
    pub download_url: String,
    pub label: String,
    #[serde(default)]
    pub is_mandatory: bool,
    #[serde(default)]
    pub update_app_version: bool,
    #[serde(default)]
    pub app_version: String,
    #[serde(default)]
    pub package_size: u64,
}

impl UpdateDescriptor {
    pub fn from_record(record: &BundleRecord) -> Self {
        Self {
            package_hash: record.content_hash.clone(),
            download_url: record.download_path(),
            label: record.label.clone(),
            is_mandatory: record.is_mandatory,
            update_app_version: record.update_app_version,
            app_version: record.app_version.clone(),
            package_size: record.size,
        }
    }
}
