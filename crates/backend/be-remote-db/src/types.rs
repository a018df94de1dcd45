use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Row of the `bundles` table as stored. Converted into
/// [`ota_core::BundleRecord`] before leaving this crate.
#[derive(Debug, Clone, FromRow)]
pub struct BundleRow {
    pub id: Uuid,
    pub app_version: String,
    pub platform: String,
    pub deployment_key: String,
    pub content_hash: String,
    pub label: String,
    pub storage_ref: String,
    pub size: i64,
    pub is_mandatory: bool,
    pub update_app_version: bool,
    pub created_at: DateTime<Utc>,
}
