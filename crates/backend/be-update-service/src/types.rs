//! Request types for the update service

use bon::Builder;
use ota_core::Platform;
use serde::Deserialize;

/// Query string of `GET /api/update-check`.
///
/// Everything is optional here so a missing parameter becomes a structured
/// 400 instead of the extractor's plain-text rejection.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCheckParams {
    pub app_version: Option<String>,
    pub platform: Option<String>,
    pub deployment_key: Option<String>,
    pub current_package_hash: Option<String>,
}

/// A bundle as received from a publisher, before it is hashed and stored
#[derive(Builder, Clone)]
pub struct BundleUpload {
    #[builder(into)]
    pub app_version: String,
    pub platform: Platform,
    #[builder(into)]
    pub deployment_key: String,
    #[builder(into)]
    pub label: String,
    #[builder(default)]
    pub is_mandatory: bool,
    #[builder(default)]
    pub update_app_version: bool,
    #[builder(into)]
    pub content: Vec<u8>,
}

impl std::fmt::Debug for BundleUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleUpload")
            .field("app_version", &self.app_version)
            .field("platform", &self.platform)
            .field("deployment_key", &self.deployment_key)
            .field("label", &self.label)
            .field("is_mandatory", &self.is_mandatory)
            .field("update_app_version", &self.update_app_version)
            .field("content_len", &self.content.len())
            .finish()
    }
}
