use std::time::Duration;

use bon::Builder;
use ota_core::{ContentHash, Platform};
use serde::Deserialize;
use url::Url;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

/// Static configuration of an installed app, injected once into the updater.
#[derive(Debug, Clone, Builder, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdaterConfig {
    pub server_url: Url,
    /// Default deployment key, used when a check does not override it
    #[builder(into)]
    pub deployment_key: String,
    /// Version of the installed binary
    #[builder(into)]
    pub app_version: String,
    pub platform: Platform,
    /// Hash of the bundle shipped inside the binary, on platforms that record one
    #[serde(default)]
    pub binary_package_hash: Option<ContentHash>,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
}

impl UpdaterConfig {
    /// The binary-embedded hash, if this platform sends one on first run.
    pub fn embedded_package_hash(&self) -> Option<&ContentHash> {
        if self.platform.embeds_binary_hash() {
            self.binary_package_hash.as_ref()
        } else {
            None
        }
    }
}
