use std::sync::Arc;

use bon::bon;
use ota_core::{ContentHash, UpdateDescriptor, UpdateQuery};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    config::UpdaterConfig,
    error::{UpdaterError, UpdaterResult},
    source::{DeploymentStatus, HttpUpdateSource, UpdateSource},
    state::{FailedUpdates, LocalPackage, PackageStore},
};

/// An update offered by the server, annotated with local knowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePackage {
    #[serde(flatten)]
    pub update: UpdateDescriptor,
    /// Deployment key the update was resolved against
    pub deployment_key: String,
    /// True when this exact bundle was installed before and rolled back
    pub failed_install: bool,
}

/// Verified bundle bytes, ready to install.
#[derive(Debug, Clone)]
pub struct DownloadedPackage {
    pub package: LocalPackage,
    pub content: Vec<u8>,
}

impl RemotePackage {
    pub fn package_hash(&self) -> &ContentHash {
        &self.update.package_hash
    }

    pub fn is_mandatory(&self) -> bool {
        self.update.is_mandatory
    }

    /// The local record this package becomes once installed.
    pub fn to_local_package(&self) -> LocalPackage {
        LocalPackage {
            app_version: self.update.app_version.clone(),
            package_hash: self.update.package_hash.clone(),
            label: self.update.label.clone(),
            deployment_key: self.deployment_key.clone(),
        }
    }

    /// Fetch the bundle and check it against the advertised hash.
    #[instrument(skip(self, source), fields(label = %self.update.label), level = "debug")]
    pub async fn download(&self, source: &dyn UpdateSource) -> UpdaterResult<DownloadedPackage> {
        let content = source.download(&self.update.download_url).await?;

        if !self.update.package_hash.verify(&content) {
            return Err(UpdaterError::HashMismatch {
                expected: self.update.package_hash.clone(),
                actual: ContentHash::compute(&content),
            });
        }

        if let Err(e) = source.report_status_download(self.package_hash()).await {
            warn!("Failed to report download of {}: {}", self.update.label, e);
        }

        Ok(DownloadedPackage {
            package: self.to_local_package(),
            content,
        })
    }
}

/// Decides whether the running app should move to a different bundle.
pub struct UpdateChecker {
    config: UpdaterConfig,
    source: Arc<dyn UpdateSource>,
    packages: Arc<dyn PackageStore>,
    failed: Arc<dyn FailedUpdates>,
}

#[bon]
impl UpdateChecker {
    #[builder]
    pub fn new(
        config: UpdaterConfig,
        source: Arc<dyn UpdateSource>,
        packages: Arc<dyn PackageStore>,
        failed: Arc<dyn FailedUpdates>,
    ) -> Self {
        Self {
            config,
            source,
            packages,
            failed,
        }
    }
}

impl UpdateChecker {
    /// Checker talking to the configured server, with both local stores in `state`.
    pub fn over_http<S>(config: UpdaterConfig, state: Arc<S>) -> UpdaterResult<Self>
    where
        S: PackageStore + FailedUpdates + 'static,
    {
        let source = Arc::new(HttpUpdateSource::new(&config)?);
        Ok(Self::builder()
            .config(config)
            .source(source)
            .packages(state.clone())
            .failed(state)
            .build())
    }

    pub fn config(&self) -> &UpdaterConfig {
        &self.config
    }

    pub fn source(&self) -> &dyn UpdateSource {
        self.source.as_ref()
    }

    /// Ask the server for an update. Any failure is logged and reported as no update.
    pub async fn check_for_update(&self, deployment_key: Option<&str>) -> Option<RemotePackage> {
        let deployment_key = deployment_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or(&self.config.deployment_key);

        match self.try_check(deployment_key).await {
            Ok(update) => update,
            Err(e) => {
                warn!("Update check against {} failed: {}", deployment_key, e);
                None
            }
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn try_check(&self, deployment_key: &str) -> UpdaterResult<Option<RemotePackage>> {
        let query = self.build_query(deployment_key).await?;

        let Some(mut update) = self.source.query_update(&query).await? else {
            debug!("No update for {}", query.key());
            return Ok(None);
        };

        if update.app_version.is_empty() {
            update.app_version = query.app_version.clone();
        }

        let failed_install = self.failed.contains(&update.package_hash).await?;
        if failed_install {
            info!(
                "Update {} was rolled back before, flagging it as a failed install",
                update.label
            );
        }

        Ok(Some(RemotePackage {
            update,
            deployment_key: deployment_key.to_string(),
            failed_install,
        }))
    }

    /// The installed package describes the device; without one, static config does.
    async fn build_query(&self, deployment_key: &str) -> UpdaterResult<UpdateQuery> {
        let query = match self.packages.current_package().await? {
            Some(local) => UpdateQuery {
                app_version: local.app_version,
                platform: self.config.platform,
                deployment_key: deployment_key.to_string(),
                current_package_hash: Some(local.package_hash),
            },
            None => UpdateQuery {
                app_version: self.config.app_version.clone(),
                platform: self.config.platform,
                deployment_key: deployment_key.to_string(),
                current_package_hash: self.config.embedded_package_hash().cloned(),
            },
        };
        Ok(query)
    }

    /// Download `package` through this checker's source.
    pub async fn download(&self, package: &RemotePackage) -> UpdaterResult<DownloadedPackage> {
        package.download(self.source.as_ref()).await
    }

    /// Remember that `package_hash` was installed and rolled back.
    pub async fn record_failed_install(&self, package_hash: &ContentHash) -> UpdaterResult<()> {
        self.failed.record(package_hash).await?;
        if let Err(e) = self
            .source
            .report_status_deploy(package_hash, DeploymentStatus::Failed)
            .await
        {
            warn!("Failed to report rollback of {}: {}", package_hash, e);
        }
        Ok(())
    }

    pub async fn clear_failed_installs(&self) -> UpdaterResult<()> {
        self.failed.clear().await
    }

    /// Record `package` as the installed bundle.
    pub async fn mark_installed(&self, package: &LocalPackage) -> UpdaterResult<()> {
        self.packages.save_package(package).await?;
        if let Err(e) = self
            .source
            .report_status_deploy(&package.package_hash, DeploymentStatus::Succeeded)
            .await
        {
            warn!("Failed to report install of {}: {}", package.label, e);
        }
        Ok(())
    }
}
