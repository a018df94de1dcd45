//! Update resolution: decides whether a client should receive a bundle.

use ota_core::{UpdateDescriptor, UpdateQuery};
use tracing::{debug, instrument};

use crate::{error::UpdateServiceResult, registry::BundleRegistry};

#[derive(Clone)]
pub struct UpdateResolver {
    registry: BundleRegistry,
}

impl UpdateResolver {
    pub fn new(registry: BundleRegistry) -> Self {
        Self { registry }
    }

    /// Resolve a client query against the latest bundle of its exact key.
    ///
    /// Returns `None` when nothing is published for the key, or when the
    /// client reports the latest bundle's hash. There is no fallback to
    /// bundles published for other app versions.
    #[instrument(skip_all, fields(
        app_version = %query.app_version,
        platform = %query.platform,
        deployment_key = %query.deployment_key,
        current_package_hash = ?query.current_package_hash
    ))]
    pub async fn resolve(&self, query: &UpdateQuery) -> UpdateServiceResult<Option<UpdateDescriptor>> {
        let Some(latest) = self.registry.latest(&query.key()).await? else {
            debug!("No bundles published for {}", query.key());
            return Ok(None);
        };

        if query.current_package_hash.as_ref() == Some(&latest.content_hash) {
            debug!("Client already runs latest bundle {}", latest.id);
            return Ok(None);
        }

        debug!(
            "Offering bundle {} ({}) with hash {}",
            latest.id, latest.label, latest.content_hash
        );
        Ok(Some(UpdateDescriptor::from_record(&latest)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use be_storage::StorageService;
    use ota_core::{BundleRecord, ContentHash, Platform};

    use super::*;
    use crate::{registry::FailingStore, types::BundleUpload};

    fn query(hash: Option<&ContentHash>) -> UpdateQuery {
        UpdateQuery {
            app_version: "1.0.0".to_string(),
            platform: Platform::Android,
            deployment_key: "prod".to_string(),
            current_package_hash: hash.cloned(),
        }
    }

    async fn publish(registry: &BundleRegistry, bytes: &[u8], label: &str) -> BundleRecord {
        registry
            .put(
                BundleUpload::builder()
                    .app_version("1.0.0")
                    .platform(Platform::Android)
                    .deployment_key("prod")
                    .label(label)
                    .content(bytes.to_vec())
                    .build(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_registry_has_no_update() {
        let resolver = UpdateResolver::new(BundleRegistry::in_memory().unwrap());
        assert!(resolver.resolve(&query(None)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_first_run_is_offered_latest() {
        let registry = BundleRegistry::in_memory().unwrap();
        let x = publish(&registry, b"bundle x", "v1").await;
        let resolver = UpdateResolver::new(registry);

        let update = resolver.resolve(&query(None)).await.unwrap().unwrap();
        assert_eq!(update.package_hash, x.content_hash);
        assert_eq!(update.label, "v1");
        assert_eq!(update.download_url, format!("/api/download/{}", x.id));
        assert!(!update.is_mandatory);
        assert!(!update.update_app_version);
    }

    #[tokio::test]
    async fn test_current_hash_means_no_update() {
        let registry = BundleRegistry::in_memory().unwrap();
        let x = publish(&registry, b"bundle x", "v1").await;
        let resolver = UpdateResolver::new(registry);

        assert!(
            resolver
                .resolve(&query(Some(&x.content_hash)))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_newer_upload_is_offered_to_current_clients() {
        let registry = BundleRegistry::in_memory().unwrap();
        let x = publish(&registry, b"bundle x", "v1").await;
        let y = publish(&registry, b"bundle y", "v2").await;
        let resolver = UpdateResolver::new(registry);

        let update = resolver
            .resolve(&query(Some(&x.content_hash)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(update.package_hash, y.content_hash);
        assert_eq!(update.label, "v2");
    }

    #[tokio::test]
    async fn test_other_app_version_gets_nothing() {
        let registry = BundleRegistry::in_memory().unwrap();
        publish(&registry, b"bundle x", "v1").await;
        let resolver = UpdateResolver::new(registry);

        let mut q = query(None);
        q.app_version = "2.0.0".to_string();
        assert!(resolver.resolve(&q).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_policy_flags_come_from_the_record() {
        let registry = BundleRegistry::in_memory().unwrap();
        registry
            .put(
                BundleUpload::builder()
                    .app_version("1.0.0")
                    .platform(Platform::Android)
                    .deployment_key("prod")
                    .label("v9")
                    .is_mandatory(true)
                    .update_app_version(true)
                    .content(b"critical fix".to_vec())
                    .build(),
            )
            .await
            .unwrap();
        let resolver = UpdateResolver::new(registry);

        let update = resolver.resolve(&query(None)).await.unwrap().unwrap();
        assert!(update.is_mandatory);
        assert!(update.update_app_version);
    }

    #[tokio::test]
    async fn test_store_failure_is_surfaced() {
        let registry =
            BundleRegistry::new(Arc::new(FailingStore), StorageService::in_memory().unwrap());
        let resolver = UpdateResolver::new(registry);

        let err = resolver.resolve(&query(None)).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
