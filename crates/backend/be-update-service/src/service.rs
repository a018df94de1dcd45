//! Shared state behind the update service router

use bon::bon;

use crate::{registry::BundleRegistry, resolver::UpdateResolver};

/// Default upload limit: 100 MiB
pub const DEFAULT_MAX_BUNDLE_SIZE: usize = 100 * 1024 * 1024;

/// Application state containing the bundle registry and resolver
#[derive(Clone)]
pub struct AppState {
    registry: BundleRegistry,
    resolver: UpdateResolver,
    max_bundle_size: usize,
}

#[bon]
impl AppState {
    #[builder]
    pub fn new(
        registry: BundleRegistry,
        #[builder(default = DEFAULT_MAX_BUNDLE_SIZE)] max_bundle_size: usize,
    ) -> Self {
        Self {
            resolver: UpdateResolver::new(registry.clone()),
            registry,
            max_bundle_size,
        }
    }

    pub fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &UpdateResolver {
        &self.resolver
    }

    pub fn max_bundle_size(&self) -> usize {
        self.max_bundle_size
    }
}
