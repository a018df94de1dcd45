//! Over-the-air bundle update service
//!
//! Publishers upload versioned, platform-specific bundles; clients ask whether
//! a newer bundle exists for their (appVersion, platform, deploymentKey) and
//! download it by id.
//!
//! Routes:
//! - `POST /api/upload` multipart bundle upload
//! - `GET /api/update-check` update resolution
//! - `GET /api/download/{bundle_id}` bundle bytes
//! - `GET /api/health` liveness

use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::debug;

pub mod analytics;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod resolver;
pub mod service;
pub mod types;
pub mod utils;

use service::AppState;

/// Create the axum router
pub fn create_router(state: Arc<AppState>) -> Router {
    let body_limit = state.max_bundle_size();

    Router::new()
        .route("/api/upload", post(handlers::upload_handler))
        .route("/api/update-check", get(handlers::update_check_handler))
        .route("/api/download/{bundle_id}", get(handlers::download_handler))
        .route("/api/health", get(handlers::health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Initialize the update service over a registry and return the router
pub fn init_update_service(registry: BundleRegistry, max_bundle_size: usize) -> Router {
    debug!(
        "Initializing update service with {} blob storage, upload limit {} bytes",
        registry.storage().get_backend_name(),
        max_bundle_size
    );

    let state = Arc::new(
        AppState::builder()
            .registry(registry)
            .max_bundle_size(max_bundle_size)
            .build(),
    );

    create_router(state)
}

// Re-export commonly used types
pub use error::{ErrorResponse, UpdateServiceError, UpdateServiceResult};
pub use registry::{BundleRegistry, BundleStore, MemoryBundleStore};
pub use resolver::UpdateResolver;
pub use service::DEFAULT_MAX_BUNDLE_SIZE;
pub use types::{BundleUpload, UpdateCheckParams};
