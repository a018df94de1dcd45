use axum::http::HeaderValue;
use be_remote_db::DatabaseManager;
use be_storage::{StorageConfig, StorageService};
use be_update_service::{
    BundleRegistry, BundleStore, DEFAULT_MAX_BUNDLE_SIZE, MemoryBundleStore, init_update_service,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:3000";

/// Configuration for running the monolith server.
pub struct ServerConfig {
    /// Postgres URL for bundle metadata. Without one, metadata lives in memory.
    pub database_url: Option<String>,
    pub http_addr: SocketAddr,
    pub storage: StorageConfig,
    pub max_bundle_size: usize,
    /// When this receiver gets a value, the server shuts down gracefully.
    pub shutdown: tokio::sync::watch::Receiver<()>,
}

impl ServerConfig {
    /// Read `REMOTE_DATABASE_URL`, `HTTP_ADDR`, `MAX_BUNDLE_SIZE_BYTES` and the
    /// `BUNDLE_STORAGE_*` variables.
    pub fn from_env(
        shutdown: tokio::sync::watch::Receiver<()>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let http_addr = std::env::var("HTTP_ADDR")
            .unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| format!("Invalid HTTP_ADDR: {}", e))?;

        let max_bundle_size = match std::env::var("MAX_BUNDLE_SIZE_BYTES") {
            Ok(v) => v
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("Invalid MAX_BUNDLE_SIZE_BYTES: {}", e))?,
            Err(_) => DEFAULT_MAX_BUNDLE_SIZE,
        };

        Ok(Self {
            database_url: std::env::var("REMOTE_DATABASE_URL")
                .ok()
                .filter(|s| !s.is_empty()),
            http_addr,
            storage: StorageConfig::from_env()?,
            max_bundle_size,
            shutdown,
        })
    }
}

fn build_cors() -> CorsLayer {
    let Ok(origins) = std::env::var("CORS_ALLOWED_ORIGINS") else {
        return CorsLayer::permissive();
    };

    let allowed: Vec<HeaderValue> = origins
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<HeaderValue>().ok()
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

async fn build_store(
    database_url: Option<&str>,
) -> Result<Arc<dyn BundleStore>, Box<dyn std::error::Error + Send + Sync>> {
    match database_url {
        Some(url) => {
            let db_manager = DatabaseManager::new(url).await?;
            tracing::info!("Bundle metadata stored in Postgres");
            Ok(Arc::new(db_manager))
        }
        None => {
            tracing::warn!(
                "REMOTE_DATABASE_URL not set, bundle metadata is kept in memory and lost on restart"
            );
            Ok(Arc::new(MemoryBundleStore::new()))
        }
    }
}

pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if let Some(posthog_key) = std::env::var("POSTHOG_API_KEY")
        .ok()
        .filter(|s| !s.is_empty())
    {
        match posthog_rs::init_global(posthog_key.as_str()).await {
            Ok(()) => {
                be_update_service::analytics::enable();
                tracing::info!("PostHog analytics initialized");
            }
            Err(e) => tracing::warn!("Failed to initialize PostHog: {}", e),
        }
    } else {
        tracing::info!("POSTHOG_API_KEY not set, analytics disabled");
    }

    let store = build_store(config.database_url.as_deref()).await?;
    let storage = StorageService::builder().config(config.storage).build()?;
    tracing::info!("Bundle blobs stored on {}", storage.get_backend_name());

    let registry = BundleRegistry::new(store, storage);
    let http_router = init_update_service(registry, config.max_bundle_size).layer(build_cors());

    tracing::info!("Starting HTTP server at {}", config.http_addr);

    let mut http_shutdown = config.shutdown.clone();
    let http_listener = tokio::net::TcpListener::bind(config.http_addr).await?;
    axum::serve(
        http_listener,
        http_router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = http_shutdown.changed().await;
        tracing::info!("Shutting down HTTP server...");
    })
    .await
    .map_err(|e| {
        tracing::error!("HTTP server error: {}", e);
        e
    })?;

    Ok(())
}
