use dotenv::dotenv;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error reporting is only wired up for release builds with a DSN configured.
fn init_sentry() -> Option<sentry::ClientInitGuard> {
    if cfg!(debug_assertions) {
        return None;
    }

    let dsn = std::env::var("SENTRY_MONOLITH_DSN")
        .ok()
        .filter(|s| !s.is_empty())?;
    let debug = std::env::var("SENTRY_DEBUG").is_ok_and(|v| v.eq_ignore_ascii_case("true"));

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 0.0,
            send_default_pii: false,
            debug,
            ..Default::default()
        },
    )))
}

fn init_tracing() -> Result<(), BoxError> {
    let level = if cfg!(debug_assertions) {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    let targets = Targets::new()
        .with_default(LevelFilter::WARN)
        .with_target("be_monolith", level)
        .with_target("be_update_service", level)
        .with_target("be_storage", level)
        .with_target("be_remote_db", level)
        .with_target("tower_http", level)
        .with_target("hyper", LevelFilter::OFF)
        .with_target("tokio", LevelFilter::OFF);

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(sentry::integrations::tracing::layer())
        .with(targets)
        .try_init()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    dotenv().ok();
    let _sentry = init_sentry();
    init_tracing()?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Received CTRL+C, shutting down"),
            Err(e) => tracing::error!("Cannot listen for CTRL+C, shutting down: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    let config = be_monolith::ServerConfig::from_env(shutdown_rx)?;
    be_monolith::run_server(config).await
}
