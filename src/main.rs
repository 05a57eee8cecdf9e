use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyshelf::blobstore::HttpBlobStore;
use studyshelf::notify::HttpMailer;
use studyshelf::{api, config::Config, storage::Database, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "studyshelf starting");

    // Load configuration
    let config = Config::load()?;

    // Initialize database
    let db = Database::open(&config.server.data_dir)?;
    info!("Database opened at: {}", config.server.data_dir);

    let timeout = Duration::from_secs(config.external.request_timeout_seconds);
    let blobs = HttpBlobStore::new(config.external.blob_store_url.clone(), timeout)?;
    let notifier = HttpMailer::new(config.external.mail_relay_url.clone(), timeout)?;

    let state = AppState {
        blobs: Arc::new(blobs),
        config: Arc::new(config.clone()),
        db,
        notifier: Arc::new(notifier),
    };

    // Build and start the HTTP server
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    info!("Listening on: {}", config.server.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
