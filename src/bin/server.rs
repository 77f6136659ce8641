//! Recipebox Sync Server
//!
//! Reference remote store for Recipebox: keeps the latest snapshot of every
//! shared collection and the uploaded hero images.
//!
//! # Configuration
//!
//! Environment variables:
//! - `RECIPEBOX_PORT`: Port to listen on (default: 8080)
//! - `RECIPEBOX_SERVER_DATA_DIR`: Directory to store collections and images
//!   (default: ~/.local/share/recipebox-server)
//! - `RECIPEBOX_PUBLIC_URL`: Base URL clients use to reach the server, used in
//!   image URLs (default: http://localhost:<port>)
//! - `RECIPEBOX_API_KEYS`: Comma separated list of accepted API keys

use recipebox::server::{router, ApiKeyStore, AppState, ServerStorage};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Directory to store collections and images
    data_dir: PathBuf,
    /// Base URL for image links
    public_url: String,
    /// Accepted API keys
    api_keys: ApiKeyStore,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("RECIPEBOX_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("RECIPEBOX_SERVER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("recipebox-server")
            });

        let public_url = std::env::var("RECIPEBOX_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        let api_keys = std::env::var("RECIPEBOX_API_KEYS")
            .map(|list| ApiKeyStore::from_list(&list))
            .unwrap_or_default();

        Self {
            port,
            data_dir,
            public_url,
            api_keys,
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recipebox=info,recipebox_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    // Ensure data directory exists
    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Public URL: {}", config.public_url);
    if config.api_keys.is_empty() {
        tracing::warn!("No API keys configured - all authenticated requests will fail");
    } else {
        tracing::info!("Loaded {} API key(s)", config.api_keys.len());
    }

    let state = AppState::new(
        ServerStorage::new(config.data_dir),
        config.api_keys,
        &config.public_url,
    );
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
