//! Whereizit Sync Server
//!
//! Serves the remote document store, blob store, and identity provider
//! that Whereizit clients talk to: JSON documents with live change
//! subscriptions over WebSocket, photo blobs, and API-key accounts.
//!
//! # Configuration
//!
//! Environment variables:
//! - `WHEREIZIT_PORT`: Port to listen on (default: 8080)
//! - `WHEREIZIT_DATA_DIR`: Directory to store documents, blobs, and
//!   accounts (default: ~/.local/share/whereizit-server)
//!
//! # Endpoints
//!
//! - `GET /health`: Health check (no auth)
//! - `POST /users`: Register an account, returns its API key (no auth)
//! - `GET /me`, `DELETE /me`: Current account (auth required)
//! - `/collections/{collection}/documents[/{id}]`: Document CRUD and
//!   one-shot `uploadUser` queries (auth required)
//! - `POST /blobs`, `GET|DELETE /blobs/{name}`: Photo blobs (auth
//!   required)
//! - `GET /ws?key=...`: Live change subscription

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use whereizit::server::{router, AccountStore, AppState, BlobStore, ChangeHub, DocumentStore};

/// Server configuration
#[derive(Debug, Clone)]
struct Config {
    /// Port to listen on
    port: u16,
    /// Directory to store documents, blobs, and accounts
    data_dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Self {
        let port = std::env::var("WHEREIZIT_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("WHEREIZIT_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("whereizit-server")
            });

        Self { port, data_dir }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "whereizit_server=info,whereizit=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Data directory: {}", config.data_dir.display());

    let state = AppState {
        documents: Arc::new(Mutex::new(DocumentStore::new(&config.data_dir))),
        hub: Arc::new(ChangeHub::new()),
        accounts: Arc::new(RwLock::new(AccountStore::load(&config.data_dir))),
        blobs: Arc::new(BlobStore::new(&config.data_dir)),
    };

    let app = router(state).layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
