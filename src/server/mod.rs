//! Server module
//!
//! axum router over the poll engine, plus startup and graceful shutdown.

pub mod connect_info;
pub mod error;
pub mod extract;
pub mod routes;

use crate::config::{Config, DatabaseConfig, ServerConfig};
use crate::migrations::{MigrationError, MigrationRunner};
use crate::polls::{MemoryPollStore, PollEngine, PollStore, SqlitePollStore, StoreError};
use axum::{
    extract::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

use routes::{create_poll_handler, get_poll_handler, health_handler, vote_handler};

/// Shared handler state
#[derive(Debug, Clone)]
pub struct AppState {
    pub engine: PollEngine,
}

impl AppState {
    pub fn new(engine: PollEngine) -> Arc<Self> {
        Arc::new(Self { engine })
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to open poll store: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to migrate database: {0}")]
    Migration(#[from] MigrationError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the HTTP router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/create-poll", post(create_poll_handler))
        .route("/poll/{poll_id}", get(get_poll_handler))
        .route("/vote/{poll_id}", post(vote_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "HTTP request"
    );
    response
}

/// Open the configured store. SQLite databases are migrated before use.
pub async fn open_store(config: &DatabaseConfig) -> Result<Arc<dyn PollStore>, ServerError> {
    if config.is_memory() {
        info!("Using in-process poll store; data is lost on exit");
        return Ok(Arc::new(MemoryPollStore::new()));
    }

    let store = SqlitePollStore::connect(&config.url, config.max_connections).await?;
    MigrationRunner::new(store.pool().clone())
        .run_migrations()
        .await?;
    Ok(Arc::new(store))
}

/// Open the store and build the engine from a full configuration
pub async fn build_engine(config: &Config) -> Result<PollEngine, ServerError> {
    let store = open_store(&config.database).await?;
    Ok(PollEngine::new(store, config.polls.clone()))
}

/// Serve until Ctrl+C or SIGTERM
pub async fn serve(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let address = config.address();
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| ServerError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("Server running on {address}");

    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

/// Load everything from `config` and serve
pub async fn start(config: &Config) -> Result<(), ServerError> {
    info!("Initializing state...");
    let engine = build_engine(config).await?;
    serve(&config.server, AppState::new(engine)).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
