//! Excel Mapper API Server implementation
//!
//! HTTP server using Axum. Hosts the template/source upload, mapping preview
//! and download endpoints over two in-memory record stores.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use super::handlers;
use crate::store::{MemoryStore, RecordStore};

/// API Server configuration
#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body, uploads included
    pub max_upload_bytes: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_upload_bytes: 25 * 1024 * 1024,
        }
    }
}

/// Shared application state.
///
/// The stores have no locking of their own; requests run on a multi-threaded
/// runtime, so each one sits behind an `RwLock`.
pub struct AppState {
    pub version: String,
    pub templates: RwLock<Box<dyn RecordStore>>,
    pub sources: RwLock<Box<dyn RecordStore>>,
}

impl AppState {
    pub fn new(templates: impl RecordStore + 'static, sources: impl RecordStore + 'static) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            templates: RwLock::new(Box::new(templates)),
            sources: RwLock::new(Box::new(sources)),
        }
    }

    /// Fresh, empty in-memory stores
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new(), MemoryStore::new())
    }
}

/// Build the router with all routes and middleware
pub fn build_router(state: Arc<AppState>, config: &ApiConfig) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/version", get(handlers::version))
        // Excel mapper endpoints
        .route("/excel/upload-template", post(handlers::upload_template))
        .route("/excel/upload-source", post(handlers::upload_source))
        .route("/excel/templates", get(handlers::list_templates))
        .route("/excel/sources", get(handlers::list_sources))
        .route("/excel/process-mapping", post(handlers::process_mapping))
        .route("/excel/download/:template_id", get(handlers::download_mapped_data))
        // State and middleware
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Run the API server
pub async fn run_api_server(config: ApiConfig) -> anyhow::Result<()> {
    // Initialize tracing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "excel_mapper=info,tower_http=info".into()),
        )
        .try_init();

    let state = Arc::new(AppState::in_memory());
    let app = build_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Excel Mapper API Server starting on http://{}", addr);
    info!("   Endpoints: /excel/upload-template, /excel/upload-source, /excel/process-mapping, /excel/download/:templateId");
    info!("   Health: /health, Version: /version");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Excel Mapper API Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping server...");
}
