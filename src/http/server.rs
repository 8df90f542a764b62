//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the relay handler
//! - Wire up middleware (request ID, tracing)
//! - Build the shared origin client and transcoder once
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use axum::{body::Body, http::Request, routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{RelayConfig, TranscodeConfig};
use crate::http::assembler::relay_handler;
use crate::http::request::X_REQUEST_ID;
use crate::origin::OriginFetcher;
use crate::transcode::{SourceLimits, TranscodeEngine};

/// Application state injected into handlers.
///
/// Read-only for the lifetime of the server.
#[derive(Clone)]
pub struct AppState {
    pub fetcher: OriginFetcher,
    pub engine: TranscodeEngine,
    pub transcode: Arc<TranscodeConfig>,
}

impl AppState {
    pub fn from_config(config: &RelayConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            fetcher: OriginFetcher::new(&config.origin, &config.identity)?,
            engine: TranscodeEngine::new(
                config.transcode.animate,
                SourceLimits {
                    max_bytes: config.origin.max_source_bytes,
                    max_pixels: config.transcode.max_pixels,
                    idle_timeout: Duration::from_secs(config.origin.timeout_secs),
                },
            ),
            transcode: Arc::new(config.transcode.clone()),
        })
    }
}

/// HTTP server for the relay.
pub struct RelayServer {
    router: Router,
    config: RelayConfig,
}

impl RelayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, reqwest::Error> {
        let state = AppState::from_config(&config)?;
        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/", get(relay_handler))
            .route("/{*path}", get(relay_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(&X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "relay",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            animate = self.config.transcode.animate,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
