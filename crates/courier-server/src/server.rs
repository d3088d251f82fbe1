use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use courier_broker::Broker;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{bayeux_handler, health_handler};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Route that accepts envelope batches.
    pub path: String,
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            path: "/bayeux".to_string(),
            max_body_bytes: 1024 * 1024,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<Broker>,
}

/// Build the Axum router with all routes.
pub fn build_router(config: &ServerConfig, state: AppState) -> Router {
    Router::new()
        .route(&config.path, post(bayeux_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind the listener and start serving. Returns a handle to shut it down.
pub async fn start(config: ServerConfig, broker: Arc<Broker>) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(&config, AppState { broker });

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(addr = %local_addr, path = %config.path, "courier server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await;
        if let Err(err) = result {
            tracing::error!(error = %err, "server exited with error");
        }
    });

    Ok(ServerHandle {
        addr: local_addr,
        shutdown_tx: Some(shutdown_tx),
        server,
    })
}

/// Handle returned by `start()`; dropping it leaves the server running.
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting connections and wait for in-flight requests, parked
    /// connects included, to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.server).await {
            tracing::warn!(error = %err, "server task did not finish cleanly");
        }
        tracing::info!(addr = %self.addr, "courier server stopped");
    }
}
