//! Web server implementation

use crate::config::WebServerConfig;
use crate::forwarded::ProxyHeaders;
use crate::puppetdb::{client_for, PuppetDbClient};
use crate::static_files::StaticFiles;
use crate::templates::Templates;
use crate::views;
use axum::{
    extract::{FromRef, Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use orgahome_common::StaticResolver;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<WebServerState>,
}

pub struct WebServerState {
    pub config: WebServerConfig,
    pub templates: Templates,
    /// Static file handler
    pub static_files: StaticFiles,
    pub puppetdb: Arc<dyn PuppetDbClient>,
}

impl FromRef<Arc<WebServerState>> for ProxyHeaders {
    fn from_ref(state: &Arc<WebServerState>) -> Self {
        ProxyHeaders {
            trusted: state.config.behind_nginx,
        }
    }
}

pub async fn serve(addr: SocketAddr, cfg: WebServerConfig) -> anyhow::Result<()> {
    let server = WebServer::new(cfg)?;
    server.serve(addr).await
}

impl WebServer {
    /// Create a new web server.
    ///
    /// Fails when the static manifest or the PuppetDB fixture cannot be
    /// loaded, so a broken deployment never starts serving.
    pub fn new(cfg: WebServerConfig) -> anyhow::Result<Self> {
        let resolver = cfg.resolver()?;
        let puppetdb = client_for(&cfg.puppetdb)?;
        info!(
            "Static files: {} mode, serving from {:?}",
            resolver.mode(),
            resolver.serving_directories()
        );
        Ok(Self::with_parts(cfg, resolver, puppetdb))
    }

    /// Assemble a server from already-built components
    pub fn with_parts(
        cfg: WebServerConfig,
        resolver: Arc<dyn StaticResolver>,
        puppetdb: Arc<dyn PuppetDbClient>,
    ) -> Self {
        Self {
            state: Arc::new(WebServerState {
                templates: Templates::new(resolver.clone(), cfg.static_prefix()),
                static_files: StaticFiles::new(resolver),
                puppetdb,
                config: cfg,
            }),
        }
    }

    pub fn config(&self) -> &WebServerConfig {
        &self.state.config
    }

    /// Create router
    pub fn router(&self) -> Router {
        let static_route = format!("{}/*path", self.state.config.static_prefix());

        Router::new()
            .route("/", get(views::home_handler))
            .route("/machines", get(views::machines_handler))
            .route("/healthz", get(health_handler))
            .route(&static_route, get(static_handler))
            .fallback(not_found_handler)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Start the web server and run until Ctrl-C
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!("orgahome listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("orgahome shutdown complete");
        Ok(())
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => {
            warn!("Cannot listen for Ctrl-C, graceful shutdown disabled: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "orgahome"
    }))
}

async fn static_handler(
    State(state): State<Arc<WebServerState>>,
    Path(path): Path<String>,
    request: Request,
) -> Response {
    state.static_files.serve(&path, request).await
}

async fn not_found_handler() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not found")
}
