//! Router, shared state and the `serve` entry point.

use crate::config::ServerConfig;
use crate::handlers;
use crate::kube::KubeClient;
use anyhow::{Context, Result};
use arena_core::{
    ArtifactFetcher, ConfigMapFetcher, ContentLayout, ContentResolver, HttpArtifactFetcher,
    SourceLookup,
};
use axum::Router;
use axum::routing::get;
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
pub struct AppState {
    pub layout: ContentLayout,
    pub sources: Arc<dyn SourceLookup>,
    pub resolver: ContentResolver,
    workspace_namespaces: HashMap<String, String>,
}

impl AppState {
    pub fn new(
        layout: ContentLayout,
        sources: Arc<dyn SourceLookup>,
        configmaps: Arc<dyn ConfigMapFetcher>,
        artifacts: Arc<dyn ArtifactFetcher>,
    ) -> Self {
        Self {
            layout,
            sources,
            resolver: ContentResolver::new(configmaps, artifacts),
            workspace_namespaces: HashMap::new(),
        }
    }

    pub fn with_workspace_namespaces(mut self, namespaces: HashMap<String, String>) -> Self {
        self.workspace_namespaces = namespaces;
        self
    }

    /// Kubernetes namespace backing a workspace.
    pub fn namespace_for<'a>(&'a self, workspace: &'a str) -> &'a str {
        self.workspace_namespaces
            .get(workspace)
            .map(String::as_str)
            .unwrap_or(workspace)
    }
}

/// Create the axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/api/workspaces/:workspace/arena/sources/:name/versions",
            get(handlers::list_versions).post(handlers::switch_version),
        )
        .route(
            "/api/workspaces/:workspace/arena/sources/:name/content",
            get(handlers::get_content),
        )
        .route(
            "/api/workspaces/:workspace/arena/sources/:name/content/file",
            get(handlers::get_file),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Build the Kubernetes-backed state for `config`.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let kube = Arc::new(KubeClient::from_config(&config.kube)?);
    let artifacts = Arc::new(
        HttpArtifactFetcher::new(config.fetch_config())
            .context("Failed to build artifact fetcher")?,
    );

    Ok(AppState::new(
        ContentLayout::new(&config.content_root),
        kube.clone(),
        kube,
        artifacts,
    )
    .with_workspace_namespaces(config.workspace_namespaces.clone()))
}

/// Serve until interrupted.
pub async fn run(config: ServerConfig) -> Result<()> {
    tracing::info!(
        content_root = %config.content_root.display(),
        fetch_timeout_secs = config.fetch_timeout_secs,
        "server configuration loaded"
    );

    let state = Arc::new(build_state(&config)?);
    let app = create_router(state);

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("arena listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("arena stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
