//! HTTP handlers for source versions and content.
//!
//! Every handler first looks the source up (the caller has already
//! authorized the request), then works on the source's directory under the
//! content volume. Blocking filesystem work runs on the blocking pool.

use crate::api::{ContentResponse, SwitchVersionResponse, VersionsResponse};
use crate::error::ApiError;
use crate::server::AppState;
use arena_core::{Error, FileContent, Source, VersionStore, build_tree, unavailable_error};
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Query of `GET .../content/file`
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    pub path: Option<String>,
}

/// A looked-up source and its base directory.
struct Located {
    source: Source,
    base: PathBuf,
}

async fn locate(state: &AppState, workspace: &str, name: &str) -> Result<Located, ApiError> {
    let namespace = state.namespace_for(workspace);
    let base = state.layout.source_path(workspace, namespace, name)?;

    let source = state
        .sources
        .get(namespace, name)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to look up source {}: {}", name, e)))?
        .ok_or_else(|| Error::source_not_found(name))?;

    Ok(Located { source, base })
}

/// Run filesystem work off the async executor.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> arena_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::internal(format!("blocking task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// Liveness probe
pub async fn healthz() -> &'static str {
    "ok"
}

/// `GET .../versions`
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path((workspace, name)): Path<(String, String)>,
) -> ApiResult<VersionsResponse> {
    let Located { source, base } = locate(&state, &workspace, &name).await?;

    let listing = blocking(move || {
        let store = VersionStore::new(&base);
        if !store.exists() {
            return Err(unavailable_error(&source, &base));
        }
        store.snapshot()
    })
    .await?;

    Ok(Json(VersionsResponse::new(name, listing)))
}

/// `POST .../versions` with body `{"version": "<hash>"}`
///
/// The body is parsed by hand so that every malformed body is a 400.
pub async fn switch_version(
    State(state): State<Arc<AppState>>,
    Path((workspace, name)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<SwitchVersionResponse> {
    let version = parse_version(&body)?;
    let Located { source, base } = locate(&state, &workspace, &name).await?;

    let switch = blocking(move || {
        let store = VersionStore::new(&base);
        if !store.exists() {
            return Err(unavailable_error(&source, &base));
        }
        store.switch_version(&version)
    })
    .await?;

    Ok(Json(SwitchVersionResponse::new(name, switch)))
}

fn parse_version(body: &[u8]) -> arena_core::Result<String> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| Error::invalid_input(format!("request body must be JSON: {}", e)))?;

    match value.get("version").and_then(serde_json::Value::as_str) {
        Some(version) if !version.is_empty() => Ok(version.to_string()),
        _ => Err(Error::invalid_input(
            "version is required and must be a non-empty string",
        )),
    }
}

/// `GET .../content`
pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path((workspace, name)): Path<(String, String)>,
) -> ApiResult<ContentResponse> {
    let Located { source, base } = locate(&state, &workspace, &name).await?;

    let resolved = state.resolver.resolve(&source, &base).await?;
    let tree = blocking(move || Ok(build_tree(&resolved.root))).await?;

    Ok(Json(ContentResponse::new(name, tree)))
}

/// `GET .../content/file?path=<relative path>`
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path((workspace, name)): Path<(String, String)>,
    Query(query): Query<FileQuery>,
) -> ApiResult<FileContent> {
    let path = query
        .path
        .ok_or_else(|| Error::invalid_input("path query parameter is required"))?;
    let Located { source, base } = locate(&state, &workspace, &name).await?;

    let file = state.resolver.resolve_file(&source, &base, &path).await?;
    Ok(Json(file))
}
