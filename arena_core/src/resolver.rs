//! Backend fallback for source content.
//!
//! Backends are consulted in a fixed order: the referenced ConfigMap, then the
//! remote artifact bundle, then the version directories on the content volume.
//! The first backend that yields content wins. A failing backend is logged
//! and skipped; it never fails the request by itself.

use crate::archive::extract_bundle;
use crate::content::{
    ContentOrigin, ContentRoot, FileContent, ResolvedContent, normalize_relative_path,
};
use crate::error::{Error, Result};
use crate::source::{ArtifactFetcher, ConfigMapFetcher, READY_PHASE, Source};
use crate::version::VersionStore;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of consulting a single backend.
#[derive(Debug)]
pub enum Resolution {
    /// The backend produced content.
    Found(ResolvedContent),
    /// The backend is not configured or holds nothing.
    Skipped,
    /// The backend is configured but failed.
    Failed(Error),
}

/// Chooses the content root for a source.
#[derive(Clone)]
pub struct ContentResolver {
    configmaps: Arc<dyn ConfigMapFetcher>,
    artifacts: Arc<dyn ArtifactFetcher>,
}

impl ContentResolver {
    pub fn new(configmaps: Arc<dyn ConfigMapFetcher>, artifacts: Arc<dyn ArtifactFetcher>) -> Self {
        Self {
            configmaps,
            artifacts,
        }
    }

    /// Resolve the content root of `source`, whose volume directory is `base`.
    pub async fn resolve(&self, source: &Source, base: &Path) -> Result<ResolvedContent> {
        for origin in [
            ContentOrigin::ConfigMap,
            ContentOrigin::Artifact,
            ContentOrigin::Filesystem,
        ] {
            let resolution = match origin {
                ContentOrigin::ConfigMap => self.from_configmap(source).await,
                ContentOrigin::Artifact => self.from_artifact(source).await,
                ContentOrigin::Filesystem => from_filesystem(base),
            };

            match resolution {
                Resolution::Found(content) => {
                    info!(
                        source = source.name(),
                        namespace = source.namespace(),
                        origin = %origin,
                        "resolved content"
                    );
                    return Ok(content);
                }
                Resolution::Skipped => {
                    debug!(source = source.name(), origin = %origin, "backend has no content");
                }
                Resolution::Failed(err) => {
                    warn!(
                        source = source.name(),
                        namespace = source.namespace(),
                        origin = %origin,
                        error = %err,
                        "backend failed, trying next"
                    );
                }
            }
        }

        Err(unavailable_error(source, base))
    }

    /// Resolve `source` and read one file from the winning root.
    pub async fn resolve_file(
        &self,
        source: &Source,
        base: &Path,
        path: &str,
    ) -> Result<FileContent> {
        let path = normalize_relative_path(path)?;
        let resolved = self.resolve(source, base).await?;

        match resolved.root.read_file(&path)? {
            Some(raw) => Ok(FileContent::new(path, &raw)),
            None => Err(Error::file_not_found(path)),
        }
    }

    async fn from_configmap(&self, source: &Source) -> Resolution {
        let Some(name) = source.config_map_name() else {
            return Resolution::Skipped;
        };

        match self.configmaps.fetch(source.namespace(), name).await {
            Ok(Some(files)) if !files.is_empty() => Resolution::Found(ResolvedContent::new(
                ContentOrigin::ConfigMap,
                ContentRoot::Files(files),
            )),
            Ok(_) => Resolution::Skipped,
            Err(err) => Resolution::Failed(err),
        }
    }

    async fn from_artifact(&self, source: &Source) -> Resolution {
        let Some(url) = source.artifact_url() else {
            return Resolution::Skipped;
        };

        let bytes = match self.artifacts.fetch(url).await {
            Ok(bytes) => bytes,
            Err(err) => return Resolution::Failed(err),
        };

        match extract_bundle(&bytes) {
            Ok(files) if files.is_empty() => Resolution::Skipped,
            Ok(files) => Resolution::Found(ResolvedContent::new(
                ContentOrigin::Artifact,
                ContentRoot::Files(files),
            )),
            Err(err) => Resolution::Failed(err),
        }
    }
}

/// Consult only the content volume.
fn from_filesystem(base: &Path) -> Resolution {
    if !base.is_dir() {
        return Resolution::Skipped;
    }

    let dir = VersionStore::new(base).resolve_content_dir();
    match has_visible_entries(&dir) {
        Ok(true) => Resolution::Found(ResolvedContent::new(
            ContentOrigin::Filesystem,
            ContentRoot::Directory(dir),
        )),
        Ok(false) => Resolution::Skipped,
        Err(err) => Resolution::Failed(err.into()),
    }
}

fn has_visible_entries(dir: &Path) -> std::io::Result<bool> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_name().to_string_lossy().starts_with('.') {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Error reported when no backend produced content for `source`.
pub fn unavailable_error(source: &Source, base: &Path) -> Error {
    if base.is_dir() {
        return Error::no_content(source.name());
    }

    match source.phase() {
        Some(phase) if phase != READY_PHASE => Error::not_ready(source.name(), phase),
        _ => Error::source_not_synced(source.name()),
    }
}

/// Resolve content from the volume alone, for callers with no Source at hand.
pub fn resolve_local(base: &Path, name: &str) -> Result<ResolvedContent> {
    match from_filesystem(base) {
        Resolution::Found(content) => Ok(content),
        Resolution::Failed(err) => Err(err),
        Resolution::Skipped if base.is_dir() => Err(Error::no_content(name)),
        Resolution::Skipped => Err(Error::source_not_synced(name)),
    }
}
