//! Content volume layout.

use crate::error::{Error, Result};
use std::path::PathBuf;

/// Directory under each workspace/namespace that holds source content.
const SOURCES_DIR: &str = "arena";

/// Maps sources to their base directory on the shared content volume.
///
/// Layout: `{root}/{workspace}/{namespace}/arena/{source}`
#[derive(Debug, Clone)]
pub struct ContentLayout {
    root: PathBuf,
}

impl ContentLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Base content directory for a source.
    pub fn source_path(&self, workspace: &str, namespace: &str, source: &str) -> Result<PathBuf> {
        validate_component("workspace", workspace)?;
        validate_component("namespace", namespace)?;
        validate_component("source name", source)?;

        Ok(self
            .root
            .join(workspace)
            .join(namespace)
            .join(SOURCES_DIR)
            .join(source))
    }
}

/// Validate a value used as a single path component.
pub(crate) fn validate_component(kind: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_input(format!("{} cannot be empty", kind)));
    }

    // No path traversal, no hidden names
    if value.starts_with('.')
        || value.contains('/')
        || value.contains('\\')
        || value.contains('\0')
    {
        return Err(Error::invalid_input(format!(
            "Invalid {}: {} (must not start with '.' or contain path separators)",
            kind, value
        )));
    }

    Ok(())
}
