//! Source resources and the collaborators that look them up.
//!
//! A [`Source`] mirrors the custom resource written by the sync controller.
//! This crate never writes sources; it only reads `spec` to pick a backend and
//! `status` to find the most recent artifact.

use crate::content::FileMap;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase reported by a source whose backend has produced content.
pub const READY_PHASE: &str = "Ready";

/// Origin a source is synced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Git,
    S3,
    Oci,
    Configmap,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
}

/// Reference to a ConfigMap in the source's namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapReference {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map: Option<ConfigMapReference>,
    // Origin specific settings are owned by the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oci: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,
}

/// Description of the most recently produced remote bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A named, namespaced content origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub metadata: SourceMetadata,
    pub spec: SourceSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SourceStatus>,
}

impl Source {
    /// Create a source with the given origin and no status.
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        source_type: SourceType,
    ) -> Self {
        Self {
            metadata: SourceMetadata {
                name: name.into(),
                namespace: namespace.into(),
            },
            spec: SourceSpec {
                source_type,
                config_map: None,
                git: None,
                s3: None,
                oci: None,
                interval: None,
            },
            status: None,
        }
    }

    /// Point the source at a ConfigMap.
    pub fn with_config_map(mut self, name: impl Into<String>) -> Self {
        self.spec.config_map = Some(ConfigMapReference { name: name.into() });
        self
    }

    /// Set the reported phase.
    pub fn with_phase(mut self, phase: impl Into<String>) -> Self {
        self.status.get_or_insert_with(SourceStatus::default).phase = Some(phase.into());
        self
    }

    /// Set the artifact URL.
    pub fn with_artifact_url(mut self, url: impl Into<String>) -> Self {
        self.status
            .get_or_insert_with(SourceStatus::default)
            .artifact
            .get_or_insert_with(Artifact::default)
            .url = Some(url.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn phase(&self) -> Option<&str> {
        self.status.as_ref()?.phase.as_deref()
    }

    pub fn artifact(&self) -> Option<&Artifact> {
        self.status.as_ref()?.artifact.as_ref()
    }

    /// URL of the remote bundle, if the controller produced one.
    pub fn artifact_url(&self) -> Option<&str> {
        self.artifact()?.url.as_deref().filter(|url| !url.is_empty())
    }

    /// Name of the referenced ConfigMap, if any.
    pub fn config_map_name(&self) -> Option<&str> {
        self.spec
            .config_map
            .as_ref()
            .map(|c| c.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// Looks up sources by name. Callers have already checked authorization.
#[async_trait]
pub trait SourceLookup: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Source>>;
}

/// Fetches the key/value data of a ConfigMap.
///
/// `Ok(None)` means the ConfigMap does not exist.
#[async_trait]
pub trait ConfigMapFetcher: Send + Sync {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<FileMap>>;
}

/// Downloads the raw bytes of a remote bundle.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_custom_resource() {
        let json = r#"{
            "apiVersion": "omnia.altairalabs.ai/v1alpha1",
            "kind": "ArenaSource",
            "metadata": {"name": "prompts", "namespace": "team-a", "uid": "123"},
            "spec": {"type": "git", "git": {"url": "https://example.com/repo.git"}, "interval": "5m"},
            "status": {
                "phase": "Ready",
                "artifact": {
                    "url": "http://localhost:8082/arena/prompts.tar.gz",
                    "checksum": "sha256:abc",
                    "revision": "main@sha1:deadbeef",
                    "lastUpdateTime": "2025-01-01T00:00:00Z",
                    "size": 1024
                }
            }
        }"#;

        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.name(), "prompts");
        assert_eq!(source.namespace(), "team-a");
        assert_eq!(source.spec.source_type, SourceType::Git);
        assert_eq!(source.phase(), Some(READY_PHASE));
        assert_eq!(
            source.artifact_url(),
            Some("http://localhost:8082/arena/prompts.tar.gz")
        );
        assert_eq!(source.artifact().unwrap().size, Some(1024));
        assert_eq!(source.config_map_name(), None);
    }

    #[test]
    fn test_deserialize_configmap_source_without_status() {
        let json = r#"{
            "metadata": {"name": "inline"},
            "spec": {"type": "configmap", "configMap": {"name": "inline-files"}}
        }"#;

        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.spec.source_type, SourceType::Configmap);
        assert_eq!(source.config_map_name(), Some("inline-files"));
        assert_eq!(source.phase(), None);
        assert_eq!(source.artifact_url(), None);
    }

    #[test]
    fn test_empty_artifact_url_is_absent() {
        let source = Source::new("ns", "s", SourceType::S3).with_artifact_url("");
        assert_eq!(source.artifact_url(), None);
    }
}
