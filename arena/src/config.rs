//! `arena serve` configuration.

use crate::logging::LogFormat;
use anyhow::{Context, Result};
use arena_core::{ArtifactFetchConfig, DEFAULT_MAX_BUNDLE_BYTES, UrlRewrite};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "arena.toml";

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root of the shared content volume
    #[serde(default = "default_content_root")]
    pub content_root: PathBuf,

    /// Bound on a single artifact download
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Largest artifact accepted, in bytes
    #[serde(default = "default_max_bundle_bytes")]
    pub max_bundle_bytes: u64,

    /// Artifact URL origin rewrites, first match wins
    #[serde(default = "default_url_rewrites")]
    pub url_rewrites: Vec<UrlRewrite>,

    /// Workspace name to Kubernetes namespace. Unlisted workspaces use
    /// their own name as namespace.
    #[serde(default)]
    pub workspace_namespaces: HashMap<String, String>,

    #[serde(default)]
    pub kube: KubeConfig,

    #[serde(default)]
    pub log_format: LogFormat,
}

/// Kubernetes API access.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KubeConfig {
    /// API server URL. Derived from `KUBERNETES_SERVICE_HOST`/`PORT` when unset.
    pub api_url: Option<String>,
    pub token_file: PathBuf,
    pub ca_file: PathBuf,
    pub source_group: String,
    pub source_version: String,
    pub source_plural: String,
}

impl Default for KubeConfig {
    fn default() -> Self {
        let sa = Path::new(SERVICE_ACCOUNT_DIR);
        Self {
            api_url: None,
            token_file: sa.join("token"),
            ca_file: sa.join("ca.crt"),
            source_group: "omnia.altairalabs.ai".to_string(),
            source_version: "v1alpha1".to_string(),
            source_plural: "arenasources".to_string(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_content_root() -> PathBuf {
    PathBuf::from("/workspace-content")
}

fn default_fetch_timeout_secs() -> u64 {
    arena_core::DEFAULT_FETCH_TIMEOUT.as_secs()
}

fn default_max_bundle_bytes() -> u64 {
    DEFAULT_MAX_BUNDLE_BYTES
}

fn default_url_rewrites() -> Vec<UrlRewrite> {
    vec![UrlRewrite::dev_to_cluster()]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            content_root: default_content_root(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_bundle_bytes: default_max_bundle_bytes(),
            url_rewrites: default_url_rewrites(),
            workspace_namespaces: HashMap::new(),
            kube: KubeConfig::default(),
            log_format: LogFormat::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from `path`, or from `arena.toml` in the current
    /// directory when present, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `ARENA_CONTENT_ROOT` and `ARENA_PORT` from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(root) = lookup("ARENA_CONTENT_ROOT") {
            self.content_root = PathBuf::from(root);
        }
        if let Some(port) = lookup("ARENA_PORT") {
            self.port = port
                .parse()
                .with_context(|| format!("Invalid ARENA_PORT: {}", port))?;
        }
        Ok(())
    }

    /// Get the full bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fetch_config(&self) -> ArtifactFetchConfig {
        ArtifactFetchConfig {
            timeout: Duration::from_secs(self.fetch_timeout_secs),
            rewrites: self.url_rewrites.clone(),
            max_bytes: self.max_bundle_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_toml_str("").unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.content_root, PathBuf::from("/workspace-content"));
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.url_rewrites, vec![UrlRewrite::dev_to_cluster()]);
        assert_eq!(config.kube.source_plural, "arenasources");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn test_toml_config_parsing() {
        let config = ServerConfig::from_toml_str(
            r#"
            host = "127.0.0.1"
            port = 9000
            content_root = "/data"
            fetch_timeout_secs = 3
            log_format = "json"

            [[url_rewrites]]
            from = "http://localhost:9999"
            to = "http://artifacts.internal"

            [workspace_namespaces]
            dev = "team-a"

            [kube]
            api_url = "https://kubernetes.default.svc"
            "#,
        )
        .unwrap();

        assert_eq!(config.bind_addr(), "127.0.0.1:9000");
        assert_eq!(config.content_root, PathBuf::from("/data"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.workspace_namespaces.get("dev").unwrap(), "team-a");
        assert_eq!(
            config.kube.api_url.as_deref(),
            Some("https://kubernetes.default.svc")
        );
        // Unset kube fields keep their defaults
        assert_eq!(config.kube.source_group, "omnia.altairalabs.ai");

        let fetch = config.fetch_config();
        assert_eq!(fetch.timeout, Duration::from_secs(3));
        assert_eq!(fetch.rewrites.len(), 1);
        assert_eq!(fetch.rewrites[0].to, "http://artifacts.internal");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ServerConfig::default();
        config
            .apply_overrides(|key| match key {
                "ARENA_CONTENT_ROOT" => Some("/mnt/content".to_string()),
                "ARENA_PORT" => Some("7070".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.content_root, PathBuf::from("/mnt/content"));
        assert_eq!(config.port, 7070);

        let err = config.apply_overrides(|key| {
            (key == "ARENA_PORT").then(|| "not-a-port".to_string())
        });
        assert!(err.is_err());
    }

    #[test]
    fn test_invalid_toml() {
        assert!(ServerConfig::from_toml_str("port = \"eighty\"").is_err());
    }
}
