//! Kubernetes API access for sources and ConfigMaps.
//!
//! Only two read-only GETs are needed, so this talks to the API server
//! directly with the pod's service account instead of pulling in a full
//! client.

use crate::config::KubeConfig;
use anyhow::Context;
use arena_core::{ConfigMapFetcher, Error, FileMap, Result, Source, SourceLookup};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Group/version/plural of the source custom resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceApi {
    pub group: String,
    pub version: String,
    pub plural: String,
}

impl SourceApi {
    fn path(&self, namespace: &str, name: &str) -> String {
        format!(
            "/apis/{}/{}/namespaces/{}/{}/{}",
            self.group, self.version, namespace, self.plural, name
        )
    }
}

/// The parts of a ConfigMap this crate reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapResource {
    #[serde(default)]
    pub data: BTreeMap<String, String>,
    /// Base64 encoded values.
    #[serde(default)]
    pub binary_data: BTreeMap<String, String>,
}

impl ConfigMapResource {
    /// Flatten into a file map, `data` keys first.
    pub fn into_files(self) -> Result<FileMap> {
        let mut files = FileMap::new();

        for (key, value) in self.data {
            files.insert(key, value);
        }

        for (key, value) in self.binary_data {
            let bytes = STANDARD.decode(value.as_bytes()).map_err(|e| {
                Error::upstream(format!("invalid binaryData for key {}: {}", key, e))
            })?;
            files.insert(key, bytes);
        }

        Ok(files)
    }
}

/// Read-only Kubernetes API client.
#[derive(Debug, Clone)]
pub struct KubeClient {
    client: reqwest::Client,
    api_url: String,
    token: Option<String>,
    sources: SourceApi,
}

impl KubeClient {
    pub fn new(
        api_url: impl Into<String>,
        token: Option<String>,
        ca_pem: Option<&[u8]>,
        sources: SourceApi,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if let Some(pem) = ca_pem {
            builder = builder.add_root_certificate(reqwest::Certificate::from_pem(pem)?);
        }

        Ok(Self {
            client: builder.build()?,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token,
            sources,
        })
    }

    /// Build a client from configuration and the pod's service account.
    ///
    /// A missing token or CA file is tolerated so the server can run against
    /// an unauthenticated local proxy.
    pub fn from_config(config: &KubeConfig) -> anyhow::Result<Self> {
        let api_url = match &config.api_url {
            Some(url) => url.clone(),
            None => {
                let host = std::env::var("KUBERNETES_SERVICE_HOST")
                    .context("kube.api_url is unset and KUBERNETES_SERVICE_HOST is not set")?;
                let port =
                    std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
                format!("https://{}:{}", host, port)
            }
        };

        let token = match std::fs::read_to_string(&config.token_file) {
            Ok(token) => Some(token.trim().to_string()),
            Err(err) => {
                debug!(path = %config.token_file.display(), error = %err, "no service account token");
                None
            }
        };

        let ca_pem = match std::fs::read(&config.ca_file) {
            Ok(pem) => Some(pem),
            Err(err) => {
                debug!(path = %config.ca_file.display(), error = %err, "no service account CA");
                None
            }
        };

        let sources = SourceApi {
            group: config.source_group.clone(),
            version: config.source_version.clone(),
            plural: config.source_plural.clone(),
        };

        Self::new(api_url, token, ca_pem.as_deref(), sources)
            .context("Failed to build Kubernetes API client")
    }

    /// GET `path` and decode the body. A 404 is `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.api_url, path);

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(Error::upstream(format!(
                "Kubernetes API GET {} returned {}",
                path, status
            )));
        }

        Ok(Some(response.json().await?))
    }
}

#[async_trait]
impl SourceLookup for KubeClient {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Source>> {
        self.get_json(&self.sources.path(namespace, name)).await
    }
}

#[async_trait]
impl ConfigMapFetcher for KubeClient {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<FileMap>> {
        let path = format!("/api/v1/namespaces/{}/configmaps/{}", namespace, name);

        match self.get_json::<ConfigMapResource>(&path).await? {
            Some(resource) => Ok(Some(resource.into_files()?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::extract::Path;
    use axum::http::HeaderMap;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use serde_json::json;

    const TOKEN: &str = "test-token";

    fn default_api() -> SourceApi {
        SourceApi {
            group: "omnia.altairalabs.ai".to_string(),
            version: "v1alpha1".to_string(),
            plural: "arenasources".to_string(),
        }
    }

    fn authorized(headers: &HeaderMap) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == format!("Bearer {}", TOKEN))
    }

    async fn configmap(Path((ns, name)): Path<(String, String)>, headers: HeaderMap) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        match (ns.as_str(), name.as_str()) {
            ("team-a", "inline") => axum::Json(json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {"name": "inline", "namespace": "team-a"},
                "data": {"config.yaml": "kind: Arena"},
                "binaryData": {"logo.bin": "AAEC"}
            }))
            .into_response(),
            _ => (StatusCode::NOT_FOUND, axum::Json(json!({"kind": "Status", "code": 404})))
                .into_response(),
        }
    }

    async fn source(
        Path((ns, name)): Path<(String, String)>,
        headers: HeaderMap,
    ) -> Response {
        if !authorized(&headers) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if ns == "team-a" && name == "prompts" {
            axum::Json(json!({
                "metadata": {"name": "prompts", "namespace": "team-a"},
                "spec": {"type": "configmap", "configMap": {"name": "inline"}},
                "status": {"phase": "Ready"}
            }))
            .into_response()
        } else {
            StatusCode::NOT_FOUND.into_response()
        }
    }

    async fn fake_api_server() -> String {
        let router = Router::new()
            .route("/api/v1/namespaces/:ns/configmaps/:name", get(configmap))
            .route(
                "/apis/omnia.altairalabs.ai/v1alpha1/namespaces/:ns/arenasources/:name",
                get(source),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_configmap_into_files() {
        let resource: ConfigMapResource = serde_json::from_value(json!({
            "data": {"b.yaml": "b", "a.yaml": "a"},
            "binaryData": {"blob.bin": "aGVsbG8="}
        }))
        .unwrap();

        let files = resource.into_files().unwrap();
        let paths: Vec<&str> = files.iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["a.yaml", "b.yaml", "blob.bin"]);
        assert_eq!(files.get("blob.bin"), Some(&b"hello"[..]));
    }

    #[test]
    fn test_configmap_invalid_binary_data() {
        let resource = ConfigMapResource {
            data: BTreeMap::new(),
            binary_data: BTreeMap::from([("x".to_string(), "!!!".to_string())]),
        };
        assert!(matches!(
            resource.into_files(),
            Err(Error::Upstream { .. })
        ));
    }

    #[test]
    fn test_source_path() {
        assert_eq!(
            default_api().path("team-a", "prompts"),
            "/apis/omnia.altairalabs.ai/v1alpha1/namespaces/team-a/arenasources/prompts"
        );
    }

    #[tokio::test]
    async fn test_fetch_configmap() {
        let base = fake_api_server().await;
        let client = KubeClient::new(base, Some(TOKEN.to_string()), None, default_api()).unwrap();

        let files = ConfigMapFetcher::fetch(&client, "team-a", "inline")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(files.get("config.yaml"), Some(&b"kind: Arena"[..]));
        assert_eq!(files.get("logo.bin"), Some(&[0u8, 1, 2][..]));

        let missing = ConfigMapFetcher::fetch(&client, "team-a", "other").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_get_source() {
        let base = fake_api_server().await;
        let client = KubeClient::new(base, Some(TOKEN.to_string()), None, default_api()).unwrap();

        let source = client.get("team-a", "prompts").await.unwrap().unwrap();
        assert_eq!(source.config_map_name(), Some("inline"));
        assert_eq!(source.phase(), Some("Ready"));

        assert!(client.get("team-a", "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unauthorized_is_upstream_error() {
        let base = fake_api_server().await;
        let client = KubeClient::new(base, None, None, default_api()).unwrap();

        let err = client.get("team-a", "prompts").await.unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }
}
