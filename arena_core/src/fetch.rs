//! HTTP artifact fetcher.

use crate::error::{Error, Result};
use crate::source::ArtifactFetcher;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Default bound on a single bundle download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Default cap on a downloaded bundle (64 MiB).
pub const DEFAULT_MAX_BUNDLE_BYTES: u64 = 64 * 1024 * 1024;

/// Artifact origin the controller advertises when run locally.
pub const DEV_ARTIFACT_ORIGIN: &str = "http://localhost:8082";

/// In-cluster address of the controller's artifact server.
pub const CLUSTER_ARTIFACT_ORIGIN: &str = "http://omnia-controller-manager.omnia-system:8082";

/// Replace the `from` origin of an artifact URL with `to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRewrite {
    pub from: String,
    pub to: String,
}

impl UrlRewrite {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// The development origin mapped to the in-cluster service.
    pub fn dev_to_cluster() -> Self {
        Self::new(DEV_ARTIFACT_ORIGIN, CLUSTER_ARTIFACT_ORIGIN)
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactFetchConfig {
    pub timeout: Duration,
    /// Applied in order; the first matching rule wins.
    pub rewrites: Vec<UrlRewrite>,
    pub max_bytes: u64,
}

impl Default for ArtifactFetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_FETCH_TIMEOUT,
            rewrites: vec![UrlRewrite::dev_to_cluster()],
            max_bytes: DEFAULT_MAX_BUNDLE_BYTES,
        }
    }
}

/// Apply the first matching rewrite to `url`.
///
/// A rule matches when `url` starts with `from` and the prefix ends at the
/// end of the string, a `/` or a `?`, so `http://localhost:80820` is left
/// alone by a `http://localhost:8082` rule.
pub fn rewrite_url(url: &str, rewrites: &[UrlRewrite]) -> String {
    for rule in rewrites {
        if let Some(rest) = url.strip_prefix(rule.from.as_str())
            && (rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
        {
            return format!("{}{}", rule.to, rest);
        }
    }
    url.to_string()
}

/// Downloads bundles over HTTP with a bounded timeout.
#[derive(Debug, Clone)]
pub struct HttpArtifactFetcher {
    client: reqwest::Client,
    config: ArtifactFetchConfig,
}

impl HttpArtifactFetcher {
    pub fn new(config: ArtifactFetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ArtifactFetchConfig {
        &self.config
    }
}

#[async_trait]
impl ArtifactFetcher for HttpArtifactFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let target = rewrite_url(url, &self.config.rewrites);
        debug!(url = %url, target = %target, "fetching artifact");

        let mut response = self.client.get(&target).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upstream(format!(
                "artifact fetch from {} returned {}",
                target, status
            )));
        }

        if let Some(length) = response.content_length()
            && length > self.config.max_bytes
        {
            return Err(Error::upstream(format!(
                "artifact of {} bytes exceeds limit of {} bytes",
                length, self.config.max_bytes
            )));
        }

        // Content-Length may be absent (chunked), so the cap is enforced per chunk
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if (body.len() + chunk.len()) as u64 > self.config.max_bytes {
                return Err(Error::upstream(format!(
                    "artifact from {} exceeds limit of {} bytes",
                    target, self.config.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        debug!(target = %target, bytes = body.len(), "fetched artifact");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::http::StatusCode;
    use axum::routing::get;

    #[test]
    fn test_rewrite_dev_origin() {
        let rewrites = vec![UrlRewrite::dev_to_cluster()];
        assert_eq!(
            rewrite_url("http://localhost:8082/artifacts/a.tar.gz", &rewrites),
            "http://omnia-controller-manager.omnia-system:8082/artifacts/a.tar.gz"
        );
        assert_eq!(
            rewrite_url("http://localhost:8082", &rewrites),
            CLUSTER_ARTIFACT_ORIGIN
        );
    }

    #[test]
    fn test_rewrite_requires_origin_boundary() {
        let rewrites = vec![UrlRewrite::dev_to_cluster()];
        assert_eq!(
            rewrite_url("http://localhost:80820/a.tar.gz", &rewrites),
            "http://localhost:80820/a.tar.gz"
        );
        assert_eq!(
            rewrite_url("https://artifacts.example.com/a.tar.gz", &rewrites),
            "https://artifacts.example.com/a.tar.gz"
        );
    }

    #[test]
    fn test_first_matching_rewrite_wins() {
        let rewrites = vec![
            UrlRewrite::new("http://a", "http://first"),
            UrlRewrite::new("http://a", "http://second"),
        ];
        assert_eq!(rewrite_url("http://a/x", &rewrites), "http://first/x");
    }

    /// Serve a fixed router on an ephemeral loopback port.
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fetcher(timeout: Duration, max_bytes: u64) -> HttpArtifactFetcher {
        HttpArtifactFetcher::new(ArtifactFetchConfig {
            timeout,
            rewrites: Vec::new(),
            max_bytes,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_ok() {
        let base = serve(Router::new().route(
            "/bundle.tar.gz",
            get(|| async { "bundle-bytes" }),
        ))
        .await;

        let bytes = fetcher(Duration::from_secs(5), DEFAULT_MAX_BUNDLE_BYTES)
            .fetch(&format!("{}/bundle.tar.gz", base))
            .await
            .unwrap();
        assert_eq!(bytes, b"bundle-bytes");
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let base = serve(Router::new().route(
            "/missing.tar.gz",
            get(|| async { (StatusCode::NOT_FOUND, "gone") }),
        ))
        .await;

        let err = fetcher(Duration::from_secs(5), DEFAULT_MAX_BUNDLE_BYTES)
            .fetch(&format!("{}/missing.tar.gz", base))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let base = serve(Router::new().route(
            "/slow.tar.gz",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        ))
        .await;

        let err = fetcher(Duration::from_millis(200), DEFAULT_MAX_BUNDLE_BYTES)
            .fetch(&format!("{}/slow.tar.gz", base))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_body() {
        let base = serve(Router::new().route("/big.tar.gz", get(|| async { "0123456789" }))).await;

        let err = fetcher(Duration::from_secs(5), 4)
            .fetch(&format!("{}/big.tar.gz", base))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_fetch_rejects_oversized_chunked_body() {
        let base = serve(Router::new().route(
            "/stream.tar.gz",
            get(|| async {
                let chunks = (0..16).map(|_| Ok::<_, std::io::Error>(vec![b'x'; 1024]));
                Body::from_stream(futures::stream::iter(chunks))
            }),
        ))
        .await;

        let fetcher = fetcher(Duration::from_secs(5), 4096);
        let err = fetcher
            .fetch(&format!("{}/stream.tar.gz", base))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Upstream { .. }));
    }

    #[tokio::test]
    async fn test_fetch_chunked_body_within_limit() {
        let base = serve(Router::new().route(
            "/stream.tar.gz",
            get(|| async {
                let chunks = (0..4).map(|_| Ok::<_, std::io::Error>(vec![b'x'; 1024]));
                Body::from_stream(futures::stream::iter(chunks))
            }),
        ))
        .await;

        let bytes = fetcher(Duration::from_secs(5), 4096)
            .fetch(&format!("{}/stream.tar.gz", base))
            .await
            .unwrap();
        assert_eq!(bytes.len(), 4096);
    }

    #[tokio::test]
    async fn test_fetch_applies_rewrite() {
        let base = serve(Router::new().route("/a.tar.gz", get(|| async { "rewritten" }))).await;

        let fetcher = HttpArtifactFetcher::new(ArtifactFetchConfig {
            timeout: Duration::from_secs(5),
            rewrites: vec![UrlRewrite::new("http://controller.invalid", base)],
            max_bytes: DEFAULT_MAX_BUNDLE_BYTES,
        })
        .unwrap();

        let bytes = fetcher
            .fetch("http://controller.invalid/a.tar.gz")
            .await
            .unwrap();
        assert_eq!(bytes, b"rewritten");
    }
}
