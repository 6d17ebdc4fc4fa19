//! In-memory collaborators for tests and local tooling.
//!
//! Each mock records the requests it served so callers can assert which
//! backends were consulted.

use crate::content::FileMap;
use crate::error::{Error, Result};
use crate::source::{ArtifactFetcher, ConfigMapFetcher, Source, SourceLookup};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Sources keyed by `(namespace, name)`.
#[derive(Debug, Default)]
pub struct MemorySources {
    sources: Mutex<HashMap<(String, String), Source>>,
    failure: Mutex<Option<String>>,
}

impl MemorySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, source: Source) {
        let key = (source.namespace().to_string(), source.name().to_string());
        lock(&self.sources).insert(key, source);
    }

    /// Make every subsequent lookup fail with an upstream error.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *lock(&self.failure) = Some(reason.into());
    }
}

#[async_trait]
impl SourceLookup for MemorySources {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Source>> {
        if let Some(reason) = lock(&self.failure).clone() {
            return Err(Error::upstream(reason));
        }
        let key = (namespace.to_string(), name.to_string());
        Ok(lock(&self.sources).get(&key).cloned())
    }
}

/// ConfigMaps keyed by `(namespace, name)`.
#[derive(Debug, Default)]
pub struct MemoryConfigMaps {
    maps: Mutex<HashMap<(String, String), FileMap>>,
    failing: Mutex<Option<String>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl MemoryConfigMaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, namespace: &str, name: &str, files: FileMap) {
        lock(&self.maps).insert((namespace.to_string(), name.to_string()), files);
    }

    /// Make every subsequent fetch fail with an upstream error.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *lock(&self.failing) = Some(reason.into());
    }

    /// `(namespace, name)` of every fetch so far.
    pub fn requests(&self) -> Vec<(String, String)> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ConfigMapFetcher for MemoryConfigMaps {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Option<FileMap>> {
        lock(&self.requests).push((namespace.to_string(), name.to_string()));

        if let Some(reason) = lock(&self.failing).clone() {
            return Err(Error::upstream(reason));
        }

        let key = (namespace.to_string(), name.to_string());
        Ok(lock(&self.maps).get(&key).cloned())
    }
}

/// Bundles keyed by URL. Unknown URLs fail like a 404 would.
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    bundles: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        lock(&self.bundles).insert(url.into(), bytes.into());
    }

    /// Every URL fetched so far.
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

#[async_trait]
impl ArtifactFetcher for MemoryArtifacts {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        lock(&self.requests).push(url.to_string());

        lock(&self.bundles)
            .get(url)
            .cloned()
            .ok_or_else(|| {
                Error::upstream(format!(
                    "artifact fetch from {} returned 404 Not Found",
                    url
                ))
            })
    }
}
