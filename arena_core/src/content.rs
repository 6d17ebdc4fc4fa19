//! Resolved content roots and the in-memory file map.

use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Insertion-ordered `path -> content` map.
///
/// Re-inserting an existing path replaces its content in place, so the
/// entry keeps its original position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMap {
    entries: Vec<(String, Vec<u8>)>,
    index: HashMap<String, usize>,
}

impl FileMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the content at `path`.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        let path = path.into();
        let content = content.into();

        match self.index.get(&path) {
            Some(&idx) => self.entries[idx].1 = content,
            None => {
                self.index.insert(path.clone(), self.entries.len());
                self.entries.push((path, content));
            }
        }
    }

    /// Get the content stored at `path`.
    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.index
            .get(path)
            .map(|&idx| self.entries[idx].1.as_slice())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.entries
            .iter()
            .map(|(path, content)| (path.as_str(), content.as_slice()))
    }
}

impl<P: Into<String>, C: Into<Vec<u8>>> FromIterator<(P, C)> for FileMap {
    fn from_iter<I: IntoIterator<Item = (P, C)>>(iter: I) -> Self {
        let mut map = FileMap::new();
        for (path, content) in iter {
            map.insert(path, content);
        }
        map
    }
}

/// Which backend produced a content root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentOrigin {
    /// Key/value data of a Kubernetes ConfigMap.
    ConfigMap,
    /// Remote tar+gzip bundle described by the source artifact.
    Artifact,
    /// Version (or legacy) directory on the content volume.
    Filesystem,
}

impl ContentOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentOrigin::ConfigMap => "configmap",
            ContentOrigin::Artifact => "artifact",
            ContentOrigin::Filesystem => "filesystem",
        }
    }
}

impl fmt::Display for ContentOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The backend-agnostic source of truth for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentRoot {
    /// A directory on disk.
    Directory(PathBuf),
    /// An in-memory file map.
    Files(FileMap),
}

impl ContentRoot {
    /// Read the file at a normalized relative `path`.
    ///
    /// Returns `Ok(None)` when the root has no regular file at that path.
    pub fn read_file(&self, path: &str) -> Result<Option<Vec<u8>>> {
        match self {
            ContentRoot::Files(files) => Ok(files.get(path).map(<[u8]>::to_vec)),
            ContentRoot::Directory(dir) => {
                let full = dir.join(path);
                match fs::metadata(&full) {
                    Ok(metadata) if metadata.is_file() => Ok(Some(fs::read(&full)?)),
                    Ok(_) => Ok(None),
                    Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                    Err(err) => Err(err.into()),
                }
            }
        }
    }
}

/// A content root together with the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub origin: ContentOrigin,
    pub root: ContentRoot,
}

impl ResolvedContent {
    pub fn new(origin: ContentOrigin, root: ContentRoot) -> Self {
        Self { origin, root }
    }
}

/// A single file served from a content root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub path: String,
    /// File content, lossily decoded as UTF-8.
    pub content: String,
    /// Byte length of the raw content.
    pub size: u64,
}

impl FileContent {
    pub fn new(path: impl Into<String>, raw: &[u8]) -> Self {
        Self {
            path: path.into(),
            content: String::from_utf8_lossy(raw).into_owned(),
            size: raw.len() as u64,
        }
    }
}

/// Strip any number of leading `./` segments.
pub fn strip_dot_prefix(path: &str) -> &str {
    let mut rest = path;
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest
}

/// Normalize a client supplied relative file path.
///
/// Leading `./` and trailing `/` are dropped. Empty, absolute and
/// `..`-containing paths are rejected.
pub fn normalize_relative_path(path: &str) -> Result<String> {
    let trimmed = strip_dot_prefix(path.trim()).trim_end_matches('/');

    if trimmed.is_empty() || trimmed == "." {
        return Err(Error::invalid_input("path cannot be empty"));
    }

    if trimmed.starts_with('/') || trimmed.starts_with('\\') {
        return Err(Error::invalid_input(format!(
            "path must be relative: {}",
            path
        )));
    }

    if trimmed.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(Error::invalid_input(format!(
            "path must not contain '..': {}",
            path
        )));
    }

    if trimmed.contains('\0') {
        return Err(Error::invalid_input("path cannot contain null bytes"));
    }

    Ok(trimmed.to_string())
}
