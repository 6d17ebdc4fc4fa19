//! HEAD pointer and version directory bookkeeping.
//!
//! Each source keeps its synced snapshots under `.arena/versions/{hash}` and
//! the selected one in `.arena/HEAD`. Versions are created and collected by
//! the sync controller; this module only reads them and moves HEAD.

use crate::error::{Error, Result};
use crate::layout::validate_component;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Bookkeeping directory inside a source's base directory.
pub const ARENA_DIR: &str = ".arena";

const HEAD_FILE: &str = "HEAD";
const VERSIONS_DIR: &str = "versions";

/// One immutable snapshot of a source's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    /// Directory name (content hash).
    pub hash: String,
    pub created_at: DateTime<Utc>,
    /// Sum of file sizes in bytes.
    pub size: u64,
    pub file_count: u64,
    pub is_latest: bool,
}

/// HEAD and every version of a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionListing {
    pub head: Option<String>,
    pub versions: Vec<Version>,
}

/// Outcome of a successful HEAD switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionSwitch {
    pub previous_head: Option<String>,
    pub new_head: String,
}

/// Reads and writes the version state of one source's base directory.
#[derive(Debug, Clone)]
pub struct VersionStore {
    base: PathBuf,
}

impl VersionStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Get the base content directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Whether the base content directory exists.
    pub fn exists(&self) -> bool {
        self.base.is_dir()
    }

    fn arena_dir(&self) -> PathBuf {
        self.base.join(ARENA_DIR)
    }

    fn head_path(&self) -> PathBuf {
        self.arena_dir().join(HEAD_FILE)
    }

    fn versions_dir(&self) -> PathBuf {
        self.arena_dir().join(VERSIONS_DIR)
    }

    /// Get the path to a version directory.
    pub fn version_path(&self, hash: &str) -> Result<PathBuf> {
        validate_component("version", hash)?;
        Ok(self.versions_dir().join(hash))
    }

    /// Read the currently selected version.
    ///
    /// A missing or unreadable HEAD means no version has been selected yet.
    pub fn read_head(&self) -> Option<String> {
        let path = self.head_path();

        match fs::read_to_string(&path) {
            Ok(content) => {
                let hash = content.trim();
                if hash.is_empty() {
                    None
                } else {
                    Some(hash.to_string())
                }
            }
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    debug!(path = %path.display(), error = %err, "unreadable HEAD");
                }
                None
            }
        }
    }

    /// Point HEAD at `hash`.
    ///
    /// The file is replaced through a temporary file so readers never see a
    /// partial write. Concurrent writers are last-writer-wins.
    pub fn write_head(&self, hash: &str) -> Result<()> {
        validate_component("version", hash)?;

        let arena_dir = self.arena_dir();
        fs::create_dir_all(&arena_dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(&arena_dir)?;
        temp.write_all(format!("{}\n", hash).as_bytes())?;
        temp.persist(self.head_path())?;

        Ok(())
    }

    /// List every version directory, newest first.
    pub fn list_versions(&self) -> Result<Vec<Version>> {
        let versions_dir = self.versions_dir();

        let entries = match fs::read_dir(&versions_dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut versions = Vec::new();

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    debug!(dir = %versions_dir.display(), error = %err, "skipping unreadable entry");
                    continue;
                }
            };

            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }

            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(err) => {
                    debug!(path = %path.display(), error = %err, "skipping unreadable version");
                    continue;
                }
            };
            if !metadata.is_dir() {
                continue;
            }

            let (file_count, size) = tally_files(&path);
            versions.push(Version {
                hash: name,
                created_at: created_at(&metadata),
                size,
                file_count,
                is_latest: false,
            });
        }

        // Latest is the first version with the greatest creation time
        let mut latest: Option<usize> = None;
        for (idx, version) in versions.iter().enumerate() {
            match latest {
                Some(best) if versions[best].created_at >= version.created_at => {}
                _ => latest = Some(idx),
            }
        }
        if let Some(idx) = latest {
            versions[idx].is_latest = true;
        }

        versions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(versions)
    }

    /// Check whether a version directory exists.
    pub fn version_exists(&self, hash: &str) -> bool {
        self.version_path(hash)
            .map(|path| path.is_dir())
            .unwrap_or(false)
    }

    /// Move HEAD to an existing version.
    ///
    /// HEAD is left untouched when the version does not exist. The check and
    /// the write are not atomic with respect to garbage collection.
    pub fn switch_version(&self, hash: &str) -> Result<VersionSwitch> {
        validate_component("version", hash)?;

        if !self.version_exists(hash) {
            return Err(Error::version_not_found(hash));
        }

        let previous_head = self.read_head();
        self.write_head(hash)?;

        info!(
            base = %self.base.display(),
            previous = previous_head.as_deref().unwrap_or("none"),
            new = hash,
            "switched version"
        );

        Ok(VersionSwitch {
            previous_head,
            new_head: hash.to_string(),
        })
    }

    /// Directory that currently holds the source's content.
    ///
    /// The HEAD version when it exists, otherwise the base directory itself
    /// (unversioned legacy content, or a stale HEAD).
    pub fn resolve_content_dir(&self) -> PathBuf {
        if let Some(head) = self.read_head() {
            match self.version_path(&head) {
                Ok(path) if path.is_dir() => return path,
                _ => debug!(head = %head, base = %self.base.display(), "stale HEAD, using base directory"),
            }
        }

        self.base.clone()
    }

    /// HEAD plus every version.
    pub fn snapshot(&self) -> Result<VersionListing> {
        Ok(VersionListing {
            head: self.read_head(),
            versions: self.list_versions()?,
        })
    }
}

/// Count files and sum their sizes below `dir`, skipping anything unreadable.
fn tally_files(dir: &Path) -> (u64, u64) {
    let walker = ignore::WalkBuilder::new(dir)
        .standard_filters(false)
        .follow_links(false)
        .build();

    let mut count = 0;
    let mut size = 0;

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "skipping unreadable entry");
                continue;
            }
        };

        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => {
                count += 1;
                size += metadata.len();
            }
            Err(err) => debug!(path = %entry.path().display(), error = %err, "skipping file"),
        }
    }

    (count, size)
}

/// Creation time, or modification time where birth time is unavailable.
fn created_at(metadata: &fs::Metadata) -> DateTime<Utc> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(std::time::UNIX_EPOCH))
}
