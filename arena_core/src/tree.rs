//! Client-facing content trees.
//!
//! Both root kinds produce the same shape: hidden entries dropped at every
//! level, directories listed before files, and enumeration order kept within
//! each group.

use crate::content::{ContentRoot, FileMap};
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

/// A file or directory in a content tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub name: String,
    /// Forward-slash path relative to the content root.
    pub path: String,
    pub is_directory: bool,
    /// File size in bytes (files only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Child entries (directories only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

impl TreeNode {
    pub fn file(name: impl Into<String>, path: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: false,
            size: Some(size),
            children: None,
        }
    }

    pub fn directory(
        name: impl Into<String>,
        path: impl Into<String>,
        children: Vec<TreeNode>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_directory: true,
            size: None,
            children: Some(children),
        }
    }
}

/// A content tree with totals over every level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentTree {
    pub tree: Vec<TreeNode>,
    pub file_count: usize,
    pub directory_count: usize,
}

#[derive(Default)]
struct Counts {
    files: usize,
    directories: usize,
}

/// Build the tree for any content root.
pub fn build_tree(root: &ContentRoot) -> ContentTree {
    match root {
        ContentRoot::Directory(dir) => build_directory_tree(dir),
        ContentRoot::Files(files) => build_file_map_tree(files),
    }
}

/// Build the tree of a directory on disk.
///
/// Unreadable subtrees are reported as empty.
pub fn build_directory_tree(dir: &Path) -> ContentTree {
    let mut counts = Counts::default();
    let tree = read_directory(dir, "", &mut counts);

    ContentTree {
        tree,
        file_count: counts.files,
        directory_count: counts.directories,
    }
}

fn read_directory(dir: &Path, prefix: &str, counts: &mut Counts) -> Vec<TreeNode> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            debug!(dir = %dir.display(), error = %err, "unreadable directory, treating as empty");
            return Vec::new();
        }
    };

    let mut directories = Vec::new();
    let mut files = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(dir = %dir.display(), error = %err, "skipping unreadable entry");
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
        let metadata = match entry_metadata(&path) {
            Ok(Some(metadata)) => metadata,
            Ok(None) => continue,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "skipping entry");
                continue;
            }
        };

        let relative = join_path(prefix, &name);
        if metadata.is_dir() {
            counts.directories += 1;
            let children = read_directory(&path, &relative, counts);
            directories.push(TreeNode::directory(name, relative, children));
        } else if metadata.is_file() {
            counts.files += 1;
            files.push(TreeNode::file(name, relative, metadata.len()));
        }
    }

    directories.extend(files);
    directories
}

/// Metadata for a directory entry without leaving the tree.
///
/// Symlinks to files are followed. Links to directories are skipped so a
/// link back to an ancestor cannot recurse; broken links surface as errors.
fn entry_metadata(path: &Path) -> std::io::Result<Option<fs::Metadata>> {
    let metadata = fs::symlink_metadata(path)?;
    if !metadata.file_type().is_symlink() {
        return Ok(Some(metadata));
    }

    let target = fs::metadata(path)?;
    if target.is_dir() {
        debug!(path = %path.display(), "skipping directory symlink");
        return Ok(None);
    }
    Ok(Some(target))
}

/// Intermediate directory used while synthesizing a tree from flat paths.
#[derive(Default)]
struct PendingDir {
    dirs: Vec<(String, PendingDir)>,
    files: Vec<(String, u64)>,
}

impl PendingDir {
    fn insert(&mut self, segments: &[&str], size: u64) {
        match segments {
            [] => {}
            [name] => self.files.push((name.to_string(), size)),
            [name, rest @ ..] => {
                let idx = match self.dirs.iter().position(|(n, _)| n == name) {
                    Some(idx) => idx,
                    None => {
                        self.dirs.push((name.to_string(), PendingDir::default()));
                        self.dirs.len() - 1
                    }
                };
                self.dirs[idx].1.insert(rest, size);
            }
        }
    }

    fn into_nodes(self, prefix: &str, counts: &mut Counts) -> Vec<TreeNode> {
        let mut nodes = Vec::with_capacity(self.dirs.len() + self.files.len());

        for (name, dir) in self.dirs {
            counts.directories += 1;
            let relative = join_path(prefix, &name);
            let children = dir.into_nodes(&relative, counts);
            nodes.push(TreeNode::directory(name, relative, children));
        }

        for (name, size) in self.files {
            counts.files += 1;
            let relative = join_path(prefix, &name);
            nodes.push(TreeNode::file(name, relative, size));
        }

        nodes
    }
}

/// Build the tree of an in-memory file map by splitting paths on `/`.
///
/// Paths with an empty or hidden segment are skipped.
pub fn build_file_map_tree(files: &FileMap) -> ContentTree {
    let mut root = PendingDir::default();

    for (path, content) in files.iter() {
        let segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty() || s.starts_with('.')) {
            continue;
        }
        root.insert(&segments, content.len() as u64);
    }

    let mut counts = Counts::default();
    let tree = root.into_nodes("", &mut counts);

    ContentTree {
        tree,
        file_count: counts.files,
        directory_count: counts.directories,
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", prefix, name)
    }
}
