//! Response bodies of the HTTP surface.
//!
//! Field names are camelCase to match what the dashboard consumes.

use arena_core::{ContentTree, TreeNode, Version, VersionListing, VersionSwitch};
use serde::Serialize;

/// `GET .../versions`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionsResponse {
    pub source_name: String,
    pub head: Option<String>,
    pub versions: Vec<Version>,
}

impl VersionsResponse {
    pub fn new(source_name: impl Into<String>, listing: VersionListing) -> Self {
        Self {
            source_name: source_name.into(),
            head: listing.head,
            versions: listing.versions,
        }
    }
}

/// `POST .../versions`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchVersionResponse {
    pub success: bool,
    pub source_name: String,
    pub previous_head: Option<String>,
    pub new_head: String,
}

impl SwitchVersionResponse {
    pub fn new(source_name: impl Into<String>, switch: VersionSwitch) -> Self {
        Self {
            success: true,
            source_name: source_name.into(),
            previous_head: switch.previous_head,
            new_head: switch.new_head,
        }
    }
}

/// `GET .../content`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentResponse {
    pub source_name: String,
    pub tree: Vec<TreeNode>,
    pub file_count: usize,
    pub directory_count: usize,
}

impl ContentResponse {
    pub fn new(source_name: impl Into<String>, tree: ContentTree) -> Self {
        Self {
            source_name: source_name.into(),
            tree: tree.tree,
            file_count: tree.file_count,
            directory_count: tree.directory_count,
        }
    }
}
