//! # Arena Core
//!
//! Version bookkeeping and content resolution for synced Arena sources.
//!
//! Sync controllers write each source's content to a shared volume as
//! immutable version directories, and may also publish it as a ConfigMap or
//! as a remote tar+gzip bundle. This library picks the authoritative copy for
//! a request and turns it into a client-facing tree.
//!
//! ## Features
//!
//! - HEAD pointer and version directory listing/switching
//! - In-memory extraction of tar+gzip bundles
//! - Ordered backend fallback (ConfigMap, remote bundle, filesystem)
//! - Directory/map agnostic content trees
//!
//! ## Example
//!
//! ```no_run
//! use arena_core::{ContentLayout, VersionStore, build_tree, resolve_local};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let layout = ContentLayout::new("/workspace-content");
//! let base = layout.source_path("dev", "team-a", "prompts")?;
//!
//! // Inspect and move HEAD
//! let store = VersionStore::new(&base);
//! for version in store.list_versions()? {
//!     println!("{} ({} files)", version.hash, version.file_count);
//! }
//! store.switch_version("abc123")?;
//!
//! // Build the tree of whatever HEAD now points at
//! let resolved = resolve_local(&base, "prompts")?;
//! let tree = build_tree(&resolved.root);
//! println!("{} files", tree.file_count);
//! # Ok(())
//! # }
//! ```

mod archive;
mod content;
mod error;
mod fetch;
mod layout;
pub mod mock;
mod resolver;
mod source;
mod tree;
mod version;

pub use archive::{extract_bundle, extract_file};
pub use content::{
    ContentOrigin, ContentRoot, FileContent, FileMap, ResolvedContent, normalize_relative_path,
};
pub use error::{Error, Result};
pub use fetch::{
    ArtifactFetchConfig, CLUSTER_ARTIFACT_ORIGIN, DEFAULT_FETCH_TIMEOUT,
    DEFAULT_MAX_BUNDLE_BYTES, DEV_ARTIFACT_ORIGIN, HttpArtifactFetcher, UrlRewrite, rewrite_url,
};
pub use layout::ContentLayout;
pub use resolver::{ContentResolver, Resolution, resolve_local, unavailable_error};
pub use source::{
    Artifact, ArtifactFetcher, ConfigMapFetcher, ConfigMapReference, READY_PHASE, Source,
    SourceLookup, SourceMetadata, SourceSpec, SourceStatus, SourceType,
};
pub use tree::{ContentTree, TreeNode, build_directory_tree, build_file_map_tree, build_tree};
pub use version::{ARENA_DIR, Version, VersionListing, VersionStore, VersionSwitch};
