//! Bundle extraction.
//!
//! Remote bundles are gzip-compressed tarballs of a source's files. They are
//! small prompt/config archives, so they are materialized fully in memory and
//! single-file lookups are plain map lookups.

use crate::content::{FileMap, strip_dot_prefix};
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use tracing::debug;

/// Decompress and unpack a tar+gzip bundle into a file map.
///
/// Only regular files are kept. Any gzip or tar failure, or an unsafe entry
/// path, fails the whole extraction; partial results are never returned.
pub fn extract_bundle(bytes: &[u8]) -> Result<FileMap> {
    if bytes.is_empty() {
        return Err(Error::corrupt_archive("archive is empty"));
    }

    let mut archive = tar::Archive::new(GzDecoder::new(bytes));
    let entries = archive
        .entries()
        .map_err(|e| Error::corrupt_archive(format!("failed to read tar entries: {}", e)))?;

    let mut files = FileMap::new();

    for entry in entries {
        let mut entry = entry
            .map_err(|e| Error::corrupt_archive(format!("failed to read tar entry: {}", e)))?;

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let raw_path = entry
            .path()
            .map_err(|e| Error::corrupt_archive(format!("invalid tar entry path: {}", e)))?
            .to_string_lossy()
            .into_owned();

        let Some(path) = normalize_entry_path(&raw_path)? else {
            continue;
        };

        // The header's declared size is untrusted; only bytes actually read are buffered
        let declared = entry.size();
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::corrupt_archive(format!("failed to read {}: {}", path, e)))?;
        if content.len() as u64 != declared {
            return Err(Error::corrupt_archive(format!(
                "truncated entry {}: header declares {} bytes, found {}",
                path,
                declared,
                content.len()
            )));
        }

        files.insert(path, content);
    }

    debug!(files = files.len(), bytes = bytes.len(), "extracted bundle");
    Ok(files)
}

/// Extract a single file from a bundle.
pub fn extract_file(bytes: &[u8], path: &str) -> Result<Vec<u8>> {
    let files = extract_bundle(bytes)?;
    files
        .get(strip_dot_prefix(path))
        .map(<[u8]>::to_vec)
        .ok_or_else(|| Error::file_not_found(path))
}

/// Normalize a tar entry path.
///
/// Returns `Ok(None)` for entries that name the archive root.
fn normalize_entry_path(raw: &str) -> Result<Option<String>> {
    let path = strip_dot_prefix(raw).trim_end_matches('/');

    if path.is_empty() || path == "." {
        return Ok(None);
    }

    if path.starts_with('/') || path.split('/').any(|segment| segment == "..") {
        return Err(Error::corrupt_archive(format!("unsafe entry path: {}", raw)));
    }

    Ok(Some(path.to_string()))
}
