//! Error types for arena_core.

use thiserror::Error;

/// Result type alias using arena_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving source content.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Source exists but its backend has not produced content yet.
    #[error("Source {name} is not ready yet (phase: {phase})")]
    NotReady { name: String, phase: String },

    /// Source content directory has never been created.
    #[error("Source {name} has not been synced yet")]
    SourceNotSynced { name: String },

    /// Source was synced but no backend yielded any content.
    #[error("No content available for source {name}")]
    NoContent { name: String },

    /// Source lookup returned nothing.
    #[error("Source not found: {name}")]
    SourceNotFound { name: String },

    /// Requested version directory does not exist.
    #[error("Version not found: {hash} (may have been garbage collected)")]
    VersionNotFound { hash: String },

    /// Resolved content lacks the requested path.
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Missing or malformed request parameter.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Bundle failed to decompress or parse.
    #[error("Corrupt archive: {reason}")]
    CorruptArchive { reason: String },

    /// External collaborator failed (network, API, status code).
    #[error("Upstream failure: {reason}")]
    Upstream { reason: String },
}

impl Error {
    /// Create a NotReady error.
    pub fn not_ready(name: impl Into<String>, phase: impl Into<String>) -> Self {
        Error::NotReady {
            name: name.into(),
            phase: phase.into(),
        }
    }

    /// Create a SourceNotSynced error.
    pub fn source_not_synced(name: impl Into<String>) -> Self {
        Error::SourceNotSynced { name: name.into() }
    }

    /// Create a NoContent error.
    pub fn no_content(name: impl Into<String>) -> Self {
        Error::NoContent { name: name.into() }
    }

    /// Create a SourceNotFound error.
    pub fn source_not_found(name: impl Into<String>) -> Self {
        Error::SourceNotFound { name: name.into() }
    }

    /// Create a VersionNotFound error.
    pub fn version_not_found(hash: impl Into<String>) -> Self {
        Error::VersionNotFound { hash: hash.into() }
    }

    /// Create a FileNotFound error.
    pub fn file_not_found(path: impl Into<String>) -> Self {
        Error::FileNotFound { path: path.into() }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a CorruptArchive error.
    pub fn corrupt_archive(reason: impl Into<String>) -> Self {
        Error::CorruptArchive {
            reason: reason.into(),
        }
    }

    /// Create an Upstream error.
    pub fn upstream(reason: impl Into<String>) -> Self {
        Error::Upstream {
            reason: reason.into(),
        }
    }
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Upstream {
            reason: err.to_string(),
        }
    }
}
