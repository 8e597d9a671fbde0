//! Error types for depot_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using depot_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during repository operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The store holds no decodable tool artifacts at all.
    #[error("no tools available")]
    NoArtifacts,

    /// Tool artifacts exist, but none satisfy the version filter.
    #[error("no matching tools available for v{}.{}", .major, display_minor(.minor))]
    NoMatchingVersion { major: u32, minor: Option<u32> },

    /// A version string does not follow the canonical grammar.
    #[error("malformed version {input:?}: {reason}")]
    MalformedVersion { input: String, reason: String },

    /// Upgrade requested for content that carries no revision marker.
    #[error("cannot upgrade package {reference:?}: not a directory")]
    UpgradeUnsupported { reference: String },

    /// Content handle of a kind the package store cannot read.
    #[error("unknown package content kind for {reference:?}: {detail}")]
    UnknownContentKind { reference: String, detail: String },

    /// Blob store operation failed.
    #[error("cannot {op} {name:?}")]
    Storage {
        op: &'static str,
        name: String,
        #[source]
        source: Box<Error>,
    },

    /// Source repository operation failed.
    #[error("cannot {op} package {reference:?}")]
    Source {
        op: &'static str,
        reference: String,
        #[source]
        source: Box<Error>,
    },

    /// Registry operation failed.
    #[error("cannot {op} package {reference:?} in registry")]
    Registry {
        op: &'static str,
        reference: String,
        #[source]
        source: Box<Error>,
    },

    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Invalid package reference.
    #[error("invalid package reference {input:?}: {reason}")]
    InvalidReference { input: String, reason: String },

    /// Blob name cannot be stored safely.
    #[error("invalid blob name {name:?}: {reason}")]
    InvalidBlobName { name: String, reason: String },

    /// Stream length differs from the declared size.
    #[error("size mismatch for {name:?}: declared {declared} bytes, got {actual}")]
    SizeMismatch {
        name: String,
        declared: u64,
        actual: u64,
    },

    /// Blob not present in the store.
    #[error("blob not found: {name}")]
    BlobNotFound { name: String },

    /// Package not present in the source repository.
    #[error("package not found: {reference}")]
    PackageNotFound { reference: String },

    /// Invalid digest format or encoding.
    #[error("invalid digest: {reason}")]
    InvalidDigest { reason: String },

    /// Depot workspace or config file is invalid.
    #[error("invalid config at {path}: {reason}")]
    InvalidConfig { path: PathBuf, reason: String },

    /// JSON encoding or decoding failed.
    #[error("serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

fn display_minor(minor: &Option<u32>) -> String {
    match minor {
        Some(minor) => minor.to_string(),
        None => "*".to_string(),
    }
}

impl Error {
    /// Create a NoMatchingVersion error.
    pub fn no_matching_version(major: u32, minor: Option<u32>) -> Self {
        Error::NoMatchingVersion { major, minor }
    }

    /// Create a MalformedVersion error.
    pub fn malformed_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::MalformedVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an UpgradeUnsupported error.
    pub fn upgrade_unsupported(reference: impl ToString) -> Self {
        Error::UpgradeUnsupported {
            reference: reference.to_string(),
        }
    }

    /// Create an UnknownContentKind error.
    pub fn unknown_content_kind(reference: impl ToString, detail: impl Into<String>) -> Self {
        Error::UnknownContentKind {
            reference: reference.to_string(),
            detail: detail.into(),
        }
    }

    /// Wrap a blob store failure with the operation and blob name.
    pub fn storage(op: &'static str, name: impl Into<String>, source: Error) -> Self {
        Error::Storage {
            op,
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a source repository failure with the operation and reference.
    pub fn repository(op: &'static str, reference: impl ToString, source: Error) -> Self {
        Error::Source {
            op,
            reference: reference.to_string(),
            source: Box::new(source),
        }
    }

    /// Wrap a registry failure with the operation and reference.
    pub fn registry(op: &'static str, reference: impl ToString, source: Error) -> Self {
        Error::Registry {
            op,
            reference: reference.to_string(),
            source: Box::new(source),
        }
    }

    /// Create an InvalidReference error.
    pub fn invalid_reference(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidReference {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidBlobName error.
    pub fn invalid_blob_name(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidBlobName {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a SizeMismatch error.
    pub fn size_mismatch(name: impl Into<String>, declared: u64, actual: u64) -> Self {
        Error::SizeMismatch {
            name: name.into(),
            declared,
            actual,
        }
    }

    /// Create a BlobNotFound error.
    pub fn blob_not_found(name: impl Into<String>) -> Self {
        Error::BlobNotFound { name: name.into() }
    }

    /// Create a PackageNotFound error.
    pub fn package_not_found(reference: impl ToString) -> Self {
        Error::PackageNotFound {
            reference: reference.to_string(),
        }
    }

    /// Create an InvalidDigest error.
    pub fn invalid_digest(reason: impl Into<String>) -> Self {
        Error::InvalidDigest {
            reason: reason.into(),
        }
    }

    /// Create an InvalidConfig error.
    pub fn invalid_config(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns the innermost error, looking through collaborator context.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Storage { source, .. }
            | Error::Source { source, .. }
            | Error::Registry { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a path error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Io {
                source: std::io::Error::other(err.to_string()),
            },
        }
    }
}
