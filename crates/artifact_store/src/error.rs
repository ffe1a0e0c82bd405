//! Error types for artifact store operations.

use std::path::{Path, PathBuf};

use crate::Protocol;

/// Result type for artifact store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while resolving providers or fetching artifacts.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StorageError {
    /// The locator prefix matches none of the known protocols.
    #[error("unsupported storage scheme in locator '{locator}'")]
    UnsupportedScheme { locator: String },

    /// Backend client or session setup failed.
    #[error("failed to construct {protocol} client: {source}")]
    CredentialConstruction {
        protocol: Protocol,
        source: anyhow::Error,
    },

    /// The remote object does not exist.
    #[error("object not found: {locator}")]
    ObjectNotFound { locator: String },

    /// Network-level failure talking to the backend.
    #[error("transport failure for '{locator}': {source}")]
    TransportFailure {
        locator: String,
        source: anyhow::Error,
    },

    /// Directory creation, file write or cleanup failed.
    #[error("local I/O failure at {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Client construction was cancelled before it completed.
    #[error("construction of {protocol} client was cancelled")]
    Cancelled { protocol: Protocol },

    /// Configuration file could not be loaded.
    #[error("invalid storage configuration: {source}")]
    Config { source: Box<figment::Error> },
}

impl StorageError {
    pub fn unsupported_scheme(locator: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            locator: locator.into(),
        }
    }

    pub fn construction(protocol: Protocol, source: impl Into<anyhow::Error>) -> Self {
        Self::CredentialConstruction {
            protocol,
            source: source.into(),
        }
    }

    pub fn not_found(locator: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            locator: locator.into(),
        }
    }

    pub fn transport(locator: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::TransportFailure {
            locator: locator.into(),
            source: source.into(),
        }
    }

    pub fn local_io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::LocalIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether the failure is permanent (the object is absent) rather than
    /// a transient transport problem.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ObjectNotFound { .. })
    }
}

impl From<figment::Error> for StorageError {
    fn from(err: figment::Error) -> Self {
        Self::Config {
            source: Box::new(err),
        }
    }
}
