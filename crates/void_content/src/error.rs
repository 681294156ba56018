//! Error types for the content system

use std::path::PathBuf;
use thiserror::Error;

use crate::kind::AssetKind;

/// Usage, consistency and environment errors.
///
/// These are the loud failures: wrong call order, malformed arguments, broken
/// internal invariants and directory enumeration failures. Per-asset fetch
/// failures are reported through [`LoadError`] instead and never cascade.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Malformed folder path, unknown asset name, bad configuration value
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A second asynchronous operation was started on a block before the first completed
    #[error("Content block '{0}' already has an asynchronous operation in flight")]
    ConcurrentOperation(String),

    /// Ownership was claimed twice for the same asset name
    #[error("Asset '{0}' already has a shared owner")]
    DuplicateOwnership(String),

    /// Directory enumeration failed
    #[error("Failed to enumerate {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation attempted on a disposed block or registry
    #[error("'{0}' has been disposed")]
    Disposed(String),

    /// A worker thread could not be started
    #[error("Failed to start worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// A fetcher or decoder panicked inside an asynchronous block operation
    #[error("Content block '{block}' operation panicked: {message}")]
    WorkerPanic { block: String, message: String },

    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration or manifest JSON was malformed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContentError {
    /// Wrap an IO error with the path that produced it
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for content operations
pub type Result<T> = std::result::Result<T, ContentError>;

/// Error raised by an [`AssetFetcher`](crate::fetcher::AssetFetcher) for a single asset
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Underlying resource does not exist
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Underlying resource could not be read
    #[error("IO error: {0}")]
    Io(String),

    /// Bytes were read but could not be turned into an asset
    #[error("Decode error: {0}")]
    Decode(String),

    /// No handler is registered for this kind
    #[error("No decoder registered for {0:?} assets")]
    UnsupportedKind(AssetKind),

    /// The payload is not of the requested Rust type
    #[error("Asset '{name}' is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },

    #[error("{0}")]
    Custom(String),
}

impl LoadError {
    /// The payload loaded for `name` is not a `T`
    pub fn type_mismatch<T: ?Sized>(name: &str) -> Self {
        Self::TypeMismatch {
            name: name.to_string(),
            expected: core::any::type_name::<T>(),
        }
    }
}

/// Result type for a single asset fetch
pub type LoadResult<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_mentions_path() {
        let err = ContentError::io(
            "/tex/",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        let msg = err.to_string();
        assert!(msg.contains("/tex/"));
        assert!(msg.contains("missing"));
    }

    #[test]
    fn type_mismatch_names_expected_type() {
        let err = LoadError::type_mismatch::<u64>("icon");
        assert!(matches!(
            &err,
            LoadError::TypeMismatch { name, expected } if name == "icon" && *expected == "u64"
        ));
        assert_eq!(err.to_string(), "Asset 'icon' is not a u64");
    }

    #[test]
    fn unsupported_kind_display() {
        let err = LoadError::UnsupportedKind(AssetKind::Model);
        assert_eq!(err.to_string(), "No decoder registered for Model assets");
    }
}
