//! Snapshot errors

use crate::snapshot::SnapshotKey;
use arena_host::HostError;
use thiserror::Error;

/// Snapshot store errors
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// Host data access failed
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Snapshot file written by a newer version
    #[error("version mismatch: snapshot version {0}, current version {1}")]
    VersionMismatch(u32, u32),

    /// No snapshot for the key
    #[error("no snapshot for {0}")]
    NotFound(SnapshotKey),

    /// A snapshot for the key is already held
    #[error("snapshot for {0} already exists")]
    AlreadyExists(SnapshotKey),

    /// Context label unusable as a storage key
    #[error("invalid snapshot context: {0:?}")]
    InvalidContext(String),

    /// Item could not be put back where it was
    #[error("could not restore {item} into {place}")]
    Placement { item: String, place: String },
}

/// Result type for snapshot operations
pub type SnapshotResult<T> = Result<T, SnapshotError>;
