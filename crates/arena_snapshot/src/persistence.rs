//! On-disk snapshot files

use crate::error::{SnapshotError, SnapshotResult};
use crate::snapshot::{PlayerSnapshot, SnapshotKey, SNAPSHOT_VERSION};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Snapshot file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotFormat {
    /// JSON (human readable)
    Json,
    /// Binary (compact)
    Binary,
}

impl Default for SnapshotFormat {
    fn default() -> Self {
        Self::Json
    }
}

impl SnapshotFormat {
    fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "snap",
        }
    }

    fn encode(&self, snapshot: &PlayerSnapshot) -> SnapshotResult<Vec<u8>> {
        match self {
            Self::Json => serde_json::to_vec_pretty(snapshot)
                .map_err(|e| SnapshotError::Serialization(e.to_string())),
            Self::Binary => bincode::serialize(snapshot)
                .map_err(|e| SnapshotError::Serialization(e.to_string())),
        }
    }

    fn decode(&self, bytes: &[u8]) -> SnapshotResult<PlayerSnapshot> {
        match self {
            Self::Json => serde_json::from_slice(bytes)
                .map_err(|e| SnapshotError::Deserialization(e.to_string())),
            Self::Binary => bincode::deserialize(bytes)
                .map_err(|e| SnapshotError::Deserialization(e.to_string())),
        }
    }
}

/// Directory of snapshot files, one per key
#[derive(Debug, Clone)]
pub struct SnapshotDisk {
    dir: PathBuf,
    format: SnapshotFormat,
}

impl SnapshotDisk {
    pub fn new(dir: impl Into<PathBuf>, format: SnapshotFormat) -> Self {
        Self {
            dir: dir.into(),
            format,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Ensure the directory exists
    pub fn ensure_dir(&self) -> SnapshotResult<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// File path for a key
    pub fn path_for(&self, key: &SnapshotKey) -> SnapshotResult<PathBuf> {
        if !is_valid_context(&key.context) {
            return Err(SnapshotError::InvalidContext(key.context.clone()));
        }
        Ok(self.dir.join(format!("{}.{}", key, self.format.extension())))
    }

    /// Write a snapshot, replacing any previous file atomically
    pub fn save(&self, snapshot: &PlayerSnapshot) -> SnapshotResult<()> {
        let path = self.path_for(&snapshot.key)?;
        let bytes = self.format.encode(snapshot)?;
        write_bytes_atomic(&path, &bytes)?;
        Ok(())
    }

    /// Read one snapshot file
    pub fn load(&self, path: &Path) -> SnapshotResult<PlayerSnapshot> {
        let bytes = fs::read(path)?;
        let snapshot = self.format.decode(&bytes)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch(snapshot.version, SNAPSHOT_VERSION));
        }
        Ok(snapshot)
    }

    /// Remove a key's file; a missing file is not an error
    pub fn delete(&self, key: &SnapshotKey) -> SnapshotResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Whether a file exists for the key
    pub fn exists(&self, key: &SnapshotKey) -> bool {
        self.path_for(key).map(|path| path.exists()).unwrap_or(false)
    }

    /// Load every readable snapshot in the directory.
    /// Unreadable files are logged and left in place.
    pub fn load_all(&self) -> SnapshotResult<Vec<PlayerSnapshot>> {
        self.ensure_dir()?;

        let ext = self.format.extension();
        let mut snapshots = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == ext).unwrap_or(false) {
                match self.load(&path) {
                    Ok(snapshot) => snapshots.push(snapshot),
                    Err(err) => log::warn!("Skipping unreadable snapshot {}: {}", path.display(), err),
                }
            }
        }

        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(snapshots)
    }
}

/// Whether `context` can name a snapshot file: non-empty ASCII letters,
/// digits, `-` and `_`
pub fn is_valid_context(context: &str) -> bool {
    !context.is_empty()
        && context
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let tmp_path = temp_path_for(path);
    fs::write(&tmp_path, bytes)?;

    if let Err(error) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("snapshot");
    let tmp_name = format!("{file_name}.tmp");
    match path.parent() {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    }
}
