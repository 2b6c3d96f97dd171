//! On-disk subscription snapshot.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use sitelink_core::messages::Snapshot;

use crate::error::SnapshotError;

/// Reads that fill this many bytes are treated as truncated.
pub const MAX_SNAPSHOT_BYTES: usize = 10 * 1024;

/// Reads and writes `<dir>/<site_id>_message_subscriber.json`.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>, site_id: &str) -> Self {
        Self {
            path: dir
                .as_ref()
                .join(format!("{site_id}_message_subscriber.json")),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the snapshot as pretty JSON, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Io`] if the directory or file cannot be written.
    pub fn save(&self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, body)?;
        Ok(())
    }

    /// Reads and fully parses the snapshot.
    ///
    /// Returns `Ok(None)` if no snapshot has been written yet.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::TooLarge`] if the file reaches
    /// [`MAX_SNAPSHOT_BYTES`], [`SnapshotError::Malformed`] if it is not a
    /// valid snapshot, and [`SnapshotError::Io`] on other read failures.
    pub fn load(&self) -> Result<Option<Snapshot>, SnapshotError> {
        let file = match fs::File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut body = Vec::with_capacity(1024);
        file.take(MAX_SNAPSHOT_BYTES as u64).read_to_end(&mut body)?;
        if body.len() >= MAX_SNAPSHOT_BYTES {
            return Err(SnapshotError::TooLarge {
                limit: MAX_SNAPSHOT_BYTES,
            });
        }

        Ok(Some(serde_json::from_slice(&body)?))
    }
}
