//! Whole-process snapshot file.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use narrator_core::error::DomainError;

/// A JSON snapshot written atomically (temp file, then rename).
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Creates a handle for `path`. Nothing is read or written yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the snapshot. A missing or unreadable file yields `None`.
    pub async fn load<T: DeserializeOwned>(&self) -> Option<T> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no snapshot yet");
                return None;
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "snapshot unreadable, starting empty");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(state) => Some(state),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "snapshot malformed, starting empty");
                None
            }
        }
    }

    /// Writes `state` atomically.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization or any file
    /// operation fails.
    pub async fn save<T: Serialize>(&self, state: &T) -> Result<(), DomainError> {
        let bytes = serde_json::to_vec(state)
            .map_err(|e| DomainError::Infrastructure(format!("snapshot serialization failed: {e}")))?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("snapshot write failed: {e}")))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("snapshot rename failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("narrator-{}-{name}.json", std::process::id()))
    }

    #[tokio::test]
    async fn test_save_then_load_round_trips() {
        let file = SnapshotFile::new(scratch("roundtrip"));
        let state = BTreeMap::from([("-100".to_owned(), 3_u32)]);

        file.save(&state).await.unwrap();
        let loaded: Option<BTreeMap<String, u32>> = file.load().await;

        assert_eq!(loaded, Some(state));
        assert!(!file.path().with_extension("json.tmp").exists());
        let _ = std::fs::remove_file(file.path());
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let file = SnapshotFile::new(scratch("missing"));

        let loaded: Option<BTreeMap<String, u32>> = file.load().await;

        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_malformed_file_loads_as_none() {
        let path = scratch("malformed");
        std::fs::write(&path, b"{not json").unwrap();
        let file = SnapshotFile::new(&path);

        let loaded: Option<BTreeMap<String, u32>> = file.load().await;

        assert!(loaded.is_none());
        let _ = std::fs::remove_file(path);
    }
}
