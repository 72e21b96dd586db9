//! Token persistence.
//!
//! The session keeps its access/refresh token pair in a small key-value
//! store that outlives the process. [`FileTokenStore`] writes a JSON object
//! to disk; [`MemoryTokenStore`] is for tests and throwaway sessions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Keys under which the session persists its tokens.
pub mod keys {
    /// Key for the short-lived access token.
    pub const ACCESS_TOKEN: &str = "accessToken";

    /// Key for the long-lived refresh token.
    pub const REFRESH_TOKEN: &str = "refreshToken";
}

/// Errors from reading or writing persisted client state.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File exists but does not hold the expected JSON.
    #[error("corrupt data in {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn corrupt(path: &Path, source: serde_json::Error) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Persistent key-value storage for session tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

// =============================================================================
// MemoryTokenStore
// =============================================================================

/// In-process token store. Lost on exit.
#[derive(Default)]
pub struct MemoryTokenStore {
    entries: RwLock<HashMap<String, SecretString>>,
}

impl MemoryTokenStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// FileTokenStore
// =============================================================================

/// Token store backed by a JSON file.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename. On Unix the file is created with mode `0600`.
pub struct FileTokenStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    /// A store persisting to `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(HashMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::corrupt(&self.path, e)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(StoreError::io(&self.path, e)),
        }
    }

    async fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let bytes =
            serde_json::to_vec_pretty(entries).map_err(|e| StoreError::corrupt(&self.path, e))?;
        write_atomic(&self.path, &bytes).await?;
        restrict_permissions(&self.path).await
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn get(&self, key: &str) -> Result<Option<SecretString>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key).map(SecretString::from))
    }

    async fn set(&self, key: &str, value: &SecretString) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.expose_secret().to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.write_all(&entries).await
    }
}

/// Write `bytes` to `path` via a temporary file and rename, creating parent
/// directories as needed.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, bytes)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[cfg(unix)]
async fn restrict_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;

    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .await
        .map_err(|e| StoreError::io(path, e))
}

#[cfg(not(unix))]
async fn restrict_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_set_get_remove() {
        let store = MemoryTokenStore::new();
        assert!(store.get(keys::ACCESS_TOKEN).await.unwrap().is_none());

        store
            .set(keys::ACCESS_TOKEN, &SecretString::from("at-1"))
            .await
            .unwrap();
        let value = store.get(keys::ACCESS_TOKEN).await.unwrap().unwrap();
        assert_eq!(value.expose_secret(), "at-1");

        store.remove(keys::ACCESS_TOKEN).await.unwrap();
        store.remove(keys::ACCESS_TOKEN).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tokens.json");

        let store = FileTokenStore::new(&path);
        store
            .set(keys::REFRESH_TOKEN, &SecretString::from("rt-1"))
            .await
            .unwrap();
        store
            .set(keys::ACCESS_TOKEN, &SecretString::from("at-1"))
            .await
            .unwrap();
        drop(store);

        let reopened = FileTokenStore::new(&path);
        let refresh = reopened.get(keys::REFRESH_TOKEN).await.unwrap().unwrap();
        assert_eq!(refresh.expose_secret(), "rt-1");

        reopened.remove(keys::ACCESS_TOKEN).await.unwrap();
        assert!(reopened.get(keys::ACCESS_TOKEN).await.unwrap().is_none());
        assert!(reopened.get(keys::REFRESH_TOKEN).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("absent.json"));
        assert!(store.get(keys::ACCESS_TOKEN).await.unwrap().is_none());
        store.remove(keys::ACCESS_TOKEN).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_reports_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let store = FileTokenStore::new(&path);
        assert!(matches!(
            store.get(keys::ACCESS_TOKEN).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_store_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let store = FileTokenStore::new(&path);
        store
            .set(keys::ACCESS_TOKEN, &SecretString::from("at"))
            .await
            .unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
