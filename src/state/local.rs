//! Local file-based workspace state backend.
//!
//! Stores one JSON state file and one lock file per project, by default
//! under `~/.cirrus/state/`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ProviderError, Result, StateError};

use super::lock::{default_holder, LockInfo, LOCK_EXPIRY_SECS};
use super::store::StateStore;
use super::types::{WorkspaceState, STATE_VERSION};

/// Default state directory under the user's home.
const STATE_DIR: &str = ".cirrus/state";

/// Local file-based workspace state store.
#[derive(Debug)]
pub struct LocalStateStore {
    /// Directory holding state and lock files.
    base_dir: PathBuf,
    /// Path to the state file.
    state_path: PathBuf,
    /// Path to the lock file.
    lock_path: PathBuf,
}

impl LocalStateStore {
    /// Creates a store for `project` under the default state directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new(project: &str) -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ProviderError::internal("Cannot determine home directory"))?;
        Ok(Self::with_base_dir(project, home.join(STATE_DIR)))
    }

    /// Creates a store for `project` under a custom directory.
    #[must_use]
    pub fn with_base_dir(project: &str, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let state_path = base_dir.join(format!("{project}.state.json"));
        let lock_path = base_dir.join(format!("{project}.lock.json"));

        Self {
            base_dir,
            state_path,
            lock_path,
        }
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if !self.base_dir.exists() {
            debug!("Creating state directory: {}", self.base_dir.display());
            fs::create_dir_all(&self.base_dir).await?;
        }
        Ok(())
    }

    /// Writes `content` atomically: temp file, sync, rename.
    async fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        self.ensure_dir().await?;

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&temp_path, path).await?;
        Ok(())
    }

    /// Reads the lock file if it exists.
    async fn read_lock_file(&self) -> Result<Option<LockInfo>> {
        if !self.lock_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.lock_path).await?;
        let lock: LockInfo = serde_json::from_str(&content).map_err(|e| {
            ProviderError::State(StateError::Corrupted {
                message: format!("Failed to parse lock file: {e}"),
            })
        })?;

        Ok(Some(lock))
    }

    /// Deletes the lock file if present.
    async fn delete_lock_file(&self) -> Result<()> {
        if self.lock_path.exists() {
            fs::remove_file(&self.lock_path).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load(&self) -> Result<Option<WorkspaceState>> {
        if !self.state_path.exists() {
            debug!("State file does not exist: {}", self.state_path.display());
            return Ok(None);
        }

        info!("Loading state from: {}", self.state_path.display());

        let content = fs::read_to_string(&self.state_path).await?;
        let state: WorkspaceState = serde_json::from_str(&content).map_err(|e| {
            ProviderError::State(StateError::Corrupted {
                message: format!("Failed to parse state file: {e}"),
            })
        })?;

        if state.version != STATE_VERSION {
            return Err(ProviderError::State(StateError::VersionMismatch {
                expected: STATE_VERSION.to_string(),
                found: state.version,
            }));
        }

        Ok(Some(state))
    }

    async fn save(&self, state: &WorkspaceState) -> Result<()> {
        info!("Saving state to: {}", self.state_path.display());

        let content = serde_json::to_string_pretty(state).map_err(|e| {
            ProviderError::State(StateError::serialization(format!(
                "Failed to serialize state: {e}"
            )))
        })?;

        self.write_atomic(&self.state_path, &content).await?;
        debug!("State saved");
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if self.state_path.exists() {
            info!("Deleting state file: {}", self.state_path.display());
            fs::remove_file(&self.state_path).await?;
        }
        self.delete_lock_file().await
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.state_path.exists())
    }

    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo> {
        if let Some(existing) = self.read_lock_file().await? {
            if !existing.is_expired() {
                return Err(ProviderError::State(StateError::LockedByOther {
                    holder: existing.holder,
                    since: existing.acquired_at.to_rfc3339(),
                }));
            }
            debug!("Expired lock found, taking over");
        }

        let holder_id = if holder.is_empty() {
            default_holder()
        } else {
            holder.to_string()
        };

        let lock = LockInfo::new(&holder_id);
        let content = serde_json::to_string_pretty(&lock).map_err(|e| {
            ProviderError::State(StateError::LockFailed {
                message: format!("Failed to serialize lock: {e}"),
            })
        })?;
        self.write_atomic(&self.lock_path, &content).await?;

        info!(
            "Acquired workspace lock {} (expires in {}s)",
            lock.lock_id, LOCK_EXPIRY_SECS
        );
        Ok(lock)
    }

    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        if let Some(existing) = self.read_lock_file().await? {
            if existing.lock_id == lock_id {
                self.delete_lock_file().await?;
                info!("Released workspace lock {lock_id}");
            } else {
                debug!(
                    "Lock ID mismatch: expected {lock_id}, found {}",
                    existing.lock_id
                );
            }
        }
        Ok(())
    }

    async fn get_lock_info(&self) -> Result<Option<LockInfo>> {
        self.read_lock_file().await
    }

    async fn is_locked(&self) -> Result<bool> {
        Ok(self
            .read_lock_file()
            .await?
            .is_some_and(|lock| !lock.is_expired()))
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (LocalStateStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalStateStore::with_base_dir("acme", temp_dir.path());
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (store, _temp) = test_store();

        let state = WorkspaceState::new("acme");
        store.save(&state).await.expect("Failed to save state");

        let loaded = store
            .load()
            .await
            .expect("Failed to load state")
            .expect("State should exist");

        assert_eq!(loaded.project, "acme");
        assert_eq!(loaded.version, STATE_VERSION);
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let (store, _temp) = test_store();

        let result = store.load().await.expect("Load should not fail");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let (store, _temp) = test_store();

        let mut state = WorkspaceState::new("acme");
        state.version = String::from("0.9");
        store.save(&state).await.expect("Failed to save state");

        let err = store.load().await.expect_err("Should reject old version");
        assert!(matches!(
            err,
            ProviderError::State(StateError::VersionMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_exists() {
        let (store, _temp) = test_store();

        assert!(!store.exists().await.expect("exists check failed"));

        store
            .save(&WorkspaceState::new("acme"))
            .await
            .expect("Failed to save state");

        assert!(store.exists().await.expect("exists check failed"));
    }

    #[tokio::test]
    async fn test_lock_acquire_release() {
        let (store, _temp) = test_store();

        let lock = store
            .acquire_lock("holder-a")
            .await
            .expect("Failed to acquire lock");

        assert!(store.is_locked().await.expect("is_locked failed"));

        store
            .release_lock(&lock.lock_id)
            .await
            .expect("Failed to release lock");

        assert!(!store.is_locked().await.expect("is_locked failed"));
    }

    #[tokio::test]
    async fn test_lock_conflict() {
        let (store, _temp) = test_store();

        let _held = store
            .acquire_lock("holder-a")
            .await
            .expect("Failed to acquire first lock");

        let result = store.acquire_lock("holder-b").await;
        assert!(matches!(
            result,
            Err(ProviderError::State(StateError::LockedByOther { .. }))
        ));
    }
}
