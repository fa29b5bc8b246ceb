//! State store trait definition.
//!
//! This module defines the common interface for workspace state storage
//! backends.

use async_trait::async_trait;

use super::lock::LockInfo;
use super::types::WorkspaceState;
use crate::error::Result;

/// Trait for workspace state storage backends.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the workspace state.
    ///
    /// Returns `None` if no state exists yet.
    async fn load(&self) -> Result<Option<WorkspaceState>>;

    /// Saves the workspace state.
    async fn save(&self, state: &WorkspaceState) -> Result<()>;

    /// Deletes the workspace state.
    async fn delete(&self) -> Result<()>;

    /// Checks if state exists.
    async fn exists(&self) -> Result<bool>;

    /// Acquires a lock on the workspace.
    ///
    /// Returns lock information if successful.
    async fn acquire_lock(&self, holder: &str) -> Result<LockInfo>;

    /// Releases a lock on the workspace.
    async fn release_lock(&self, lock_id: &str) -> Result<()>;

    /// Gets current lock information if locked.
    async fn get_lock_info(&self) -> Result<Option<LockInfo>>;

    /// Checks if the workspace is locked.
    async fn is_locked(&self) -> Result<bool>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}
