//! Workspace state management.
//!
//! Persists the last-known models of managed resources between `cirrus`
//! runs, so the next cycle has a prior state to diff the manifest
//! against. The reconciliation core itself persists nothing; this module
//! exists for the CLI's benefit.

mod local;
mod lock;
mod store;
mod types;

pub use local::LocalStateStore;
pub use lock::{default_holder, LockInfo, LOCK_EXPIRY_SECS};
pub use store::StateStore;
pub use types::{HistoryEntry, OperationKind, WorkspaceState, STATE_VERSION};
