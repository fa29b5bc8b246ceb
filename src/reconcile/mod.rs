//! Sub-resource reconciliation engine.
//!
//! Each module converges one sub-resource kind (env vars, custom domains,
//! disk, autoscaling, environment membership, ...) from its last-known
//! state to the desired plan, composing the diff resolver with the API
//! client. Reconcilers never roll back applied remote changes: on partial
//! failure they report exactly what was applied so the caller's view of
//! state matches reality.
//!
//! A shared convention across all reconcilers: a `None` plan slice means
//! "leave this sub-resource untouched", while an empty collection means
//! "remove everything".

mod autoscaling;
mod custom_domains;
mod diff;
mod disk;
mod env_vars;
mod environment;
mod ip_allow;
mod log_stream;
mod notifications;
mod routes;
mod secret_files;

use crate::error::ApiError;

pub use autoscaling::reconcile_autoscaling;
pub use custom_domains::reconcile_custom_domains;
pub use diff::{diff_keyed, diff_ordered, KeyedDiff, OrderedDiff, UpdatedEntry};
pub use disk::{reconcile_disk, DiskPlan};
pub use env_vars::reconcile_env_vars;
pub use environment::reconcile_environment;
pub use ip_allow::reconcile_ip_allow_list;
pub use log_stream::reconcile_log_stream;
pub use notifications::reconcile_notification_override;
pub use routes::reconcile_routes;
pub use secret_files::reconcile_secret_files;

/// A failure partway through a reconciler's call sequence.
#[derive(Debug)]
pub struct SubResourceFailure {
    /// Which sub-resource kind failed.
    pub sub_resource: &'static str,
    /// Number of changes applied before the failure.
    pub applied: usize,
    /// Number of changes that were planned in total.
    pub attempted: usize,
    /// The call failure itself.
    pub error: ApiError,
}

/// The result of converging one sub-resource: the state actually on the
/// server afterwards, plus the first failure if one occurred. Never both
/// empty-handed -- a failed reconciliation still reports the applied
/// prefix.
#[derive(Debug)]
pub struct SubOutcome<T> {
    /// Best-known resulting sub-state.
    pub state: T,
    /// First failure, if the sequence did not complete.
    pub failure: Option<SubResourceFailure>,
}

impl<T> SubOutcome<T> {
    /// A fully-converged outcome.
    #[must_use]
    pub const fn ok(state: T) -> Self {
        Self {
            state,
            failure: None,
        }
    }

    /// A partially-applied outcome.
    #[must_use]
    pub const fn failed(state: T, failure: SubResourceFailure) -> Self {
        Self {
            state,
            failure: Some(failure),
        }
    }

    /// Returns true if the sub-resource fully converged.
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        self.failure.is_none()
    }
}
