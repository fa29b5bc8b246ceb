//! Polling for asynchronous operation completion.
//!
//! Mutating calls against the Cirrus API frequently finish asynchronously
//! (a deploy builds and rolls out long after the triggering request
//! returns). This module provides the cooperative polling loop that waits
//! for such an operation to reach a terminal status, with an explicit
//! time budget, prompt cancellation, and retry of transient status-check
//! failures within the remaining budget.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ApiError, PollError};

use super::client::ApiClient;
use super::types::{Deploy, ResourceFamily};

/// Default interval between status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default budget for a deploy to reach a terminal status.
pub const DEFAULT_DEPLOY_TIMEOUT: Duration = Duration::from_secs(15 * 60);

/// Parameters for one polling wait. Created per asynchronous operation
/// and discarded after it settles.
#[derive(Debug, Clone)]
pub struct PollSpec {
    /// Human-readable description of what is being awaited.
    pub what: String,
    /// Interval between status checks.
    pub interval: Duration,
    /// Maximum total time to wait.
    pub max_wait: Duration,
}

impl PollSpec {
    /// Creates a poll spec with the default cadence.
    #[must_use]
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: DEFAULT_DEPLOY_TIMEOUT,
        }
    }

    /// Overrides the check interval.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides the total wait budget.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

/// Classification of one observed status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Not terminal yet; keep polling.
    Pending,
    /// Terminal success.
    Complete,
    /// Terminal failure reported by the server. Returned immediately as a
    /// semantic failure, never retried.
    Failed {
        /// The failure status observed.
        status: String,
        /// Additional detail, if any.
        message: String,
    },
}

/// Repeatedly invokes `status_check` until `classify` reports a terminal
/// outcome, the wait budget elapses, or `cancel` fires.
///
/// Transient `status_check` errors are retried within the remaining
/// budget; they never abort the wait on their own. A `Failed`
/// classification is terminal and surfaces as [`PollError::Failed`].
///
/// # Errors
///
/// Returns [`PollError::TimedOut`] when the budget elapses without a
/// terminal status, [`PollError::Failed`] when the awaited operation
/// reports failure, and [`PollError::Cancelled`] when the token fires.
pub async fn wait_until<S, F, Fut, C>(
    spec: &PollSpec,
    cancel: &CancellationToken,
    mut status_check: F,
    classify: C,
) -> Result<S, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, ApiError>>,
    C: Fn(&S) -> PollOutcome,
{
    let start = tokio::time::Instant::now();

    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled {
                what: spec.what.clone(),
            });
        }

        if start.elapsed() >= spec.max_wait {
            return Err(PollError::TimedOut {
                what: spec.what.clone(),
                waited: start.elapsed(),
            });
        }

        match status_check().await {
            Ok(status) => match classify(&status) {
                PollOutcome::Complete => {
                    debug!("{} reached terminal status", spec.what);
                    return Ok(status);
                }
                PollOutcome::Failed { status, message } => {
                    return Err(PollError::Failed {
                        what: spec.what.clone(),
                        status,
                        message,
                    });
                }
                PollOutcome::Pending => {
                    debug!("{} still pending", spec.what);
                }
            },
            Err(e) => {
                // Poll mechanics failed, not the polled operation; retry
                // within the remaining budget.
                warn!("Status check for {} failed, will retry: {}", spec.what, e);
            }
        }

        tokio::select! {
            () = cancel.cancelled() => {
                return Err(PollError::Cancelled {
                    what: spec.what.clone(),
                });
            }
            () = tokio::time::sleep(spec.interval) => {}
        }
    }
}

/// Waits for a deploy to settle, classifying its status per the server's
/// terminality rules.
///
/// # Errors
///
/// Propagates [`wait_until`] errors.
pub async fn wait_for_deploy(
    api: &ApiClient,
    family: ResourceFamily,
    owner_id: &str,
    deploy_id: &str,
    spec: &PollSpec,
    cancel: &CancellationToken,
) -> Result<Deploy, PollError> {
    wait_until(
        spec,
        cancel,
        || api.get_deploy(family, owner_id, deploy_id),
        |deploy: &Deploy| {
            if deploy.status.is_failure() {
                PollOutcome::Failed {
                    status: deploy.status.to_string(),
                    message: String::new(),
                }
            } else if deploy.status.is_terminal() {
                PollOutcome::Complete
            } else {
                PollOutcome::Pending
            }
        },
    )
    .await
}
