//! Generic resource orchestration.
//!
//! Every resource type runs the same lifecycle: build the primary request
//! from the plan, mutate the primary resource, converge the applicable
//! sub-resources in dependency order, optionally wait for the resulting
//! deploy, and assemble the final model from the freshest server state.
//! That loop lives here once; each resource type plugs in its endpoints
//! and reconcilers through [`ResourceAdapter`].

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use std::time::Duration;

use crate::api::{
    wait_for_deploy, ApiClient, ApiResult, PollSpec, ResourceFamily, CIRRUS_API_URL,
    DEFAULT_DEPLOY_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
use crate::error::{ApiError, ProviderError, ReconcileError, Result};
use crate::reconcile::SubResourceFailure;

/// Provider-level settings injected into every orchestrator.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Bearer token for the Cirrus API.
    pub api_key: String,
    /// Owner/account identifier stamped onto create requests.
    pub owner_id: String,
    /// API base URL.
    pub base_url: String,
    /// Whether to wait for deploy completion after mutations.
    pub wait_for_deploy: bool,
    /// Whether to skip triggering a deploy after updates.
    pub skip_deploy_after_update: bool,
    /// Interval between deploy status checks.
    pub poll_interval: Duration,
    /// Budget for a deploy to reach a terminal status.
    pub poll_timeout: Duration,
}

impl ProviderSettings {
    /// Creates settings with default flags against the production API.
    #[must_use]
    pub fn new(api_key: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            owner_id: owner_id.into(),
            base_url: CIRRUS_API_URL.to_string(),
            wait_for_deploy: true,
            skip_deploy_after_update: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            poll_timeout: DEFAULT_DEPLOY_TIMEOUT,
        }
    }

    /// Overrides the API base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets whether mutations wait for deploy completion.
    #[must_use]
    pub const fn with_wait_for_deploy(mut self, wait: bool) -> Self {
        self.wait_for_deploy = wait;
        self
    }

    /// Sets whether updates skip the post-update deploy.
    #[must_use]
    pub const fn with_skip_deploy_after_update(mut self, skip: bool) -> Self {
        self.skip_deploy_after_update = skip;
        self
    }

    /// Overrides the deploy polling cadence.
    #[must_use]
    pub const fn with_poll_cadence(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.poll_timeout = timeout;
        self
    }
}

/// Lifecycle phases, carried in error context so a failure identifies
/// where it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Building requests from the plan.
    Planning,
    /// The primary create/update/delete call is in flight.
    PrimaryMutation,
    /// Sub-resource reconcilers are running.
    SubResourceReconciliation,
    /// Waiting for an asynchronous deploy.
    Polling,
    /// The operation finished.
    Settled,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Planning => "plan",
            Self::PrimaryMutation => "mutate",
            Self::SubResourceReconciliation => "reconcile",
            Self::Polling => "await deploy for",
            Self::Settled => "settle",
        };
        write!(f, "{s}")
    }
}

/// The outcome of a create or update: the best-known model, plus the
/// partial-reconciliation error if a sub-resource step failed partway.
/// Callers persist the model either way; a present `partial` still means
/// the operation failed.
#[derive(Debug)]
pub struct ApplyResult<M> {
    /// Best-known resulting model, reflecting what was actually applied.
    pub model: M,
    /// Partial-failure report, if any sub-resource step failed.
    pub partial: Option<ReconcileError>,
}

impl<M> ApplyResult<M> {
    /// A fully-converged result.
    #[must_use]
    pub const fn converged(model: M) -> Self {
        Self {
            model,
            partial: None,
        }
    }

    /// Returns true if every step applied cleanly.
    #[must_use]
    pub const fn is_converged(&self) -> bool {
        self.partial.is_none()
    }
}

/// Converts a reconciler's partial failure into the error carried by an
/// [`ApplyResult`].
#[must_use]
pub fn partial_error(resource_id: &str, failure: SubResourceFailure) -> ReconcileError {
    ReconcileError::Partial {
        resource_id: resource_id.to_string(),
        sub_resource: failure.sub_resource.to_string(),
        applied: failure.applied,
        attempted: failure.attempted,
        cause: failure.error.to_string(),
    }
}

/// The per-resource-type capability set plugged into [`Orchestrator`].
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Desired configuration for one cycle.
    type Plan: Send + Sync;
    /// The persisted resource model.
    type Model: Send + Sync;

    /// Resource kind name for logs and errors.
    const KIND: &'static str;

    /// Endpoint family whose deploys gate this kind, if it deploys at all.
    const DEPLOYS: Option<ResourceFamily>;

    /// Returns the server identifier recorded in a model.
    fn model_id(model: &Self::Model) -> &str;

    /// Issues the primary create call, returning the new identifier.
    async fn create_primary(&self, api: &ApiClient, plan: &Self::Plan) -> ApiResult<String>;

    /// Issues the primary update call for primary-owned fields.
    async fn update_primary(
        &self,
        api: &ApiClient,
        id: &str,
        plan: &Self::Plan,
    ) -> ApiResult<()>;

    /// Issues the primary delete call.
    async fn delete_primary(&self, api: &ApiClient, id: &str) -> ApiResult<()>;

    /// Runs the applicable sub-resource reconcilers in dependency order,
    /// then assembles the model from a fresh primary read merged with the
    /// reconciled sub-state fragments. Stops at the first sub-resource
    /// failure and reports it through the result's `partial`.
    async fn reconcile_and_assemble(
        &self,
        api: &ApiClient,
        id: &str,
        state: Option<&Self::Model>,
        plan: &Self::Plan,
    ) -> Result<ApplyResult<Self::Model>>;

    /// Reads the full model, enriching with sub-resources not embedded in
    /// the primary payload. Returns `None` when the resource is gone.
    async fn read(&self, api: &ApiClient, id: &str) -> Result<Option<Self::Model>>;
}

/// Drives the lifecycle of one resource type against the Cirrus API.
///
/// Owns nothing shared: each invocation operates on exactly one
/// state/plan pair, and the only reused handle is the cheaply-cloneable
/// API client.
#[derive(Debug)]
pub struct Orchestrator<A: ResourceAdapter> {
    /// API client.
    api: ApiClient,
    /// Provider settings.
    settings: ProviderSettings,
    /// The resource type's capability set.
    adapter: A,
    /// Cancellation token observed while polling.
    cancel: CancellationToken,
}

impl<A: ResourceAdapter> Orchestrator<A> {
    /// Creates an orchestrator for the given resource type.
    ///
    /// # Errors
    ///
    /// Returns an error if the API client cannot be constructed.
    pub fn new(settings: ProviderSettings, adapter: A) -> Result<Self> {
        let api = ApiClient::with_base_url(
            &settings.api_key,
            &settings.owner_id,
            &settings.base_url,
        )?;
        Ok(Self {
            api,
            settings,
            adapter,
            cancel: CancellationToken::new(),
        })
    }

    /// Attaches a cancellation token observed during polling.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the underlying API client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Creates the resource and converges its create-time sub-resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the primary create, the model assembly, or the
    /// deploy wait fails. Sub-resource failures surface through the
    /// result's `partial` alongside the best-known model.
    pub async fn create(&self, name: &str, plan: &A::Plan) -> Result<ApplyResult<A::Model>> {
        info!("Creating {} '{}'", A::KIND, name);

        let id = self
            .adapter
            .create_primary(&self.api, plan)
            .await
            .map_err(|e| Self::phase_error(name, Phase::PrimaryMutation, &e))?;
        debug!("Created {} '{}' as {}", A::KIND, name, id);

        let result = self
            .adapter
            .reconcile_and_assemble(&self.api, &id, None, plan)
            .await?;
        if !result.is_converged() {
            // Fail fast: no deploy wait past a failed sub-resource step.
            return Ok(result);
        }

        if self.settings.wait_for_deploy {
            if let Some(family) = A::DEPLOYS {
                self.await_latest_deploy(family, &id).await?;
                // The deploy may have settled server-computed fields.
                let model = self.reread_settled(&id).await?;
                return Ok(ApplyResult::converged(model));
            }
        }

        Ok(result)
    }

    /// Reads the resource's current state. `None` means it was deleted
    /// out of band and should be dropped from tracked state.
    ///
    /// # Errors
    ///
    /// Returns an error for any failure other than the resource being
    /// gone.
    pub async fn read(&self, id: &str) -> Result<Option<A::Model>> {
        debug!("Reading {} {}", A::KIND, id);
        self.adapter.read(&self.api, id).await
    }

    /// Updates the resource and converges its sub-resources.
    ///
    /// # Errors
    ///
    /// As for [`Orchestrator::create`].
    pub async fn update(&self, state: &A::Model, plan: &A::Plan) -> Result<ApplyResult<A::Model>> {
        let id = A::model_id(state).to_string();
        info!("Updating {} {}", A::KIND, id);

        self.adapter
            .update_primary(&self.api, &id, plan)
            .await
            .map_err(|e| Self::phase_error(&id, Phase::PrimaryMutation, &e))?;

        let result = self
            .adapter
            .reconcile_and_assemble(&self.api, &id, Some(state), plan)
            .await?;
        if !result.is_converged() {
            return Ok(result);
        }

        if !self.settings.skip_deploy_after_update {
            if let Some(family) = A::DEPLOYS {
                let deploy = self
                    .api
                    .trigger_deploy(family, &id)
                    .await
                    .map_err(|e| Self::phase_error(&id, Phase::Polling, &e))?;

                if self.settings.wait_for_deploy {
                    let spec = self.poll_spec(&deploy.id, &id);
                    wait_for_deploy(&self.api, family, &id, &deploy.id, &spec, &self.cancel)
                        .await
                        .map_err(ProviderError::Poll)?;
                    let model = self.reread_settled(&id).await?;
                    return Ok(ApplyResult::converged(model));
                }
            }
        }

        Ok(result)
    }

    /// Deletes the resource. Already-gone resources count as success.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete call fails for any reason other
    /// than the resource being gone.
    pub async fn delete(&self, id: &str) -> Result<()> {
        info!("Deleting {} {}", A::KIND, id);
        match self.adapter.delete_primary(&self.api, id).await {
            Ok(()) => Ok(()),
            Err(ApiError::NotFound { .. }) => {
                debug!("{} {} already deleted", A::KIND, id);
                Ok(())
            }
            Err(e) => Err(Self::phase_error(id, Phase::PrimaryMutation, &e)),
        }
    }

    /// Imports a pre-existing resource by its server identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource does not exist or cannot be read.
    pub async fn import_by_id(&self, id: &str) -> Result<A::Model> {
        info!("Importing {} {}", A::KIND, id);
        self.adapter.read(&self.api, id).await?.ok_or_else(|| {
            ProviderError::Api(ApiError::not_found(A::KIND, id))
        })
    }

    /// Waits for the deploy a create kicked off.
    async fn await_latest_deploy(&self, family: ResourceFamily, id: &str) -> Result<()> {
        let deploy = self
            .api
            .latest_deploy(family, id)
            .await
            .map_err(|e| Self::phase_error(id, Phase::Polling, &e))?;

        let spec = self.poll_spec(&deploy.id, id);
        wait_for_deploy(&self.api, family, id, &deploy.id, &spec, &self.cancel)
            .await
            .map_err(ProviderError::Poll)?;
        Ok(())
    }

    /// Re-reads the model after a deploy settles.
    async fn reread_settled(&self, id: &str) -> Result<A::Model> {
        self.adapter.read(&self.api, id).await?.ok_or_else(|| {
            ProviderError::Reconcile(ReconcileError::ResourceFailed {
                resource_type: A::KIND.to_string(),
                name: id.to_string(),
                phase: Phase::Settled.to_string(),
                reason: String::from("resource disappeared while awaiting deploy"),
            })
        })
    }

    /// Builds the poll spec for one deploy wait.
    fn poll_spec(&self, deploy_id: &str, resource_id: &str) -> PollSpec {
        PollSpec::new(format!("deploy {deploy_id} of {resource_id}"))
            .with_interval(self.settings.poll_interval)
            .with_max_wait(self.settings.poll_timeout)
    }

    /// Wraps a call failure with resource and phase context.
    fn phase_error(name: &str, phase: Phase, error: &ApiError) -> ProviderError {
        ProviderError::Reconcile(ReconcileError::ResourceFailed {
            resource_type: A::KIND.to_string(),
            name: name.to_string(),
            phase: phase.to_string(),
            reason: error.to_string(),
        })
    }
}
