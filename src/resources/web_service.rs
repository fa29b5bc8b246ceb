//! Web service resource type.
//!
//! The richest resource: beyond its primary fields it owns env vars,
//! secret files, a disk, custom domains, autoscaling, environment
//! membership, a notification override, and a log stream override.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{
    ApiClient, ApiResult, Autoscaling, CreateServiceRequest, CustomDomain, Disk, EnvVar,
    LogStreamOverride, NotificationOverride, ResourceFamily, SecretFile, Service,
    UpdateServiceRequest,
};
use crate::error::{ApiError, Result};
use crate::reconcile::{
    reconcile_autoscaling, reconcile_custom_domains, reconcile_disk, reconcile_env_vars,
    reconcile_environment, reconcile_log_stream, reconcile_notification_override,
    reconcile_secret_files, DiskPlan, SubResourceFailure,
};

use super::orchestrator::{partial_error, ApplyResult, ResourceAdapter};
use super::not_found_as_none;

/// Desired configuration for a web service.
///
/// List-valued fields are `Option`al: `None` means "leave whatever the
/// server has untouched", an empty collection means "remove everything".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebServicePlan {
    /// Service name.
    pub name: String,
    /// Instance plan identifier.
    pub plan: String,
    /// Region identifier.
    pub region: String,
    /// Container image, for image-backed services.
    #[serde(default)]
    pub image: Option<String>,
    /// Git repository, for repo-backed services.
    #[serde(default)]
    pub repo: Option<String>,
    /// Git branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Build command.
    #[serde(default)]
    pub build_command: Option<String>,
    /// Start command.
    #[serde(default)]
    pub start_command: Option<String>,
    /// HTTP health check path.
    #[serde(default)]
    pub health_check_path: Option<String>,
    /// Number of instances (ignored while autoscaling is declared).
    #[serde(default = "default_instances")]
    pub num_instances: u32,
    /// Environment variables.
    #[serde(default)]
    pub env_vars: Option<Vec<EnvVar>>,
    /// Secret files.
    #[serde(default)]
    pub secret_files: Option<Vec<SecretFile>>,
    /// Custom domain names.
    #[serde(default)]
    pub custom_domains: Option<Vec<String>>,
    /// Persistent disk.
    #[serde(default)]
    pub disk: Option<WebServiceDiskPlan>,
    /// Autoscaling configuration.
    #[serde(default)]
    pub autoscaling: Option<Autoscaling>,
    /// Environment membership.
    #[serde(default)]
    pub environment_id: Option<String>,
    /// Notification override.
    #[serde(default)]
    pub notifications: Option<NotificationOverride>,
    /// Log stream override.
    #[serde(default)]
    pub log_stream: Option<LogStreamOverride>,
}

const fn default_instances() -> u32 {
    1
}

/// Declared disk configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebServiceDiskPlan {
    /// Disk name.
    pub name: String,
    /// Size in GB.
    pub size_gb: u32,
    /// Mount path inside the container.
    pub mount_path: String,
}

impl WebServiceDiskPlan {
    fn to_disk_plan(&self) -> DiskPlan {
        DiskPlan {
            name: self.name.clone(),
            size_gb: self.size_gb,
            mount_path: self.mount_path.clone(),
        }
    }
}

/// The persisted model of a web service: primary fields from the server
/// plus every reconciled sub-resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebServiceModel {
    /// Server-assigned identifier (`srv-` prefixed).
    pub id: String,
    /// Service name.
    pub name: String,
    /// Server-computed URL slug.
    pub slug: String,
    /// Instance plan identifier.
    pub plan: String,
    /// Region identifier.
    pub region: String,
    /// Public URL.
    pub url: Option<String>,
    /// Container image.
    pub image: Option<String>,
    /// Git repository.
    pub repo: Option<String>,
    /// Git branch.
    pub branch: Option<String>,
    /// Build command.
    pub build_command: Option<String>,
    /// Start command.
    pub start_command: Option<String>,
    /// HTTP health check path.
    pub health_check_path: Option<String>,
    /// Number of instances.
    pub num_instances: u32,
    /// Environment variables.
    pub env_vars: Vec<EnvVar>,
    /// Secret files.
    pub secret_files: Vec<SecretFile>,
    /// Custom domains, with server-assigned identifiers.
    pub custom_domains: Vec<CustomDomain>,
    /// Attached disk.
    pub disk: Option<Disk>,
    /// Autoscaling configuration.
    pub autoscaling: Option<Autoscaling>,
    /// Environment membership.
    pub environment_id: Option<String>,
    /// Notification override.
    pub notifications: Option<NotificationOverride>,
    /// Log stream override.
    pub log_stream: Option<LogStreamOverride>,
    /// When the service was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the service was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Sub-state fragments accumulated while reconcilers run. Initialized
/// from prior state so an aborted sequence still reflects reality.
#[derive(Debug, Default)]
struct Fragments {
    env_vars: Vec<EnvVar>,
    secret_files: Vec<SecretFile>,
    custom_domains: Vec<CustomDomain>,
    disk: Option<Disk>,
    autoscaling: Option<Autoscaling>,
    environment_id: Option<String>,
    notifications: Option<NotificationOverride>,
    log_stream: Option<LogStreamOverride>,
}

impl Fragments {
    fn from_state(state: Option<&WebServiceModel>) -> Self {
        state.map_or_else(Self::default, |model| Self {
            env_vars: model.env_vars.clone(),
            secret_files: model.secret_files.clone(),
            custom_domains: model.custom_domains.clone(),
            disk: model.disk.clone(),
            autoscaling: model.autoscaling.clone(),
            environment_id: model.environment_id.clone(),
            notifications: model.notifications.clone(),
            log_stream: model.log_stream.clone(),
        })
    }
}

/// Capability set for web services.
#[derive(Debug, Default)]
pub struct WebServiceAdapter;

impl WebServiceAdapter {
    /// Runs the sub-resource reconcilers in dependency order, stopping at
    /// the first failure.
    async fn converge(
        api: &ApiClient,
        id: &str,
        state: Option<&WebServiceModel>,
        plan: &WebServicePlan,
    ) -> (Fragments, Option<SubResourceFailure>) {
        let mut frags = Fragments::from_state(state);

        // Env vars and secret files ride the create body; reconciling them
        // only makes sense against an existing service.
        if state.is_some() {
            let outcome = reconcile_env_vars(
                api,
                ResourceFamily::Services,
                id,
                &frags.env_vars,
                plan.env_vars.as_deref(),
            )
            .await;
            frags.env_vars = outcome.state;
            if let Some(f) = outcome.failure {
                return (frags, Some(f));
            }

            let outcome = reconcile_secret_files(
                api,
                id,
                &frags.secret_files,
                plan.secret_files.as_deref(),
            )
            .await;
            frags.secret_files = outcome.state;
            if let Some(f) = outcome.failure {
                return (frags, Some(f));
            }
        } else {
            frags.env_vars = plan.env_vars.clone().unwrap_or_default();
            frags.secret_files = plan.secret_files.clone().unwrap_or_default();
        }

        let disk_plan = plan.disk.as_ref().map(WebServiceDiskPlan::to_disk_plan);
        let outcome = reconcile_disk(api, id, frags.disk.as_ref(), disk_plan.as_ref()).await;
        frags.disk = outcome.state;
        if let Some(f) = outcome.failure {
            return (frags, Some(f));
        }

        let outcome = reconcile_custom_domains(
            api,
            ResourceFamily::Services,
            id,
            &frags.custom_domains,
            plan.custom_domains.as_deref(),
        )
        .await;
        frags.custom_domains = outcome.state;
        if let Some(f) = outcome.failure {
            return (frags, Some(f));
        }

        let outcome =
            reconcile_autoscaling(api, id, frags.autoscaling.as_ref(), plan.autoscaling.as_ref())
                .await;
        frags.autoscaling = outcome.state;
        if let Some(f) = outcome.failure {
            return (frags, Some(f));
        }

        let outcome = reconcile_environment(
            api,
            id,
            frags.environment_id.as_deref(),
            plan.environment_id.as_deref(),
        )
        .await;
        frags.environment_id = outcome.state;
        if let Some(f) = outcome.failure {
            return (frags, Some(f));
        }

        let outcome = reconcile_notification_override(
            api,
            id,
            frags.notifications.as_ref(),
            plan.notifications.as_ref(),
        )
        .await;
        frags.notifications = outcome.state;
        if let Some(f) = outcome.failure {
            return (frags, Some(f));
        }

        let outcome =
            reconcile_log_stream(api, id, frags.log_stream.as_ref(), plan.log_stream.as_ref())
                .await;
        frags.log_stream = outcome.state;
        if let Some(f) = outcome.failure {
            return (frags, Some(f));
        }

        (frags, None)
    }

    /// Merges the fresh primary payload with reconciled fragments.
    fn model_from(service: Service, frags: Fragments) -> WebServiceModel {
        WebServiceModel {
            id: service.id,
            name: service.name,
            slug: service.slug,
            plan: service.plan,
            region: service.region,
            url: service.url,
            image: service.image,
            repo: service.repo,
            branch: service.branch,
            build_command: service.build_command,
            start_command: service.start_command,
            health_check_path: service.health_check_path,
            num_instances: service.num_instances,
            env_vars: frags.env_vars,
            secret_files: frags.secret_files,
            custom_domains: frags.custom_domains,
            disk: frags.disk,
            autoscaling: frags.autoscaling,
            environment_id: service.environment_id.or(frags.environment_id),
            notifications: frags.notifications,
            log_stream: frags.log_stream,
            created_at: service.created_at,
            updated_at: service.updated_at,
        }
    }
}

#[async_trait]
impl ResourceAdapter for WebServiceAdapter {
    type Plan = WebServicePlan;
    type Model = WebServiceModel;

    const KIND: &'static str = "web service";
    const DEPLOYS: Option<ResourceFamily> = Some(ResourceFamily::Services);

    fn model_id(model: &Self::Model) -> &str {
        &model.id
    }

    async fn create_primary(&self, api: &ApiClient, plan: &Self::Plan) -> ApiResult<String> {
        let request = CreateServiceRequest {
            name: plan.name.clone(),
            plan: plan.plan.clone(),
            region: plan.region.clone(),
            image: plan.image.clone(),
            repo: plan.repo.clone(),
            branch: plan.branch.clone(),
            build_command: plan.build_command.clone(),
            start_command: plan.start_command.clone(),
            health_check_path: plan.health_check_path.clone(),
            num_instances: plan.num_instances,
            env_vars: plan.env_vars.clone().unwrap_or_default(),
            secret_files: plan.secret_files.clone().unwrap_or_default(),
        };
        let service = api.create_service(&request).await?;
        Ok(service.id)
    }

    async fn update_primary(&self, api: &ApiClient, id: &str, plan: &Self::Plan) -> ApiResult<()> {
        let request = UpdateServiceRequest {
            name: Some(plan.name.clone()),
            plan: Some(plan.plan.clone()),
            image: plan.image.clone(),
            branch: plan.branch.clone(),
            build_command: plan.build_command.clone(),
            start_command: plan.start_command.clone(),
            health_check_path: plan.health_check_path.clone(),
            num_instances: Some(plan.num_instances),
        };
        api.update_service(id, &request).await?;
        Ok(())
    }

    async fn delete_primary(&self, api: &ApiClient, id: &str) -> ApiResult<()> {
        api.delete_service(id).await
    }

    async fn reconcile_and_assemble(
        &self,
        api: &ApiClient,
        id: &str,
        state: Option<&Self::Model>,
        plan: &Self::Plan,
    ) -> Result<ApplyResult<Self::Model>> {
        let (frags, failure) = Self::converge(api, id, state, plan).await;

        let service = api.get_service(id).await?;
        let model = Self::model_from(service, frags);

        Ok(ApplyResult {
            model,
            partial: failure.map(|f| partial_error(id, f)),
        })
    }

    async fn read(&self, api: &ApiClient, id: &str) -> Result<Option<Self::Model>> {
        let service = match api.get_service(id).await {
            Ok(service) => service,
            Err(ApiError::NotFound { .. }) => {
                debug!("Service {id} gone from the server");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let frags = Fragments {
            env_vars: api.list_env_vars(ResourceFamily::Services, id).await?,
            secret_files: api.list_secret_files(id).await?,
            custom_domains: api.list_custom_domains(ResourceFamily::Services, id).await?,
            disk: not_found_as_none(api.get_service_disk(id).await)?,
            autoscaling: not_found_as_none(api.get_autoscaling(id).await)?,
            environment_id: service.environment_id.clone(),
            notifications: not_found_as_none(api.get_notification_override(id).await)?,
            log_stream: not_found_as_none(api.get_log_stream_override(id).await)?,
        };

        Ok(Some(Self::model_from(service, frags)))
    }
}
