//! Cirrus API types and data structures.
//!
//! This module defines the wire types exchanged with the Cirrus
//! control-plane API. Responses tolerate unknown fields; fields the server
//! may omit carry `#[serde(default)]` so a sparse payload degrades to
//! defaults instead of a decode failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which endpoint family owns a shared sub-resource (env vars, custom
/// domains live under both services and static sites).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceFamily {
    /// Web services (`/services`).
    Services,
    /// Static sites (`/static-sites`).
    StaticSites,
}

impl ResourceFamily {
    /// Returns the URL path segment for this family.
    #[must_use]
    pub const fn as_path(self) -> &'static str {
        match self {
            Self::Services => "services",
            Self::StaticSites => "static-sites",
        }
    }
}

/// A Cirrus web service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Unique service identifier (`srv-` prefixed).
    pub id: String,
    /// Service name.
    pub name: String,
    /// Server-computed URL slug.
    #[serde(default)]
    pub slug: String,
    /// Instance plan identifier.
    #[serde(default)]
    pub plan: String,
    /// Region identifier.
    #[serde(default)]
    pub region: String,
    /// Public URL, once assigned.
    #[serde(default)]
    pub url: Option<String>,
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
    /// Number of instances (fixed scaling).
    #[serde(default = "default_instances")]
    pub num_instances: u32,
    /// Environment this service belongs to, if any.
    #[serde(default)]
    pub environment_id: Option<String>,
    /// When the service was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the service was last updated.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

const fn default_instances() -> u32 {
    1
}

/// Request body for creating a web service.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    /// Service name.
    pub name: String,
    /// Instance plan identifier.
    pub plan: String,
    /// Region identifier.
    pub region: String,
    /// Container image, for image-backed services.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Git repository, for repo-backed services.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    /// Git branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Build command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    /// Start command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
    /// HTTP health check path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    /// Number of instances.
    pub num_instances: u32,
    /// Environment variables to set at creation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<EnvVar>,
    /// Secret files to set at creation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secret_files: Vec<SecretFile>,
}

/// Request body for updating a web service. Absent fields are left
/// untouched by the server.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New instance plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// New container image.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// New git branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// New build command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    /// New start command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
    /// New health check path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    /// New instance count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_instances: Option<u32>,
}

/// A Cirrus static site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticSite {
    /// Unique site identifier (`sts-` prefixed).
    pub id: String,
    /// Site name.
    pub name: String,
    /// Server-computed URL slug.
    #[serde(default)]
    pub slug: String,
    /// Public URL, once assigned.
    #[serde(default)]
    pub url: Option<String>,
    /// Git repository.
    #[serde(default)]
    pub repo: Option<String>,
    /// Git branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Build command.
    #[serde(default)]
    pub build_command: Option<String>,
    /// Directory published after the build.
    #[serde(default)]
    pub publish_path: Option<String>,
    /// Environment this site belongs to, if any.
    #[serde(default)]
    pub environment_id: Option<String>,
    /// When the site was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the site was last updated.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Request body for creating a static site.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaticSiteRequest {
    /// Site name.
    pub name: String,
    /// Git repository.
    pub repo: String,
    /// Git branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Build command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    /// Directory published after the build.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_path: Option<String>,
    /// Build-time environment variables.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<EnvVar>,
}

/// Request body for updating a static site.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStaticSiteRequest {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New git branch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// New build command.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    /// New publish path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_path: Option<String>,
}

/// A Cirrus key-value instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyValueInstance {
    /// Unique instance identifier (`red-` prefixed).
    pub id: String,
    /// Instance name.
    pub name: String,
    /// Instance plan identifier.
    #[serde(default)]
    pub plan: String,
    /// Region identifier.
    #[serde(default)]
    pub region: String,
    /// Eviction policy applied when memory is full.
    #[serde(default)]
    pub maxmemory_policy: Option<MaxMemoryPolicy>,
    /// Environment this instance belongs to, if any.
    #[serde(default)]
    pub environment_id: Option<String>,
    /// When the instance was created.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the instance was last updated.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Eviction policies for key-value instances.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MaxMemoryPolicy {
    /// Evict nothing; writes fail when memory is full.
    Noeviction,
    /// Evict least-recently-used keys among those with an expiry.
    VolatileLru,
    /// Evict least-recently-used keys across the whole keyspace.
    AllkeysLru,
    /// Evict random keys among those with an expiry.
    VolatileRandom,
    /// Evict random keys across the whole keyspace.
    AllkeysRandom,
}

/// Request body for creating a key-value instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKeyValueRequest {
    /// Instance name.
    pub name: String,
    /// Instance plan identifier.
    pub plan: String,
    /// Region identifier.
    pub region: String,
    /// Eviction policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxmemory_policy: Option<MaxMemoryPolicy>,
    /// Initial IP allow list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip_allow_list: Vec<IpAllowRule>,
}

/// Request body for updating a key-value instance.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateKeyValueRequest {
    /// New name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New instance plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<String>,
    /// New eviction policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maxmemory_policy: Option<MaxMemoryPolicy>,
}

/// Connection details for a key-value instance. Not embedded in the
/// primary payload; fetched separately on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Connection string reachable from inside the platform network.
    pub internal_connection_string: String,
    /// Connection string reachable from the public internet, if enabled.
    #[serde(default)]
    pub external_connection_string: Option<String>,
}

/// An environment variable key/value pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    /// Variable name.
    pub key: String,
    /// Variable value.
    pub value: String,
}

/// A secret file mounted into a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SecretFile {
    /// Mount path inside the container.
    pub path: String,
    /// File contents.
    pub contents: String,
}

/// A custom domain attached to a service or static site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomDomain {
    /// Unique domain identifier (`cdm-` prefixed). Absent on create input.
    #[serde(default)]
    pub id: Option<String>,
    /// Fully-qualified domain name.
    pub name: String,
    /// Whether DNS verification has completed.
    #[serde(default)]
    pub verified: bool,
}

/// Request body for attaching a custom domain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomDomainRequest {
    /// Fully-qualified domain name.
    pub name: String,
}

/// A persistent disk attached to a service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disk {
    /// Unique disk identifier (`dsk-` prefixed).
    pub id: String,
    /// Disk name.
    pub name: String,
    /// Size in GB.
    pub size_gb: u32,
    /// Mount path inside the container.
    pub mount_path: String,
}

/// Request body for creating a disk.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiskRequest {
    /// Service the disk attaches to.
    pub service_id: String,
    /// Disk name.
    pub name: String,
    /// Size in GB.
    pub size_gb: u32,
    /// Mount path inside the container.
    pub mount_path: String,
}

/// Request body for resizing or renaming a disk.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateDiskRequest {
    /// New disk name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// New size in GB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_gb: Option<u32>,
    /// New mount path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_path: Option<String>,
}

/// Autoscaling configuration for a service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Autoscaling {
    /// Minimum instance count.
    pub min: u32,
    /// Maximum instance count.
    pub max: u32,
    /// Target CPU utilization percentage that triggers scaling.
    #[serde(alias = "target_cpu_percent")]
    pub target_cpu_percent: u32,
}

/// Notification behavior override for a single service. Always present
/// server-side; only ever updated, never created or deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOverride {
    /// Which events produce notifications for this service.
    #[serde(alias = "notifications_to_send")]
    pub notifications_to_send: NotificationSetting,
}

/// Notification settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationSetting {
    /// Inherit the owner-level default.
    Default,
    /// Notify on every deploy.
    All,
    /// Notify only on failures.
    Failure,
    /// Never notify.
    None,
}

/// Log stream override routing a resource's logs to a custom endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogStreamOverride {
    /// Whether logs are forwarded or dropped.
    pub setting: LogStreamSetting,
    /// Forwarding endpoint; required when `setting` is `Send`.
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// Log stream settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogStreamSetting {
    /// Forward logs to the configured endpoint.
    Send,
    /// Drop logs for this resource.
    Drop,
}

/// A routing rule for a static site. Order is significant: rules are
/// evaluated top to bottom.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// Rule type.
    #[serde(rename = "type")]
    pub route_type: RouteType,
    /// Source path pattern.
    pub source: String,
    /// Destination path or URL.
    pub destination: String,
}

/// Route rule types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    /// HTTP redirect.
    Redirect,
    /// Internal rewrite.
    Rewrite,
}

/// An IP allow list rule for a key-value instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IpAllowRule {
    /// CIDR block granted access.
    #[serde(alias = "cidr_block")]
    pub cidr_block: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
}

/// Request body for environment membership changes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentResourcesRequest {
    /// Resources to add or remove.
    pub resource_ids: Vec<String>,
}

/// A deploy of a service or static site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deploy {
    /// Unique deploy identifier (`dep-` prefixed).
    pub id: String,
    /// Current status.
    #[serde(default)]
    pub status: DeployStatus,
    /// When the deploy started.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the deploy reached a terminal status.
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Deploy statuses reported by the server.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeployStatus {
    /// Accepted but not yet started.
    #[default]
    Created,
    /// Build phase running.
    BuildInProgress,
    /// Rollout phase running.
    UpdateInProgress,
    /// Deploy succeeded and is serving.
    Live,
    /// Build failed.
    BuildFailed,
    /// Rollout failed.
    UpdateFailed,
    /// Deploy was canceled.
    Canceled,
    /// Service was deactivated mid-deploy.
    Deactivated,
}

impl DeployStatus {
    /// Returns true if the status will not transition further.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(
            self,
            Self::Created | Self::BuildInProgress | Self::UpdateInProgress
        )
    }

    /// Returns true if the status is a terminal failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::BuildFailed | Self::UpdateFailed | Self::Canceled | Self::Deactivated
        )
    }
}

impl std::fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::BuildInProgress => "build_in_progress",
            Self::UpdateInProgress => "update_in_progress",
            Self::Live => "live",
            Self::BuildFailed => "build_failed",
            Self::UpdateFailed => "update_failed",
            Self::Canceled => "canceled",
            Self::Deactivated => "deactivated",
        };
        write!(f, "{s}")
    }
}

/// Structured error body returned by the API on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_status_terminality() {
        assert!(DeployStatus::Live.is_terminal());
        assert!(DeployStatus::BuildFailed.is_terminal());
        assert!(DeployStatus::Canceled.is_terminal());
        assert!(!DeployStatus::Created.is_terminal());
        assert!(!DeployStatus::BuildInProgress.is_terminal());
        assert!(!DeployStatus::UpdateInProgress.is_terminal());
    }

    #[test]
    fn test_deploy_status_failure() {
        assert!(!DeployStatus::Live.is_failure());
        assert!(DeployStatus::BuildFailed.is_failure());
        assert!(DeployStatus::UpdateFailed.is_failure());
        assert!(DeployStatus::Deactivated.is_failure());
    }

    #[test]
    fn test_service_decodes_sparse_payload() {
        // Only `id` and `name` are required; everything else defaults.
        let service: Service =
            serde_json::from_str(r#"{"id":"srv-abc123","name":"api","unknownField":true}"#)
                .expect("sparse payload should decode");

        assert_eq!(service.id, "srv-abc123");
        assert_eq!(service.num_instances, 1);
        assert!(service.url.is_none());
        assert!(service.environment_id.is_none());
    }

    #[test]
    fn test_update_request_skips_absent_fields() {
        let request = UpdateServiceRequest {
            plan: Some(String::from("standard")),
            ..UpdateServiceRequest::default()
        };

        let body = serde_json::to_value(&request).expect("serialize");
        assert_eq!(body, serde_json::json!({"plan": "standard"}));
    }

    #[test]
    fn test_route_wire_format() {
        let route = Route {
            route_type: RouteType::Redirect,
            source: String::from("/old"),
            destination: String::from("/new"),
        };

        let body = serde_json::to_value(&route).expect("serialize");
        assert_eq!(
            body,
            serde_json::json!({"type": "redirect", "source": "/old", "destination": "/new"})
        );
    }
}
