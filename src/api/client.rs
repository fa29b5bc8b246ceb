//! Cirrus API client implementation.
//!
//! This module provides the HTTP client for the Cirrus control-plane REST
//! API. Every typed endpoint method wraps a single round trip through
//! [`ApiClient::request`], which normalizes transport and status-code
//! failures into the [`ApiError`] taxonomy.

use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::ApiError;

use super::types::{
    ApiErrorBody, Autoscaling, ConnectionInfo, CreateCustomDomainRequest, CreateDiskRequest,
    CreateKeyValueRequest, CreateServiceRequest, CreateStaticSiteRequest, CustomDomain, Deploy,
    Disk, EnvVar, EnvironmentResourcesRequest, IpAllowRule, KeyValueInstance, LogStreamOverride,
    NotificationOverride, ResourceFamily, Route, SecretFile, Service, StaticSite,
    UpdateDiskRequest, UpdateKeyValueRequest, UpdateServiceRequest, UpdateStaticSiteRequest,
};
use super::ApiResult;

/// Cirrus API base URL.
pub const CIRRUS_API_URL: &str = "https://api.cirrus.dev/v1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of attempts for transient failures.
const MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

/// Cirrus API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    /// HTTP client.
    client: Client,
    /// API key.
    api_key: String,
    /// Base URL, overridable for tests.
    base_url: String,
    /// Owner/account identifier stamped onto create requests.
    owner_id: String,
}

/// What a request addresses, used to give `NotFound` errors a useful
/// resource kind and identifier.
#[derive(Debug, Clone, Copy)]
struct Target<'a> {
    /// Kind of resource (service, disk, custom domain, ...).
    resource: &'a str,
    /// Identifier being addressed.
    id: &'a str,
}

impl ApiClient {
    /// Creates a new Cirrus API client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(api_key: &str, owner_id: &str) -> ApiResult<Self> {
        Self::with_base_url(api_key, owner_id, CIRRUS_API_URL)
    }

    /// Creates a client against a custom base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(api_key: &str, owner_id: &str, base_url: &str) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            owner_id: owner_id.to_string(),
        })
    }

    /// Returns the owner identifier this client stamps onto create calls.
    #[must_use]
    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Executes a request with retries for transient failures.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        target: Target<'_>,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<T> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                debug!("Retry attempt {attempt} of {MAX_RETRIES} for {method} {path}");
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * u64::from(attempt)))
                    .await;
            }

            match self
                .request_once::<T>(method.clone(), path, target, body)
                .await
            {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if e.is_retryable() {
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| ApiError::transport(String::from("Max retries exceeded"))))
    }

    /// Executes a single HTTP round trip.
    async fn request_once<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        target: Target<'_>,
        body: Option<&serde_json::Value>,
    ) -> ApiResult<T> {
        trace!("{} {}/{}", method, self.base_url, path);

        let mut builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, path))
            .header(header::ACCEPT, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key));

        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::transport(format!("Request failed: {e}")))?;

        let status = response.status();

        if !status.is_success() {
            return Err(Self::classify_failure(status, target, response).await);
        }

        if status == StatusCode::NO_CONTENT {
            // Decode "null" so endpoints returning () work uniformly.
            return serde_json::from_value(serde_json::Value::Null)
                .map_err(|e| ApiError::validation(format!("Empty response not accepted: {e}")));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::validation(format!("Failed to parse response: {e}")))
    }

    /// Classifies a non-success response into the error taxonomy.
    async fn classify_failure(
        status: StatusCode,
        target: Target<'_>,
        response: reqwest::Response,
    ) -> ApiError {
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let retry_after = if retry_after == 0 { 60 } else { retry_after };

            return ApiError::RateLimited {
                retry_after_secs: retry_after,
            };
        }

        let message = response
            .json::<ApiErrorBody>()
            .await
            .map(|b| b.message)
            .unwrap_or_default();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::AuthenticationFailed {
                message: if message.is_empty() {
                    String::from("Invalid API key")
                } else {
                    message
                },
            },
            StatusCode::NOT_FOUND => ApiError::not_found(target.resource, target.id),
            StatusCode::CONFLICT => ApiError::Conflict { message },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ApiError::validation(message)
            }
            _ => ApiError::unexpected(status.as_u16(), message),
        }
    }

    /// Serializes a request body, stamping in the owner identifier.
    fn owned_body<B: Serialize>(&self, request: &B) -> ApiResult<serde_json::Value> {
        let mut body = serde_json::to_value(request)
            .map_err(|e| ApiError::validation(format!("Failed to encode request: {e}")))?;
        body["ownerId"] = serde_json::Value::String(self.owner_id.clone());
        Ok(body)
    }

    /// Serializes a request body as-is.
    fn body<B: Serialize>(request: &B) -> ApiResult<serde_json::Value> {
        serde_json::to_value(request)
            .map_err(|e| ApiError::validation(format!("Failed to encode request: {e}")))
    }

    // ------------------------------------------------------------------
    // Web services
    // ------------------------------------------------------------------

    /// Creates a web service.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be created.
    pub async fn create_service(&self, request: &CreateServiceRequest) -> ApiResult<Service> {
        let body = self.owned_body(request)?;
        self.request(
            Method::POST,
            "services",
            Target { resource: "service", id: &request.name },
            Some(&body),
        )
        .await
    }

    /// Gets a web service by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the service does not exist.
    pub async fn get_service(&self, service_id: &str) -> ApiResult<Service> {
        self.request(
            Method::GET,
            &format!("services/{service_id}"),
            Target { resource: "service", id: service_id },
            None,
        )
        .await
    }

    /// Updates a web service's primary fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be updated.
    pub async fn update_service(
        &self,
        service_id: &str,
        request: &UpdateServiceRequest,
    ) -> ApiResult<Service> {
        let body = Self::body(request)?;
        self.request(
            Method::PATCH,
            &format!("services/{service_id}"),
            Target { resource: "service", id: service_id },
            Some(&body),
        )
        .await
    }

    /// Deletes a web service.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be deleted.
    pub async fn delete_service(&self, service_id: &str) -> ApiResult<()> {
        self.request(
            Method::DELETE,
            &format!("services/{service_id}"),
            Target { resource: "service", id: service_id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Static sites
    // ------------------------------------------------------------------

    /// Creates a static site.
    ///
    /// # Errors
    ///
    /// Returns an error if the site cannot be created.
    pub async fn create_static_site(
        &self,
        request: &CreateStaticSiteRequest,
    ) -> ApiResult<StaticSite> {
        let body = self.owned_body(request)?;
        self.request(
            Method::POST,
            "static-sites",
            Target { resource: "static site", id: &request.name },
            Some(&body),
        )
        .await
    }

    /// Gets a static site by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the site does not exist.
    pub async fn get_static_site(&self, site_id: &str) -> ApiResult<StaticSite> {
        self.request(
            Method::GET,
            &format!("static-sites/{site_id}"),
            Target { resource: "static site", id: site_id },
            None,
        )
        .await
    }

    /// Updates a static site's primary fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the site cannot be updated.
    pub async fn update_static_site(
        &self,
        site_id: &str,
        request: &UpdateStaticSiteRequest,
    ) -> ApiResult<StaticSite> {
        let body = Self::body(request)?;
        self.request(
            Method::PATCH,
            &format!("static-sites/{site_id}"),
            Target { resource: "static site", id: site_id },
            Some(&body),
        )
        .await
    }

    /// Deletes a static site.
    ///
    /// # Errors
    ///
    /// Returns an error if the site cannot be deleted.
    pub async fn delete_static_site(&self, site_id: &str) -> ApiResult<()> {
        self.request(
            Method::DELETE,
            &format!("static-sites/{site_id}"),
            Target { resource: "static site", id: site_id },
            None,
        )
        .await
    }

    /// Replaces a static site's ordered routing rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the routes cannot be replaced.
    pub async fn put_routes(&self, site_id: &str, routes: &[Route]) -> ApiResult<Vec<Route>> {
        let body = Self::body(&routes)?;
        self.request(
            Method::PUT,
            &format!("static-sites/{site_id}/routes"),
            Target { resource: "static site", id: site_id },
            Some(&body),
        )
        .await
    }

    /// Lists a static site's routing rules in evaluation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the routes cannot be listed.
    pub async fn list_routes(&self, site_id: &str) -> ApiResult<Vec<Route>> {
        self.request(
            Method::GET,
            &format!("static-sites/{site_id}/routes"),
            Target { resource: "static site", id: site_id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Deploys (services and static sites)
    // ------------------------------------------------------------------

    /// Triggers a new deploy.
    ///
    /// # Errors
    ///
    /// Returns an error if the deploy cannot be started.
    pub async fn trigger_deploy(&self, family: ResourceFamily, id: &str) -> ApiResult<Deploy> {
        self.request(
            Method::POST,
            &format!("{}/{id}/deploys", family.as_path()),
            Target { resource: "deploy", id },
            Some(&serde_json::json!({})),
        )
        .await
    }

    /// Gets the most recent deploy, e.g. the one a create kicked off.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when no deploy exists yet.
    pub async fn latest_deploy(&self, family: ResourceFamily, id: &str) -> ApiResult<Deploy> {
        self.request(
            Method::GET,
            &format!("{}/{id}/deploys/latest", family.as_path()),
            Target { resource: "deploy", id },
            None,
        )
        .await
    }

    /// Gets a deploy's current status.
    ///
    /// # Errors
    ///
    /// Returns an error if the deploy cannot be fetched.
    pub async fn get_deploy(
        &self,
        family: ResourceFamily,
        id: &str,
        deploy_id: &str,
    ) -> ApiResult<Deploy> {
        self.request(
            Method::GET,
            &format!("{}/{id}/deploys/{deploy_id}", family.as_path()),
            Target { resource: "deploy", id: deploy_id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Environment variables (bulk replace)
    // ------------------------------------------------------------------

    /// Replaces all environment variables on a service or static site.
    ///
    /// # Errors
    ///
    /// Returns an error if the variables cannot be replaced.
    pub async fn put_env_vars(
        &self,
        family: ResourceFamily,
        id: &str,
        env_vars: &[EnvVar],
    ) -> ApiResult<Vec<EnvVar>> {
        let body = Self::body(&env_vars)?;
        self.request(
            Method::PUT,
            &format!("{}/{id}/env-vars", family.as_path()),
            Target { resource: "env vars", id },
            Some(&body),
        )
        .await
    }

    /// Lists the environment variables on a service or static site.
    ///
    /// # Errors
    ///
    /// Returns an error if the variables cannot be listed.
    pub async fn list_env_vars(
        &self,
        family: ResourceFamily,
        id: &str,
    ) -> ApiResult<Vec<EnvVar>> {
        self.request(
            Method::GET,
            &format!("{}/{id}/env-vars", family.as_path()),
            Target { resource: "env vars", id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Secret files (bulk replace, services only)
    // ------------------------------------------------------------------

    /// Replaces all secret files on a service.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be replaced.
    pub async fn put_secret_files(
        &self,
        service_id: &str,
        files: &[SecretFile],
    ) -> ApiResult<Vec<SecretFile>> {
        let body = Self::body(&files)?;
        self.request(
            Method::PUT,
            &format!("services/{service_id}/secret-files"),
            Target { resource: "secret files", id: service_id },
            Some(&body),
        )
        .await
    }

    /// Lists the secret files on a service.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be listed.
    pub async fn list_secret_files(&self, service_id: &str) -> ApiResult<Vec<SecretFile>> {
        self.request(
            Method::GET,
            &format!("services/{service_id}/secret-files"),
            Target { resource: "secret files", id: service_id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Custom domains (per-entry)
    // ------------------------------------------------------------------

    /// Lists the custom domains attached to a service or static site.
    ///
    /// # Errors
    ///
    /// Returns an error if the domains cannot be listed.
    pub async fn list_custom_domains(
        &self,
        family: ResourceFamily,
        id: &str,
    ) -> ApiResult<Vec<CustomDomain>> {
        self.request(
            Method::GET,
            &format!("{}/{id}/custom-domains", family.as_path()),
            Target { resource: "custom domains", id },
            None,
        )
        .await
    }

    /// Attaches a single custom domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain cannot be attached.
    pub async fn create_custom_domain(
        &self,
        family: ResourceFamily,
        id: &str,
        name: &str,
    ) -> ApiResult<CustomDomain> {
        let body = Self::body(&CreateCustomDomainRequest {
            name: name.to_string(),
        })?;
        self.request(
            Method::POST,
            &format!("{}/{id}/custom-domains", family.as_path()),
            Target { resource: "custom domain", id: name },
            Some(&body),
        )
        .await
    }

    /// Detaches a single custom domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the domain cannot be detached.
    pub async fn delete_custom_domain(
        &self,
        family: ResourceFamily,
        id: &str,
        domain_id: &str,
    ) -> ApiResult<()> {
        self.request(
            Method::DELETE,
            &format!("{}/{id}/custom-domains/{domain_id}", family.as_path()),
            Target { resource: "custom domain", id: domain_id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Disks (single object per service)
    // ------------------------------------------------------------------

    /// Gets the disk attached to a service, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when the service has no disk.
    pub async fn get_service_disk(&self, service_id: &str) -> ApiResult<Disk> {
        self.request(
            Method::GET,
            &format!("services/{service_id}/disk"),
            Target { resource: "disk", id: service_id },
            None,
        )
        .await
    }

    /// Creates a disk attached to a service.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk cannot be created.
    pub async fn create_disk(&self, request: &CreateDiskRequest) -> ApiResult<Disk> {
        let body = Self::body(request)?;
        self.request(
            Method::POST,
            "disks",
            Target { resource: "disk", id: &request.name },
            Some(&body),
        )
        .await
    }

    /// Resizes or renames a disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk cannot be updated.
    pub async fn update_disk(&self, disk_id: &str, request: &UpdateDiskRequest) -> ApiResult<Disk> {
        let body = Self::body(request)?;
        self.request(
            Method::PATCH,
            &format!("disks/{disk_id}"),
            Target { resource: "disk", id: disk_id },
            Some(&body),
        )
        .await
    }

    /// Deletes a disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the disk cannot be deleted.
    pub async fn delete_disk(&self, disk_id: &str) -> ApiResult<()> {
        self.request(
            Method::DELETE,
            &format!("disks/{disk_id}"),
            Target { resource: "disk", id: disk_id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Autoscaling (single object per service)
    // ------------------------------------------------------------------

    /// Gets a service's autoscaling configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when autoscaling is not configured.
    pub async fn get_autoscaling(&self, service_id: &str) -> ApiResult<Autoscaling> {
        self.request(
            Method::GET,
            &format!("services/{service_id}/autoscaling"),
            Target { resource: "autoscaling", id: service_id },
            None,
        )
        .await
    }

    /// Sets a service's autoscaling configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be applied.
    pub async fn put_autoscaling(
        &self,
        service_id: &str,
        config: &Autoscaling,
    ) -> ApiResult<Autoscaling> {
        let body = Self::body(config)?;
        self.request(
            Method::PUT,
            &format!("services/{service_id}/autoscaling"),
            Target { resource: "autoscaling", id: service_id },
            Some(&body),
        )
        .await
    }

    /// Removes a service's autoscaling configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be removed.
    pub async fn delete_autoscaling(&self, service_id: &str) -> ApiResult<()> {
        self.request(
            Method::DELETE,
            &format!("services/{service_id}/autoscaling"),
            Target { resource: "autoscaling", id: service_id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Environment membership
    // ------------------------------------------------------------------

    /// Adds resources to an environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the resources cannot be added.
    pub async fn add_environment_resources(
        &self,
        environment_id: &str,
        resource_ids: &[String],
    ) -> ApiResult<()> {
        let body = Self::body(&EnvironmentResourcesRequest {
            resource_ids: resource_ids.to_vec(),
        })?;
        self.request(
            Method::POST,
            &format!("environments/{environment_id}/resources"),
            Target { resource: "environment", id: environment_id },
            Some(&body),
        )
        .await
    }

    /// Removes resources from an environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the resources cannot be removed.
    pub async fn remove_environment_resources(
        &self,
        environment_id: &str,
        resource_ids: &[String],
    ) -> ApiResult<()> {
        let body = Self::body(&EnvironmentResourcesRequest {
            resource_ids: resource_ids.to_vec(),
        })?;
        self.request(
            Method::DELETE,
            &format!("environments/{environment_id}/resources"),
            Target { resource: "environment", id: environment_id },
            Some(&body),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Notification overrides (update-only)
    // ------------------------------------------------------------------

    /// Gets a service's notification override.
    ///
    /// # Errors
    ///
    /// Returns an error if the override cannot be fetched.
    pub async fn get_notification_override(
        &self,
        service_id: &str,
    ) -> ApiResult<NotificationOverride> {
        self.request(
            Method::GET,
            &format!("notification-settings/services/{service_id}"),
            Target { resource: "notification override", id: service_id },
            None,
        )
        .await
    }

    /// Updates a service's notification override.
    ///
    /// # Errors
    ///
    /// Returns an error if the override cannot be updated.
    pub async fn patch_notification_override(
        &self,
        service_id: &str,
        config: &NotificationOverride,
    ) -> ApiResult<NotificationOverride> {
        let body = Self::body(config)?;
        self.request(
            Method::PATCH,
            &format!("notification-settings/services/{service_id}"),
            Target { resource: "notification override", id: service_id },
            Some(&body),
        )
        .await
    }

    // ------------------------------------------------------------------
    // Log stream overrides (upsert / delete)
    // ------------------------------------------------------------------

    /// Gets a resource's log stream override.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] when no override is configured.
    pub async fn get_log_stream_override(
        &self,
        resource_id: &str,
    ) -> ApiResult<LogStreamOverride> {
        self.request(
            Method::GET,
            &format!("log-streams/resources/{resource_id}"),
            Target { resource: "log stream override", id: resource_id },
            None,
        )
        .await
    }

    /// Creates or replaces a resource's log stream override.
    ///
    /// # Errors
    ///
    /// Returns an error if the override cannot be applied.
    pub async fn put_log_stream_override(
        &self,
        resource_id: &str,
        config: &LogStreamOverride,
    ) -> ApiResult<LogStreamOverride> {
        let body = Self::body(config)?;
        self.request(
            Method::PUT,
            &format!("log-streams/resources/{resource_id}"),
            Target { resource: "log stream override", id: resource_id },
            Some(&body),
        )
        .await
    }

    /// Removes a resource's log stream override.
    ///
    /// # Errors
    ///
    /// Returns an error if the override cannot be removed.
    pub async fn delete_log_stream_override(&self, resource_id: &str) -> ApiResult<()> {
        self.request(
            Method::DELETE,
            &format!("log-streams/resources/{resource_id}"),
            Target { resource: "log stream override", id: resource_id },
            None,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Key-value instances
    // ------------------------------------------------------------------

    /// Creates a key-value instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be created.
    pub async fn create_key_value(
        &self,
        request: &CreateKeyValueRequest,
    ) -> ApiResult<KeyValueInstance> {
        let body = self.owned_body(request)?;
        self.request(
            Method::POST,
            "key-value",
            Target { resource: "key-value instance", id: &request.name },
            Some(&body),
        )
        .await
    }

    /// Gets a key-value instance by ID.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the instance does not exist.
    pub async fn get_key_value(&self, instance_id: &str) -> ApiResult<KeyValueInstance> {
        self.request(
            Method::GET,
            &format!("key-value/{instance_id}"),
            Target { resource: "key-value instance", id: instance_id },
            None,
        )
        .await
    }

    /// Updates a key-value instance's primary fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be updated.
    pub async fn update_key_value(
        &self,
        instance_id: &str,
        request: &UpdateKeyValueRequest,
    ) -> ApiResult<KeyValueInstance> {
        let body = Self::body(request)?;
        self.request(
            Method::PATCH,
            &format!("key-value/{instance_id}"),
            Target { resource: "key-value instance", id: instance_id },
            Some(&body),
        )
        .await
    }

    /// Deletes a key-value instance.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be deleted.
    pub async fn delete_key_value(&self, instance_id: &str) -> ApiResult<()> {
        self.request(
            Method::DELETE,
            &format!("key-value/{instance_id}"),
            Target { resource: "key-value instance", id: instance_id },
            None,
        )
        .await
    }

    /// Replaces a key-value instance's IP allow list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be replaced.
    pub async fn put_ip_allow_list(
        &self,
        instance_id: &str,
        rules: &[IpAllowRule],
    ) -> ApiResult<Vec<IpAllowRule>> {
        let body = Self::body(&rules)?;
        self.request(
            Method::PUT,
            &format!("key-value/{instance_id}/ip-allow-list"),
            Target { resource: "ip allow list", id: instance_id },
            Some(&body),
        )
        .await
    }

    /// Lists a key-value instance's IP allow list.
    ///
    /// # Errors
    ///
    /// Returns an error if the list cannot be fetched.
    pub async fn list_ip_allow_list(&self, instance_id: &str) -> ApiResult<Vec<IpAllowRule>> {
        self.request(
            Method::GET,
            &format!("key-value/{instance_id}/ip-allow-list"),
            Target { resource: "ip allow list", id: instance_id },
            None,
        )
        .await
    }

    /// Gets a key-value instance's connection info.
    ///
    /// # Errors
    ///
    /// Returns an error if the info cannot be fetched.
    pub async fn get_connection_info(&self, instance_id: &str) -> ApiResult<ConnectionInfo> {
        self.request(
            Method::GET,
            &format!("key-value/{instance_id}/connection-info"),
            Target { resource: "connection info", id: instance_id },
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_client(server: &MockServer) -> ApiClient {
        ApiClient::with_base_url("test-key", "own-123", &server.uri())
            .expect("client should build")
    }

    #[tokio::test]
    async fn test_bearer_token_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/srv-1"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "srv-1", "name": "api"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let service = client.get_service("srv-1").await.expect("get should succeed");
        assert_eq!(service.name, "api");
    }

    #[tokio::test]
    async fn test_404_classified_as_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/srv-gone"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"message": "no such service"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let err = client.get_service("srv-gone").await.expect_err("should fail");

        match err {
            ApiError::NotFound { resource, id } => {
                assert_eq!(resource, "service");
                assert_eq!(id, "srv-gone");
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_409_classified_as_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/services/srv-1"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({"message": "deploy in progress"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let err = client
            .update_service("srv-1", &UpdateServiceRequest::default())
            .await
            .expect_err("should fail");

        assert!(matches!(err, ApiError::Conflict { ref message } if message == "deploy in progress"));
    }

    #[tokio::test]
    async fn test_422_classified_as_validation() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/services/srv-1/env-vars"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({"message": "key must not be empty"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let err = client
            .put_env_vars(ResourceFamily::Services, "srv-1", &[])
            .await
            .expect_err("should fail");

        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_missing_required_field_is_validation_not_panic() {
        let server = MockServer::start().await;
        // `id` is required on Service; this payload lacks it.
        Mock::given(method("GET"))
            .and(path("/services/srv-1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"name": "api"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let err = client.get_service("srv-1").await.expect_err("should fail");

        assert!(matches!(err, ApiError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_owner_id_stamped_on_create() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/key-value"))
            .and(body_json(serde_json::json!({
                "name": "cache",
                "plan": "starter",
                "region": "eu-central",
                "ownerId": "own-123",
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"id": "red-1", "name": "cache"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let created = client
            .create_key_value(&CreateKeyValueRequest {
                name: String::from("cache"),
                plan: String::from("starter"),
                region: String::from("eu-central"),
                maxmemory_policy: None,
                ip_allow_list: vec![],
            })
            .await
            .expect("create should succeed");

        assert_eq!(created.id, "red-1");
    }

    #[tokio::test]
    async fn test_delete_returns_ok_on_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/services/srv-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        client.delete_service("srv-1").await.expect("delete should succeed");
    }

    #[tokio::test]
    async fn test_transient_429_retried_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/services/srv-1"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/services/srv-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"id": "srv-1", "name": "api"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server).await;
        let service = client.get_service("srv-1").await.expect("retry should recover");
        assert_eq!(service.id, "srv-1");
    }
}
