//! Cirrus API integration module.
//!
//! This module provides all functionality for talking to the Cirrus
//! control-plane: the REST client, the wire types, and the polling loop
//! used to await asynchronous deploy completion.

mod client;
mod poll;
mod types;

use crate::error::ApiError;

/// Result alias for single API round trips.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

pub use client::{ApiClient, CIRRUS_API_URL};
pub use poll::{
    wait_for_deploy, wait_until, PollOutcome, PollSpec, DEFAULT_DEPLOY_TIMEOUT,
    DEFAULT_POLL_INTERVAL,
};
pub use types::{
    ApiErrorBody, Autoscaling, ConnectionInfo, CreateCustomDomainRequest, CreateDiskRequest,
    CreateKeyValueRequest, CreateServiceRequest, CreateStaticSiteRequest, CustomDomain, Deploy,
    DeployStatus, Disk, EnvVar, EnvironmentResourcesRequest, IpAllowRule, KeyValueInstance,
    LogStreamOverride, LogStreamSetting, MaxMemoryPolicy, NotificationOverride,
    NotificationSetting, ResourceFamily, Route, RouteType, SecretFile, Service, StaticSite,
    UpdateDiskRequest, UpdateKeyValueRequest, UpdateServiceRequest, UpdateStaticSiteRequest,
};
