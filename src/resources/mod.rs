//! Resource orchestration module.
//!
//! One adapter per top-level resource type (web service, static site,
//! key-value instance), all driven through the generic
//! [`Orchestrator`](orchestrator::Orchestrator) lifecycle.

mod key_value;
mod orchestrator;
mod static_site;
mod web_service;

pub use key_value::{KeyValueAdapter, KeyValueModel, KeyValuePlan};
pub use orchestrator::{
    partial_error, ApplyResult, Orchestrator, Phase, ProviderSettings, ResourceAdapter,
};
pub use static_site::{StaticSiteAdapter, StaticSiteModel, StaticSitePlan};
pub use web_service::{WebServiceAdapter, WebServiceDiskPlan, WebServiceModel, WebServicePlan};

use crate::api::ApiResult;
use crate::error::{ApiError, Result};

/// Maps a remote "not found" to `None`, propagating every other error.
/// Used when enriching reads with sub-resources that may simply not be
/// configured.
pub(crate) fn not_found_as_none<T>(result: ApiResult<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
