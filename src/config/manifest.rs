//! Manifest specification types.
//!
//! This module defines the structs that map to the `cirrus.deploy.yaml`
//! file. The per-resource plan types live with their adapters in
//! [`crate::resources`]; the manifest wraps them with project and
//! provider settings.
//!
//! A note on list-valued fields (env vars, custom domains, routes, IP
//! allow rules): omitting a field means "leave whatever the server has
//! untouched", while declaring it empty means "remove everything". The
//! two spellings are distinct on purpose.

use serde::{Deserialize, Serialize};

use crate::resources::{KeyValuePlan, ProviderSettings, StaticSitePlan, WebServicePlan};

/// The root manifest structure for a Cirrus workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Provider-level configuration.
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Web services to manage.
    #[serde(default)]
    pub web_services: Vec<WebServicePlan>,
    /// Static sites to manage.
    #[serde(default)]
    pub static_sites: Vec<StaticSitePlan>,
    /// Key-value instances to manage.
    #[serde(default)]
    pub key_value: Vec<KeyValuePlan>,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Unique name for the project; becomes the workspace state key.
    pub name: String,
    /// Environment label (e.g. "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Provider-level configuration. The API key never lives in the
/// manifest; it comes from the `CIRRUS_API_KEY` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Owner/account identifier.
    pub owner_id: String,
    /// API base URL override.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Whether mutations wait for deploy completion.
    #[serde(default = "default_true")]
    pub wait_for_deploy: bool,
    /// Whether updates skip the post-update deploy.
    #[serde(default)]
    pub skip_deploy_after_update: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            owner_id: String::new(),
            base_url: None,
            wait_for_deploy: true,
            skip_deploy_after_update: false,
        }
    }
}

fn default_environment() -> String {
    String::from("dev")
}

const fn default_true() -> bool {
    true
}

impl Manifest {
    /// Returns the total number of declared resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.web_services.len() + self.static_sites.len() + self.key_value.len()
    }

    /// Builds provider settings from this manifest plus the API key.
    #[must_use]
    pub fn provider_settings(&self, api_key: &str) -> ProviderSettings {
        let mut settings = ProviderSettings::new(api_key, &self.provider.owner_id)
            .with_wait_for_deploy(self.provider.wait_for_deploy)
            .with_skip_deploy_after_update(self.provider.skip_deploy_after_update);
        if let Some(base_url) = &self.provider.base_url {
            settings = settings.with_base_url(base_url);
        }
        settings
    }
}
