//! Manifest validation.
//!
//! Validates a parsed manifest before any call touches the Cirrus API:
//! names, duplicate resources, deployment sources, disks, autoscaling
//! bounds, routes, and allow-list rules.

use crate::error::{ConfigError, ProviderError, Result};
use std::collections::HashSet;
use tracing::debug;

use crate::api::{LogStreamOverride, LogStreamSetting, Route};
use crate::resources::{KeyValuePlan, StaticSitePlan, WebServicePlan};

use super::manifest::Manifest;

/// Regions the platform currently operates.
const KNOWN_REGIONS: &[&str] = &[
    "eu-central",
    "eu-west",
    "us-east",
    "us-west",
    "ap-southeast",
];

/// Instance plans the platform currently offers.
const KNOWN_PLANS: &[&str] = &["starter", "standard", "pro", "pro_plus"];

/// Validator for workspace manifests.
#[derive(Debug, Default)]
pub struct ManifestValidator {
    /// Known valid regions.
    known_regions: HashSet<String>,
    /// Known valid instance plans.
    known_plans: HashSet<String>,
}

/// Validation result containing all issues found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ManifestValidator {
    /// Creates a validator with the default region and plan catalogs.
    #[must_use]
    pub fn new() -> Self {
        Self {
            known_regions: KNOWN_REGIONS.iter().map(|s| (*s).to_string()).collect(),
            known_plans: KNOWN_PLANS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Validates a manifest.
    ///
    /// # Errors
    ///
    /// Returns the first error if validation fails; the full list is in
    /// the returned result otherwise.
    pub fn validate(&self, manifest: &Manifest) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_project(manifest, &mut result);
        Self::validate_unique_names(manifest, &mut result);
        for service in &manifest.web_services {
            self.validate_web_service(service, &mut result);
        }
        for site in &manifest.static_sites {
            Self::validate_static_site(site, &mut result);
        }
        for instance in &manifest.key_value {
            self.validate_key_value(instance, &mut result);
        }

        if result.errors.is_empty() {
            debug!(
                "Manifest validation passed with {} warnings",
                result.warnings.len()
            );
            Ok(result)
        } else {
            let first = &result.errors[0];
            Err(ProviderError::Config(ConfigError::ValidationError {
                message: first.message.clone(),
                field: Some(first.field.clone()),
            }))
        }
    }

    /// Validates project and provider configuration.
    fn validate_project(manifest: &Manifest, result: &mut ValidationResult) {
        if manifest.project.name.is_empty() {
            result.push_error("project.name", "Project name cannot be empty");
        } else if !is_valid_name(&manifest.project.name) {
            result.push_error(
                "project.name",
                format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    manifest.project.name
                ),
            );
        }

        if manifest.provider.owner_id.is_empty() {
            result.push_error("provider.owner_id", "Owner identifier cannot be empty");
        }
    }

    /// Checks for duplicate resource names within each kind.
    fn validate_unique_names(manifest: &Manifest, result: &mut ValidationResult) {
        let kinds: [(&str, Vec<&str>); 3] = [
            (
                "web service",
                manifest.web_services.iter().map(|s| s.name.as_str()).collect(),
            ),
            (
                "static site",
                manifest.static_sites.iter().map(|s| s.name.as_str()).collect(),
            ),
            (
                "key-value instance",
                manifest.key_value.iter().map(|s| s.name.as_str()).collect(),
            ),
        ];

        for (kind, names) in kinds {
            let mut seen = HashSet::new();
            for name in names {
                if !seen.insert(name) {
                    result.push_error(
                        format!("{kind} '{name}'"),
                        format!("Duplicate {kind} name: {name}"),
                    );
                }
            }
        }
    }

    /// Validates one web service plan.
    fn validate_web_service(&self, service: &WebServicePlan, result: &mut ValidationResult) {
        let prefix = format!("web_services.{}", service.name);

        if !is_valid_name(&service.name) {
            result.push_error(
                format!("{prefix}.name"),
                format!("Service name '{}' is invalid", service.name),
            );
        }

        self.check_plan_and_region(&prefix, &service.plan, &service.region, result);

        match (&service.image, &service.repo) {
            (None, None) => result.push_error(
                format!("{prefix}.image"),
                "Service must declare either an image or a repo",
            ),
            (Some(_), Some(_)) => result.push_error(
                format!("{prefix}.image"),
                "Service cannot declare both an image and a repo",
            ),
            _ => {}
        }

        if service.num_instances == 0 {
            result.push_error(
                format!("{prefix}.num_instances"),
                "Instance count must be at least 1",
            );
        }

        if let Some(disk) = &service.disk {
            if disk.size_gb == 0 {
                result.push_error(format!("{prefix}.disk.size_gb"), "Disk size must be > 0 GB");
            }
            if !disk.mount_path.starts_with('/') {
                result.push_error(
                    format!("{prefix}.disk.mount_path"),
                    "Mount path must be absolute",
                );
            }
        }

        if let Some(autoscaling) = &service.autoscaling {
            if autoscaling.min == 0 || autoscaling.min > autoscaling.max {
                result.push_error(
                    format!("{prefix}.autoscaling"),
                    "Autoscaling bounds must satisfy 1 <= min <= max",
                );
            }
            if autoscaling.target_cpu_percent == 0 || autoscaling.target_cpu_percent > 100 {
                result.push_error(
                    format!("{prefix}.autoscaling.target_cpu_percent"),
                    "Target CPU percentage must be in 1..=100",
                );
            }
        }

        if let Some(env_vars) = &service.env_vars {
            for var in env_vars {
                if var.key.is_empty() {
                    result.push_error(
                        format!("{prefix}.env_vars"),
                        "Environment variable keys cannot be empty",
                    );
                }
            }
        }

        Self::check_environment_id(&prefix, service.environment_id.as_deref(), result);
        Self::check_log_stream(&prefix, service.log_stream.as_ref(), result);
    }

    /// Validates one static site plan.
    fn validate_static_site(site: &StaticSitePlan, result: &mut ValidationResult) {
        let prefix = format!("static_sites.{}", site.name);

        if !is_valid_name(&site.name) {
            result.push_error(
                format!("{prefix}.name"),
                format!("Site name '{}' is invalid", site.name),
            );
        }

        if site.repo.is_empty() {
            result.push_error(format!("{prefix}.repo"), "Static site repo cannot be empty");
        }

        if let Some(routes) = &site.routes {
            for route in routes {
                Self::check_route(&prefix, route, result);
            }
        }

        Self::check_environment_id(&prefix, site.environment_id.as_deref(), result);
        Self::check_log_stream(&prefix, site.log_stream.as_ref(), result);
    }

    /// Validates one key-value plan.
    fn validate_key_value(&self, instance: &KeyValuePlan, result: &mut ValidationResult) {
        let prefix = format!("key_value.{}", instance.name);

        if !is_valid_name(&instance.name) {
            result.push_error(
                format!("{prefix}.name"),
                format!("Instance name '{}' is invalid", instance.name),
            );
        }

        self.check_plan_and_region(&prefix, &instance.plan, &instance.region, result);

        if let Some(rules) = &instance.ip_allow_list {
            for rule in rules {
                if !rule.cidr_block.contains('/') {
                    result.push_error(
                        format!("{prefix}.ip_allow_list"),
                        format!("'{}' is not a CIDR block", rule.cidr_block),
                    );
                }
            }
        }

        Self::check_environment_id(&prefix, instance.environment_id.as_deref(), result);
        Self::check_log_stream(&prefix, instance.log_stream.as_ref(), result);
    }

    /// Checks an instance plan and region against the known catalogs.
    fn check_plan_and_region(
        &self,
        prefix: &str,
        plan: &str,
        region: &str,
        result: &mut ValidationResult,
    ) {
        if plan.is_empty() {
            result.push_error(format!("{prefix}.plan"), "Instance plan cannot be empty");
        } else if !self.known_plans.contains(plan) {
            result.push_error(
                format!("{prefix}.plan"),
                format!("Unknown instance plan: {plan}"),
            );
        }

        if region.is_empty() {
            result.push_error(format!("{prefix}.region"), "Region cannot be empty");
        } else if !self.known_regions.contains(region) {
            // Regions come and go; only warn.
            result
                .warnings
                .push(format!("{prefix}.region: unknown region '{region}'"));
        }
    }

    /// Checks a route rule.
    fn check_route(prefix: &str, route: &Route, result: &mut ValidationResult) {
        if !route.source.starts_with('/') {
            result.push_error(
                format!("{prefix}.routes"),
                format!("Route source '{}' must start with '/'", route.source),
            );
        }
        if route.destination.is_empty() {
            result.push_error(
                format!("{prefix}.routes"),
                "Route destination cannot be empty",
            );
        }
    }

    /// Checks an environment identifier shape.
    fn check_environment_id(prefix: &str, id: Option<&str>, result: &mut ValidationResult) {
        if let Some(id) = id {
            if !id.starts_with("evm-") {
                result.warnings.push(format!(
                    "{prefix}.environment_id: '{id}' does not look like an environment id"
                ));
            }
        }
    }

    /// Checks a log stream override.
    fn check_log_stream(
        prefix: &str,
        config: Option<&LogStreamOverride>,
        result: &mut ValidationResult,
    ) {
        if let Some(config) = config {
            if config.setting == LogStreamSetting::Send && config.endpoint.is_none() {
                result.push_error(
                    format!("{prefix}.log_stream.endpoint"),
                    "A 'send' log stream override requires an endpoint",
                );
            }
        }
    }
}

/// Checks that a name is lowercase alphanumeric with single hyphens.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.len() > 63 {
        return false;
    }

    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_lowercase() {
        return false;
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Records an error.
    fn push_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestParser;

    fn parse(yaml: &str) -> Manifest {
        ManifestParser::new().parse_yaml(yaml, None).expect("parse")
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("api"));
        assert!(is_valid_name("my-service-123"));
        assert!(is_valid_name("a"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Api"));
        assert!(!is_valid_name("123-api"));
        assert!(!is_valid_name("api_v2"));
        assert!(!is_valid_name("api-"));
        assert!(!is_valid_name("api--v2"));
    }

    #[test]
    fn test_valid_manifest_passes() {
        let manifest = parse(
            r"
project:
  name: acme
provider:
  owner_id: own-123
web_services:
  - name: api
    plan: standard
    region: eu-central
    image: ghcr.io/acme/api:latest
",
        );

        let result = ManifestValidator::new().validate(&manifest).expect("valid");
        assert!(result.is_valid());
    }

    #[test]
    fn test_service_without_source_rejected() {
        let manifest = parse(
            r"
project:
  name: acme
provider:
  owner_id: own-123
web_services:
  - name: api
    plan: standard
    region: eu-central
",
        );

        let err = ManifestValidator::new()
            .validate(&manifest)
            .expect_err("no image or repo");
        assert!(err.to_string().contains("image or a repo"));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let manifest = parse(
            r"
project:
  name: acme
provider:
  owner_id: own-123
key_value:
  - name: cache
    plan: starter
    region: eu-central
  - name: cache
    plan: starter
    region: eu-central
",
        );

        let err = ManifestValidator::new()
            .validate(&manifest)
            .expect_err("duplicate names");
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_bad_autoscaling_bounds_rejected() {
        let manifest = parse(
            r"
project:
  name: acme
provider:
  owner_id: own-123
web_services:
  - name: api
    plan: standard
    region: eu-central
    image: ghcr.io/acme/api:latest
    autoscaling:
      min: 5
      max: 2
      target_cpu_percent: 70
",
        );

        let err = ManifestValidator::new()
            .validate(&manifest)
            .expect_err("bad bounds");
        assert!(err.to_string().contains("min <= max"));
    }

    #[test]
    fn test_unknown_region_is_a_warning() {
        let manifest = parse(
            r"
project:
  name: acme
provider:
  owner_id: own-123
key_value:
  - name: cache
    plan: starter
    region: mars-north
",
        );

        let result = ManifestValidator::new().validate(&manifest).expect("valid");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 1);
    }

    #[test]
    fn test_send_log_stream_requires_endpoint() {
        let manifest = parse(
            r"
project:
  name: acme
provider:
  owner_id: own-123
key_value:
  - name: cache
    plan: starter
    region: eu-central
    log_stream:
      setting: send
",
        );

        let err = ManifestValidator::new()
            .validate(&manifest)
            .expect_err("missing endpoint");
        assert!(err.to_string().contains("endpoint"));
    }
}
