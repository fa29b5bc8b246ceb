//! Workspace state types.
//!
//! These types record the last-known models of every resource a
//! workspace manages, keyed by the name declared in the manifest. The
//! state is superseded wholesale on each apply and carries a short
//! history of operations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::resources::{KeyValueModel, StaticSiteModel, WebServiceModel};

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Maximum number of history entries retained.
const HISTORY_LIMIT: usize = 20;

/// The complete workspace state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceState {
    /// State format version.
    pub version: String,
    /// Project name.
    pub project: String,
    /// Fingerprint of the last applied manifest.
    pub fingerprint: String,
    /// Web services, keyed by declared name.
    pub web_services: HashMap<String, WebServiceModel>,
    /// Static sites, keyed by declared name.
    pub static_sites: HashMap<String, StaticSiteModel>,
    /// Key-value instances, keyed by declared name.
    pub key_values: HashMap<String, KeyValueModel>,
    /// Per-resource plan fingerprints, keyed by `<kind>:<name>`.
    #[serde(default)]
    pub plan_fingerprints: HashMap<String, String>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Recent operations.
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// A single entry in the workspace history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the operation ran.
    pub timestamp: DateTime<Utc>,
    /// Type of operation.
    pub operation: OperationKind,
    /// Manifest fingerprint at the time.
    pub fingerprint: String,
    /// Resources touched.
    pub resources: Vec<String>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Optional error message.
    #[serde(default)]
    pub error: Option<String>,
}

/// Kinds of workspace operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// An apply run.
    Apply,
    /// A destroy run.
    Destroy,
    /// An import of a pre-existing resource.
    Import,
}

impl WorkspaceState {
    /// Creates a new empty workspace state.
    #[must_use]
    pub fn new(project: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            project: project.to_string(),
            fingerprint: String::new(),
            web_services: HashMap::new(),
            static_sites: HashMap::new(),
            key_values: HashMap::new(),
            plan_fingerprints: HashMap::new(),
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Returns the number of tracked resources.
    #[must_use]
    pub fn resource_count(&self) -> usize {
        self.web_services.len() + self.static_sites.len() + self.key_values.len()
    }

    /// Returns true if no resources are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resource_count() == 0
    }

    /// Records or replaces a web service model.
    pub fn set_web_service(&mut self, name: &str, model: WebServiceModel) {
        self.web_services.insert(name.to_string(), model);
        self.last_updated = Utc::now();
    }

    /// Records or replaces a static site model.
    pub fn set_static_site(&mut self, name: &str, model: StaticSiteModel) {
        self.static_sites.insert(name.to_string(), model);
        self.last_updated = Utc::now();
    }

    /// Records or replaces a key-value model.
    pub fn set_key_value(&mut self, name: &str, model: KeyValueModel) {
        self.key_values.insert(name.to_string(), model);
        self.last_updated = Utc::now();
    }

    /// Drops a web service from tracked state.
    pub fn remove_web_service(&mut self, name: &str) -> Option<WebServiceModel> {
        let removed = self.web_services.remove(name);
        if removed.is_some() {
            self.last_updated = Utc::now();
        }
        removed
    }

    /// Drops a static site from tracked state.
    pub fn remove_static_site(&mut self, name: &str) -> Option<StaticSiteModel> {
        let removed = self.static_sites.remove(name);
        if removed.is_some() {
            self.last_updated = Utc::now();
        }
        removed
    }

    /// Drops a key-value instance from tracked state.
    pub fn remove_key_value(&mut self, name: &str) -> Option<KeyValueModel> {
        let removed = self.key_values.remove(name);
        if removed.is_some() {
            self.last_updated = Utc::now();
        }
        removed
    }

    /// Records the fingerprint of the plan last applied to a resource.
    pub fn set_plan_fingerprint(&mut self, key: &str, fingerprint: &str) {
        self.plan_fingerprints
            .insert(key.to_string(), fingerprint.to_string());
    }

    /// Returns the fingerprint of the plan last applied to a resource.
    #[must_use]
    pub fn plan_fingerprint(&self, key: &str) -> Option<&str> {
        self.plan_fingerprints.get(key).map(String::as_str)
    }

    /// Drops a resource's plan fingerprint.
    pub fn remove_plan_fingerprint(&mut self, key: &str) {
        self.plan_fingerprints.remove(key);
    }

    /// Appends a history entry, trimming the oldest past the limit.
    pub fn add_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
        self.last_updated = Utc::now();
    }
}

impl HistoryEntry {
    /// Creates a successful history entry.
    #[must_use]
    pub fn new(operation: OperationKind, fingerprint: &str, resources: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            fingerprint: fingerprint.to_string(),
            resources,
            success: true,
            error: None,
        }
    }

    /// Creates a failed history entry.
    #[must_use]
    pub fn failed(
        operation: OperationKind,
        fingerprint: &str,
        resources: Vec<String>,
        error: &str,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            fingerprint: fingerprint.to_string(),
            resources,
            success: false,
            error: Some(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_service(id: &str) -> WebServiceModel {
        WebServiceModel {
            id: id.to_string(),
            name: String::from("api"),
            slug: String::from("api-x1y2"),
            plan: String::from("standard"),
            region: String::from("eu-central"),
            url: None,
            image: None,
            repo: None,
            branch: None,
            build_command: None,
            start_command: None,
            health_check_path: None,
            num_instances: 1,
            env_vars: vec![],
            secret_files: vec![],
            custom_domains: vec![],
            disk: None,
            autoscaling: None,
            environment_id: None,
            notifications: None,
            log_stream: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_set_and_remove_resources() {
        let mut state = WorkspaceState::new("acme");
        assert!(state.is_empty());

        state.set_web_service("api", sample_service("srv-1"));
        assert_eq!(state.resource_count(), 1);

        let removed = state.remove_web_service("api").expect("was tracked");
        assert_eq!(removed.id, "srv-1");
        assert!(state.is_empty());
        assert!(state.remove_web_service("api").is_none());
    }

    #[test]
    fn test_history_trimmed_to_limit() {
        let mut state = WorkspaceState::new("acme");
        for i in 0..30 {
            state.add_history(HistoryEntry::new(
                OperationKind::Apply,
                &format!("fp-{i}"),
                vec![],
            ));
        }

        assert_eq!(state.history.len(), HISTORY_LIMIT);
        assert_eq!(state.history.last().expect("entry").fingerprint, "fp-29");
    }

    #[test]
    fn test_state_round_trips_through_json() {
        let mut state = WorkspaceState::new("acme");
        state.set_web_service("api", sample_service("srv-1"));

        let json = serde_json::to_string(&state).expect("serialize");
        let restored: WorkspaceState = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(restored.project, "acme");
        assert_eq!(restored.web_services["api"].id, "srv-1");
    }
}
