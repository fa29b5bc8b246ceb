//! Workspace planning.
//!
//! Compares the declared manifest against the stored workspace state and
//! produces the ordered set of per-resource actions an apply will run.
//! Change detection is fingerprint-based: a resource whose declaration
//! hashes the same as what was last applied is left alone. Deletes come
//! first so freed names and quota are available to creates.

use chrono::{DateTime, Utc};

use crate::config::{Manifest, ManifestHasher};
use crate::state::WorkspaceState;

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    /// Create a new resource.
    Create,
    /// Update an existing resource.
    Update,
    /// Delete a resource no longer declared.
    Delete,
    /// Resource is unchanged.
    NoChange,
}

/// The resource kinds a workspace manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// A web service.
    WebService,
    /// A static site.
    StaticSite,
    /// A key-value instance.
    KeyValue,
}

impl ResourceKind {
    /// Returns the fingerprint map key for a named resource of this kind.
    #[must_use]
    pub fn state_key(self, name: &str) -> String {
        format!("{self}:{name}")
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::WebService => "web-service",
            Self::StaticSite => "static-site",
            Self::KeyValue => "key-value",
        };
        write!(f, "{s}")
    }
}

/// A single planned action.
#[derive(Debug, Clone)]
pub struct PlannedAction {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Declared resource name.
    pub name: String,
    /// What to do.
    pub action: ActionType,
    /// Why this action was planned.
    pub reason: String,
    /// Fingerprint of the declaration being applied, if any.
    pub fingerprint: Option<String>,
}

/// A complete workspace plan.
#[derive(Debug)]
pub struct WorkspacePlan {
    /// When the plan was computed.
    pub created_at: DateTime<Utc>,
    /// Fingerprint of the whole manifest.
    pub fingerprint: String,
    /// Planned actions in execution order.
    pub actions: Vec<PlannedAction>,
}

impl WorkspacePlan {
    /// Returns true if anything needs to change.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.actions
            .iter()
            .any(|action| action.action != ActionType::NoChange)
    }

    /// Counts actions of a given type.
    #[must_use]
    pub fn count(&self, action: ActionType) -> usize {
        self.actions.iter().filter(|a| a.action == action).count()
    }

    /// Returns only the actions that do something.
    #[must_use]
    pub fn actionable(&self) -> Vec<&PlannedAction> {
        self.actions
            .iter()
            .filter(|a| a.action != ActionType::NoChange)
            .collect()
    }
}

/// Builds the workspace plan from a manifest and the stored state.
#[must_use]
pub fn build_plan(manifest: &Manifest, state: &WorkspaceState) -> WorkspacePlan {
    let hasher = ManifestHasher::new();
    let mut actions = Vec::new();

    // Deletes first: anything tracked but no longer declared.
    for name in state.web_services.keys() {
        if !manifest.web_services.iter().any(|s| s.name == *name) {
            actions.push(delete_action(ResourceKind::WebService, name));
        }
    }
    for name in state.static_sites.keys() {
        if !manifest.static_sites.iter().any(|s| s.name == *name) {
            actions.push(delete_action(ResourceKind::StaticSite, name));
        }
    }
    for name in state.key_values.keys() {
        if !manifest.key_value.iter().any(|s| s.name == *name) {
            actions.push(delete_action(ResourceKind::KeyValue, name));
        }
    }

    // Deterministic order regardless of map iteration.
    actions.sort_by(|a, b| a.name.cmp(&b.name));

    for service in &manifest.web_services {
        let fingerprint = hasher.hash_web_service(service);
        actions.push(declared_action(
            ResourceKind::WebService,
            &service.name,
            state.web_services.contains_key(&service.name),
            state.plan_fingerprint(&ResourceKind::WebService.state_key(&service.name)),
            fingerprint,
        ));
    }
    for site in &manifest.static_sites {
        let fingerprint = hasher.hash_static_site(site);
        actions.push(declared_action(
            ResourceKind::StaticSite,
            &site.name,
            state.static_sites.contains_key(&site.name),
            state.plan_fingerprint(&ResourceKind::StaticSite.state_key(&site.name)),
            fingerprint,
        ));
    }
    for instance in &manifest.key_value {
        let fingerprint = hasher.hash_key_value(instance);
        actions.push(declared_action(
            ResourceKind::KeyValue,
            &instance.name,
            state.key_values.contains_key(&instance.name),
            state.plan_fingerprint(&ResourceKind::KeyValue.state_key(&instance.name)),
            fingerprint,
        ));
    }

    WorkspacePlan {
        created_at: Utc::now(),
        fingerprint: hasher.hash_manifest(manifest),
        actions,
    }
}

/// Builds the action for a declared resource.
fn declared_action(
    kind: ResourceKind,
    name: &str,
    tracked: bool,
    last_fingerprint: Option<&str>,
    fingerprint: String,
) -> PlannedAction {
    if !tracked {
        return PlannedAction {
            kind,
            name: name.to_string(),
            action: ActionType::Create,
            reason: String::from("Declared in manifest but not yet tracked"),
            fingerprint: Some(fingerprint),
        };
    }

    if last_fingerprint.is_some_and(|last| ManifestHasher::hashes_match(last, &fingerprint)) {
        PlannedAction {
            kind,
            name: name.to_string(),
            action: ActionType::NoChange,
            reason: String::from("Declaration unchanged"),
            fingerprint: Some(fingerprint),
        }
    } else {
        PlannedAction {
            kind,
            name: name.to_string(),
            action: ActionType::Update,
            reason: String::from("Declaration changed since last apply"),
            fingerprint: Some(fingerprint),
        }
    }
}

/// Builds the action for a tracked-but-undeclared resource.
fn delete_action(kind: ResourceKind, name: &str) -> PlannedAction {
    PlannedAction {
        kind,
        name: name.to_string(),
        action: ActionType::Delete,
        reason: String::from("Removed from manifest"),
        fingerprint: None,
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::NoChange => "no change",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} '{}' ({})", self.action, self.kind, self.name, self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestParser;
    use crate::resources::KeyValueModel;

    fn manifest(yaml: &str) -> Manifest {
        ManifestParser::new().parse_yaml(yaml, None).expect("parse")
    }

    const CACHE_ONLY: &str = r"
project:
  name: acme
provider:
  owner_id: own-123
key_value:
  - name: cache
    plan: starter
    region: eu-central
";

    fn tracked_cache(state: &mut WorkspaceState) {
        state.set_key_value(
            "cache",
            KeyValueModel {
                id: String::from("red-1"),
                name: String::from("cache"),
                plan: String::from("starter"),
                region: String::from("eu-central"),
                maxmemory_policy: None,
                ip_allow_list: vec![],
                environment_id: None,
                log_stream: None,
                connection_info: None,
                created_at: None,
                updated_at: None,
            },
        );
    }

    #[test]
    fn test_untracked_declared_resource_is_created() {
        let plan = build_plan(&manifest(CACHE_ONLY), &WorkspaceState::new("acme"));

        assert_eq!(plan.count(ActionType::Create), 1);
        assert!(plan.has_changes());
        assert_eq!(plan.actions[0].name, "cache");
    }

    #[test]
    fn test_unchanged_declaration_is_no_change() {
        let m = manifest(CACHE_ONLY);
        let mut state = WorkspaceState::new("acme");
        tracked_cache(&mut state);

        let fingerprint = ManifestHasher::new().hash_key_value(&m.key_value[0]);
        state.set_plan_fingerprint(&ResourceKind::KeyValue.state_key("cache"), &fingerprint);

        let plan = build_plan(&m, &state);
        assert!(!plan.has_changes());
        assert_eq!(plan.count(ActionType::NoChange), 1);
    }

    #[test]
    fn test_changed_declaration_is_updated() {
        let m = manifest(CACHE_ONLY);
        let mut state = WorkspaceState::new("acme");
        tracked_cache(&mut state);
        state.set_plan_fingerprint(
            &ResourceKind::KeyValue.state_key("cache"),
            "stale-fingerprint",
        );

        let plan = build_plan(&m, &state);
        assert_eq!(plan.count(ActionType::Update), 1);
    }

    #[test]
    fn test_undeclared_tracked_resource_is_deleted_first() {
        let m = manifest(
            r"
project:
  name: acme
provider:
  owner_id: own-123
",
        );
        let mut state = WorkspaceState::new("acme");
        tracked_cache(&mut state);

        let plan = build_plan(&m, &state);
        assert_eq!(plan.count(ActionType::Delete), 1);
        assert_eq!(plan.actions[0].action, ActionType::Delete);
    }
}
