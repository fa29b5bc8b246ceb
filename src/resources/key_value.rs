//! Key-value instance resource type.
//!
//! Key-value instances own an IP allow list, environment membership, and
//! a log stream override. Connection info is not embedded in the primary
//! payload and is fetched as a read enrichment. No deploys: mutations
//! settle synchronously.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{
    ApiClient, ApiResult, ConnectionInfo, CreateKeyValueRequest, IpAllowRule, KeyValueInstance,
    LogStreamOverride, MaxMemoryPolicy, ResourceFamily, UpdateKeyValueRequest,
};
use crate::error::{ApiError, Result};
use crate::reconcile::{
    reconcile_environment, reconcile_ip_allow_list, reconcile_log_stream, SubResourceFailure,
};

use super::not_found_as_none;
use super::orchestrator::{partial_error, ApplyResult, ResourceAdapter};

/// Desired configuration for a key-value instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyValuePlan {
    /// Instance name.
    pub name: String,
    /// Instance plan identifier.
    pub plan: String,
    /// Region identifier.
    pub region: String,
    /// Eviction policy.
    #[serde(default)]
    pub maxmemory_policy: Option<MaxMemoryPolicy>,
    /// IP allow list.
    #[serde(default)]
    pub ip_allow_list: Option<Vec<IpAllowRule>>,
    /// Environment membership.
    #[serde(default)]
    pub environment_id: Option<String>,
    /// Log stream override.
    #[serde(default)]
    pub log_stream: Option<LogStreamOverride>,
}

/// The persisted model of a key-value instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyValueModel {
    /// Server-assigned identifier (`red-` prefixed).
    pub id: String,
    /// Instance name.
    pub name: String,
    /// Instance plan identifier.
    pub plan: String,
    /// Region identifier.
    pub region: String,
    /// Eviction policy.
    pub maxmemory_policy: Option<MaxMemoryPolicy>,
    /// IP allow list.
    pub ip_allow_list: Vec<IpAllowRule>,
    /// Environment membership.
    pub environment_id: Option<String>,
    /// Log stream override.
    pub log_stream: Option<LogStreamOverride>,
    /// Connection details, fetched on read.
    pub connection_info: Option<ConnectionInfo>,
    /// When the instance was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the instance was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Sub-state fragments accumulated while reconcilers run.
#[derive(Debug, Default)]
struct Fragments {
    ip_allow_list: Vec<IpAllowRule>,
    environment_id: Option<String>,
    log_stream: Option<LogStreamOverride>,
    connection_info: Option<ConnectionInfo>,
}

impl Fragments {
    fn from_state(state: Option<&KeyValueModel>) -> Self {
        state.map_or_else(Self::default, |model| Self {
            ip_allow_list: model.ip_allow_list.clone(),
            environment_id: model.environment_id.clone(),
            log_stream: model.log_stream.clone(),
            connection_info: model.connection_info.clone(),
        })
    }
}

/// Capability set for key-value instances.
#[derive(Debug, Default)]
pub struct KeyValueAdapter;

impl KeyValueAdapter {
    /// Runs the sub-resource reconcilers in dependency order, stopping at
    /// the first failure.
    async fn converge(
        api: &ApiClient,
        id: &str,
        state: Option<&KeyValueModel>,
        plan: &KeyValuePlan,
    ) -> (Fragments, Option<SubResourceFailure>) {
        let mut frags = Fragments::from_state(state);

        // The IP allow list rides the create body.
        if state.is_some() {
            let outcome = reconcile_ip_allow_list(
                api,
                id,
                &frags.ip_allow_list,
                plan.ip_allow_list.as_deref(),
            )
            .await;
            frags.ip_allow_list = outcome.state;
            if let Some(f) = outcome.failure {
                return (frags, Some(f));
            }
        } else {
            frags.ip_allow_list = plan.ip_allow_list.clone().unwrap_or_default();
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
    fn model_from(instance: KeyValueInstance, frags: Fragments) -> KeyValueModel {
        KeyValueModel {
            id: instance.id,
            name: instance.name,
            plan: instance.plan,
            region: instance.region,
            maxmemory_policy: instance.maxmemory_policy,
            ip_allow_list: frags.ip_allow_list,
            environment_id: instance.environment_id.or(frags.environment_id),
            log_stream: frags.log_stream,
            connection_info: frags.connection_info,
            created_at: instance.created_at,
            updated_at: instance.updated_at,
        }
    }
}

#[async_trait]
impl ResourceAdapter for KeyValueAdapter {
    type Plan = KeyValuePlan;
    type Model = KeyValueModel;

    const KIND: &'static str = "key-value instance";
    const DEPLOYS: Option<ResourceFamily> = None;

    fn model_id(model: &Self::Model) -> &str {
        &model.id
    }

    async fn create_primary(&self, api: &ApiClient, plan: &Self::Plan) -> ApiResult<String> {
        let request = CreateKeyValueRequest {
            name: plan.name.clone(),
            plan: plan.plan.clone(),
            region: plan.region.clone(),
            maxmemory_policy: plan.maxmemory_policy,
            ip_allow_list: plan.ip_allow_list.clone().unwrap_or_default(),
        };
        let instance = api.create_key_value(&request).await?;
        Ok(instance.id)
    }

    async fn update_primary(&self, api: &ApiClient, id: &str, plan: &Self::Plan) -> ApiResult<()> {
        let request = UpdateKeyValueRequest {
            name: Some(plan.name.clone()),
            plan: Some(plan.plan.clone()),
            maxmemory_policy: plan.maxmemory_policy,
        };
        api.update_key_value(id, &request).await?;
        Ok(())
    }

    async fn delete_primary(&self, api: &ApiClient, id: &str) -> ApiResult<()> {
        api.delete_key_value(id).await
    }

    async fn reconcile_and_assemble(
        &self,
        api: &ApiClient,
        id: &str,
        state: Option<&Self::Model>,
        plan: &Self::Plan,
    ) -> Result<ApplyResult<Self::Model>> {
        let (mut frags, failure) = Self::converge(api, id, state, plan).await;

        let instance = api.get_key_value(id).await?;
        frags.connection_info = not_found_as_none(api.get_connection_info(id).await)?;
        let model = Self::model_from(instance, frags);

        Ok(ApplyResult {
            model,
            partial: failure.map(|f| partial_error(id, f)),
        })
    }

    async fn read(&self, api: &ApiClient, id: &str) -> Result<Option<Self::Model>> {
        let instance = match api.get_key_value(id).await {
            Ok(instance) => instance,
            Err(ApiError::NotFound { .. }) => {
                debug!("Key-value instance {id} gone from the server");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let frags = Fragments {
            ip_allow_list: api.list_ip_allow_list(id).await?,
            environment_id: instance.environment_id.clone(),
            log_stream: not_found_as_none(api.get_log_stream_override(id).await)?,
            connection_info: not_found_as_none(api.get_connection_info(id).await)?,
        };

        Ok(Some(Self::model_from(instance, frags)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Orchestrator, ProviderSettings};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn instance_body(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": "cache",
            "plan": "starter",
            "region": "eu-central",
            "maxmemoryPolicy": "allkeys_lru",
        })
    }

    fn orchestrator(server: &MockServer) -> Orchestrator<KeyValueAdapter> {
        let settings = ProviderSettings::new("test-key", "own-1").with_base_url(server.uri());
        Orchestrator::new(settings, KeyValueAdapter).expect("orchestrator")
    }

    #[tokio::test]
    async fn test_read_enriches_with_connection_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/key-value/red-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("red-1")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/key-value/red-1/ip-allow-list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"cidrBlock": "203.0.113.0/24", "description": "office"},
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/log-streams/resources/red-1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/key-value/red-1/connection-info"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "internalConnectionString": "rediss://red-1.internal:6379",
            })))
            .mount(&server)
            .await;

        let model = orchestrator(&server)
            .read("red-1")
            .await
            .expect("read should succeed")
            .expect("instance should exist");

        assert_eq!(model.maxmemory_policy, Some(MaxMemoryPolicy::AllkeysLru));
        assert_eq!(model.ip_allow_list.len(), 1);
        assert_eq!(
            model
                .connection_info
                .expect("connection info")
                .internal_connection_string,
            "rediss://red-1.internal:6379"
        );
    }

    #[tokio::test]
    async fn test_update_moves_environment_leave_then_join() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/key-value/red-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("red-1")))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/environments/evm-123/resources"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/environments/evm-456/resources"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/key-value/red-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("red-1")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/key-value/red-1/connection-info"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let state = KeyValueModel {
            id: String::from("red-1"),
            name: String::from("cache"),
            plan: String::from("starter"),
            region: String::from("eu-central"),
            maxmemory_policy: Some(MaxMemoryPolicy::AllkeysLru),
            ip_allow_list: vec![],
            environment_id: Some(String::from("evm-123")),
            log_stream: None,
            connection_info: None,
            created_at: None,
            updated_at: None,
        };
        let plan = KeyValuePlan {
            name: String::from("cache"),
            plan: String::from("starter"),
            region: String::from("eu-central"),
            maxmemory_policy: Some(MaxMemoryPolicy::AllkeysLru),
            ip_allow_list: None,
            environment_id: Some(String::from("evm-456")),
            log_stream: None,
        };

        let result = orchestrator(&server)
            .update(&state, &plan)
            .await
            .expect("update should succeed");

        assert!(result.is_converged());
        assert_eq!(result.model.environment_id.as_deref(), Some("evm-456"));

        let env_paths: Vec<String> = server
            .received_requests()
            .await
            .expect("requests")
            .iter()
            .filter(|r| r.url.path().starts_with("/environments/"))
            .map(|r| r.url.path().to_string())
            .collect();
        assert_eq!(
            env_paths,
            vec![
                String::from("/environments/evm-123/resources"),
                String::from("/environments/evm-456/resources"),
            ]
        );
    }
}
