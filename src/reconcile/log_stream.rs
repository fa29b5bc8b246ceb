//! Log stream override reconciliation.
//!
//! An override is a single optional object per resource: declared means
//! upsert via `PUT`, undeclared means `DELETE` any existing override so
//! the resource falls back to the owner-level stream.

use tracing::{debug, info};

use crate::api::{ApiClient, LogStreamOverride};
use crate::error::ApiError;

use super::{SubOutcome, SubResourceFailure};

/// Converges a resource's log stream override.
pub async fn reconcile_log_stream(
    api: &ApiClient,
    resource_id: &str,
    state: Option<&LogStreamOverride>,
    plan: Option<&LogStreamOverride>,
) -> SubOutcome<Option<LogStreamOverride>> {
    match (state, plan) {
        (None, None) => SubOutcome::ok(None),

        (Some(existing), Some(desired)) if existing == desired => {
            debug!("Log stream override for {resource_id} already converged");
            SubOutcome::ok(Some(existing.clone()))
        }

        (_, Some(desired)) => {
            info!("Setting log stream override on {resource_id}");
            match api.put_log_stream_override(resource_id, desired).await {
                Ok(applied) => SubOutcome::ok(Some(applied)),
                Err(e) => SubOutcome::failed(state.cloned(), failure(e)),
            }
        }

        (Some(_), None) => {
            info!("Removing log stream override from {resource_id}");
            match api.delete_log_stream_override(resource_id).await {
                Ok(()) | Err(ApiError::NotFound { .. }) => SubOutcome::ok(None),
                Err(e) => SubOutcome::failed(state.cloned(), failure(e)),
            }
        }
    }
}

const fn failure(error: ApiError) -> SubResourceFailure {
    SubResourceFailure {
        sub_resource: "log stream override",
        applied: 0,
        attempted: 1,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LogStreamSetting;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn override_to(endpoint: &str) -> LogStreamOverride {
        LogStreamOverride {
            setting: LogStreamSetting::Send,
            endpoint: Some(endpoint.to_string()),
        }
    }

    #[tokio::test]
    async fn test_upsert_on_change() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/log-streams/resources/srv-1"))
            .and(body_json(serde_json::json!({
                "setting": "send",
                "endpoint": "syslog://collector:6514",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "setting": "send",
                "endpoint": "syslog://collector:6514",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome = reconcile_log_stream(
            &api,
            "srv-1",
            None,
            Some(&override_to("syslog://collector:6514")),
        )
        .await;

        assert!(outcome.is_converged());
        assert_eq!(
            outcome.state.expect("override").endpoint.as_deref(),
            Some("syslog://collector:6514")
        );
    }

    #[tokio::test]
    async fn test_removal_falls_back_to_owner_stream() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/log-streams/resources/srv-1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome =
            reconcile_log_stream(&api, "srv-1", Some(&override_to("syslog://old:6514")), None)
                .await;

        assert!(outcome.is_converged());
        assert!(outcome.state.is_none());
    }
}
