//! Environment membership reconciliation.
//!
//! A resource belongs to at most one environment. The API exposes only
//! join and leave primitives, so the three transitions map to distinct
//! call sequences: unset-to-set joins, set-to-unset leaves, and a move
//! leaves the old environment before joining the new one.

use tracing::{debug, info};

use crate::api::ApiClient;
use crate::error::ApiError;

use super::{SubOutcome, SubResourceFailure};

/// Converges a resource's environment membership.
///
/// Returns the environment the resource actually belongs to afterwards,
/// which on a failed move can be "none" (left the old environment but
/// never joined the new one).
pub async fn reconcile_environment(
    api: &ApiClient,
    resource_id: &str,
    previous: Option<&str>,
    desired: Option<&str>,
) -> SubOutcome<Option<String>> {
    let ids = [resource_id.to_string()];

    match (previous, desired) {
        (prev, want) if prev == want => {
            debug!("Environment membership for {resource_id} already converged");
            SubOutcome::ok(previous.map(String::from))
        }

        (None, Some(environment)) => {
            info!("Adding {resource_id} to environment {environment}");
            match api.add_environment_resources(environment, &ids).await {
                Ok(()) => SubOutcome::ok(Some(environment.to_string())),
                Err(e) => SubOutcome::failed(None, failure(0, 1, e)),
            }
        }

        (Some(environment), None) => {
            info!("Removing {resource_id} from environment {environment}");
            match api.remove_environment_resources(environment, &ids).await {
                Ok(()) | Err(ApiError::NotFound { .. }) => SubOutcome::ok(None),
                Err(e) => {
                    SubOutcome::failed(Some(environment.to_string()), failure(0, 1, e))
                }
            }
        }

        (Some(old), Some(new)) => {
            info!("Moving {resource_id} from environment {old} to {new}");
            match api.remove_environment_resources(old, &ids).await {
                Ok(()) | Err(ApiError::NotFound { .. }) => {}
                Err(e) => {
                    return SubOutcome::failed(Some(old.to_string()), failure(0, 2, e));
                }
            }
            match api.add_environment_resources(new, &ids).await {
                Ok(()) => SubOutcome::ok(Some(new.to_string())),
                // Left but never joined: report membership as it really is.
                Err(e) => SubOutcome::failed(None, failure(1, 2, e)),
            }
        }

        // Covered by the equality arm; the compiler cannot see that.
        (None, None) => SubOutcome::ok(None),
    }
}

const fn failure(applied: usize, attempted: usize, error: ApiError) -> SubResourceFailure {
    SubResourceFailure {
        sub_resource: "environment",
        applied,
        attempted,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> ApiClient {
        ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client")
    }

    #[tokio::test]
    async fn test_join_when_previously_unset() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/environments/evm-123/resources"))
            .and(body_json(serde_json::json!({"resourceIds": ["srv-1"]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let outcome = reconcile_environment(&api, "srv-1", None, Some("evm-123")).await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state.as_deref(), Some("evm-123"));
    }

    #[tokio::test]
    async fn test_leave_when_plan_unset() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/environments/evm-123/resources"))
            .and(body_json(serde_json::json!({"resourceIds": ["srv-1"]})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let outcome = reconcile_environment(&api, "srv-1", Some("evm-123"), None).await;

        assert!(outcome.is_converged());
        assert!(outcome.state.is_none());
    }

    #[tokio::test]
    async fn test_move_issues_leave_then_join() {
        let server = MockServer::start().await;
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

        let api = client(&server).await;
        let outcome =
            reconcile_environment(&api, "srv-1", Some("evm-123"), Some("evm-456")).await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state.as_deref(), Some("evm-456"));

        // The leave must hit the wire before the join.
        let requests = server.received_requests().await.expect("requests");
        let paths: Vec<String> = requests.iter().map(|r| r.url.path().to_string()).collect();
        assert_eq!(
            paths,
            vec![
                String::from("/environments/evm-123/resources"),
                String::from("/environments/evm-456/resources"),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_join_after_leave_reports_no_membership() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/environments/evm-123/resources"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/environments/evm-456/resources"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let outcome =
            reconcile_environment(&api, "srv-1", Some("evm-123"), Some("evm-456")).await;

        let failure = outcome.failure.expect("should fail");
        assert_eq!(failure.applied, 1);
        assert_eq!(failure.attempted, 2);
        assert!(outcome.state.is_none());
    }

    #[tokio::test]
    async fn test_unchanged_membership_issues_no_calls() {
        let server = MockServer::start().await;
        let api = client(&server).await;

        let outcome =
            reconcile_environment(&api, "srv-1", Some("evm-123"), Some("evm-123")).await;

        assert!(outcome.is_converged());
        assert!(server.received_requests().await.expect("requests").is_empty());
    }
}
