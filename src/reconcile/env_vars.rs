//! Environment variable reconciliation.
//!
//! The API exposes env vars as a bulk-replace endpoint, so convergence is
//! a single `PUT` of the desired set -- issued only when the diff shows an
//! actual change.

use tracing::{debug, info};

use crate::api::{ApiClient, EnvVar, ResourceFamily};

use super::diff::diff_keyed;
use super::{SubOutcome, SubResourceFailure};

/// Converges the environment variables on a service or static site.
///
/// A `None` plan leaves the server's variables untouched; an empty plan
/// removes them all.
pub async fn reconcile_env_vars(
    api: &ApiClient,
    family: ResourceFamily,
    owner_id: &str,
    state: &[EnvVar],
    plan: Option<&[EnvVar]>,
) -> SubOutcome<Vec<EnvVar>> {
    let Some(desired) = plan else {
        debug!("Env vars not declared for {owner_id}, leaving untouched");
        return SubOutcome::ok(state.to_vec());
    };

    let diff = diff_keyed(state, desired, |var| var.key.clone());
    if diff.is_empty() {
        debug!("Env vars for {owner_id} already converged");
        return SubOutcome::ok(state.to_vec());
    }

    info!(
        "Replacing env vars on {owner_id}: +{} ~{} -{}",
        diff.to_add.len(),
        diff.to_update.len(),
        diff.to_remove.len()
    );

    match api.put_env_vars(family, owner_id, desired).await {
        Ok(applied) => SubOutcome::ok(applied),
        Err(e) => SubOutcome::failed(
            state.to_vec(),
            SubResourceFailure {
                sub_resource: "env vars",
                applied: 0,
                attempted: diff.total_changes(),
                error: e,
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn var(key: &str, value: &str) -> EnvVar {
        EnvVar {
            key: key.to_string(),
            value: value.to_string(),
        }
    }

    async fn client(server: &MockServer) -> ApiClient {
        ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client")
    }

    #[tokio::test]
    async fn test_absent_plan_issues_no_calls() {
        let server = MockServer::start().await;
        let api = client(&server).await;

        let outcome = reconcile_env_vars(
            &api,
            ResourceFamily::Services,
            "srv-1",
            &[var("A", "1")],
            None,
        )
        .await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state, vec![var("A", "1")]);
        assert!(server.received_requests().await.expect("requests").is_empty());
    }

    #[tokio::test]
    async fn test_converged_vars_skip_the_call() {
        let server = MockServer::start().await;
        let api = client(&server).await;
        let vars = vec![var("A", "1"), var("B", "2")];

        let outcome = reconcile_env_vars(
            &api,
            ResourceFamily::Services,
            "srv-1",
            &vars,
            Some(&vars.clone()),
        )
        .await;

        assert!(outcome.is_converged());
        assert!(server.received_requests().await.expect("requests").is_empty());
    }

    #[tokio::test]
    async fn test_changed_vars_bulk_replaced() {
        let server = MockServer::start().await;
        let desired = vec![var("A", "1"), var("B", "new")];
        Mock::given(method("PUT"))
            .and(path("/services/srv-1/env-vars"))
            .and(body_json(serde_json::json!([
                {"key": "A", "value": "1"},
                {"key": "B", "value": "new"},
            ])))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"key": "A", "value": "1"},
                {"key": "B", "value": "new"},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let outcome = reconcile_env_vars(
            &api,
            ResourceFamily::Services,
            "srv-1",
            &[var("A", "1"), var("B", "old")],
            Some(&desired),
        )
        .await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state, desired);
    }

    #[tokio::test]
    async fn test_failed_replace_reports_prior_state() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/services/srv-1/env-vars"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let api = client(&server).await;
        let prior = vec![var("A", "1")];
        let outcome = reconcile_env_vars(
            &api,
            ResourceFamily::Services,
            "srv-1",
            &prior,
            Some(&[var("A", "2")]),
        )
        .await;

        let failure = outcome.failure.expect("should fail");
        assert_eq!(failure.applied, 0);
        assert_eq!(failure.attempted, 1);
        assert_eq!(outcome.state, prior);
    }
}
