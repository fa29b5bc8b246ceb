//! Autoscaling reconciliation.
//!
//! Autoscaling is a single optional object per service: declared means
//! `PUT` the configuration, undeclared means `DELETE` any existing one.

use tracing::{debug, info};

use crate::api::{ApiClient, Autoscaling};
use crate::error::ApiError;

use super::{SubOutcome, SubResourceFailure};

/// Converges a service's autoscaling configuration.
pub async fn reconcile_autoscaling(
    api: &ApiClient,
    service_id: &str,
    state: Option<&Autoscaling>,
    plan: Option<&Autoscaling>,
) -> SubOutcome<Option<Autoscaling>> {
    match (state, plan) {
        (None, None) => SubOutcome::ok(None),

        (Some(existing), Some(desired)) if existing == desired => {
            debug!("Autoscaling for {service_id} already converged");
            SubOutcome::ok(Some(existing.clone()))
        }

        (_, Some(desired)) => {
            info!(
                "Setting autoscaling on {service_id}: {}..{} @ {}% CPU",
                desired.min, desired.max, desired.target_cpu_percent
            );
            match api.put_autoscaling(service_id, desired).await {
                Ok(applied) => SubOutcome::ok(Some(applied)),
                Err(e) => SubOutcome::failed(state.cloned(), failure(e)),
            }
        }

        (Some(_), None) => {
            info!("Removing autoscaling from {service_id}");
            match api.delete_autoscaling(service_id).await {
                Ok(()) | Err(ApiError::NotFound { .. }) => SubOutcome::ok(None),
                Err(e) => SubOutcome::failed(state.cloned(), failure(e)),
            }
        }
    }
}

const fn failure(error: ApiError) -> SubResourceFailure {
    SubResourceFailure {
        sub_resource: "autoscaling",
        applied: 0,
        attempted: 1,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(min: u32, max: u32) -> Autoscaling {
        Autoscaling {
            min,
            max,
            target_cpu_percent: 70,
        }
    }

    #[tokio::test]
    async fn test_put_on_change() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/services/srv-1/autoscaling"))
            .and(body_json(serde_json::json!({
                "min": 2, "max": 6, "targetCpuPercent": 70,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "min": 2, "max": 6, "targetCpuPercent": 70,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome =
            reconcile_autoscaling(&api, "srv-1", Some(&config(1, 3)), Some(&config(2, 6))).await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state.expect("config").max, 6);
    }

    #[tokio::test]
    async fn test_delete_on_removal() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/services/srv-1/autoscaling"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome = reconcile_autoscaling(&api, "srv-1", Some(&config(1, 3)), None).await;

        assert!(outcome.is_converged());
        assert!(outcome.state.is_none());
    }

    #[tokio::test]
    async fn test_failure_keeps_prior_state() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/services/srv-1/autoscaling"))
            .respond_with(ResponseTemplate::new(422).set_body_json(
                serde_json::json!({"message": "max must be >= min"}),
            ))
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let prior = config(1, 3);
        let outcome =
            reconcile_autoscaling(&api, "srv-1", Some(&prior), Some(&config(5, 2))).await;

        let failure = outcome.failure.expect("should fail");
        assert!(matches!(failure.error, ApiError::Validation { .. }));
        assert_eq!(outcome.state, Some(prior));
    }
}
