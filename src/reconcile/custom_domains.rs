//! Custom domain reconciliation.
//!
//! Domains have no update semantics -- a domain either is or is not
//! attached -- so convergence issues one call per removed domain and one
//! per added domain. The sequence stops at the first failure and reports
//! the applied prefix.

use tracing::{debug, info, warn};

use crate::api::{ApiClient, CustomDomain, ResourceFamily};
use crate::error::ApiError;

use super::{SubOutcome, SubResourceFailure};

/// Converges the custom domains attached to a service or static site.
///
/// `plan` is the desired set of domain names. A `None` plan leaves the
/// attached domains untouched; an empty plan detaches them all.
pub async fn reconcile_custom_domains(
    api: &ApiClient,
    family: ResourceFamily,
    owner_id: &str,
    state: &[CustomDomain],
    plan: Option<&[String]>,
) -> SubOutcome<Vec<CustomDomain>> {
    let Some(desired) = plan else {
        debug!("Custom domains not declared for {owner_id}, leaving untouched");
        return SubOutcome::ok(state.to_vec());
    };

    let to_remove: Vec<&CustomDomain> = state
        .iter()
        .filter(|domain| !desired.contains(&domain.name))
        .collect();
    let to_add: Vec<&String> = desired
        .iter()
        .filter(|name| !state.iter().any(|domain| domain.name == **name))
        .collect();

    let attempted = to_remove.len() + to_add.len();
    if attempted == 0 {
        debug!("Custom domains for {owner_id} already converged");
        return SubOutcome::ok(state.to_vec());
    }

    info!(
        "Reconciling custom domains on {owner_id}: +{} -{}",
        to_add.len(),
        to_remove.len()
    );

    let mut current: Vec<CustomDomain> = state.to_vec();
    let mut applied = 0_usize;

    for domain in &to_remove {
        let Some(domain_id) = domain.id.as_deref() else {
            warn!("Domain {} has no identifier, skipping detach", domain.name);
            continue;
        };

        match api.delete_custom_domain(family, owner_id, domain_id).await {
            Ok(()) | Err(ApiError::NotFound { .. }) => {
                current.retain(|d| d.name != domain.name);
                applied += 1;
            }
            Err(e) => {
                return SubOutcome::failed(
                    current,
                    SubResourceFailure {
                        sub_resource: "custom domains",
                        applied,
                        attempted,
                        error: e,
                    },
                );
            }
        }
    }

    for name in to_add {
        match api.create_custom_domain(family, owner_id, name).await {
            Ok(created) => {
                current.push(created);
                applied += 1;
            }
            Err(e) => {
                return SubOutcome::failed(
                    current,
                    SubResourceFailure {
                        sub_resource: "custom domains",
                        applied,
                        attempted,
                        error: e,
                    },
                );
            }
        }
    }

    SubOutcome::ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn attached(id: &str, name: &str) -> CustomDomain {
        CustomDomain {
            id: Some(id.to_string()),
            name: name.to_string(),
            verified: true,
        }
    }

    fn domain_body(id: &str, name: &str) -> serde_json::Value {
        serde_json::json!({"id": id, "name": name, "verified": false})
    }

    async fn client(server: &MockServer) -> ApiClient {
        ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client")
    }

    #[tokio::test]
    async fn test_add_and_remove_domains() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/services/srv-1/custom-domains/cdm-old"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/services/srv-1/custom-domains"))
            .and(body_json(serde_json::json!({"name": "app.example.com"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(domain_body("cdm-new", "app.example.com")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let outcome = reconcile_custom_domains(
            &api,
            ResourceFamily::Services,
            "srv-1",
            &[attached("cdm-old", "old.example.com")],
            Some(&[String::from("app.example.com")]),
        )
        .await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state.len(), 1);
        assert_eq!(outcome.state[0].name, "app.example.com");
    }

    #[tokio::test]
    async fn test_partial_failure_stops_and_reports_applied_prefix() {
        // Three additions; the second fails. Exactly one applied, the
        // third never attempted.
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/srv-1/custom-domains"))
            .and(body_json(serde_json::json!({"name": "a.example.com"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(domain_body("cdm-a", "a.example.com")),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/services/srv-1/custom-domains"))
            .and(body_json(serde_json::json!({"name": "b.example.com"})))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(serde_json::json!({"message": "domain taken"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/services/srv-1/custom-domains"))
            .and(body_json(serde_json::json!({"name": "c.example.com"})))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(domain_body("cdm-c", "c.example.com")),
            )
            .expect(0)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let outcome = reconcile_custom_domains(
            &api,
            ResourceFamily::Services,
            "srv-1",
            &[],
            Some(&[
                String::from("a.example.com"),
                String::from("b.example.com"),
                String::from("c.example.com"),
            ]),
        )
        .await;

        let failure = outcome.failure.expect("should fail");
        assert_eq!(failure.applied, 1);
        assert_eq!(failure.attempted, 3);
        assert!(matches!(failure.error, ApiError::Conflict { .. }));
        // The applied prefix is visible in the resulting state.
        assert_eq!(outcome.state.len(), 1);
        assert_eq!(outcome.state[0].name, "a.example.com");
    }

    #[tokio::test]
    async fn test_detach_tolerates_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/services/srv-1/custom-domains/cdm-gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let api = client(&server).await;
        let outcome = reconcile_custom_domains(
            &api,
            ResourceFamily::Services,
            "srv-1",
            &[attached("cdm-gone", "gone.example.com")],
            Some(&[]),
        )
        .await;

        assert!(outcome.is_converged());
        assert!(outcome.state.is_empty());
    }
}
