//! IP allow list reconciliation for key-value instances.
//!
//! Rules key on CIDR block plus description; the API replaces the whole
//! list in one `PUT`.

use tracing::{debug, info};

use crate::api::{ApiClient, IpAllowRule};

use super::diff::diff_keyed;
use super::{SubOutcome, SubResourceFailure};

/// Converges a key-value instance's IP allow list.
///
/// A `None` plan leaves the server's list untouched; an empty plan
/// removes every rule, closing the instance to external traffic.
pub async fn reconcile_ip_allow_list(
    api: &ApiClient,
    instance_id: &str,
    state: &[IpAllowRule],
    plan: Option<&[IpAllowRule]>,
) -> SubOutcome<Vec<IpAllowRule>> {
    let Some(desired) = plan else {
        debug!("IP allow list not declared for {instance_id}, leaving untouched");
        return SubOutcome::ok(state.to_vec());
    };

    let diff = diff_keyed(state, desired, |rule| {
        (rule.cidr_block.clone(), rule.description.clone())
    });
    if diff.is_empty() {
        debug!("IP allow list for {instance_id} already converged");
        return SubOutcome::ok(state.to_vec());
    }

    info!(
        "Replacing IP allow list on {instance_id}: +{} -{}",
        diff.to_add.len(),
        diff.to_remove.len()
    );

    match api.put_ip_allow_list(instance_id, desired).await {
        Ok(applied) => SubOutcome::ok(applied),
        Err(e) => SubOutcome::failed(
            state.to_vec(),
            SubResourceFailure {
                sub_resource: "ip allow list",
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
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rule(cidr: &str, description: &str) -> IpAllowRule {
        IpAllowRule {
            cidr_block: cidr.to_string(),
            description: description.to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_plan_clears_the_list() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/key-value/red-1/ip-allow-list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome = reconcile_ip_allow_list(
            &api,
            "red-1",
            &[rule("203.0.113.0/24", "office")],
            Some(&[]),
        )
        .await;

        assert!(outcome.is_converged());
        assert!(outcome.state.is_empty());
    }

    #[tokio::test]
    async fn test_absent_plan_is_no_change() {
        let server = MockServer::start().await;
        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let prior = vec![rule("203.0.113.0/24", "office")];

        let outcome = reconcile_ip_allow_list(&api, "red-1", &prior, None).await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state, prior);
        assert!(server.received_requests().await.expect("requests").is_empty());
    }

    #[tokio::test]
    async fn test_same_cidr_different_description_is_a_change() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/key-value/red-1/ip-allow-list"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"cidrBlock": "203.0.113.0/24", "description": "vpn"},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome = reconcile_ip_allow_list(
            &api,
            "red-1",
            &[rule("203.0.113.0/24", "office")],
            Some(&[rule("203.0.113.0/24", "vpn")]),
        )
        .await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state, vec![rule("203.0.113.0/24", "vpn")]);
    }
}
