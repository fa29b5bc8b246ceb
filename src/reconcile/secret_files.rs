//! Secret file reconciliation.
//!
//! Secret files follow the same bulk-replace pattern as env vars, keyed
//! by mount path.

use tracing::{debug, info};

use crate::api::{ApiClient, SecretFile};

use super::diff::diff_keyed;
use super::{SubOutcome, SubResourceFailure};

/// Converges the secret files on a service.
///
/// A `None` plan leaves the server's files untouched; an empty plan
/// removes them all.
pub async fn reconcile_secret_files(
    api: &ApiClient,
    service_id: &str,
    state: &[SecretFile],
    plan: Option<&[SecretFile]>,
) -> SubOutcome<Vec<SecretFile>> {
    let Some(desired) = plan else {
        debug!("Secret files not declared for {service_id}, leaving untouched");
        return SubOutcome::ok(state.to_vec());
    };

    let diff = diff_keyed(state, desired, |file| file.path.clone());
    if diff.is_empty() {
        debug!("Secret files for {service_id} already converged");
        return SubOutcome::ok(state.to_vec());
    }

    info!(
        "Replacing secret files on {service_id}: +{} ~{} -{}",
        diff.to_add.len(),
        diff.to_update.len(),
        diff.to_remove.len()
    );

    match api.put_secret_files(service_id, desired).await {
        Ok(applied) => SubOutcome::ok(applied),
        Err(e) => SubOutcome::failed(
            state.to_vec(),
            SubResourceFailure {
                sub_resource: "secret files",
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

    fn file(mount: &str, contents: &str) -> SecretFile {
        SecretFile {
            path: mount.to_string(),
            contents: contents.to_string(),
        }
    }

    #[tokio::test]
    async fn test_changed_contents_trigger_replace() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/services/srv-1/secret-files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"path": "/etc/app/token", "contents": "v2"},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome = reconcile_secret_files(
            &api,
            "srv-1",
            &[file("/etc/app/token", "v1")],
            Some(&[file("/etc/app/token", "v2")]),
        )
        .await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state, vec![file("/etc/app/token", "v2")]);
    }

    #[tokio::test]
    async fn test_empty_plan_removes_all() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/services/srv-1/secret-files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome =
            reconcile_secret_files(&api, "srv-1", &[file("/etc/app/token", "v1")], Some(&[]))
                .await;

        assert!(outcome.is_converged());
        assert!(outcome.state.is_empty());
    }
}
