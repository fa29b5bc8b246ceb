//! Notification override reconciliation.
//!
//! The override exists for every service server-side; it is only ever
//! updated. An undeclared plan leaves the server's setting alone.

use tracing::{debug, info};

use crate::api::{ApiClient, NotificationOverride};

use super::{SubOutcome, SubResourceFailure};

/// Converges a service's notification override.
pub async fn reconcile_notification_override(
    api: &ApiClient,
    service_id: &str,
    state: Option<&NotificationOverride>,
    plan: Option<&NotificationOverride>,
) -> SubOutcome<Option<NotificationOverride>> {
    let Some(desired) = plan else {
        debug!("Notification override not declared for {service_id}, leaving untouched");
        return SubOutcome::ok(state.cloned());
    };

    if state == Some(desired) {
        debug!("Notification override for {service_id} already converged");
        return SubOutcome::ok(state.cloned());
    }

    info!("Updating notification override on {service_id}");
    match api.patch_notification_override(service_id, desired).await {
        Ok(applied) => SubOutcome::ok(Some(applied)),
        Err(e) => SubOutcome::failed(
            state.cloned(),
            SubResourceFailure {
                sub_resource: "notification override",
                applied: 0,
                attempted: 1,
                error: e,
            },
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::NotificationSetting;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_patch_on_change() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/notification-settings/services/srv-1"))
            .and(body_json(serde_json::json!({"notificationsToSend": "failure"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"notificationsToSend": "failure"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome = reconcile_notification_override(
            &api,
            "srv-1",
            Some(&NotificationOverride {
                notifications_to_send: NotificationSetting::Default,
            }),
            Some(&NotificationOverride {
                notifications_to_send: NotificationSetting::Failure,
            }),
        )
        .await;

        assert!(outcome.is_converged());
        assert_eq!(
            outcome.state.expect("override").notifications_to_send,
            NotificationSetting::Failure
        );
    }

    #[tokio::test]
    async fn test_absent_plan_leaves_setting_alone() {
        let server = MockServer::start().await;
        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");

        let prior = NotificationOverride {
            notifications_to_send: NotificationSetting::All,
        };
        let outcome = reconcile_notification_override(&api, "srv-1", Some(&prior), None).await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state, Some(prior));
        assert!(server.received_requests().await.expect("requests").is_empty());
    }
}
