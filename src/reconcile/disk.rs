//! Persistent disk reconciliation.
//!
//! A service carries at most one disk, so this is a single-object
//! converge: absent-to-present creates, present-to-present patches,
//! present-to-absent deletes.

use tracing::{debug, info};

use crate::api::{ApiClient, CreateDiskRequest, Disk, UpdateDiskRequest};
use crate::error::ApiError;

use super::{SubOutcome, SubResourceFailure};

/// Desired disk configuration for a service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskPlan {
    /// Disk name.
    pub name: String,
    /// Size in GB.
    pub size_gb: u32,
    /// Mount path inside the container.
    pub mount_path: String,
}

impl DiskPlan {
    fn matches(&self, disk: &Disk) -> bool {
        self.name == disk.name && self.size_gb == disk.size_gb && self.mount_path == disk.mount_path
    }
}

/// Converges the disk attached to a service. Declaring no disk removes an
/// existing one.
pub async fn reconcile_disk(
    api: &ApiClient,
    service_id: &str,
    state: Option<&Disk>,
    plan: Option<&DiskPlan>,
) -> SubOutcome<Option<Disk>> {
    match (state, plan) {
        (None, None) => SubOutcome::ok(None),

        (None, Some(desired)) => {
            info!("Creating disk {} for {service_id}", desired.name);
            let request = CreateDiskRequest {
                service_id: service_id.to_string(),
                name: desired.name.clone(),
                size_gb: desired.size_gb,
                mount_path: desired.mount_path.clone(),
            };
            match api.create_disk(&request).await {
                Ok(disk) => SubOutcome::ok(Some(disk)),
                Err(e) => SubOutcome::failed(None, failure(0, e)),
            }
        }

        (Some(existing), None) => {
            info!("Removing disk {} from {service_id}", existing.id);
            match api.delete_disk(&existing.id).await {
                Ok(()) | Err(ApiError::NotFound { .. }) => SubOutcome::ok(None),
                Err(e) => SubOutcome::failed(Some(existing.clone()), failure(0, e)),
            }
        }

        (Some(existing), Some(desired)) => {
            if desired.matches(existing) {
                debug!("Disk {} already converged", existing.id);
                return SubOutcome::ok(Some(existing.clone()));
            }

            info!("Updating disk {} on {service_id}", existing.id);
            let request = UpdateDiskRequest {
                name: Some(desired.name.clone()),
                size_gb: Some(desired.size_gb),
                mount_path: Some(desired.mount_path.clone()),
            };
            match api.update_disk(&existing.id, &request).await {
                Ok(disk) => SubOutcome::ok(Some(disk)),
                Err(e) => SubOutcome::failed(Some(existing.clone()), failure(0, e)),
            }
        }
    }
}

const fn failure(applied: usize, error: ApiError) -> SubResourceFailure {
    SubResourceFailure {
        sub_resource: "disk",
        applied,
        attempted: 1,
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn plan() -> DiskPlan {
        DiskPlan {
            name: String::from("data"),
            size_gb: 10,
            mount_path: String::from("/var/data"),
        }
    }

    fn existing() -> Disk {
        Disk {
            id: String::from("dsk-1"),
            name: String::from("data"),
            size_gb: 10,
            mount_path: String::from("/var/data"),
        }
    }

    #[tokio::test]
    async fn test_create_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/disks"))
            .and(body_json(serde_json::json!({
                "serviceId": "srv-1",
                "name": "data",
                "sizeGb": 10,
                "mountPath": "/var/data",
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "dsk-1", "name": "data", "sizeGb": 10, "mountPath": "/var/data",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome = reconcile_disk(&api, "srv-1", None, Some(&plan())).await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state.expect("disk").id, "dsk-1");
    }

    #[tokio::test]
    async fn test_resize_when_changed() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/disks/dsk-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "dsk-1", "name": "data", "sizeGb": 20, "mountPath": "/var/data",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let mut desired = plan();
        desired.size_gb = 20;
        let outcome = reconcile_disk(&api, "srv-1", Some(&existing()), Some(&desired)).await;

        assert!(outcome.is_converged());
        assert_eq!(outcome.state.expect("disk").size_gb, 20);
    }

    #[tokio::test]
    async fn test_converged_disk_issues_no_calls() {
        let server = MockServer::start().await;
        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");

        let outcome = reconcile_disk(&api, "srv-1", Some(&existing()), Some(&plan())).await;

        assert!(outcome.is_converged());
        assert!(server.received_requests().await.expect("requests").is_empty());
    }

    #[tokio::test]
    async fn test_remove_tolerates_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/disks/dsk-1"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let outcome = reconcile_disk(&api, "srv-1", Some(&existing()), None).await;

        assert!(outcome.is_converged());
        assert!(outcome.state.is_none());
    }
}
