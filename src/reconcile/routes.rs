//! Routing rule reconciliation for static sites.
//!
//! Routes are order-significant, so convergence replaces the whole
//! sequence with the plan-declared order in one `PUT`. Plan entries are
//! matched against state by their content key; duplicate plan entries are
//! rejected as ambiguous before anything touches the wire.

use tracing::{debug, info};

use crate::api::{ApiClient, Route};
use crate::error::PlanError;

use super::diff::diff_ordered;
use super::{SubOutcome, SubResourceFailure};

/// Converges a static site's ordered routing rules.
///
/// # Errors
///
/// Returns [`PlanError::AmbiguousEntry`] when the plan declares two
/// identical routes; no remote call is made in that case.
pub async fn reconcile_routes(
    api: &ApiClient,
    site_id: &str,
    state: &[Route],
    plan: Option<&[Route]>,
) -> Result<SubOutcome<Vec<Route>>, PlanError> {
    let Some(desired) = plan else {
        debug!("Routes not declared for {site_id}, leaving untouched");
        return Ok(SubOutcome::ok(state.to_vec()));
    };

    let diff = diff_ordered(state, desired, route_key, "routes")?;
    if !diff.changed {
        debug!("Routes for {site_id} already converged");
        return Ok(SubOutcome::ok(state.to_vec()));
    }

    info!("Replacing {} routes on {site_id}", diff.entries.len());
    Ok(match api.put_routes(site_id, &diff.entries).await {
        Ok(applied) => SubOutcome::ok(applied),
        Err(e) => SubOutcome::failed(
            state.to_vec(),
            SubResourceFailure {
                sub_resource: "routes",
                applied: 0,
                attempted: diff.entries.len().max(state.len()),
                error: e,
            },
        ),
    })
}

fn route_key(route: &Route) -> String {
    format!("{:?} {} -> {}", route.route_type, route.source, route.destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RouteType;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn redirect(source: &str, destination: &str) -> Route {
        Route {
            route_type: RouteType::Redirect,
            source: source.to_string(),
            destination: destination.to_string(),
        }
    }

    #[tokio::test]
    async fn test_reorder_triggers_replace_in_plan_order() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/static-sites/sts-1/routes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"type": "redirect", "source": "/b", "destination": "/y"},
                {"type": "redirect", "source": "/a", "destination": "/x"},
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let state = vec![redirect("/a", "/x"), redirect("/b", "/y")];
        let plan = vec![redirect("/b", "/y"), redirect("/a", "/x")];

        let outcome = reconcile_routes(&api, "sts-1", &state, Some(&plan))
            .await
            .expect("unambiguous");

        assert!(outcome.is_converged());
        assert_eq!(outcome.state, plan);
    }

    #[tokio::test]
    async fn test_duplicate_plan_routes_rejected_before_any_call() {
        let server = MockServer::start().await;
        let api = ApiClient::with_base_url("k", "own-1", &server.uri()).expect("client");
        let plan = vec![redirect("/a", "/x"), redirect("/a", "/x")];

        let err = reconcile_routes(&api, "sts-1", &[], Some(&plan))
            .await
            .expect_err("duplicates are ambiguous");

        assert!(matches!(err, PlanError::AmbiguousEntry { .. }));
        assert!(server.received_requests().await.expect("requests").is_empty());
    }
}
