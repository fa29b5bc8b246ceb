//! Static site resource type.
//!
//! Static sites own build-time env vars, custom domains, an ordered
//! routing rule list, environment membership, and a log stream override.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{
    ApiClient, ApiResult, CreateStaticSiteRequest, CustomDomain, EnvVar, LogStreamOverride,
    ResourceFamily, Route, StaticSite, UpdateStaticSiteRequest,
};
use crate::error::{ApiError, Result};
use crate::reconcile::{
    reconcile_custom_domains, reconcile_env_vars, reconcile_environment, reconcile_log_stream,
    reconcile_routes, SubResourceFailure,
};

use super::not_found_as_none;
use super::orchestrator::{partial_error, ApplyResult, ResourceAdapter};

/// Desired configuration for a static site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StaticSitePlan {
    /// Site name.
    pub name: String,
    /// Git repository.
    pub repo: String,
    /// Git branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Build command.
    #[serde(default)]
    pub build_command: Option<String>,
    /// Directory published after the build.
    #[serde(default)]
    pub publish_path: Option<String>,
    /// Build-time environment variables.
    #[serde(default)]
    pub env_vars: Option<Vec<EnvVar>>,
    /// Custom domain names.
    #[serde(default)]
    pub custom_domains: Option<Vec<String>>,
    /// Ordered routing rules.
    #[serde(default)]
    pub routes: Option<Vec<Route>>,
    /// Environment membership.
    #[serde(default)]
    pub environment_id: Option<String>,
    /// Log stream override.
    #[serde(default)]
    pub log_stream: Option<LogStreamOverride>,
}

/// The persisted model of a static site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticSiteModel {
    /// Server-assigned identifier (`sts-` prefixed).
    pub id: String,
    /// Site name.
    pub name: String,
    /// Server-computed URL slug.
    pub slug: String,
    /// Public URL.
    pub url: Option<String>,
    /// Git repository.
    pub repo: Option<String>,
    /// Git branch.
    pub branch: Option<String>,
    /// Build command.
    pub build_command: Option<String>,
    /// Directory published after the build.
    pub publish_path: Option<String>,
    /// Build-time environment variables.
    pub env_vars: Vec<EnvVar>,
    /// Custom domains, with server-assigned identifiers.
    pub custom_domains: Vec<CustomDomain>,
    /// Ordered routing rules.
    pub routes: Vec<Route>,
    /// Environment membership.
    pub environment_id: Option<String>,
    /// Log stream override.
    pub log_stream: Option<LogStreamOverride>,
    /// When the site was created.
    pub created_at: Option<DateTime<Utc>>,
    /// When the site was last updated.
    pub updated_at: Option<DateTime<Utc>>,
}

/// Sub-state fragments accumulated while reconcilers run.
#[derive(Debug, Default)]
struct Fragments {
    env_vars: Vec<EnvVar>,
    custom_domains: Vec<CustomDomain>,
    routes: Vec<Route>,
    environment_id: Option<String>,
    log_stream: Option<LogStreamOverride>,
}

impl Fragments {
    fn from_state(state: Option<&StaticSiteModel>) -> Self {
        state.map_or_else(Self::default, |model| Self {
            env_vars: model.env_vars.clone(),
            custom_domains: model.custom_domains.clone(),
            routes: model.routes.clone(),
            environment_id: model.environment_id.clone(),
            log_stream: model.log_stream.clone(),
        })
    }
}

/// Capability set for static sites.
#[derive(Debug, Default)]
pub struct StaticSiteAdapter;

impl StaticSiteAdapter {
    /// Runs the sub-resource reconcilers in dependency order, stopping at
    /// the first failure.
    async fn converge(
        api: &ApiClient,
        id: &str,
        state: Option<&StaticSiteModel>,
        plan: &StaticSitePlan,
    ) -> Result<(Fragments, Option<SubResourceFailure>)> {
        let mut frags = Fragments::from_state(state);

        // Env vars ride the create body.
        if state.is_some() {
            let outcome = reconcile_env_vars(
                api,
                ResourceFamily::StaticSites,
                id,
                &frags.env_vars,
                plan.env_vars.as_deref(),
            )
            .await;
            frags.env_vars = outcome.state;
            if let Some(f) = outcome.failure {
                return Ok((frags, Some(f)));
            }
        } else {
            frags.env_vars = plan.env_vars.clone().unwrap_or_default();
        }

        let outcome =
            reconcile_routes(api, id, &frags.routes, plan.routes.as_deref()).await?;
        frags.routes = outcome.state;
        if let Some(f) = outcome.failure {
            return Ok((frags, Some(f)));
        }

        let outcome = reconcile_custom_domains(
            api,
            ResourceFamily::StaticSites,
            id,
            &frags.custom_domains,
            plan.custom_domains.as_deref(),
        )
        .await;
        frags.custom_domains = outcome.state;
        if let Some(f) = outcome.failure {
            return Ok((frags, Some(f)));
        }

        let outcome = reconcile_environment(
            api,
            id,
            frags.environment_id.as_deref(),
            plan.environment_id.as_deref(),
        )
        .await;
        frags.environment_id = outcome.state;
        if let Some(f) = outcome.failure {
            return Ok((frags, Some(f)));
        }

        let outcome =
            reconcile_log_stream(api, id, frags.log_stream.as_ref(), plan.log_stream.as_ref())
                .await;
        frags.log_stream = outcome.state;
        if let Some(f) = outcome.failure {
            return Ok((frags, Some(f)));
        }

        Ok((frags, None))
    }

    /// Merges the fresh primary payload with reconciled fragments.
    fn model_from(site: StaticSite, frags: Fragments) -> StaticSiteModel {
        StaticSiteModel {
            id: site.id,
            name: site.name,
            slug: site.slug,
            url: site.url,
            repo: site.repo,
            branch: site.branch,
            build_command: site.build_command,
            publish_path: site.publish_path,
            env_vars: frags.env_vars,
            custom_domains: frags.custom_domains,
            routes: frags.routes,
            environment_id: site.environment_id.or(frags.environment_id),
            log_stream: frags.log_stream,
            created_at: site.created_at,
            updated_at: site.updated_at,
        }
    }
}

#[async_trait]
impl ResourceAdapter for StaticSiteAdapter {
    type Plan = StaticSitePlan;
    type Model = StaticSiteModel;

    const KIND: &'static str = "static site";
    const DEPLOYS: Option<ResourceFamily> = Some(ResourceFamily::StaticSites);

    fn model_id(model: &Self::Model) -> &str {
        &model.id
    }

    async fn create_primary(&self, api: &ApiClient, plan: &Self::Plan) -> ApiResult<String> {
        let request = CreateStaticSiteRequest {
            name: plan.name.clone(),
            repo: plan.repo.clone(),
            branch: plan.branch.clone(),
            build_command: plan.build_command.clone(),
            publish_path: plan.publish_path.clone(),
            env_vars: plan.env_vars.clone().unwrap_or_default(),
        };
        let site = api.create_static_site(&request).await?;
        Ok(site.id)
    }

    async fn update_primary(&self, api: &ApiClient, id: &str, plan: &Self::Plan) -> ApiResult<()> {
        let request = UpdateStaticSiteRequest {
            name: Some(plan.name.clone()),
            branch: plan.branch.clone(),
            build_command: plan.build_command.clone(),
            publish_path: plan.publish_path.clone(),
        };
        api.update_static_site(id, &request).await?;
        Ok(())
    }

    async fn delete_primary(&self, api: &ApiClient, id: &str) -> ApiResult<()> {
        api.delete_static_site(id).await
    }

    async fn reconcile_and_assemble(
        &self,
        api: &ApiClient,
        id: &str,
        state: Option<&Self::Model>,
        plan: &Self::Plan,
    ) -> Result<ApplyResult<Self::Model>> {
        let (frags, failure) = Self::converge(api, id, state, plan).await?;

        let site = api.get_static_site(id).await?;
        let model = Self::model_from(site, frags);

        Ok(ApplyResult {
            model,
            partial: failure.map(|f| partial_error(id, f)),
        })
    }

    async fn read(&self, api: &ApiClient, id: &str) -> Result<Option<Self::Model>> {
        let site = match api.get_static_site(id).await {
            Ok(site) => site,
            Err(ApiError::NotFound { .. }) => {
                debug!("Static site {id} gone from the server");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let frags = Fragments {
            env_vars: api.list_env_vars(ResourceFamily::StaticSites, id).await?,
            custom_domains: api
                .list_custom_domains(ResourceFamily::StaticSites, id)
                .await?,
            routes: api.list_routes(id).await?,
            environment_id: site.environment_id.clone(),
            log_stream: not_found_as_none(api.get_log_stream_override(id).await)?,
        };

        Ok(Some(Self::model_from(site, frags)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RouteType;
    use crate::error::{PlanError, ProviderError};
    use crate::resources::{Orchestrator, ProviderSettings};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn site_body(id: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "name": "docs",
            "slug": "docs-a1b2",
            "url": "https://docs-a1b2.cirrus.app",
            "repo": "https://github.com/acme/docs",
            "branch": "main",
            "publishPath": "dist",
        })
    }

    fn base_plan() -> StaticSitePlan {
        StaticSitePlan {
            name: String::from("docs"),
            repo: String::from("https://github.com/acme/docs"),
            branch: Some(String::from("main")),
            build_command: Some(String::from("npm run build")),
            publish_path: Some(String::from("dist")),
            env_vars: None,
            custom_domains: None,
            routes: None,
            environment_id: None,
            log_stream: None,
        }
    }

    fn orchestrator(server: &MockServer) -> Orchestrator<StaticSiteAdapter> {
        let settings = ProviderSettings::new("test-key", "own-1")
            .with_base_url(server.uri())
            .with_wait_for_deploy(false)
            .with_skip_deploy_after_update(true);
        Orchestrator::new(settings, StaticSiteAdapter).expect("orchestrator")
    }

    #[tokio::test]
    async fn test_create_applies_routes_in_plan_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/static-sites"))
            .respond_with(ResponseTemplate::new(201).set_body_json(site_body("sts-1")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/static-sites/sts-1/routes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"type": "rewrite", "source": "/api/*", "destination": "https://api.acme.dev/*"},
                {"type": "redirect", "source": "/old", "destination": "/new"},
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/static-sites/sts-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(site_body("sts-1")))
            .mount(&server)
            .await;

        let mut plan = base_plan();
        plan.routes = Some(vec![
            Route {
                route_type: RouteType::Rewrite,
                source: String::from("/api/*"),
                destination: String::from("https://api.acme.dev/*"),
            },
            Route {
                route_type: RouteType::Redirect,
                source: String::from("/old"),
                destination: String::from("/new"),
            },
        ]);

        let created = orchestrator(&server)
            .create("docs", &plan)
            .await
            .expect("create should succeed");

        assert!(created.is_converged());
        assert_eq!(created.model.routes.len(), 2);
        assert_eq!(created.model.routes[0].source, "/api/*");
    }

    #[tokio::test]
    async fn test_ambiguous_routes_fail_before_primary_read() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/static-sites"))
            .respond_with(ResponseTemplate::new(201).set_body_json(site_body("sts-1")))
            .mount(&server)
            .await;

        let duplicate = Route {
            route_type: RouteType::Redirect,
            source: String::from("/old"),
            destination: String::from("/new"),
        };
        let mut plan = base_plan();
        plan.routes = Some(vec![duplicate.clone(), duplicate]);

        let err = orchestrator(&server)
            .create("docs", &plan)
            .await
            .expect_err("duplicate routes are ambiguous");

        assert!(matches!(
            err,
            ProviderError::Plan(PlanError::AmbiguousEntry { .. })
        ));
    }
}
