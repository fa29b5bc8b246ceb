//! Cirrus CLI entrypoint.
//!
//! This is the main entrypoint for the `cirrus` command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cirrus_provider::cli::{Cli, Commands, ImportKind, OutputFormatter};
use cirrus_provider::config::{find_manifest_file, Manifest, ManifestParser, ManifestValidator};
use cirrus_provider::error::{PlanError, ProviderError, ReconcileError, Result};
use cirrus_provider::plan::{build_plan, ActionType, PlannedAction, ResourceKind, WorkspacePlan};
use cirrus_provider::resources::{
    KeyValueAdapter, KeyValuePlan, Orchestrator, ProviderSettings, StaticSiteAdapter,
    StaticSitePlan, WebServiceAdapter, WebServicePlan,
};
use cirrus_provider::state::{
    HistoryEntry, LocalStateStore, OperationKind, StateStore, WorkspaceState,
};

use clap::Parser;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Starter manifest written by `cirrus init`.
const STARTER_MANIFEST: &str = r"# Cirrus workspace manifest
project:
  name: my-project
  environment: dev

provider:
  owner_id: own-replace-me

web_services:
  - name: api
    plan: standard
    region: eu-central
    image: ghcr.io/acme/api:latest
    env_vars:
      - key: LOG_LEVEL
        value: info
";

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("cirrus_provider=info,cirrus=info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Dispatches the parsed command.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force),
        Commands::Validate { warnings } => {
            cmd_validate(cli.manifest.as_deref(), &formatter, warnings)
        }
        Commands::Plan => cmd_plan(cli.manifest.as_deref(), &formatter).await,
        Commands::Apply { yes } => cmd_apply(cli.manifest.as_deref(), &formatter, yes).await,
        Commands::Status => cmd_status(cli.manifest.as_deref(), &formatter).await,
        Commands::Destroy { yes } => cmd_destroy(cli.manifest.as_deref(), yes).await,
        Commands::Import { kind, name, id } => {
            cmd_import(cli.manifest.as_deref(), kind, &name, &id).await
        }
    }
}

/// Resolves the manifest path from the flag or by searching upwards.
fn resolve_manifest_path(manifest_path: Option<&Path>) -> Result<PathBuf> {
    match manifest_path {
        Some(path) => Ok(path.to_path_buf()),
        None => find_manifest_file(std::env::current_dir()?),
    }
}

/// Loads and parses the manifest, picking up `.env` along the way.
fn load_manifest(manifest_path: Option<&Path>) -> Result<Manifest> {
    let path = resolve_manifest_path(manifest_path)?;
    let parser =
        ManifestParser::new().with_base_path(path.parent().unwrap_or_else(|| Path::new(".")));
    parser.load_dotenv()?;
    parser.load_file(&path)
}

/// Loads the manifest and rejects it if validation fails.
fn load_valid_manifest(manifest_path: Option<&Path>) -> Result<Manifest> {
    let manifest = load_manifest(manifest_path)?;
    ManifestValidator::new().validate(&manifest)?;
    Ok(manifest)
}

/// Asks the user for confirmation on stderr.
fn confirm(prompt: &str) -> Result<bool> {
    eprint!("{prompt} [y/N] ");
    std::io::stderr().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_ascii_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Creates a starter workspace.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    let manifest_path = path.join("cirrus.deploy.yaml");

    if manifest_path.exists() && !force {
        return Err(ProviderError::internal(format!(
            "{} already exists (use --force to overwrite)",
            manifest_path.display()
        )));
    }

    std::fs::create_dir_all(path)?;
    std::fs::write(&manifest_path, STARTER_MANIFEST)?;
    println!("Created {}", manifest_path.display());
    println!("Set CIRRUS_API_KEY in your environment (or a .env file) before applying.");
    Ok(())
}

/// Validates the manifest and reports issues.
fn cmd_validate(
    manifest_path: Option<&Path>,
    formatter: &OutputFormatter,
    warnings: bool,
) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let result = ManifestValidator::new().validate(&manifest)?;
    print!("{}", formatter.format_validation(&result, warnings));
    Ok(())
}

/// Computes and displays the workspace plan.
async fn cmd_plan(manifest_path: Option<&Path>, formatter: &OutputFormatter) -> Result<()> {
    let manifest = load_valid_manifest(manifest_path)?;
    let store = LocalStateStore::new(&manifest.project.name)?;
    let state = store
        .load()
        .await?
        .unwrap_or_else(|| WorkspaceState::new(&manifest.project.name));

    let plan = build_plan(&manifest, &state);
    print!("{}", formatter.format_plan(&plan));
    Ok(())
}

/// Applies the manifest.
async fn cmd_apply(
    manifest_path: Option<&Path>,
    formatter: &OutputFormatter,
    yes: bool,
) -> Result<()> {
    let manifest = load_valid_manifest(manifest_path)?;
    let store = LocalStateStore::new(&manifest.project.name)?;
    let mut state = store
        .load()
        .await?
        .unwrap_or_else(|| WorkspaceState::new(&manifest.project.name));

    let plan = build_plan(&manifest, &state);
    print!("{}", formatter.format_plan(&plan));

    if !plan.has_changes() {
        return Ok(());
    }

    if !yes && !confirm("Apply these changes?")? {
        eprintln!("Apply aborted.");
        return Ok(());
    }

    let api_key = ManifestParser::api_key()?;
    let executor = Executor::new(manifest.provider_settings(&api_key))?;

    let lock = store.acquire_lock("").await?;
    let (applied, failure) = executor.execute(&plan, &manifest, &mut state).await;

    let touched: Vec<String> = plan
        .actionable()
        .iter()
        .map(|action| format!("{}:{}", action.kind, action.name))
        .collect();
    match &failure {
        None => {
            state.fingerprint.clone_from(&plan.fingerprint);
            state.add_history(HistoryEntry::new(
                OperationKind::Apply,
                &plan.fingerprint,
                touched,
            ));
        }
        Some(e) => {
            state.add_history(HistoryEntry::failed(
                OperationKind::Apply,
                &plan.fingerprint,
                touched,
                &e.to_string(),
            ));
        }
    }

    let save_result = store.save(&state).await;
    store.release_lock(&lock.lock_id).await?;
    save_result?;

    let failed = usize::from(failure.is_some());
    println!("{}", formatter.format_apply_summary(applied, failed));

    failure.map_or(Ok(()), Err)
}

/// Shows the tracked workspace state.
async fn cmd_status(manifest_path: Option<&Path>, formatter: &OutputFormatter) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let store = LocalStateStore::new(&manifest.project.name)?;
    let state = store
        .load()
        .await?
        .unwrap_or_else(|| WorkspaceState::new(&manifest.project.name));

    print!("{}", formatter.format_status(&state));
    Ok(())
}

/// Deletes every tracked resource.
async fn cmd_destroy(manifest_path: Option<&Path>, yes: bool) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let store = LocalStateStore::new(&manifest.project.name)?;
    let Some(mut state) = store.load().await? else {
        println!("Nothing to destroy: no state tracked.");
        return Ok(());
    };

    if state.is_empty() {
        println!("Nothing to destroy: no resources tracked.");
        return Ok(());
    }

    if !yes
        && !confirm(&format!(
            "Destroy all {} tracked resources?",
            state.resource_count()
        ))?
    {
        eprintln!("Destroy aborted.");
        return Ok(());
    }

    let api_key = ManifestParser::api_key()?;
    let executor = Executor::new(manifest.provider_settings(&api_key))?;

    let lock = store.acquire_lock("").await?;
    let failure = executor.destroy_all(&mut state).await;

    let entry = match &failure {
        None => HistoryEntry::new(OperationKind::Destroy, &state.fingerprint.clone(), vec![]),
        Some(e) => HistoryEntry::failed(
            OperationKind::Destroy,
            &state.fingerprint.clone(),
            vec![],
            &e.to_string(),
        ),
    };
    state.add_history(entry);

    let save_result = store.save(&state).await;
    store.release_lock(&lock.lock_id).await?;
    save_result?;

    match failure {
        None => {
            println!("Destroyed all resources.");
            Ok(())
        }
        Some(e) => Err(e),
    }
}

/// Imports a pre-existing server resource into the workspace.
async fn cmd_import(
    manifest_path: Option<&Path>,
    kind: ImportKind,
    name: &str,
    id: &str,
) -> Result<()> {
    let manifest = load_manifest(manifest_path)?;
    let api_key = ManifestParser::api_key()?;
    let executor = Executor::new(manifest.provider_settings(&api_key))?;

    let store = LocalStateStore::new(&manifest.project.name)?;
    let mut state = store
        .load()
        .await?
        .unwrap_or_else(|| WorkspaceState::new(&manifest.project.name));

    match kind {
        ImportKind::WebService => {
            let model = executor.web_services.import_by_id(id).await?;
            state.set_web_service(name, model);
        }
        ImportKind::StaticSite => {
            let model = executor.static_sites.import_by_id(id).await?;
            state.set_static_site(name, model);
        }
        ImportKind::KeyValue => {
            let model = executor.key_values.import_by_id(id).await?;
            state.set_key_value(name, model);
        }
    }

    let fingerprint = state.fingerprint.clone();
    state.add_history(HistoryEntry::new(
        OperationKind::Import,
        &fingerprint,
        vec![format!("{id} as {name}")],
    ));
    store.save(&state).await?;

    println!("Imported {id} as '{name}'. Run `cirrus plan` to see pending changes.");
    Ok(())
}

/// Drives plan actions through the per-kind orchestrators.
struct Executor {
    /// Web service orchestrator.
    web_services: Orchestrator<WebServiceAdapter>,
    /// Static site orchestrator.
    static_sites: Orchestrator<StaticSiteAdapter>,
    /// Key-value orchestrator.
    key_values: Orchestrator<KeyValueAdapter>,
}

impl Executor {
    /// Builds the orchestrators from provider settings.
    fn new(settings: ProviderSettings) -> Result<Self> {
        Ok(Self {
            web_services: Orchestrator::new(settings.clone(), WebServiceAdapter)?,
            static_sites: Orchestrator::new(settings.clone(), StaticSiteAdapter)?,
            key_values: Orchestrator::new(settings, KeyValueAdapter)?,
        })
    }

    /// Executes the plan against the remote API, updating state as each
    /// action lands. Stops at the first failure; everything already
    /// applied stays recorded in state.
    async fn execute(
        &self,
        plan: &WorkspacePlan,
        manifest: &Manifest,
        state: &mut WorkspaceState,
    ) -> (usize, Option<ProviderError>) {
        let mut applied = 0;

        for action in &plan.actions {
            if action.action == ActionType::NoChange {
                debug!("Skipping {} '{}': no change", action.kind, action.name);
                continue;
            }

            info!("Executing: {action}");
            match self.execute_action(action, manifest, state).await {
                Ok(()) => applied += 1,
                Err(e) => {
                    error!("Action failed: {e}");
                    return (applied, Some(e));
                }
            }
        }

        (applied, None)
    }

    /// Executes a single plan action.
    async fn execute_action(
        &self,
        action: &PlannedAction,
        manifest: &Manifest,
        state: &mut WorkspaceState,
    ) -> Result<()> {
        match action.kind {
            ResourceKind::WebService => self.apply_web_service(action, manifest, state).await,
            ResourceKind::StaticSite => self.apply_static_site(action, manifest, state).await,
            ResourceKind::KeyValue => self.apply_key_value(action, manifest, state).await,
        }
    }

    /// Applies one web service action.
    async fn apply_web_service(
        &self,
        action: &PlannedAction,
        manifest: &Manifest,
        state: &mut WorkspaceState,
    ) -> Result<()> {
        let key = action.kind.state_key(&action.name);

        match action.action {
            ActionType::Delete => {
                if let Some(model) = state.web_services.get(&action.name) {
                    let id = model.id.clone();
                    self.web_services.delete(&id).await?;
                }
                state.remove_web_service(&action.name);
                state.remove_plan_fingerprint(&key);
                Ok(())
            }
            ActionType::Create => {
                let plan = find_web_service(manifest, action)?;
                let result = self.web_services.create(&action.name, plan).await?;
                state.set_web_service(&action.name, result.model);
                finish_apply(state, &key, action, result.partial)
            }
            ActionType::Update => {
                let plan = find_web_service(manifest, action)?;
                let model = state
                    .web_services
                    .get(&action.name)
                    .cloned()
                    .ok_or_else(|| missing_identifier(action, "not found in tracked state"))?;
                let result = self.web_services.update(&model, plan).await?;
                state.set_web_service(&action.name, result.model);
                finish_apply(state, &key, action, result.partial)
            }
            ActionType::NoChange => Ok(()),
        }
    }

    /// Applies one static site action.
    async fn apply_static_site(
        &self,
        action: &PlannedAction,
        manifest: &Manifest,
        state: &mut WorkspaceState,
    ) -> Result<()> {
        let key = action.kind.state_key(&action.name);

        match action.action {
            ActionType::Delete => {
                if let Some(model) = state.static_sites.get(&action.name) {
                    let id = model.id.clone();
                    self.static_sites.delete(&id).await?;
                }
                state.remove_static_site(&action.name);
                state.remove_plan_fingerprint(&key);
                Ok(())
            }
            ActionType::Create => {
                let plan = find_static_site(manifest, action)?;
                let result = self.static_sites.create(&action.name, plan).await?;
                state.set_static_site(&action.name, result.model);
                finish_apply(state, &key, action, result.partial)
            }
            ActionType::Update => {
                let plan = find_static_site(manifest, action)?;
                let model = state
                    .static_sites
                    .get(&action.name)
                    .cloned()
                    .ok_or_else(|| missing_identifier(action, "not found in tracked state"))?;
                let result = self.static_sites.update(&model, plan).await?;
                state.set_static_site(&action.name, result.model);
                finish_apply(state, &key, action, result.partial)
            }
            ActionType::NoChange => Ok(()),
        }
    }

    /// Applies one key-value action.
    async fn apply_key_value(
        &self,
        action: &PlannedAction,
        manifest: &Manifest,
        state: &mut WorkspaceState,
    ) -> Result<()> {
        let key = action.kind.state_key(&action.name);

        match action.action {
            ActionType::Delete => {
                if let Some(model) = state.key_values.get(&action.name) {
                    let id = model.id.clone();
                    self.key_values.delete(&id).await?;
                }
                state.remove_key_value(&action.name);
                state.remove_plan_fingerprint(&key);
                Ok(())
            }
            ActionType::Create => {
                let plan = find_key_value(manifest, action)?;
                let result = self.key_values.create(&action.name, plan).await?;
                state.set_key_value(&action.name, result.model);
                finish_apply(state, &key, action, result.partial)
            }
            ActionType::Update => {
                let plan = find_key_value(manifest, action)?;
                let model = state
                    .key_values
                    .get(&action.name)
                    .cloned()
                    .ok_or_else(|| missing_identifier(action, "not found in tracked state"))?;
                let result = self.key_values.update(&model, plan).await?;
                state.set_key_value(&action.name, result.model);
                finish_apply(state, &key, action, result.partial)
            }
            ActionType::NoChange => Ok(()),
        }
    }

    /// Deletes every tracked resource, returning the first failure.
    async fn destroy_all(&self, state: &mut WorkspaceState) -> Option<ProviderError> {
        let service_names: Vec<String> = state.web_services.keys().cloned().collect();
        for name in service_names {
            let id = state.web_services[&name].id.clone();
            if let Err(e) = self.web_services.delete(&id).await {
                return Some(e);
            }
            state.remove_web_service(&name);
            state.remove_plan_fingerprint(&ResourceKind::WebService.state_key(&name));
        }

        let site_names: Vec<String> = state.static_sites.keys().cloned().collect();
        for name in site_names {
            let id = state.static_sites[&name].id.clone();
            if let Err(e) = self.static_sites.delete(&id).await {
                return Some(e);
            }
            state.remove_static_site(&name);
            state.remove_plan_fingerprint(&ResourceKind::StaticSite.state_key(&name));
        }

        let instance_names: Vec<String> = state.key_values.keys().cloned().collect();
        for name in instance_names {
            let id = state.key_values[&name].id.clone();
            if let Err(e) = self.key_values.delete(&id).await {
                return Some(e);
            }
            state.remove_key_value(&name);
            state.remove_plan_fingerprint(&ResourceKind::KeyValue.state_key(&name));
        }

        None
    }
}

/// Records the fingerprint on full convergence, or surfaces the partial
/// failure with the model already persisted.
fn finish_apply(
    state: &mut WorkspaceState,
    key: &str,
    action: &PlannedAction,
    partial: Option<ReconcileError>,
) -> Result<()> {
    match partial {
        None => {
            if let Some(fingerprint) = &action.fingerprint {
                state.set_plan_fingerprint(key, fingerprint);
            }
            Ok(())
        }
        // No fingerprint recorded: the next apply must retry this resource.
        Some(e) => Err(ProviderError::Reconcile(e)),
    }
}

/// Finds a declared web service by action name.
fn find_web_service<'a>(
    manifest: &'a Manifest,
    action: &PlannedAction,
) -> Result<&'a WebServicePlan> {
    manifest
        .web_services
        .iter()
        .find(|s| s.name == action.name)
        .ok_or_else(|| missing_identifier(action, "not declared in manifest"))
}

/// Finds a declared static site by action name.
fn find_static_site<'a>(
    manifest: &'a Manifest,
    action: &PlannedAction,
) -> Result<&'a StaticSitePlan> {
    manifest
        .static_sites
        .iter()
        .find(|s| s.name == action.name)
        .ok_or_else(|| missing_identifier(action, "not declared in manifest"))
}

/// Finds a declared key-value instance by action name.
fn find_key_value<'a>(
    manifest: &'a Manifest,
    action: &PlannedAction,
) -> Result<&'a KeyValuePlan> {
    manifest
        .key_value
        .iter()
        .find(|s| s.name == action.name)
        .ok_or_else(|| missing_identifier(action, "not declared in manifest"))
}

/// Builds a missing-identifier planning error.
fn missing_identifier(action: &PlannedAction, message: &str) -> ProviderError {
    ProviderError::Plan(PlanError::MissingIdentifier {
        resource_type: action.kind.to_string(),
        name: action.name.clone(),
        message: message.to_string(),
    })
}
