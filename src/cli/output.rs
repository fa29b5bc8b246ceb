//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying plans,
//! validation results, and workspace status to the user.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::plan::{ActionType, WorkspacePlan};
use crate::state::WorkspaceState;

use super::commands::OutputFormat;

/// Output formatter for CLI commands.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Resource")]
    resource: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Tracked resource row for status display.
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Region")]
    region: String,
    #[tabled(rename = "URL")]
    url: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a workspace plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &WorkspacePlan) -> String {
        match self.format {
            OutputFormat::Json => {
                let actions: Vec<_> = plan
                    .actions
                    .iter()
                    .map(|action| {
                        serde_json::json!({
                            "action": action.action.to_string(),
                            "kind": action.kind.to_string(),
                            "name": action.name,
                            "reason": action.reason,
                        })
                    })
                    .collect();
                serde_json::to_string_pretty(&serde_json::json!({
                    "fingerprint": plan.fingerprint,
                    "actions": actions,
                }))
                .unwrap_or_default()
            }
            OutputFormat::Text => Self::format_plan_text(plan),
        }
    }

    /// Formats a plan as text.
    fn format_plan_text(plan: &WorkspacePlan) -> String {
        if !plan.has_changes() {
            return format!(
                "{} No changes required - workspace matches the manifest.\n",
                "✓".green()
            );
        }

        let mut output = String::new();
        let _ = writeln!(output, "\nWorkspace plan (manifest {}):", &plan.fingerprint[..8]);

        let rows: Vec<PlanActionRow> = plan
            .actionable()
            .iter()
            .map(|action| PlanActionRow {
                action: Self::colored_action(action.action),
                kind: action.kind.to_string(),
                resource: action.name.clone(),
                reason: action.reason.clone(),
            })
            .collect();
        let _ = writeln!(output, "{}", Table::new(rows));

        let _ = writeln!(
            output,
            "\n{} to create, {} to update, {} to delete, {} unchanged",
            plan.count(ActionType::Create).to_string().green(),
            plan.count(ActionType::Update).to_string().yellow(),
            plan.count(ActionType::Delete).to_string().red(),
            plan.count(ActionType::NoChange)
        );

        output
    }

    /// Colors an action verb by its effect.
    fn colored_action(action: ActionType) -> String {
        match action {
            ActionType::Create => action.to_string().green().to_string(),
            ActionType::Update => action.to_string().yellow().to_string(),
            ActionType::Delete => action.to_string().red().to_string(),
            ActionType::NoChange => action.to_string(),
        }
    }

    /// Formats a validation result for display.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": result.warnings,
            }))
            .unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                if result.is_valid() {
                    let _ = writeln!(output, "{} Manifest is valid.", "✓".green());
                } else {
                    for error in &result.errors {
                        let _ = writeln!(output, "{} {error}", "✗".red());
                    }
                }
                if show_warnings {
                    for warning in &result.warnings {
                        let _ = writeln!(output, "{} {warning}", "!".yellow());
                    }
                } else if result.warning_count() > 0 {
                    let _ = writeln!(
                        output,
                        "({} warnings suppressed; pass --warnings to show)",
                        result.warning_count()
                    );
                }
                output
            }
        }
    }

    /// Formats the tracked workspace state for display.
    #[must_use]
    pub fn format_status(&self, state: &WorkspaceState) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(state).unwrap_or_default(),
            OutputFormat::Text => {
                if state.is_empty() {
                    return format!("No resources tracked for project '{}'.\n", state.project);
                }

                let mut rows = Vec::new();
                for (name, model) in &state.web_services {
                    rows.push(StatusRow {
                        name: name.clone(),
                        kind: String::from("web service"),
                        id: model.id.clone(),
                        region: model.region.clone(),
                        url: model.url.clone().unwrap_or_default(),
                    });
                }
                for (name, model) in &state.static_sites {
                    rows.push(StatusRow {
                        name: name.clone(),
                        kind: String::from("static site"),
                        id: model.id.clone(),
                        region: String::new(),
                        url: model.url.clone().unwrap_or_default(),
                    });
                }
                for (name, model) in &state.key_values {
                    rows.push(StatusRow {
                        name: name.clone(),
                        kind: String::from("key-value"),
                        id: model.id.clone(),
                        region: model.region.clone(),
                        url: String::new(),
                    });
                }
                rows.sort_by(|a, b| a.name.cmp(&b.name));

                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "Project '{}' - {} resources (updated {})",
                    state.project,
                    state.resource_count(),
                    state.last_updated.format("%Y-%m-%d %H:%M:%S UTC")
                );
                let _ = writeln!(output, "{}", Table::new(rows));
                output
            }
        }
    }

    /// Formats an apply summary line.
    #[must_use]
    pub fn format_apply_summary(&self, applied: usize, failed: usize) -> String {
        if failed == 0 {
            format!(
                "{} Applied {applied} changes successfully.",
                "✓".green()
            )
        } else {
            format!(
                "{} Applied {applied} changes, {failed} failed.",
                "✗".red()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestParser;
    use crate::plan::build_plan;

    #[test]
    fn test_empty_plan_renders_no_changes() {
        let manifest = ManifestParser::new()
            .parse_yaml(
                "project:\n  name: acme\nprovider:\n  owner_id: own-123\n",
                None,
            )
            .expect("parse");
        let plan = build_plan(&manifest, &WorkspaceState::new("acme"));

        let text = OutputFormatter::new(OutputFormat::Text).format_plan(&plan);
        assert!(text.contains("No changes required"));
    }

    #[test]
    fn test_json_plan_is_valid_json() {
        let manifest = ManifestParser::new()
            .parse_yaml(
                "project:\n  name: acme\nprovider:\n  owner_id: own-123\n",
                None,
            )
            .expect("parse");
        let plan = build_plan(&manifest, &WorkspaceState::new("acme"));

        let json = OutputFormatter::new(OutputFormat::Json).format_plan(&plan);
        let value: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert!(value["actions"].is_array());
    }
}
