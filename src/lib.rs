// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Cirrus Provider
//!
//! A declarative, idempotent resource provider for the Cirrus cloud
//! platform.
//!
//! ## Overview
//!
//! Cirrus Provider maps declarative resource definitions (web services,
//! static sites, key-value instances) onto the Cirrus control-plane REST
//! API, allowing you to:
//!
//! - Define your infrastructure as code in a YAML manifest
//! - Converge remote resources to the declared state with minimal calls
//! - Wait for asynchronous deploys to settle, with cancellation and
//!   timeouts
//! - Track last-known state and survive partial failures without losing
//!   sight of what was actually applied
//!
//! ## Architecture
//!
//! The system is built around **state reconciliation**: each apply
//! compares the last-known state of a resource with the desired plan,
//! computes the minimal add/update/remove sets for every sub-resource
//! (env vars, custom domains, disks, autoscaling, environment
//! membership, log streams), issues the calls in dependency order, and
//! reassembles the resulting model from the server's authoritative
//! responses.
//!
//! ## Modules
//!
//! - [`config`]: Manifest parsing, validation, and fingerprinting
//! - [`api`]: Cirrus API client, wire types, and deploy polling
//! - [`reconcile`]: Diff resolution and per-sub-resource reconcilers
//! - [`resources`]: Per-resource-type orchestration (create/read/update/
//!   delete/import)
//! - [`plan`]: Workspace planning (manifest vs. tracked state)
//! - [`state`]: Workspace state storage and locking
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! project:
//!   name: acme
//!
//! provider:
//!   owner_id: own-123
//!
//! web_services:
//!   - name: api
//!     plan: standard
//!     region: eu-central
//!     image: ghcr.io/acme/api:latest
//!     env_vars:
//!       - key: LOG_LEVEL
//!         value: info
//!     custom_domains:
//!       - api.acme.dev
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod plan;
pub mod reconcile;
pub mod resources;
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use api::{ApiClient, PollOutcome, PollSpec};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{Manifest, ManifestHasher, ManifestParser, ManifestValidator};
pub use error::{ApiError, PollError, ProviderError, ReconcileError, Result};
pub use plan::{build_plan, WorkspacePlan};
pub use resources::{
    ApplyResult, KeyValueAdapter, Orchestrator, ProviderSettings, StaticSiteAdapter,
    WebServiceAdapter,
};
pub use state::{LocalStateStore, StateStore, WorkspaceState};
