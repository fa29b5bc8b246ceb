//! Configuration module for the Cirrus provider.
//!
//! This module handles all manifest-related functionality:
//! - Parsing and deserializing `cirrus.deploy.yaml`
//! - Validation of declared resources
//! - Computing manifest fingerprints for change detection

mod hash;
mod manifest;
mod parser;
mod validator;

pub use hash::ManifestHasher;
pub use manifest::{Manifest, ProjectConfig, ProviderConfig};
pub use parser::{
    find_manifest_file, ManifestParser, API_KEY_ENV, DEFAULT_MANIFEST_FILES,
};
pub use validator::{ManifestValidator, ValidationError, ValidationResult};
