//! Manifest parser.
//!
//! Loads and parses the `cirrus.deploy.yaml` manifest, with `.env`
//! support and environment overrides for the few settings that make
//! sense outside the file.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, ProviderError, Result};

use super::manifest::Manifest;

/// Environment variable holding the Cirrus API key.
pub const API_KEY_ENV: &str = "CIRRUS_API_KEY";

/// Default manifest file names to search for.
pub const DEFAULT_MANIFEST_FILES: &[&str] = &[
    "cirrus.deploy.yaml",
    "cirrus.deploy.yml",
    "cirrus.yaml",
    "cirrus.yml",
];

/// Manifest parser.
#[derive(Debug, Default)]
pub struct ManifestParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ManifestParser {
    /// Creates a new manifest parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads a manifest from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Manifest> {
        let path = path.as_ref();
        info!("Loading manifest from: {}", path.display());

        if !path.exists() {
            return Err(ProviderError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a manifest from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<Manifest> {
        debug!("Parsing YAML manifest");

        let mut manifest: Manifest = serde_yaml::from_str(content).map_err(|e| {
            ProviderError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        Self::apply_env_overrides(&mut manifest);

        debug!(
            "Parsed manifest for project {} with {} resources",
            manifest.project.name,
            manifest.resource_count()
        );
        Ok(manifest)
    }

    /// Applies environment variable overrides to the manifest.
    fn apply_env_overrides(manifest: &mut Manifest) {
        if let Ok(owner) = std::env::var("CIRRUS_OWNER_ID") {
            debug!("Overriding provider.owner_id from environment");
            manifest.provider.owner_id = owner;
        }

        if let Ok(base_url) = std::env::var("CIRRUS_BASE_URL") {
            debug!("Overriding provider.base_url from environment");
            manifest.provider.base_url = Some(base_url);
        }
    }

    /// Loads the `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the `.env` file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ProviderError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the Cirrus API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not set.
    pub fn api_key() -> Result<String> {
        std::env::var(API_KEY_ENV).map_err(|_| {
            ProviderError::Config(ConfigError::MissingEnvVar {
                name: API_KEY_ENV.to_string(),
            })
        })
    }
}

/// Finds the manifest file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no manifest file is found.
pub fn find_manifest_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_MANIFEST_FILES {
            let manifest_path = current.join(filename);
            if manifest_path.exists() {
                info!("Found manifest file: {}", manifest_path.display());
                return Ok(manifest_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(ProviderError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_MANIFEST_FILES[0]),
    }))
}
