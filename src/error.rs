//! Error types for the Cirrus provider.
//!
//! This module provides a comprehensive error hierarchy for all operations
//! in the resource lifecycle: configuration, workspace state, the Cirrus
//! API, polling, planning, and reconciliation.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// The main error type for the Cirrus provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Workspace state errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Cirrus API errors.
    #[error("Cirrus API error: {0}")]
    Api(#[from] ApiError),

    /// Polling errors while awaiting asynchronous operations.
    #[error("Polling error: {0}")]
    Poll(#[from] PollError),

    /// Planning errors.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Reconciliation errors.
    #[error("Reconciliation error: {0}")]
    Reconcile(#[from] ReconcileError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest file could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Manifest validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate resource definition.
    #[error("Duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// Type of resource (service, static site, key-value).
        resource_type: String,
        /// The duplicated name.
        name: String,
    },

    /// Invalid instance plan identifier.
    #[error("Invalid instance plan: {plan}")]
    InvalidPlan {
        /// The invalid plan string.
        plan: String,
    },

    /// Invalid region identifier.
    #[error("Invalid region: {region}")]
    InvalidRegion {
        /// The invalid region string.
        region: String,
    },
}

/// Workspace state errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State file not found.
    #[error("State file not found: {path}")]
    NotFound {
        /// Path to the missing state file.
        path: PathBuf,
    },

    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// State lock acquisition failed.
    #[error("Failed to acquire state lock: {message}")]
    LockFailed {
        /// Description of the lock failure.
        message: String,
    },

    /// State lock is held by another process.
    #[error("State is locked by another process (lock holder: {holder}, since: {since})")]
    LockedByOther {
        /// Identifier of the lock holder.
        holder: String,
        /// When the lock was acquired.
        since: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// State version mismatch.
    #[error("State version mismatch: expected {expected}, found {found}")]
    VersionMismatch {
        /// Expected state version.
        expected: String,
        /// Found state version.
        found: String,
    },
}

/// Cirrus API errors, classified per response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport-level failure (connection refused, DNS, request timeout).
    /// The only class of error the client retries on its own.
    #[error("Network error communicating with Cirrus: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// Rate limited by the API.
    #[error("Cirrus API rate limited, retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Authentication failed.
    #[error("Cirrus authentication failed: {message}")]
    AuthenticationFailed {
        /// Description of the auth failure.
        message: String,
    },

    /// The resource does not exist remotely. Distinguishable so a read can
    /// treat it as "deleted out of band" rather than a hard failure.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of resource (service, disk, custom domain, ...).
        resource: String,
        /// Identifier that was looked up.
        id: String,
    },

    /// The remote rejected the request due to a state mismatch.
    #[error("Cirrus API conflict: {message}")]
    Conflict {
        /// Error message from the API.
        message: String,
    },

    /// Malformed request, or a response missing required fields.
    #[error("Cirrus API validation error: {message}")]
    Validation {
        /// Description of the validation issue.
        message: String,
    },

    /// Any other non-success status.
    #[error("Cirrus API request failed: {status} - {message}")]
    Unexpected {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },
}

/// Errors from the polling loop awaiting asynchronous completion.
#[derive(Debug, Error)]
pub enum PollError {
    /// The wait budget elapsed before a terminal status was observed.
    #[error("Timed out after {}s waiting for {what}", waited.as_secs())]
    TimedOut {
        /// What was being awaited (e.g. "deploy dep-123").
        what: String,
        /// How long the poller waited.
        waited: Duration,
    },

    /// The awaited operation itself reached a failure status. Terminal;
    /// never retried.
    #[error("{what} failed with status {status}: {message}")]
    Failed {
        /// What was being awaited.
        what: String,
        /// The terminal failure status reported by the server.
        status: String,
        /// Additional detail, if any.
        message: String,
    },

    /// The caller cancelled the wait.
    #[error("Polling cancelled while waiting for {what}")]
    Cancelled {
        /// What was being awaited.
        what: String,
    },
}

/// Planning errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// An ordered plan entry matched more than one state entry.
    #[error("Ambiguous {collection} entry: {key} matches multiple existing entries")]
    AmbiguousEntry {
        /// The collection being matched (e.g. "routes").
        collection: String,
        /// The content key that was ambiguous.
        key: String,
    },

    /// A planned action is missing the identifier it needs.
    #[error("Missing identifier for {resource_type} '{name}': {message}")]
    MissingIdentifier {
        /// Type of resource.
        resource_type: String,
        /// Name of the resource.
        name: String,
        /// What was missing.
        message: String,
    },
}

/// Reconciliation errors.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Some sub-resource calls succeeded before one failed. Carries enough
    /// accounting for the caller to persist what was actually applied.
    #[error(
        "Partial reconciliation of {sub_resource} on {resource_id}: \
         {applied} of {attempted} changes applied before failure: {cause}"
    )]
    Partial {
        /// Identifier of the primary resource.
        resource_id: String,
        /// Sub-resource kind that failed partway.
        sub_resource: String,
        /// Number of changes successfully applied.
        applied: usize,
        /// Number of changes that were attempted in total.
        attempted: usize,
        /// The underlying failure text.
        cause: String,
    },

    /// A resource operation failed outright.
    #[error("Failed to {phase} {resource_type} '{name}': {reason}")]
    ResourceFailed {
        /// Type of resource.
        resource_type: String,
        /// Name or identifier of the resource.
        name: String,
        /// Lifecycle phase that failed.
        phase: String,
        /// Reason for failure.
        reason: String,
    },

    /// Reconciliation was aborted.
    #[error("Reconciliation aborted: {reason}")]
    Aborted {
        /// Reason for abort.
        reason: String,
    },
}

/// Result type alias for Cirrus provider operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Api(ApiError::Transport { .. } | ApiError::RateLimited { .. })
                | Self::State(StateError::LockFailed { .. })
        )
    }

    /// Returns the suggested retry delay in seconds, if applicable.
    #[must_use]
    pub const fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::Api(ApiError::RateLimited { retry_after_secs }) => Some(*retry_after_secs),
            Self::Api(ApiError::Transport { .. }) => Some(5),
            Self::State(StateError::LockFailed { .. }) => Some(2),
            _ => None,
        }
    }

    /// Returns true if this error is a remote "not found".
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Api(ApiError::NotFound { .. }))
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

impl ApiError {
    /// Creates a transport error.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates an unexpected-status error.
    #[must_use]
    pub fn unexpected(status: u16, message: impl Into<String>) -> Self {
        Self::Unexpected {
            status,
            message: message.into(),
        }
    }

    /// Returns true if a new attempt of the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::RateLimited { .. })
    }
}
