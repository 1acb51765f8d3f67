//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`CouncilError`]
//! via `#[from]` when crossing a port boundary.

use crate::automation::HttpMethod;

/// Base error type for domain and application operations.
#[derive(Debug, thiserror::Error)]
pub enum CouncilError {
    /// A definition or request violated a domain invariant.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// The requested automation does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// An automation with the same name already exists.
    #[error("duplicate name")]
    DuplicateName(#[from] DuplicateNameError),

    /// The automation exists but has no endpoint with that identity.
    #[error("endpoint not found")]
    EndpointNotFound(#[from] EndpointNotFoundError),

    /// A persistence layer failed.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("name {0:?} must be lowercase alphanumeric, '-' or '_' and at most 64 characters")]
    InvalidName(String),

    #[error("base path {0:?} must start with '/', only contain URL-safe characters and not start with a reserved segment")]
    InvalidBasePath(String),

    #[error("endpoint path {0:?} must start with '/' and contain well-formed placeholders")]
    InvalidEndpointPath(String),

    #[error("endpoint {method} {path} is declared more than once")]
    DuplicateEndpoint { method: HttpMethod, path: String },

    #[error("parameter {0:?} is declared more than once")]
    DuplicateParameter(String),

    #[error("storage resource {0:?} must be an identifier")]
    InvalidResource(String),

    #[error("storage config must be a JSON object")]
    InvalidStorageConfig,

    #[error("malformed definition: {0}")]
    Malformed(String),
}

/// A lookup by name failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id:?} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A create collided with an existing automation name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("automation {0:?} already exists")]
pub struct DuplicateNameError(pub String);

/// No endpoint with the given `(path, method)` exists in the automation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("endpoint {method} {path} not found in automation {automation:?}")]
pub struct EndpointNotFoundError {
    pub automation: String,
    pub method: HttpMethod,
    pub path: String,
}

impl CouncilError {
    /// Wrap any error as a storage failure.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }

    /// Shorthand for an automation lookup miss.
    #[must_use]
    pub fn automation_not_found(name: &str) -> Self {
        NotFoundError {
            entity: "Automation",
            id: name.to_string(),
        }
        .into()
    }
}
