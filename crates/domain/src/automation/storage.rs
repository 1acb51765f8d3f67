use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;

/// Type tags accepted for [`StorageBinding::backend`].
pub mod backend {
    pub const MEMORY: &str = "memory";
    pub const RELATIONAL: &str = "relational";
    pub const DOCUMENT: &str = "document";
    pub const KEY_VALUE: &str = "key_value";
    pub const SEARCH: &str = "search";
    pub const WIDE_COLUMN: &str = "wide_column";

    pub const ALL: [&str; 6] = [MEMORY, RELATIONAL, DOCUMENT, KEY_VALUE, SEARCH, WIDE_COLUMN];
}

/// Where an automation keeps its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageBinding {
    pub backend: String,
    #[serde(default = "empty_object")]
    pub config: Value,
    pub resource: String,
}

impl StorageBinding {
    #[must_use]
    pub fn new(backend: impl Into<String>, config: Value, resource: impl Into<String>) -> Self {
        Self {
            backend: backend.into(),
            config,
            resource: resource.into(),
        }
    }

    /// In-memory binding whose resource is derived from the automation name.
    #[must_use]
    pub fn memory_for(name: &str) -> Self {
        Self::new(backend::MEMORY, empty_object(), name.replace('-', "_"))
    }

    /// Canonical text of the connection config, used as a cache key.
    #[must_use]
    pub fn config_key(&self) -> String {
        self.config.to_string()
    }

    /// # Errors
    ///
    /// Returns [`ValidationError::Malformed`] for an unknown backend tag,
    /// [`ValidationError::InvalidStorageConfig`] when `config` is not an
    /// object and [`ValidationError::InvalidResource`] for a bad resource.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !backend::ALL.contains(&self.backend.as_str()) {
            return Err(ValidationError::Malformed(format!(
                "unknown storage backend {:?}",
                self.backend
            )));
        }
        if !self.config.is_object() {
            return Err(ValidationError::InvalidStorageConfig);
        }
        if !is_resource_identifier(&self.resource) {
            return Err(ValidationError::InvalidResource(self.resource.clone()));
        }
        Ok(())
    }
}

fn is_resource_identifier(resource: &str) -> bool {
    let mut chars = resource.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
