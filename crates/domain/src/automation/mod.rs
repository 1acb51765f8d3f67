//! Automation: a named, versioned bundle of endpoints bound to a store.
//!
//! An automation is declared as data. Once `active`, every active
//! [`Endpoint`] it carries is served under its `base_path`, backed by the
//! records reachable through its [`StorageBinding`].

mod crud;
mod endpoint;
mod path;
mod storage;

pub use crud::{DEFAULT_LIST_LIMIT, default_crud_endpoints};
pub use endpoint::{
    Endpoint, EndpointKey, EndpointParameter, HttpMethod, ParamType, UnknownMethod,
};
pub use path::{PathTemplate, RESERVED_PREFIXES, join_path, normalize_path, validate_base_path};
pub use storage::{StorageBinding, backend};

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ValidationError;
use crate::id::AutomationId;
use crate::time::{Timestamp, advance, now};

/// Version assigned to new automations.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Longest accepted automation name.
pub const MAX_NAME_LEN: usize = 64;

/// Lifecycle state of an automation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AutomationStatus {
    #[default]
    Draft,
    Active,
    Inactive,
}

impl AutomationStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for AutomationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declarative bundle of HTTP endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Automation {
    pub id: AutomationId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub base_path: String,
    #[serde(default)]
    pub status: AutomationStatus,
    #[serde(default)]
    pub degraded: bool,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    pub storage_binding: StorageBinding,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Automation {
    /// Create a builder for constructing an [`Automation`].
    #[must_use]
    pub fn builder() -> AutomationBuilder {
        AutomationBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated rule:
    /// - `name` is empty or not URL-safe
    /// - `base_path` is not an absolute literal path
    /// - an endpoint is malformed or its `(path, method)` repeats
    /// - the storage binding is invalid
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_base_path(&self.base_path)?;
        let mut keys = HashSet::new();
        for endpoint in &self.endpoints {
            endpoint.validate()?;
            let key = endpoint.key();
            if !keys.insert(key.clone()) {
                return Err(ValidationError::DuplicateEndpoint {
                    method: key.method,
                    path: key.path,
                });
            }
        }
        self.storage_binding.validate()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AutomationStatus::Active
    }

    /// Bump `updated_at`, never moving it backwards.
    pub fn touch(&mut self) {
        self.updated_at = advance(self.updated_at);
    }

    #[must_use]
    pub fn find_endpoint(&self, path: &str, method: HttpMethod) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.is(path, method))
    }

    /// Append an endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateEndpoint`] when the `(path, method)`
    /// is already taken, or the endpoint's own validation error.
    pub fn add_endpoint(&mut self, endpoint: Endpoint) -> Result<(), ValidationError> {
        endpoint.validate()?;
        if self.find_endpoint(&endpoint.path, endpoint.method).is_some() {
            let key = endpoint.key();
            return Err(ValidationError::DuplicateEndpoint {
                method: key.method,
                path: key.path,
            });
        }
        self.endpoints.push(endpoint);
        self.touch();
        Ok(())
    }

    /// Replace the endpoint addressed by `(path, method)` in place.
    ///
    /// Returns `Ok(false)` when no such endpoint exists.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DuplicateEndpoint`] when the replacement
    /// moves onto the identity of another endpoint.
    pub fn update_endpoint(
        &mut self,
        path: &str,
        method: HttpMethod,
        endpoint: Endpoint,
    ) -> Result<bool, ValidationError> {
        endpoint.validate()?;
        let Some(index) = self.endpoints.iter().position(|e| e.is(path, method)) else {
            return Ok(false);
        };
        let collides = self
            .endpoints
            .iter()
            .enumerate()
            .any(|(i, e)| i != index && e.is(&endpoint.path, endpoint.method));
        if collides {
            let key = endpoint.key();
            return Err(ValidationError::DuplicateEndpoint {
                method: key.method,
                path: key.path,
            });
        }
        self.endpoints[index] = endpoint;
        self.touch();
        Ok(true)
    }

    /// Drop the endpoint addressed by `(path, method)`, returning whether it existed.
    pub fn remove_endpoint(&mut self, path: &str, method: HttpMethod) -> bool {
        let before = self.endpoints.len();
        self.endpoints.retain(|e| !e.is(path, method));
        let removed = self.endpoints.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Full live path of one of this automation's endpoints.
    #[must_use]
    pub fn route_path(&self, endpoint: &Endpoint) -> String {
        join_path(&self.base_path, &endpoint.path)
    }
}

/// Check an automation name: `[a-z0-9][a-z0-9_-]*`, at most 64 characters.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyName`] or [`ValidationError::InvalidName`].
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    let allowed = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    let mut chars = name.chars();
    let valid = name.len() <= MAX_NAME_LEN
        && chars.next().is_some_and(allowed)
        && chars.all(|c| allowed(c) || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidName(name.to_string()))
    }
}

/// Default base path for an automation named `name`.
#[must_use]
pub fn default_base_path(name: &str) -> String {
    format!("/api/{name}")
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// Step-by-step builder for [`Automation`].
#[derive(Debug, Default)]
pub struct AutomationBuilder {
    id: Option<AutomationId>,
    name: Option<String>,
    description: String,
    version: Option<String>,
    base_path: Option<String>,
    status: AutomationStatus,
    endpoints: Vec<Endpoint>,
    storage_binding: Option<StorageBinding>,
    metadata: BTreeMap<String, Value>,
}

impl AutomationBuilder {
    #[must_use]
    pub fn id(mut self, id: AutomationId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = Some(base_path.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: AutomationStatus) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    #[must_use]
    pub fn storage_binding(mut self, binding: StorageBinding) -> Self {
        self.storage_binding = Some(binding);
        self
    }

    #[must_use]
    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Consume the builder, validate, and return an [`Automation`].
    ///
    /// Missing fields fall back to defaults: version `1.0.0`, base path
    /// `/api/{name}`, an in-memory binding named after the automation.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found by [`Automation::validate`].
    pub fn build(self) -> Result<Automation, ValidationError> {
        let name = self.name.unwrap_or_default();
        let base_path = self
            .base_path
            .filter(|p| !p.is_empty())
            .map_or_else(|| default_base_path(&name), |p| normalize_path(&p));
        let storage_binding = self
            .storage_binding
            .unwrap_or_else(|| StorageBinding::memory_for(&name));
        let created_at = now();
        let automation = Automation {
            id: self.id.unwrap_or_default(),
            description: self.description,
            version: self.version.unwrap_or_else(default_version),
            base_path,
            status: self.status,
            degraded: false,
            endpoints: self.endpoints,
            storage_binding,
            metadata: self.metadata,
            created_at,
            updated_at: created_at,
            name,
        };
        automation.validate()?;
        Ok(automation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn orders() -> Automation {
        Automation::builder()
            .name("orders")
            .description("Order book")
            .build()
            .unwrap()
    }

    #[test]
    fn should_apply_defaults_when_building() {
        let automation = orders();
        assert_eq!(automation.version, "1.0.0");
        assert_eq!(automation.base_path, "/api/orders");
        assert_eq!(automation.status, AutomationStatus::Draft);
        assert_eq!(automation.storage_binding.resource, "orders");
        assert!(automation.endpoints.is_empty());
        assert!(!automation.degraded);
    }

    #[test]
    fn should_trim_trailing_slash_from_base_path() {
        let automation = Automation::builder()
            .name("orders")
            .base_path("/shop/orders/")
            .build()
            .unwrap();
        assert_eq!(automation.base_path, "/shop/orders");
    }

    #[test]
    fn should_reject_invalid_names() {
        assert_eq!(
            Automation::builder().build().unwrap_err(),
            ValidationError::EmptyName
        );
        let long = "a".repeat(65);
        for bad in ["Orders", "-orders", "or ders", "orders/x", long.as_str()] {
            assert_eq!(
                validate_name(bad),
                Err(ValidationError::InvalidName(bad.to_string())),
                "{bad}"
            );
        }
        assert!(validate_name("order_book-2").is_ok());
    }

    #[test]
    fn should_reject_duplicate_endpoints_on_build() {
        let result = Automation::builder()
            .name("orders")
            .endpoint(Endpoint::new(HttpMethod::Get, "/items"))
            .endpoint(Endpoint::new(HttpMethod::Get, "/items/"))
            .build();
        assert!(matches!(
            result,
            Err(ValidationError::DuplicateEndpoint { .. })
        ));
    }

    #[test]
    fn should_add_update_and_remove_endpoints() {
        let mut automation = orders();
        automation
            .add_endpoint(Endpoint::new(HttpMethod::Get, "/summary"))
            .unwrap();
        assert!(
            automation
                .add_endpoint(Endpoint::new(HttpMethod::Get, "/summary"))
                .is_err()
        );

        let replacement = Endpoint::new(HttpMethod::Get, "/summary").summary("Totals");
        assert!(
            automation
                .update_endpoint("/summary", HttpMethod::Get, replacement)
                .unwrap()
        );
        assert_eq!(
            automation
                .find_endpoint("/summary", HttpMethod::Get)
                .unwrap()
                .summary,
            "Totals"
        );
        assert!(
            !automation
                .update_endpoint("/missing", HttpMethod::Get, Endpoint::new(HttpMethod::Get, "/x"))
                .unwrap()
        );

        assert!(automation.remove_endpoint("/summary", HttpMethod::Get));
        assert!(!automation.remove_endpoint("/summary", HttpMethod::Get));
    }

    #[test]
    fn should_refuse_update_onto_another_endpoint() {
        let mut automation = orders();
        automation
            .add_endpoint(Endpoint::new(HttpMethod::Get, "/a"))
            .unwrap();
        automation
            .add_endpoint(Endpoint::new(HttpMethod::Get, "/b"))
            .unwrap();
        let result =
            automation.update_endpoint("/a", HttpMethod::Get, Endpoint::new(HttpMethod::Get, "/b"));
        assert!(result.is_err());
    }

    #[test]
    fn should_join_route_path() {
        let automation = orders();
        let endpoint = Endpoint::new(HttpMethod::Get, "/{id}");
        assert_eq!(automation.route_path(&endpoint), "/api/orders/{id}");
    }

    #[test]
    fn should_round_trip_through_json() {
        let mut automation = orders();
        automation.endpoints = default_crud_endpoints();
        automation
            .metadata
            .insert("owner".to_string(), json!("ops"));
        let text = serde_json::to_string_pretty(&automation).unwrap();
        let back: Automation = serde_json::from_str(&text).unwrap();
        assert_eq!(back, automation);
    }

    #[test]
    fn should_serialize_status_lowercase() {
        let value = serde_json::to_value(orders()).unwrap();
        assert_eq!(value["status"], json!("draft"));
        assert_eq!(value["storage_binding"]["backend"], json!("memory"));
    }
}
