use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::{PathTemplate, normalize_path};
use crate::error::ValidationError;
use crate::record::ID_FIELD;

/// HTTP verbs an endpoint can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }

    /// Whether requests with this method carry a body worth parsing.
    #[must_use]
    pub fn has_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unsupported HTTP method.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported HTTP method {0:?}")]
pub struct UnknownMethod(pub String);

impl FromStr for HttpMethod {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Declared type of an endpoint parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    Object,
    Array,
    File,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Object => "object",
            Self::Array => "array",
            Self::File => "file",
        };
        f.write_str(name)
    }
}

/// One entry in an endpoint's parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointParameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl EndpointParameter {
    /// A required parameter without default.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            required: true,
            default: None,
        }
    }

    /// An optional parameter, filled with `default` when absent.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ParamType, default: Option<Value>) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            required: false,
            default,
        }
    }

    #[must_use]
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Identity of an endpoint inside its automation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EndpointKey {
    pub method: HttpMethod,
    pub path: String,
}

impl EndpointKey {
    #[must_use]
    pub fn new(method: HttpMethod, path: &str) -> Self {
        Self {
            method,
            path: normalize_path(path),
        }
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// One route of an automation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub path: String,
    pub method: HttpMethod,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<EndpointParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler_path: Option<String>,
    #[serde(default)]
    pub requires_auth: bool,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub wrap_response: bool,
    #[serde(default)]
    pub single_item: bool,
    #[serde(default = "default_id_field")]
    pub id_field: String,
}

impl Endpoint {
    /// An active endpoint with no parameters and the built-in handler.
    #[must_use]
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            summary: String::new(),
            description: String::new(),
            parameters: Vec::new(),
            handler_path: None,
            requires_auth: false,
            active: true,
            wrap_response: false,
            single_item: false,
            id_field: default_id_field(),
        }
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    #[must_use]
    pub fn handler(mut self, handler_path: impl Into<String>) -> Self {
        self.handler_path = Some(handler_path.into());
        self
    }

    #[must_use]
    pub fn param(mut self, parameter: EndpointParameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    #[must_use]
    pub fn wrapped(mut self, wrap_response: bool) -> Self {
        self.wrap_response = wrap_response;
        self
    }

    #[must_use]
    pub fn single(mut self, single_item: bool) -> Self {
        self.single_item = single_item;
        self
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(self.method, &self.path)
    }

    /// Whether this endpoint is addressed by `(path, method)`.
    #[must_use]
    pub fn is(&self, path: &str, method: HttpMethod) -> bool {
        self.method == method && normalize_path(&self.path) == normalize_path(path)
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&EndpointParameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check the endpoint's own invariants.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidEndpointPath`] for a malformed path
    /// and [`ValidationError::DuplicateParameter`] for a repeated parameter.
    pub fn validate(&self) -> Result<(), ValidationError> {
        PathTemplate::parse(&self.path)?;
        let mut seen = HashSet::new();
        for parameter in &self.parameters {
            if parameter.name.is_empty() || !seen.insert(parameter.name.as_str()) {
                return Err(ValidationError::DuplicateParameter(parameter.name.clone()));
            }
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_id_field() -> String {
    ID_FIELD.to_string()
}
