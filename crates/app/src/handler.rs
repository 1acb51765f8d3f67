//! Endpoint handler contract.
//!
//! Every live route ends in an [`EndpointHandler`]. Handlers receive the
//! merged request parameters plus the automation and endpoint they were bound
//! to, and produce a [`HandlerOutput`] that the dispatcher shapes into the
//! response body.

use async_trait::async_trait;
use council_domain::automation::{Automation, Endpoint, HttpMethod};
use serde_json::{Map, Value};

use crate::ports::StorageError;

/// Merged request parameters (query, body fields, path placeholders).
pub type Params = Map<String, Value>;

/// What a handler produced, before response shaping.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    /// A page of items plus the total number matching.
    Collection { items: Vec<Value>, total: u64 },
    /// One value.
    Single(Value),
}

impl HandlerOutput {
    #[must_use]
    pub fn single(value: impl Into<Value>) -> Self {
        Self::Single(value.into())
    }
}

/// Failures raised while handling a request.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The addressed record does not exist.
    #[error("record {0:?} not found")]
    RecordNotFound(String),

    /// A record with the requested id already exists.
    #[error("record {0:?} already exists")]
    DuplicateRecord(String),

    /// The request was well-formed but not acceptable to the handler.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Backend(#[from] StorageError),

    /// Business-logic failure of a custom handler.
    #[error("handler failed: {0}")]
    Failed(String),
}

/// A request handler bound into the live route table.
#[async_trait]
pub trait EndpointHandler: Send + Sync {
    async fn handle(
        &self,
        params: Params,
        automation: &Automation,
        endpoint: &Endpoint,
    ) -> Result<HandlerOutput, HandlerError>;

    /// Whether this handler can serve requests with `method`.
    fn accepts(&self, _method: HttpMethod) -> bool {
        true
    }
}
