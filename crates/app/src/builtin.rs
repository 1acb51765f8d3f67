//! Built-in handlers: default CRUD over an automation's records, echo and health.

use std::sync::Arc;

use async_trait::async_trait;
use council_domain::automation::{
    Automation, DEFAULT_LIST_LIMIT, Endpoint, HttpMethod, PathTemplate,
};
use council_domain::record::{ID_FIELD, Record, RecordFilter, value_text};
use serde_json::{Value, json};

use crate::handler::{EndpointHandler, HandlerError, HandlerOutput, Params};
use crate::ports::{BackendStatus, RecordRepository, StorageError};

/// Largest page the list handler returns.
pub const MAX_LIST_LIMIT: usize = 100;

/// Which CRUD operation a default endpoint performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrudOp {
    List,
    Get,
    Create,
    Update,
    Patch,
    Delete,
}

impl CrudOp {
    /// Pick the operation for an endpoint without a custom handler.
    ///
    /// # Errors
    ///
    /// Returns a description of the problem when the operation needs a record
    /// id but the endpoint neither has a matching path placeholder nor
    /// declares a matching parameter.
    pub fn for_endpoint(endpoint: &Endpoint) -> Result<Self, String> {
        let op = match (endpoint.method, endpoint.single_item) {
            (HttpMethod::Get, true) => Self::Get,
            (HttpMethod::Get, false) => Self::List,
            (HttpMethod::Post, _) => Self::Create,
            (HttpMethod::Put, _) => Self::Update,
            (HttpMethod::Patch, _) => Self::Patch,
            (HttpMethod::Delete, _) => Self::Delete,
        };
        if op.needs_id() && !addresses_id(endpoint) {
            return Err(format!(
                "{} {} needs a {{{}}} placeholder or parameter",
                endpoint.method, endpoint.path, endpoint.id_field
            ));
        }
        Ok(op)
    }

    fn needs_id(self) -> bool {
        !matches!(self, Self::List | Self::Create)
    }

    #[must_use]
    pub fn method(self) -> HttpMethod {
        match self {
            Self::List | Self::Get => HttpMethod::Get,
            Self::Create => HttpMethod::Post,
            Self::Update => HttpMethod::Put,
            Self::Patch => HttpMethod::Patch,
            Self::Delete => HttpMethod::Delete,
        }
    }
}

fn addresses_id(endpoint: &Endpoint) -> bool {
    let in_path = PathTemplate::parse(&endpoint.path)
        .is_ok_and(|t| t.placeholders().any(|p| p == endpoint.id_field));
    in_path || endpoint.parameter(&endpoint.id_field).is_some()
}

fn take_id(params: &mut Params, id_field: &str) -> Result<String, HandlerError> {
    params
        .remove(id_field)
        .filter(|v| !v.is_null())
        .map(|v| value_text(&v))
        .filter(|id| !id.is_empty())
        .ok_or_else(|| HandlerError::InvalidInput(format!("missing required id field {id_field:?}")))
}

fn page_bound(params: &mut Params, name: &str, default: usize) -> usize {
    params
        .remove(name)
        .and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(default)
}

/// Default CRUD handler over one automation's repository.
pub struct CrudHandler {
    op: CrudOp,
    records: Arc<dyn RecordRepository>,
}

impl CrudHandler {
    pub fn new(op: CrudOp, records: Arc<dyn RecordRepository>) -> Self {
        Self { op, records }
    }

    #[must_use]
    pub fn op(&self) -> CrudOp {
        self.op
    }
}

#[async_trait]
impl EndpointHandler for CrudHandler {
    async fn handle(
        &self,
        mut params: Params,
        _automation: &Automation,
        endpoint: &Endpoint,
    ) -> Result<HandlerOutput, HandlerError> {
        let id_field = endpoint.id_field.as_str();
        match self.op {
            CrudOp::List => {
                let default_limit = usize::try_from(DEFAULT_LIST_LIMIT).unwrap_or(MAX_LIST_LIMIT);
                let limit = page_bound(&mut params, "limit", default_limit).min(MAX_LIST_LIMIT);
                let offset = page_bound(&mut params, "offset", 0);
                let filter: RecordFilter = params.into_iter().collect();
                let items = self.records.list(&filter, limit, offset).await?;
                let total = self.records.count(&filter).await?;
                Ok(HandlerOutput::Collection {
                    items: items.into_iter().map(Value::Object).collect(),
                    total: u64::try_from(total).unwrap_or(u64::MAX),
                })
            }
            CrudOp::Get => {
                let id = take_id(&mut params, id_field)?;
                let record = self
                    .records
                    .get(&id)
                    .await?
                    .ok_or(HandlerError::RecordNotFound(id))?;
                Ok(HandlerOutput::Single(Value::Object(record)))
            }
            CrudOp::Create => {
                let created = self.records.create(params).await.map_err(|err| match err {
                    StorageError::DuplicateId(id) => HandlerError::DuplicateRecord(id),
                    other => other.into(),
                })?;
                Ok(HandlerOutput::Single(Value::Object(created)))
            }
            CrudOp::Update => {
                let id = take_id(&mut params, id_field)?;
                params.remove(ID_FIELD);
                let updated = self
                    .records
                    .update(&id, params)
                    .await?
                    .ok_or(HandlerError::RecordNotFound(id))?;
                Ok(HandlerOutput::Single(Value::Object(updated)))
            }
            CrudOp::Patch => {
                let id = take_id(&mut params, id_field)?;
                params.remove(ID_FIELD);
                let mut existing: Record = self
                    .records
                    .get(&id)
                    .await?
                    .ok_or_else(|| HandlerError::RecordNotFound(id.clone()))?;
                existing.extend(params);
                let patched = self
                    .records
                    .update(&id, existing)
                    .await?
                    .ok_or(HandlerError::RecordNotFound(id))?;
                Ok(HandlerOutput::Single(Value::Object(patched)))
            }
            CrudOp::Delete => {
                let id = take_id(&mut params, id_field)?;
                if !self.records.delete(&id).await? {
                    return Err(HandlerError::RecordNotFound(id));
                }
                Ok(HandlerOutput::single(json!({"deleted": true, "id": id})))
            }
        }
    }

    fn accepts(&self, method: HttpMethod) -> bool {
        self.op.method() == method
    }
}

/// Reflects the binding and the parameters it was invoked with.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoHandler;

#[async_trait]
impl EndpointHandler for EchoHandler {
    async fn handle(
        &self,
        params: Params,
        automation: &Automation,
        endpoint: &Endpoint,
    ) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput::single(json!({
            "automation": automation.name,
            "method": endpoint.method,
            "path": endpoint.path,
            "params": params,
        })))
    }
}

/// Per-automation liveness route.
#[derive(Debug, Clone, Copy)]
pub struct HealthHandler {
    storage: BackendStatus,
}

impl HealthHandler {
    #[must_use]
    pub fn new(storage: BackendStatus) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl EndpointHandler for HealthHandler {
    async fn handle(
        &self,
        _params: Params,
        automation: &Automation,
        _endpoint: &Endpoint,
    ) -> Result<HandlerOutput, HandlerError> {
        Ok(HandlerOutput::single(json!({
            "service": automation.name,
            "status": "healthy",
            "storage": self.storage,
        })))
    }

    fn accepts(&self, method: HttpMethod) -> bool {
        method == HttpMethod::Get
    }
}
