//! Handler resolver: turns an endpoint declaration into an invocable handler.
//!
//! Custom handlers are looked up by name in a catalog populated at startup;
//! endpoints without a `handler_path` get the built-in CRUD handler matching
//! their method. Every [`BoundHandler`] owns its own automation and endpoint
//! snapshot, so two routes never share or overwrite each other's binding.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use council_domain::automation::{Automation, Endpoint};

use crate::builtin::{CrudHandler, CrudOp};
use crate::handler::{EndpointHandler, HandlerError, HandlerOutput, Params};
use crate::ports::RecordRepository;

/// Why an endpoint could not be bound.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// The `handler_path` names no handler in the catalog.
    #[error("handler {0:?} not found")]
    HandlerNotFound(String),

    /// The handler exists but cannot serve this endpoint.
    #[error("handler {handler:?} cannot serve this endpoint: {reason}")]
    HandlerSignature { handler: String, reason: String },
}

/// A handler closed over the automation and endpoint it was resolved for.
#[derive(Clone)]
pub struct BoundHandler {
    name: String,
    automation: Arc<Automation>,
    endpoint: Arc<Endpoint>,
    handler: Arc<dyn EndpointHandler>,
}

impl BoundHandler {
    pub(crate) fn new(
        name: impl Into<String>,
        automation: Arc<Automation>,
        endpoint: Endpoint,
        handler: Arc<dyn EndpointHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            automation,
            endpoint: Arc::new(endpoint),
            handler,
        }
    }

    /// Run the handler with its own snapshot.
    ///
    /// # Errors
    ///
    /// Propagates the handler's [`HandlerError`].
    pub async fn invoke(&self, params: Params) -> Result<HandlerOutput, HandlerError> {
        self.handler
            .handle(params, &self.automation, &self.endpoint)
            .await
    }

    /// Catalog name, or `builtin.<op>` for default handlers.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn automation(&self) -> &Arc<Automation> {
        &self.automation
    }

    #[must_use]
    pub fn endpoint(&self) -> &Arc<Endpoint> {
        &self.endpoint
    }
}

impl fmt::Debug for BoundHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundHandler")
            .field("name", &self.name)
            .field("automation", &self.automation.name)
            .field("endpoint", &self.endpoint.key())
            .finish_non_exhaustive()
    }
}

/// Catalog of named handlers.
#[derive(Default, Clone)]
pub struct HandlerResolver {
    catalog: HashMap<String, Arc<dyn EndpointHandler>>,
}

impl HandlerResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `handler` available to endpoints whose `handler_path` is `name`.
    #[must_use]
    pub fn with_handler(
        mut self,
        name: impl Into<String>,
        handler: impl EndpointHandler + 'static,
    ) -> Self {
        self.register(name, Arc::new(handler));
        self
    }

    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn EndpointHandler>) {
        self.catalog.insert(name.into(), handler);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.catalog.contains_key(name)
    }

    /// Bind `endpoint` of `automation`.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::HandlerNotFound`] for an unknown
    /// `handler_path` and [`ResolutionError::HandlerSignature`] when the
    /// handler rejects the endpoint's method or no default can be derived.
    pub fn resolve(
        &self,
        automation: &Arc<Automation>,
        endpoint: Endpoint,
        records: &Arc<dyn RecordRepository>,
    ) -> Result<BoundHandler, ResolutionError> {
        let (name, handler): (String, Arc<dyn EndpointHandler>) = match &endpoint.handler_path {
            Some(path) => {
                let handler = self
                    .catalog
                    .get(path)
                    .ok_or_else(|| ResolutionError::HandlerNotFound(path.clone()))?;
                (path.clone(), Arc::clone(handler))
            }
            None => {
                let op = CrudOp::for_endpoint(&endpoint).map_err(|reason| {
                    ResolutionError::HandlerSignature {
                        handler: "builtin".to_string(),
                        reason,
                    }
                })?;
                let name = format!("builtin.{op:?}").to_lowercase();
                (name, Arc::new(CrudHandler::new(op, Arc::clone(records))))
            }
        };
        if !handler.accepts(endpoint.method) {
            return Err(ResolutionError::HandlerSignature {
                handler: name,
                reason: format!("{} is not accepted", endpoint.method),
            });
        }
        Ok(BoundHandler::new(name, Arc::clone(automation), endpoint, handler))
    }
}
