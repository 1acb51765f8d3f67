//! Automation manager: keeps the registry and the live route table in step.
//!
//! Every mutation is written to the registry first and pushed to the
//! dispatcher second. When the dispatcher refuses, the registry change stays
//! and the automation is flagged `degraded` until a later registration succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use council_domain::automation::{
    Automation, AutomationStatus, Endpoint, HttpMethod, StorageBinding, default_crud_endpoints,
    normalize_path,
};
use council_domain::error::{CouncilError, EndpointNotFoundError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatcher::{Dispatcher, RemovalOutcome};
use crate::ports::{ArtifactWriter, DefinitionStore};
use crate::registry::{AutomationRegistry, NameLocks};

/// Default page size of [`AutomationManager::list`].
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Largest page size of [`AutomationManager::list`].
pub const MAX_PAGE_SIZE: usize = 100;

/// Everything needed to create an automation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateAutomation {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub base_path: Option<String>,
    #[serde(default)]
    pub storage_binding: Option<StorageBinding>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl CreateAutomation {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Listing criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFilter {
    pub status: Option<AutomationStatus>,
    pub skip: usize,
    pub limit: usize,
}

impl Default for ListFilter {
    fn default() -> Self {
        Self {
            status: None,
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of automations.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
    pub automations: Vec<Automation>,
}

/// Application service orchestrating registry, dispatcher and artifacts.
pub struct AutomationManager<S, A> {
    registry: AutomationRegistry<S>,
    dispatcher: Arc<Dispatcher>,
    artifacts: A,
    locks: NameLocks,
}

impl<S, A> AutomationManager<S, A>
where
    S: DefinitionStore + Send + Sync,
    A: ArtifactWriter + Send + Sync,
{
    /// Create a new manager. Call [`initialize`](Self::initialize) before serving.
    pub fn new(registry: AutomationRegistry<S>, dispatcher: Arc<Dispatcher>, artifacts: A) -> Self {
        Self {
            registry,
            dispatcher,
            artifacts,
            locks: NameLocks::default(),
        }
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    #[must_use]
    pub fn registry(&self) -> &AutomationRegistry<S> {
        &self.registry
    }

    /// Load every definition and register the active ones.
    ///
    /// Returns the number of automations with live routes.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the definition store cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn initialize(&self) -> Result<usize, CouncilError> {
        let automations = self.registry.load().await?;
        let results = self.dispatcher.register_all(&automations).await;
        let mut live = 0;
        for (name, result) in results {
            let _guard = self.locks.lock(&name).await;
            match result {
                Ok(_) => {
                    live += 1;
                    self.mark(&name, false).await?;
                }
                Err(error) => {
                    tracing::error!(automation = %name, %error, "automation could not be registered");
                    self.mark(&name, true).await?;
                }
            }
        }
        tracing::info!(total = automations.len(), live, "automations initialized");
        Ok(live)
    }

    /// Create a draft automation and emit its artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::DuplicateName`], [`CouncilError::Validation`]
    /// or a storage error. Artifact failures are logged only.
    #[tracing::instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create(&self, request: CreateAutomation) -> Result<Automation, CouncilError> {
        let mut builder = Automation::builder()
            .name(request.name)
            .description(request.description);
        if let Some(version) = request.version {
            builder = builder.version(version);
        }
        if let Some(base_path) = request.base_path {
            builder = builder.base_path(base_path);
        }
        if let Some(binding) = request.storage_binding {
            builder = builder.storage_binding(binding);
        }
        for endpoint in request.endpoints {
            builder = builder.endpoint(endpoint);
        }
        for (key, value) in request.metadata {
            builder = builder.metadata(key, value);
        }
        let automation = self.registry.insert(builder.build()?).await?;
        if let Err(error) = self.artifacts.generate(&automation).await {
            tracing::warn!(%error, "artifact generation failed");
        }
        Ok(automation)
    }

    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`] when no automation has that name.
    pub fn get(&self, name: &str) -> Result<Automation, CouncilError> {
        self.registry.get(name)
    }

    /// Page through automations sorted by name.
    #[must_use]
    pub fn list(&self, filter: ListFilter) -> Page {
        let limit = filter.limit.clamp(1, MAX_PAGE_SIZE);
        let matching: Vec<_> = self
            .registry
            .list()
            .into_iter()
            .filter(|a| filter.status.is_none_or(|status| a.status == status))
            .collect();
        Page {
            total: matching.len(),
            skip: filter.skip,
            limit,
            automations: matching.into_iter().skip(filter.skip).take(limit).collect(),
        }
    }

    /// Make an automation live, adding the default CRUD endpoints when it has none.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`] or a storage error. A dispatcher
    /// failure is not an error: the automation comes back flagged `degraded`.
    #[tracing::instrument(skip(self))]
    pub async fn activate(&self, name: &str) -> Result<Automation, CouncilError> {
        let _guard = self.locks.lock(name).await;
        let (automation, ()) = self
            .registry
            .modify(name, |a| {
                if a.endpoints.is_empty() {
                    a.endpoints = default_crud_endpoints();
                }
                a.status = AutomationStatus::Active;
                Ok(())
            })
            .await?;
        self.publish(automation, true).await
    }

    /// Take an automation offline, keeping its definition.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`] or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn deactivate(&self, name: &str) -> Result<Automation, CouncilError> {
        let _guard = self.locks.lock(name).await;
        let (automation, ()) = self
            .registry
            .modify(name, |a| {
                a.status = AutomationStatus::Inactive;
                a.degraded = false;
                Ok(())
            })
            .await?;
        self.dispatcher.remove(name).await;
        Ok(automation)
    }

    /// Register an automation's routes again from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`] or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn reregister(&self, name: &str) -> Result<Automation, CouncilError> {
        let _guard = self.locks.lock(name).await;
        let automation = self.registry.get(name)?;
        if !automation.is_active() {
            return Ok(automation);
        }
        self.publish(automation, true).await
    }

    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`], [`CouncilError::Validation`] when
    /// `(path, method)` is taken, or a storage error.
    #[tracing::instrument(skip(self, endpoint), fields(method = %endpoint.method, path = %endpoint.path))]
    pub async fn add_endpoint(&self, name: &str, endpoint: Endpoint) -> Result<Automation, CouncilError> {
        let _guard = self.locks.lock(name).await;
        let (automation, ()) = self
            .registry
            .modify(name, |a| Ok(a.add_endpoint(endpoint)?))
            .await?;
        self.publish_if_active(automation).await
    }

    /// Replace the endpoint addressed by `(path, method)`.
    ///
    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`], [`CouncilError::EndpointNotFound`],
    /// [`CouncilError::Validation`] or a storage error.
    #[tracing::instrument(skip(self, endpoint))]
    pub async fn update_endpoint(
        &self,
        name: &str,
        path: &str,
        method: HttpMethod,
        endpoint: Endpoint,
    ) -> Result<Automation, CouncilError> {
        let _guard = self.locks.lock(name).await;
        let (automation, ()) = self
            .registry
            .modify(name, |a| {
                if a.update_endpoint(path, method, endpoint)? {
                    Ok(())
                } else {
                    Err(endpoint_not_found(name, path, method))
                }
            })
            .await?;
        self.publish_if_active(automation).await
    }

    /// # Errors
    ///
    /// Returns [`CouncilError::NotFound`], [`CouncilError::EndpointNotFound`]
    /// or a storage error.
    #[tracing::instrument(skip(self))]
    pub async fn remove_endpoint(
        &self,
        name: &str,
        path: &str,
        method: HttpMethod,
    ) -> Result<Automation, CouncilError> {
        let _guard = self.locks.lock(name).await;
        let (automation, ()) = self
            .registry
            .modify(name, |a| {
                if a.remove_endpoint(path, method) {
                    Ok(())
                } else {
                    Err(endpoint_not_found(name, path, method))
                }
            })
            .await?;
        self.publish_if_active(automation).await
    }

    /// Remove routes, definition and artifacts. Returns whether the automation existed.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the definition cannot be removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, name: &str) -> Result<bool, CouncilError> {
        let guard = self.locks.lock(name).await;
        let routes = self.dispatcher.remove(name).await;
        let existed = self.registry.delete(name).await?;
        if existed && let Err(error) = self.artifacts.purge(name).await {
            tracing::warn!(%error, "artifact purge failed");
        }
        self.locks.release(name, guard);
        Ok(existed || routes != RemovalOutcome::NotRegistered)
    }

    async fn publish_if_active(&self, automation: Automation) -> Result<Automation, CouncilError> {
        if automation.is_active() {
            self.publish(automation, false).await
        } else {
            Ok(automation)
        }
    }

    async fn publish(&self, automation: Automation, full: bool) -> Result<Automation, CouncilError> {
        let result = if full {
            self.dispatcher.register(&automation).await
        } else {
            self.dispatcher.update(&automation).await
        };
        match result {
            Ok(_) if !automation.degraded => Ok(automation),
            Ok(_) => self.mark(&automation.name, false).await,
            Err(error) => {
                tracing::error!(automation = %automation.name, %error, "route update failed, automation flagged degraded");
                self.mark(&automation.name, true).await
            }
        }
    }

    async fn mark(&self, name: &str, degraded: bool) -> Result<Automation, CouncilError> {
        let current = self.registry.get(name)?;
        if current.degraded == degraded {
            return Ok(current);
        }
        let (automation, ()) = self
            .registry
            .modify(name, |a| {
                a.degraded = degraded;
                Ok(())
            })
            .await?;
        Ok(automation)
    }
}

fn endpoint_not_found(name: &str, path: &str, method: HttpMethod) -> CouncilError {
    EndpointNotFoundError {
        automation: name.to_string(),
        method,
        path: normalize_path(path),
    }
    .into()
}
