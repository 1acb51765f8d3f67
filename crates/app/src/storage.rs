//! Storage factory: resolves a [`StorageBinding`] to a repository.
//!
//! Connectors are registered per backend type tag. Connections are cached by
//! `(type tag, canonical config)`, so every automation bound to the same
//! database shares one pool.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use council_domain::automation::StorageBinding;
use tokio::sync::Mutex;

use crate::ports::{BackendConnection, BackendConnector, RecordRepository, StorageError};

type ConnectionKey = (String, String);

/// Registry of backend connectors plus the connection cache.
#[derive(Default)]
pub struct StorageFactory {
    connectors: HashMap<String, Arc<dyn BackendConnector>>,
    connections: Mutex<HashMap<ConnectionKey, Arc<dyn BackendConnection>>>,
}

impl StorageFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the connector serving `backend`, replacing any previous one.
    #[must_use]
    pub fn with_connector(
        mut self,
        backend: impl Into<String>,
        connector: impl BackendConnector + 'static,
    ) -> Self {
        self.connectors.insert(backend.into(), Arc::new(connector));
        self
    }

    /// Whether a connector is registered for `backend`.
    #[must_use]
    pub fn supports(&self, backend: &str) -> bool {
        self.connectors.contains_key(backend)
    }

    /// Resolve the repository a binding points at.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::UnsupportedBackend`] when no connector serves
    /// the binding's tag, [`StorageError::BackendUnavailable`] when the
    /// connection cannot be established, or any error the connection reports
    /// while opening the resource.
    #[tracing::instrument(skip(self, binding), fields(backend = %binding.backend, resource = %binding.resource))]
    pub async fn resolve(
        &self,
        binding: &StorageBinding,
    ) -> Result<Arc<dyn RecordRepository>, StorageError> {
        let connector = self
            .connectors
            .get(&binding.backend)
            .ok_or_else(|| StorageError::UnsupportedBackend(binding.backend.clone()))?;
        let key = (binding.backend.clone(), binding.config_key());

        let cached = self.connections.lock().await.get(&key).cloned();
        let connection = match cached {
            Some(connection) => connection,
            None => self.open(connector.as_ref(), binding, key).await?,
        };
        connection.repository(&binding.resource).await
    }

    /// Connect without holding the cache lock, then publish. When another
    /// task published first, its connection wins and ours is closed.
    async fn open(
        &self,
        connector: &dyn BackendConnector,
        binding: &StorageBinding,
        key: ConnectionKey,
    ) -> Result<Arc<dyn BackendConnection>, StorageError> {
        let opened = connector.connect(&binding.config).await?;
        let winner = match self.connections.lock().await.entry(key) {
            Entry::Occupied(entry) => Some(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                entry.insert(Arc::clone(&opened));
                None
            }
        };
        if let Some(winner) = winner {
            opened.close().await;
            return Ok(winner);
        }
        tracing::debug!("opened storage connection");
        Ok(opened)
    }

    /// Number of cached connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Close and forget every cached connection.
    pub async fn close(&self) {
        let drained: Vec<_> = self.connections.lock().await.drain().collect();
        for ((backend, _), connection) in drained {
            connection.close().await;
            tracing::debug!(%backend, "closed storage connection");
        }
    }
}
