//! Record storage ports: the uniform capability every backend provides.
//!
//! A [`BackendConnector`] turns a binding's connection config into a
//! [`BackendConnection`] (a pool, a client), which in turn hands out one
//! [`RecordRepository`] per resource. These traits are object-safe so the
//! storage factory can hold connectors of different backends side by side.

use std::sync::Arc;

use async_trait::async_trait;
use council_domain::record::{Record, RecordFilter};
use serde_json::Value;

/// Whether a repository persists to its configured backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    #[default]
    Durable,
    /// Records live in a process-local fallback because the backend was unreachable.
    Degraded,
}

impl BackendStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::Degraded => "degraded",
        }
    }
}

/// Failures of the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No connector is registered for the binding's type tag.
    #[error("unsupported storage backend {0:?}")]
    UnsupportedBackend(String),

    /// The backend could not be reached or refused the connection.
    #[error("storage backend {backend:?} unavailable")]
    BackendUnavailable {
        backend: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A record with this id already exists.
    #[error("record {0:?} already exists")]
    DuplicateId(String),

    /// The connection config is missing a field or has the wrong shape.
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    /// A query failed after the connection was established.
    #[error("storage backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }

    pub fn unavailable(
        backend: &str,
        err: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::BackendUnavailable {
            backend: backend.to_string(),
            source: Box::new(err),
        }
    }
}

/// CRUD over the records of one resource.
#[async_trait]
pub trait RecordRepository: Send + Sync {
    /// Insert a record, assigning an `id` when absent. Returns the stored record.
    ///
    /// Fails with [`StorageError::DuplicateId`] when the id is already taken;
    /// an existing record is never replaced.
    async fn create(&self, record: Record) -> Result<Record, StorageError>;

    async fn get(&self, id: &str) -> Result<Option<Record>, StorageError>;

    /// Records matching every equality in `filter`, in insertion order.
    async fn list(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record>, StorageError>;

    async fn count(&self, filter: &RecordFilter) -> Result<usize, StorageError>;

    /// Replace the record stored under `id`. Returns `None` when it does not exist.
    async fn update(&self, id: &str, record: Record) -> Result<Option<Record>, StorageError>;

    /// Returns whether a record was removed.
    async fn delete(&self, id: &str) -> Result<bool, StorageError>;

    fn status(&self) -> BackendStatus {
        BackendStatus::Durable
    }
}

/// An established connection to one backend instance.
#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Repository over `resource` (table, collection, index, key prefix).
    async fn repository(&self, resource: &str)
    -> Result<Arc<dyn RecordRepository>, StorageError>;

    /// Release pooled resources.
    async fn close(&self) {}
}

/// Opens connections for one backend type tag.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, config: &Value) -> Result<Arc<dyn BackendConnection>, StorageError>;
}
