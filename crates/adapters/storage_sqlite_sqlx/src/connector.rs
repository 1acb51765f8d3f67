//! Connector for the `relational` storage binding.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use council_app::ports::{BackendConnection, BackendConnector, RecordRepository, StorageError};
use council_domain::automation::backend;

use crate::pool::{Config, Database};
use crate::repository::SqliteRecordRepository;

/// Opens one pool per distinct binding config.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

#[async_trait]
impl BackendConnector for SqliteConnector {
    async fn connect(&self, config: &Value) -> Result<Arc<dyn BackendConnection>, StorageError> {
        let config = Config::from_binding(config)?;
        let url = config.url.clone();
        let database = config
            .build()
            .await
            .map_err(|err| StorageError::unavailable(backend::RELATIONAL, err))?;
        tracing::info!(%url, "sqlite backend connected");
        Ok(Arc::new(SqliteConnection::new(database)))
    }
}

/// A pool plus the repositories opened on it.
pub struct SqliteConnection {
    database: Database,
    repositories: Mutex<HashMap<String, Arc<SqliteRecordRepository>>>,
}

impl SqliteConnection {
    #[must_use]
    pub fn new(database: Database) -> Self {
        Self {
            database,
            repositories: Mutex::default(),
        }
    }
}

#[async_trait]
impl BackendConnection for SqliteConnection {
    async fn repository(
        &self,
        resource: &str,
    ) -> Result<Arc<dyn RecordRepository>, StorageError> {
        let mut repositories = self.repositories.lock().await;
        if let Some(repository) = repositories.get(resource) {
            return Ok(Arc::clone(repository) as Arc<dyn RecordRepository>);
        }
        let repository = Arc::new(
            SqliteRecordRepository::open(self.database.pool().clone(), resource).await?,
        );
        repositories.insert(resource.to_string(), Arc::clone(&repository));
        Ok(repository)
    }

    async fn close(&self) {
        self.repositories.lock().await.clear();
        self.database.close().await;
    }
}
