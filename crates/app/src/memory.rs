//! In-process record backend.
//!
//! Serves the `memory` type tag and doubles as the fallback store when a
//! configured backend is unreachable, in which case it reports
//! [`BackendStatus::Degraded`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use council_domain::id::new_record_id;
use council_domain::record::{ID_FIELD, Record, RecordFilter, matches_filter, record_id};
use serde_json::Value;

use crate::ports::{
    BackendConnection, BackendConnector, BackendStatus, RecordRepository, StorageError,
};

/// Records of one resource kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: RwLock<Vec<Record>>,
    status: BackendStatus,
}

impl MemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A repository standing in for an unreachable backend.
    #[must_use]
    pub fn degraded() -> Self {
        Self {
            records: RwLock::default(),
            status: BackendStatus::Degraded,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Record>> {
        self.records
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Record>> {
        self.records
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RecordRepository for MemoryRepository {
    async fn create(&self, mut record: Record) -> Result<Record, StorageError> {
        let id = record_id(&record).unwrap_or_else(new_record_id);
        record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        let mut records = self.write();
        if records
            .iter()
            .any(|r| record_id(r).as_deref() == Some(id.as_str()))
        {
            return Err(StorageError::DuplicateId(id));
        }
        records.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<Record>, StorageError> {
        Ok(self
            .read()
            .iter()
            .find(|r| record_id(r).as_deref() == Some(id))
            .cloned())
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record>, StorageError> {
        Ok(self
            .read()
            .iter()
            .filter(|r| matches_filter(r, filter))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count(&self, filter: &RecordFilter) -> Result<usize, StorageError> {
        Ok(self
            .read()
            .iter()
            .filter(|r| matches_filter(r, filter))
            .count())
    }

    async fn update(&self, id: &str, mut record: Record) -> Result<Option<Record>, StorageError> {
        record.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        let mut records = self.write();
        let Some(existing) = records
            .iter_mut()
            .find(|r| record_id(r).as_deref() == Some(id))
        else {
            return Ok(None);
        };
        existing.clone_from(&record);
        Ok(Some(record))
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut records = self.write();
        let before = records.len();
        records.retain(|r| record_id(r).as_deref() != Some(id));
        Ok(records.len() != before)
    }

    fn status(&self) -> BackendStatus {
        self.status
    }
}

/// One in-process "database": a set of named resources.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    resources: Mutex<HashMap<String, Arc<MemoryRepository>>>,
}

#[async_trait]
impl BackendConnection for MemoryConnection {
    async fn repository(
        &self,
        resource: &str,
    ) -> Result<Arc<dyn RecordRepository>, StorageError> {
        let mut resources = self
            .resources
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let repository = resources
            .entry(resource.to_string())
            .or_insert_with(|| Arc::new(MemoryRepository::new()));
        Ok(Arc::clone(repository) as Arc<dyn RecordRepository>)
    }

    async fn close(&self) {
        self.resources
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

/// Connector for the `memory` type tag. Config is ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryConnector;

#[async_trait]
impl BackendConnector for MemoryConnector {
    async fn connect(&self, _config: &Value) -> Result<Arc<dyn BackendConnection>, StorageError> {
        Ok(Arc::new(MemoryConnection::default()))
    }
}
