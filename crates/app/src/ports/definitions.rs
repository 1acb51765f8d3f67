//! Definition store port: durable home of automation documents.

use std::future::Future;

use council_domain::error::CouncilError;
use serde_json::Value;

/// One raw document as found in the store, before schema validation.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDefinition {
    /// Store-specific key (file name, row key) used in diagnostics.
    pub key: String,
    /// Parsed JSON, or the parse failure message for unreadable documents.
    pub document: Result<Value, String>,
}

/// Persistence for automation definition documents.
///
/// Implementations must make [`write`](Self::write) atomic: a reader never
/// observes a partially written document.
pub trait DefinitionStore {
    /// Read every stored document.
    fn load_all(&self) -> impl Future<Output = Result<Vec<StoredDefinition>, CouncilError>> + Send;

    /// Create or replace the document for `name`.
    fn write(
        &self,
        name: &str,
        document: &Value,
    ) -> impl Future<Output = Result<(), CouncilError>> + Send;

    /// Remove the document for `name`, returning whether it existed.
    fn remove(&self, name: &str) -> impl Future<Output = Result<bool, CouncilError>> + Send;
}
