//! Storage-specific error type wrapping sqlx errors.

use council_app::ports::StorageError;

/// Errors originating from the `SQLite` backend.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// A query or connection failed.
    #[error("database error")]
    Database(#[from] sqlx::Error),

    /// A stored body is not a JSON object.
    #[error("JSON deserialization error")]
    Json(#[from] serde_json::Error),

    /// Failed to run migrations.
    #[error("migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<DatabaseError> for StorageError {
    fn from(err: DatabaseError) -> Self {
        Self::backend(err)
    }
}
