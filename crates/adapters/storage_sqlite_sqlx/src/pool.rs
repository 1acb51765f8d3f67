//! `SQLite` connection pool setup and migration runner.

use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use council_app::ports::StorageError;

use crate::error::DatabaseError;

fn default_max_connections() -> u32 {
    5
}

/// Connection settings read from a binding's `config` object.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// `SQLite` connection URL (e.g. `sqlite:records.db` or `sqlite::memory:`).
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Config {
    /// Read the settings from a storage binding config.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] when `url` is missing or a
    /// field has the wrong type.
    pub fn from_binding(config: &Value) -> Result<Self, StorageError> {
        let config = Self::deserialize(config)
            .map_err(|err| StorageError::InvalidConfig(err.to_string()))?;
        if config.max_connections == 0 {
            return Err(StorageError::InvalidConfig(
                "max_connections must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Build a [`Database`] from this configuration.
    ///
    /// Creates the connection pool, creates the database file if missing,
    /// and runs all pending migrations.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError`] if the connection or migrations fail.
    pub async fn build(self) -> Result<Database, DatabaseError> {
        Database::initialize(&self).await
    }
}

/// Holds the `SQLite` connection pool and provides access to it.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    async fn initialize(config: &Config) -> Result<Self, DatabaseError> {
        let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

        // An in-memory database lives only as long as one of its connections.
        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Borrow the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
