//! # council-adapter-storage-sqlite-sqlx
//!
//! `SQLite` record backend using [sqlx](https://docs.rs/sqlx), registered for
//! the `relational` storage binding.
//!
//! ## Responsibilities
//! - Implement the record port traits defined in `council-app::ports::records`
//! - Manage the `SQLite` connection pool lifecycle per binding config
//! - Run the embedded catalog migration and create one table per resource
//! - Store records as JSON documents and filter them with `json_extract`
//!
//! ## Dependency rule
//! Depends on `council-app` (for port traits) and `council-domain` (for record
//! helpers). The `app` and `domain` crates must never reference this adapter.

mod connector;
mod error;
mod pool;
mod repository;

pub use connector::{SqliteConnection, SqliteConnector};
pub use error::DatabaseError;
pub use pool::{Config, Database};
pub use repository::SqliteRecordRepository;
