//! `SQLite` implementation of [`RecordRepository`].
//!
//! Each resource gets its own table holding the record id and the record
//! body as JSON text. A monotonically increasing `seq` column keeps the
//! insertion order stable across updates.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Arguments, FromRow, Row, SqlitePool};

use council_app::ports::{RecordRepository, StorageError};
use council_domain::id::new_record_id;
use council_domain::record::{ID_FIELD, Record, RecordFilter, record_id, value_text};

use crate::error::DatabaseError;

/// Wrapper for converting a stored body into a [`Record`].
struct Wrapper(Record);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let body: String = row.try_get("body")?;
        let record: Record =
            serde_json::from_str(&body).map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        Ok(Self(record))
    }
}

/// Compares a field the way [`value_text`] renders it, so `"5"` matches `5`
/// and `"true"` matches `true`.
const FIELD_EQUALS: &str = "(CASE json_type(body, ?) \
     WHEN 'true' THEN 'true' \
     WHEN 'false' THEN 'false' \
     WHEN 'null' THEN '' \
     ELSE CAST(json_extract(body, ?) AS TEXT) END) = ?";

/// Table name of a resource. Resources are plain identifiers.
pub(crate) fn table_name(resource: &str) -> Result<String, StorageError> {
    let valid = !resource.is_empty()
        && resource
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(format!("rec_{resource}"))
    } else {
        Err(StorageError::InvalidConfig(format!(
            "resource {resource:?} is not an identifier"
        )))
    }
}

fn json_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('"', "\\\""))
}

/// `SQLite`-backed repository over one resource table.
pub struct SqliteRecordRepository {
    pool: SqlitePool,
    table: String,
}

impl SqliteRecordRepository {
    /// Open the repository for `resource`, creating its table when missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidConfig`] for a non-identifier resource
    /// and [`StorageError::Backend`] when the table cannot be created.
    pub async fn open(pool: SqlitePool, resource: &str) -> Result<Self, StorageError> {
        let table = table_name(resource)?;
        let create = format!(
            "CREATE TABLE IF NOT EXISTS \"{table}\" (\
                seq INTEGER PRIMARY KEY AUTOINCREMENT, \
                id TEXT NOT NULL UNIQUE, \
                body TEXT NOT NULL, \
                created_at TEXT NOT NULL, \
                updated_at TEXT NOT NULL)"
        );
        sqlx::query(&create)
            .execute(&pool)
            .await
            .map_err(DatabaseError::from)?;
        sqlx::query(
            "INSERT OR IGNORE INTO council_resources (name, table_name, created_at) VALUES (?, ?, ?)",
        )
        .bind(resource)
        .bind(&table)
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .map_err(DatabaseError::from)?;
        tracing::debug!(resource, table, "record table ready");
        Ok(Self { pool, table })
    }

    fn where_clause(filter: &RecordFilter) -> Result<(String, SqliteArguments<'static>), StorageError> {
        let mut arguments = SqliteArguments::default();
        let mut clauses = Vec::with_capacity(filter.len());
        for (field, expected) in filter {
            let path = json_path(field);
            arguments.add(path.clone()).map_err(StorageError::Backend)?;
            arguments.add(path).map_err(StorageError::Backend)?;
            arguments
                .add(value_text(expected))
                .map_err(StorageError::Backend)?;
            clauses.push(FIELD_EQUALS);
        }
        let clause = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        Ok((clause, arguments))
    }
}

fn encode(record: &Record) -> Result<String, StorageError> {
    serde_json::to_string(record).map_err(|err| DatabaseError::from(err).into())
}

#[async_trait]
impl RecordRepository for SqliteRecordRepository {
    async fn create(&self, mut record: Record) -> Result<Record, StorageError> {
        let id = record_id(&record).unwrap_or_else(new_record_id);
        record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        let now = Utc::now().to_rfc3339();
        let statement = format!(
            "INSERT INTO \"{}\" (id, body, created_at, updated_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO NOTHING",
            self.table
        );
        let result = sqlx::query(&statement)
            .bind(&id)
            .bind(encode(&record)?)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::DuplicateId(id));
        }
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<Record>, StorageError> {
        let statement = format!("SELECT body FROM \"{}\" WHERE id = ?", self.table);
        let row: Option<Wrapper> = sqlx::query_as(&statement)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(row.map(|w| w.0))
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Record>, StorageError> {
        let (clause, mut arguments) = Self::where_clause(filter)?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let offset = i64::try_from(offset).unwrap_or(i64::MAX);
        arguments.add(limit).map_err(StorageError::Backend)?;
        arguments.add(offset).map_err(StorageError::Backend)?;
        let statement = format!(
            "SELECT body FROM \"{}\"{clause} ORDER BY seq LIMIT ? OFFSET ?",
            self.table
        );
        let rows: Vec<Wrapper> = sqlx::query_as_with(&statement, arguments)
            .fetch_all(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn count(&self, filter: &RecordFilter) -> Result<usize, StorageError> {
        let (clause, arguments) = Self::where_clause(filter)?;
        let statement = format!("SELECT COUNT(*) FROM \"{}\"{clause}", self.table);
        let (count,): (i64,) = sqlx::query_as_with(&statement, arguments)
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    async fn update(&self, id: &str, mut record: Record) -> Result<Option<Record>, StorageError> {
        record.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        let statement = format!(
            "UPDATE \"{}\" SET body = ?, updated_at = ? WHERE id = ?",
            self.table
        );
        let result = sqlx::query(&statement)
            .bind(encode(&record)?)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok((result.rows_affected() > 0).then_some(record))
    }

    async fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let statement = format!("DELETE FROM \"{}\" WHERE id = ?", self.table);
        let result = sqlx::query(&statement)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DatabaseError::from)?;
        Ok(result.rows_affected() > 0)
    }
}
