use crate::models::{Credential, Record, RecordId};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::{PgPool, types::Json};
use std::sync::Arc;
use thiserror::Error;

/// StoreError
///
/// Failures an external collection can report. `Unavailable` always surfaces as a 500; it is
/// never folded into "not found".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The natural key (or username) is already taken.
    #[error("{0}")]
    Conflict(String),
    /// The store could not be reached or rejected the statement.
    #[error("{0}")]
    Unavailable(String),
}

/// RecordStore Trait
///
/// The contract over an external persistent collection, keyed by `(resource, id)`. Each method
/// is a single atomic primitive of the backing store; there is no locking, retrying or
/// multi-statement transaction above this layer.
///
/// **Send + Sync + async_trait** keep `Arc<dyn RecordStore>` shareable across Axum tasks.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Every record of `resource`, ordered by id.
    async fn scan(&self, resource: &str) -> Result<Vec<Record>, StoreError>;

    async fn get(&self, resource: &str, id: RecordId) -> Result<Option<Record>, StoreError>;

    /// Persists `fields` under id `max(id) + 1` (1 for an empty collection). When
    /// `natural_key` is given and another record already carries the same value for that
    /// field, nothing is written and `StoreError::Conflict` is returned.
    async fn insert(
        &self,
        resource: &str,
        natural_key: Option<&str>,
        fields: Map<String, Value>,
    ) -> Result<Record, StoreError>;

    /// Overwrites the body of `record.id`. `None` when no such record exists.
    async fn replace(&self, resource: &str, record: Record) -> Result<Option<Record>, StoreError>;

    /// `true` if a record was removed, `false` if there was nothing to remove.
    async fn delete(&self, resource: &str, id: RecordId) -> Result<bool, StoreError>;
}

/// CredentialStore Trait
///
/// Login material, keyed by unique username.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError>;

    /// Fails with `StoreError::Conflict` when the username is taken.
    async fn create_credential(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<Credential, StoreError>;
}

/// Shared handles placed in the application state.
pub type RecordStoreState = Arc<dyn RecordStore>;
pub type CredentialStoreState = Arc<dyn CredentialStore>;

pub(crate) const USERNAME_TAKEN: &str = "username is already taken";

/// PostgresRepository
///
/// Document-style store on PostgreSQL: every record is one JSONB body in the `records` table.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// migrate
    ///
    /// Creates the two tables if they are missing. Safe to run on every start.
    pub async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                resource TEXT NOT NULL,
                id BIGINT NOT NULL,
                body JSONB NOT NULL,
                PRIMARY KEY (resource, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id BIGSERIAL PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

type RecordRow = (i64, Json<Map<String, Value>>);

fn into_record((id, Json(fields)): RecordRow) -> Record {
    Record::new(id, fields)
}

/// Maps a driver error: unique violations become `Conflict`, everything else `Unavailable`.
fn store_error(context: &str, e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(format!("{} conflict", context));
        }
    }
    unavailable(context, e)
}

fn unavailable(context: &str, e: sqlx::Error) -> StoreError {
    tracing::error!("{} error: {:?}", context, e);
    StoreError::Unavailable(format!("{} failed", context))
}

#[async_trait]
impl RecordStore for PostgresRepository {
    async fn scan(&self, resource: &str) -> Result<Vec<Record>, StoreError> {
        sqlx::query_as::<_, RecordRow>(
            "SELECT id, body FROM records WHERE resource = $1 ORDER BY id",
        )
        .bind(resource)
        .fetch_all(&self.pool)
        .await
        .map(|rows| rows.into_iter().map(into_record).collect())
        .map_err(|e| store_error("scan", e))
    }

    async fn get(&self, resource: &str, id: RecordId) -> Result<Option<Record>, StoreError> {
        sqlx::query_as::<_, RecordRow>(
            "SELECT id, body FROM records WHERE resource = $1 AND id = $2",
        )
        .bind(resource)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(into_record))
        .map_err(|e| store_error("get", e))
    }

    /// insert
    ///
    /// Id assignment and the natural-key check happen in one statement. `HAVING` without
    /// `GROUP BY` keeps the aggregate row (so an empty collection still yields id 1) unless the
    /// key is taken, in which case no row is inserted and nothing is returned.
    ///
    /// The statement runs in a transaction holding a per-resource advisory lock, so concurrent
    /// inserts into one resource take turns computing `max + 1`. A primary-key violation can
    /// therefore only mean the store is misbehaving and is reported as `Unavailable`, never as a
    /// natural-key conflict.
    async fn insert(
        &self,
        resource: &str,
        natural_key: Option<&str>,
        fields: Map<String, Value>,
    ) -> Result<Record, StoreError> {
        let key_value = natural_key
            .and_then(|key| fields.get(key).cloned())
            .unwrap_or(Value::Null);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| unavailable("insert", e))?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(resource)
            .execute(&mut *tx)
            .await
            .map_err(|e| unavailable("insert", e))?;

        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO records (resource, id, body)
            SELECT $1, COALESCE(MAX(id), 0) + 1, $2
            FROM records
            WHERE resource = $1
            HAVING $3::text IS NULL OR NOT EXISTS (
                SELECT 1 FROM records
                WHERE resource = $1 AND body -> $3::text = $4::jsonb
            )
            RETURNING id
            "#,
        )
        .bind(resource)
        .bind(Json(&fields))
        .bind(natural_key)
        .bind(Json(&key_value))
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| unavailable("insert", e))?;

        tx.commit().await.map_err(|e| unavailable("insert", e))?;

        match inserted {
            Some(id) => Ok(Record::new(id, fields)),
            None => Err(StoreError::Conflict(format!(
                "{} already exists",
                natural_key.unwrap_or("record")
            ))),
        }
    }

    async fn replace(&self, resource: &str, record: Record) -> Result<Option<Record>, StoreError> {
        sqlx::query_as::<_, RecordRow>(
            "UPDATE records SET body = $3 WHERE resource = $1 AND id = $2 RETURNING id, body",
        )
        .bind(resource)
        .bind(record.id)
        .bind(Json(&record.fields))
        .fetch_optional(&self.pool)
        .await
        .map(|row| row.map(into_record))
        .map_err(|e| store_error("replace", e))
    }

    async fn delete(&self, resource: &str, id: RecordId) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM records WHERE resource = $1 AND id = $2")
            .bind(resource)
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| store_error("delete", e))
    }
}

#[async_trait]
impl CredentialStore for PostgresRepository {
    async fn find_credential(&self, username: &str) -> Result<Option<Credential>, StoreError> {
        sqlx::query_as::<_, Credential>(
            "SELECT id, username, password_hash, role FROM credentials WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("find_credential", e))
    }

    /// create_credential
    ///
    /// `ON CONFLICT DO NOTHING` makes a duplicate username come back as zero rows rather
    /// than a driver error.
    async fn create_credential(
        &self,
        username: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<Credential, StoreError> {
        sqlx::query_as::<_, Credential>(
            r#"
            INSERT INTO credentials (username, password_hash, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (username) DO NOTHING
            RETURNING id, username, password_hash, role
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| store_error("create_credential", e))?
        .ok_or_else(|| StoreError::Conflict(USERNAME_TAKEN.to_string()))
    }
}
