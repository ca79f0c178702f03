use std::time::Duration;

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::{DatabaseConfig, QueryConfig};
use crate::models::{ConnectionConfig, QueryResult};
use crate::{executor, schema};

pub async fn create_pool(
    connection: &ConnectionConfig,
    config: &DatabaseConfig,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
        .connect_with(connection.connect_options())
        .await
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Whether an error means the database itself is unreachable, as opposed to a
/// problem with one statement.
pub fn is_connection_error(error: &sqlx::Error) -> bool {
    matches!(
        error,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

/// The two things a chat request needs from the connected database.
///
/// `Err` from either method is always a connection-level failure; statement
/// errors from `execute` come back as `QueryResult::Error`.
#[async_trait]
pub trait Database: Send + Sync {
    /// Plain-text schema description for prompt inclusion. Recomputed on every call.
    async fn describe_schema(&self) -> Result<String, sqlx::Error>;

    async fn execute(&self, sql: &str) -> Result<QueryResult, sqlx::Error>;
}

/// Postgres-backed [`Database`].
#[derive(Clone)]
pub struct PgDatabase {
    pool: PgPool,
    query: QueryConfig,
}

impl PgDatabase {
    pub fn new(pool: PgPool, query: QueryConfig) -> Self {
        Self { pool, query }
    }

    pub async fn connect(
        connection: &ConnectionConfig,
        database: &DatabaseConfig,
        query: QueryConfig,
    ) -> Result<Self, sqlx::Error> {
        let pool = create_pool(connection, database).await?;
        tracing::info!(url = %connection.display_url(), "Connected to database");
        Ok(Self::new(pool, query))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn describe_schema(&self) -> Result<String, sqlx::Error> {
        schema::describe(&self.pool, self.query.sample_rows).await
    }

    async fn execute(&self, sql: &str) -> Result<QueryResult, sqlx::Error> {
        executor::execute(&self.pool, sql, self.query.max_rows).await
    }
}
