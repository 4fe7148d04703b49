//! PostgreSQL backend.
//!
//! # Module Structure
//! - `connection`: pool creation with read-only session settings
//! - `catalog`: pg_catalog queries for tables, columns, indexes, keys, triggers
//! - `type_mapping`: storage-class and referential-action decoding
//!
//! # Security Guarantees
//! - Sessions run with `default_transaction_read_only = on`
//! - Server-side `statement_timeout` bounds every statement
//! - Credentials are handed to the driver and never retained

mod catalog;
mod connection;
mod type_mapping;

pub use type_mapping::{referential_action, storage_class};

use super::{AuditBackend, Statement};
use crate::Result;
use crate::config::ConnectionConfig;
use crate::models::{Column, Dialect, ForeignKey, Index, Table, Trigger};
use async_trait::async_trait;
use sqlx::PgPool;

/// PostgreSQL audit backend over a small connection pool.
///
/// The pool lives exactly as long as one audit session.
pub struct PostgresBackend {
    pub(crate) pool: PgPool,
    pub(crate) config: ConnectionConfig,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("config", &self.config)
            .field("pool_size", &self.pool.size())
            .field("pool_idle", &self.pool.num_idle())
            .finish()
    }
}

#[async_trait]
impl AuditBackend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::PostgreSQL
    }

    fn max_parallelism(&self) -> usize {
        self.config.max_connections.clamp(1, 100) as usize
    }

    async fn test_connection(&self) -> Result<()> {
        let result: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(crate::error::AuditError::connection_failed)?;

        if result != 1 {
            return Err(crate::error::AuditError::configuration(
                "Basic connectivity test failed: unexpected result",
            ));
        }
        Ok(())
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        catalog::tables(&self.pool).await
    }

    async fn columns(&self) -> Result<Vec<Column>> {
        catalog::columns(&self.pool).await
    }

    async fn indexes(&self) -> Result<Vec<Index>> {
        catalog::indexes(&self.pool).await
    }

    async fn foreign_keys(&self) -> Result<Vec<ForeignKey>> {
        catalog::foreign_keys(&self.pool).await
    }

    async fn triggers(&self) -> Result<Vec<Trigger>> {
        catalog::triggers(&self.pool).await
    }

    async fn count(&self, statement: &Statement) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(&statement.sql)
            .persistent(false)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| super::helpers::statement_error(&statement.unit, e))
    }

    async fn close(&self) {
        self.close_pool().await;
    }
}
