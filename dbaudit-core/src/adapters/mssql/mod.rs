//! SQL Server backend over tiberius.
//!
//! # Module Structure
//! - `connection`: TDS connection setup and teardown
//! - `catalog`: sys.* catalog view queries
//! - `type_mapping`: storage-class and referential-action decoding
//!
//! The backend holds a single TDS connection and reports a parallelism of
//! one, so the executor runs per-unit statements one at a time.

mod catalog;
mod connection;
mod type_mapping;

pub use type_mapping::{referential_action, storage_class};

use super::{AuditBackend, Statement};
use crate::Result;
use crate::config::ConnectionConfig;
use crate::error::AuditError;
use crate::models::{Column, Dialect, ForeignKey, Index, Table, Trigger};
use async_trait::async_trait;
use tiberius::{Client, Row};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::Compat;

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server error number for "permission denied on object".
const PERMISSION_DENIED: u32 = 229;

/// SQL Server audit backend.
pub struct SqlServerBackend {
    client: Mutex<Option<TdsClient>>,
    config: ConnectionConfig,
}

impl std::fmt::Debug for SqlServerBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlServerBackend")
            .field("config", &self.config)
            .finish()
    }
}

impl SqlServerBackend {
    /// Runs a query and collects the rows of its first result set.
    async fn query_rows(&self, sql: &str) -> std::result::Result<Vec<Row>, QueryError> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or(QueryError::Closed)?;
        let stream = client.query(sql, &[]).await.map_err(QueryError::Driver)?;
        stream.into_first_result().await.map_err(QueryError::Driver)
    }

    async fn catalog_rows(&self, sql: &str, resource: &str) -> Result<Vec<Row>> {
        self.query_rows(sql).await.map_err(|e| e.into_catalog_error(resource))
    }
}

/// Failure of a single round trip.
#[derive(Debug)]
enum QueryError {
    Closed,
    Driver(tiberius::error::Error),
}

impl QueryError {
    fn into_catalog_error(self, resource: &str) -> AuditError {
        match self {
            Self::Closed => AuditError::query_failed("connection already closed"),
            Self::Driver(tiberius::error::Error::Server(token)) if token.code() == PERMISSION_DENIED => {
                AuditError::insufficient_privileges(format!(
                    "Cannot read {} - insufficient privileges",
                    resource
                ))
            }
            Self::Driver(e) => {
                AuditError::introspection_failed(format!("Failed to query {}", resource), e)
            }
        }
    }

    fn into_statement_error(self, unit: &str) -> AuditError {
        match self {
            Self::Closed => AuditError::query_failed("connection already closed"),
            Self::Driver(tiberius::error::Error::Server(token)) if token.code() == PERMISSION_DENIED => {
                AuditError::insufficient_privileges(format!("cannot read {}", unit))
            }
            Self::Driver(tiberius::error::Error::Server(token)) => {
                AuditError::query_failed(token.message().to_string())
            }
            Self::Driver(e) => AuditError::query_failed(e.to_string()),
        }
    }
}

#[async_trait]
impl AuditBackend for SqlServerBackend {
    fn dialect(&self) -> Dialect {
        Dialect::SqlServer
    }

    fn max_parallelism(&self) -> usize {
        1
    }

    async fn test_connection(&self) -> Result<()> {
        let rows = self
            .query_rows("SELECT 1")
            .await
            .map_err(|e| e.into_statement_error("connection test"))?;

        match rows.first().and_then(|row| row.try_get::<i32, _>(0).ok().flatten()) {
            Some(1) => Ok(()),
            _ => Err(AuditError::configuration(
                "Basic connectivity test failed: unexpected result",
            )),
        }
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        let rows = self.catalog_rows(catalog::TABLES_QUERY, "sys.tables").await?;
        catalog::tables(&rows)
    }

    async fn columns(&self) -> Result<Vec<Column>> {
        let rows = self.catalog_rows(catalog::COLUMNS_QUERY, "sys.columns").await?;
        catalog::columns(&rows)
    }

    async fn indexes(&self) -> Result<Vec<Index>> {
        let rows = self.catalog_rows(catalog::INDEXES_QUERY, "sys.indexes").await?;
        catalog::indexes(&rows)
    }

    async fn foreign_keys(&self) -> Result<Vec<ForeignKey>> {
        let rows = self
            .catalog_rows(catalog::FOREIGN_KEYS_QUERY, "sys.foreign_keys")
            .await?;
        catalog::foreign_keys(&rows)
    }

    async fn triggers(&self) -> Result<Vec<Trigger>> {
        let rows = self.catalog_rows(catalog::TRIGGERS_QUERY, "sys.triggers").await?;
        catalog::triggers(&rows)
    }

    async fn count(&self, statement: &Statement) -> Result<i64> {
        let rows = self
            .query_rows(&statement.sql)
            .await
            .map_err(|e| e.into_statement_error(&statement.unit))?;

        let count = match rows.first() {
            Some(row) => row
                .try_get::<i64, _>(0)
                .map_err(|e| AuditError::query_failed(e.to_string()))?,
            None => None,
        };
        count.ok_or_else(|| {
            AuditError::query_failed(format!("statement on {} returned no count", statement.unit))
        })
    }

    async fn close(&self) {
        self.disconnect().await;
    }
}
