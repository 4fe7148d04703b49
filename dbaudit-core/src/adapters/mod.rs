//! Backend trait and factory for audit targets.
//!
//! A backend answers two kinds of questions: catalog reads (tables, columns,
//! indexes, foreign keys, triggers) and scalar counts for synthesized
//! statements. Everything else in the engine is written against the trait,
//! so the same checks run unchanged on every engine.
//!
//! # Module Structure
//! - `helpers`: shared row-extraction and error-mapping utilities
//! - `postgres`: PostgreSQL backend (feature `postgresql`)
//! - `mssql`: SQL Server backend (feature `mssql`)

use crate::Result;
use crate::config::ConnectionConfig;
use crate::models::{Column, Dialect, ForeignKey, Index, Table, Trigger};
use crate::security::Credentials;
use async_trait::async_trait;

#[cfg(feature = "postgresql")]
pub mod helpers;

#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "postgresql")]
pub mod postgres;

/// One synthesized statement together with the unit it evaluates.
///
/// The statement must return a single row with a single integer column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    /// Unit label used in logs and failure entries (table or constraint)
    pub unit: String,
    /// Statement text; every identifier in it is catalog-sourced and quoted
    pub sql: String,
}

impl Statement {
    /// Pairs a unit label with its statement text.
    pub fn new(unit: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            sql: sql.into(),
        }
    }
}

/// Read-only access to one audit target.
///
/// # Security Guarantees
/// - All operations are read-only
/// - Credentials are never stored or logged
/// - Statement errors never include connection details
///
/// # Object Safety
/// This trait is object-safe, allowing dynamic dispatch through
/// `Box<dyn AuditBackend>` or `Arc<dyn AuditBackend>`.
#[async_trait]
pub trait AuditBackend: Send + Sync {
    /// Engine this backend talks to; drives identifier quoting.
    fn dialect(&self) -> Dialect;

    /// Number of statements this backend can execute at the same time.
    ///
    /// The executor never keeps more units in flight than this, so a unit's
    /// timeout only covers its own execution and not a wait for a
    /// connection.
    fn max_parallelism(&self) -> usize;

    /// Tests the connection with a trivial query.
    ///
    /// # Errors
    /// Returns a connection error if the target is unreachable
    async fn test_connection(&self) -> Result<()>;

    /// Lists base tables, user-defined and system-shipped alike.
    async fn tables(&self) -> Result<Vec<Table>>;

    /// Lists columns of all base tables.
    async fn columns(&self) -> Result<Vec<Column>>;

    /// Lists indexes (including primary-key indexes) of all base tables.
    async fn indexes(&self) -> Result<Vec<Index>>;

    /// Lists declared foreign keys with column pairs in key order.
    async fn foreign_keys(&self) -> Result<Vec<ForeignKey>>;

    /// Lists triggers on base tables.
    async fn triggers(&self) -> Result<Vec<Trigger>>;

    /// Executes a synthesized counting statement.
    ///
    /// # Errors
    /// Returns an error for this statement only; callers treat it as a
    /// per-unit failure.
    async fn count(&self, statement: &Statement) -> Result<i64>;

    /// Releases every connection held by this backend.
    ///
    /// Calling it more than once is harmless.
    async fn close(&self);
}

/// Connects to an audit target.
///
/// # Arguments
/// * `dialect` - Target engine
/// * `config` - Host, port and database (no secrets)
/// * `credentials` - User and password for this audit only
///
/// # Errors
/// Returns a connection error if the engine is unreachable or rejects the
/// credentials, or `UnsupportedFeature` if the engine was not compiled in.
pub async fn connect(
    dialect: Dialect,
    config: &ConnectionConfig,
    credentials: &Credentials,
) -> Result<Box<dyn AuditBackend>> {
    config.validate()?;

    match dialect {
        #[cfg(feature = "postgresql")]
        Dialect::PostgreSQL => {
            let backend = postgres::PostgresBackend::connect(config, credentials).await?;
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "postgresql"))]
        Dialect::PostgreSQL => {
            let _ = credentials;
            Err(crate::error::AuditError::unsupported_feature(
                "PostgreSQL backend",
                "Compile with --features postgresql to enable PostgreSQL support",
            ))
        }
        #[cfg(feature = "mssql")]
        Dialect::SqlServer => {
            let backend = mssql::SqlServerBackend::connect(config, credentials).await?;
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "mssql"))]
        Dialect::SqlServer => {
            let _ = credentials;
            Err(crate::error::AuditError::unsupported_feature(
                "SQL Server backend",
                "Compile with --features mssql to enable SQL Server support",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_new() {
        let statement = Statement::new("orders", "SELECT 1");
        assert_eq!(statement.unit, "orders");
        assert_eq!(statement.sql, "SELECT 1");
    }

    #[cfg(not(feature = "mssql"))]
    #[tokio::test]
    async fn test_connect_without_mssql_feature() {
        let config = ConnectionConfig::new("localhost".to_string());
        let credentials = Credentials::new("sa".to_string(), Some("pw".to_string()));
        let result = connect(Dialect::SqlServer, &config, &credentials).await;
        assert!(matches!(
            result,
            Err(crate::error::AuditError::UnsupportedFeature { .. })
        ));
    }
}
