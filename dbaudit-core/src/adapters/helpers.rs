//! Helper utilities for the sqlx-backed adapter.
//!
//! Provides row extraction and error mapping shared by the catalog reads and
//! the per-unit count statements.

use crate::{Result, error::AuditError};
use sqlx::{Row, postgres::PgRow};

/// PostgreSQL SQLSTATE for `insufficient_privilege`.
pub const SQLSTATE_INSUFFICIENT_PRIVILEGE: &str = "42501";

/// PostgreSQL SQLSTATE for `query_canceled` (raised by `statement_timeout`).
pub const SQLSTATE_QUERY_CANCELED: &str = "57014";

/// Extension trait for extracting typed values from database rows
/// with consistent error handling.
///
/// # Example
/// ```rust,ignore
/// use dbaudit_core::adapters::helpers::RowExt;
///
/// let name: String = row.get_field("table_name", Some("pg_class"))?;
/// let body: Option<String> = row.get_field("trigger_body", None)?;
/// ```
pub trait RowExt {
    /// Extracts a typed field from the row with proper error context.
    ///
    /// # Arguments
    /// * `field_name` - Name of the column to extract
    /// * `catalog_context` - Optional catalog object for error messages
    fn get_field<'r, T>(&'r self, field_name: &str, catalog_context: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>;
}

impl RowExt for PgRow {
    fn get_field<'r, T>(&'r self, field_name: &str, catalog_context: Option<&str>) -> Result<T>
    where
        T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
    {
        self.try_get(field_name)
            .map_err(|e| AuditError::parse_field(field_name, catalog_context, e))
    }
}

fn sqlstate(error: &sqlx::Error) -> Option<String> {
    match error {
        sqlx::Error::Database(db_err) => db_err.code().map(|code| code.into_owned()),
        _ => None,
    }
}

/// Maps a failed catalog read. Privilege errors keep their own variant so
/// callers can tell "not allowed" from "broken".
pub fn catalog_error(resource: &str, error: sqlx::Error) -> AuditError {
    if sqlstate(&error).as_deref() == Some(SQLSTATE_INSUFFICIENT_PRIVILEGE) {
        return AuditError::insufficient_privileges(format!(
            "Cannot read {} - insufficient privileges",
            resource
        ));
    }
    AuditError::introspection_failed(format!("Failed to query {}", resource), error)
}

/// Maps a failed per-unit statement to a message safe to put in a report.
pub fn statement_error(unit: &str, error: sqlx::Error) -> AuditError {
    match sqlstate(&error).as_deref() {
        Some(SQLSTATE_INSUFFICIENT_PRIVILEGE) => {
            AuditError::insufficient_privileges(format!("cannot read {}", unit))
        }
        Some(SQLSTATE_QUERY_CANCELED) => {
            AuditError::query_failed(format!("statement on {} cancelled by server timeout", unit))
        }
        _ => match error {
            sqlx::Error::Database(db_err) => AuditError::query_failed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => {
                AuditError::query_failed("timed out waiting for a pooled connection")
            }
            other => AuditError::query_failed(other.to_string()),
        },
    }
}

/// Fetches all rows of a catalog query, mapping errors with
/// [`catalog_error`].
///
/// # Example
/// ```rust,ignore
/// let rows = fetch_catalog!(&self.pool, TABLES_QUERY, "pg_class")?;
/// ```
#[macro_export]
macro_rules! fetch_catalog {
    ($pool:expr, $query:expr, $resource:expr) => {{
        sqlx::query($query)
            .fetch_all($pool)
            .await
            .map_err(|e| $crate::adapters::helpers::catalog_error($resource, e))
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_database_errors_are_introspection_failures() {
        let error = catalog_error("pg_class", sqlx::Error::RowNotFound);
        assert!(matches!(error, AuditError::Introspection { .. }));
        assert!(error.to_string().contains("pg_class"));
    }

    #[test]
    fn test_pool_timeout_is_query_failure() {
        let error = statement_error("orders", sqlx::Error::PoolTimedOut);
        assert!(matches!(error, AuditError::QueryExecution { .. }));
        assert!(error.to_string().contains("pooled connection"));
    }
}
