//! Catalog introspection.
//!
//! Wraps a backend's catalog reads with the introspection timeout and the
//! user-object filter. Every check goes through the same filter: a table is
//! in scope only when it is user-defined, and a foreign key or trigger is in
//! scope only when every table it touches is.
//!
//! Any error here is fatal to the audit; an empty result is not an error.

use crate::Result;
use crate::adapters::AuditBackend;
use crate::error::AuditError;
use crate::models::{Column, Dialect, ForeignKey, Index, TableRef, Trigger};
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;

/// The user-defined tables of one audit, in deterministic order.
pub type TableSet = BTreeSet<TableRef>;

/// Timed, filtered access to catalog metadata.
pub struct CatalogIntrospector<'a> {
    backend: &'a dyn AuditBackend,
    timeout: Duration,
}

impl<'a> CatalogIntrospector<'a> {
    /// Wraps a backend; every catalog read is bounded by `timeout`.
    pub fn new(backend: &'a dyn AuditBackend, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Engine of the wrapped backend.
    pub fn dialect(&self) -> Dialect {
        self.backend.dialect()
    }

    async fn timed<T>(&self, what: &str, read: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(AuditError::timeout(
                format!("Catalog read of {}", what),
                self.timeout,
            )),
        }
    }

    /// User-defined base tables; system-shipped tables never appear.
    pub async fn user_tables(&self) -> Result<TableSet> {
        let tables = self.timed("tables", self.backend.tables()).await?;
        let user_tables: TableSet = tables
            .into_iter()
            .filter(|t| t.is_user_defined())
            .map(|t| t.table)
            .collect();

        tracing::debug!("Catalog lists {} user tables", user_tables.len());
        Ok(user_tables)
    }

    /// Columns of in-scope tables, ordered by table then position.
    pub async fn columns(&self, scope: &TableSet) -> Result<Vec<Column>> {
        let mut columns: Vec<Column> = self
            .timed("columns", self.backend.columns())
            .await?
            .into_iter()
            .filter(|c| scope.contains(&c.table))
            .collect();
        columns.sort_by(|a, b| {
            a.table
                .cmp(&b.table)
                .then(a.ordinal_position.cmp(&b.ordinal_position))
        });
        Ok(columns)
    }

    /// Indexes of in-scope tables.
    pub async fn indexes(&self, scope: &TableSet) -> Result<Vec<Index>> {
        Ok(self
            .timed("indexes", self.backend.indexes())
            .await?
            .into_iter()
            .filter(|i| scope.contains(&i.table))
            .collect())
    }

    /// Foreign keys whose parent and referenced tables are both in scope.
    pub async fn foreign_keys(&self, scope: &TableSet) -> Result<Vec<ForeignKey>> {
        let foreign_keys: Vec<ForeignKey> = self
            .timed("foreign keys", self.backend.foreign_keys())
            .await?
            .into_iter()
            .filter(|fk| scope.contains(&fk.table) && scope.contains(&fk.referenced_table))
            .collect();

        for fk in &foreign_keys {
            if fk.columns.is_empty() || fk.columns.len() != fk.referenced_columns.len() {
                return Err(AuditError::Introspection {
                    context: format!("Foreign key {} on {} has mismatched columns", fk.name, fk.table),
                    source: "column pairs do not line up".into(),
                });
            }
        }
        Ok(foreign_keys)
    }

    /// User triggers on in-scope tables.
    pub async fn triggers(&self, scope: &TableSet) -> Result<Vec<Trigger>> {
        Ok(self
            .timed("triggers", self.backend.triggers())
            .await?
            .into_iter()
            .filter(|t| t.origin == crate::models::ObjectOrigin::User && scope.contains(&t.table))
            .collect())
    }
}
