//! Checks that evaluate each table or constraint on its own.

use super::AuditKind;
use super::rows::{
    ConstraintViolationRow, DuplicateRow, MissingPrimaryKeyRow, NO_PRIMARY_KEY, OrphanRow,
};
use crate::Result;
use crate::adapters::{AuditBackend, Statement};
use crate::catalog::CatalogIntrospector;
use crate::config::AuditSettings;
use crate::executor::execute_counts;
use crate::models::{Column, ForeignKey, TableRef};
use crate::report::{AuditReport, ReportBuilder, SortKey};
use crate::synth;

/// Check 1: rows per table whose foreign key has no referenced row.
///
/// Tables without an enabled foreign key are skipped. Every checked table
/// gets a row, including a zero count.
pub(super) async fn orphans(
    catalog: &CatalogIntrospector<'_>,
    backend: &dyn AuditBackend,
    settings: &AuditSettings,
) -> Result<AuditReport> {
    let dialect = catalog.dialect();
    let scope = catalog.user_tables().await?;
    let foreign_keys = catalog.foreign_keys(&scope).await?;

    let units: Vec<(TableRef, Statement)> = scope
        .iter()
        .filter_map(|table| {
            let own: Vec<&ForeignKey> = foreign_keys.iter().filter(|fk| &fk.table == table).collect();
            synth::orphan_statement(dialect, table, &own).map(|s| (table.clone(), s))
        })
        .collect();

    let mut report = ReportBuilder::new(AuditKind::Orphans).units(units.len());
    for (table, outcome) in execute_counts(backend, units, settings).await {
        let table_name = table.display_name();
        match outcome {
            Ok(orphan_count) => report.push_row(
                SortKey::table(&table_name),
                &OrphanRow {
                    table_name,
                    orphan_count,
                },
            )?,
            Err(e) => report.push_failure(SortKey::table(&table_name), table_name, None, &e),
        }
    }
    Ok(report.finish())
}

/// Check 2: number of duplicate groups per table, over groupable columns.
///
/// Only tables with at least one duplicate group produce a row.
pub(super) async fn duplicates(
    catalog: &CatalogIntrospector<'_>,
    backend: &dyn AuditBackend,
    settings: &AuditSettings,
) -> Result<AuditReport> {
    let dialect = catalog.dialect();
    let scope = catalog.user_tables().await?;
    let columns = catalog.columns(&scope).await?;

    let units: Vec<(TableRef, Statement)> = scope
        .iter()
        .filter_map(|table| {
            let own: Vec<&Column> = columns.iter().filter(|c| &c.table == table).collect();
            let statement = synth::duplicate_statement(dialect, table, &own);
            if statement.is_none() {
                tracing::debug!("Skipping duplicate check on {}: no groupable columns", table);
            }
            statement.map(|s| (table.clone(), s))
        })
        .collect();

    let mut report = ReportBuilder::new(AuditKind::Duplicates).units(units.len());
    for (table, outcome) in execute_counts(backend, units, settings).await {
        let table_name = table.display_name();
        match outcome {
            Ok(0) => {}
            Ok(duplicate_count) => report.push_row(
                SortKey::table(&table_name),
                &DuplicateRow {
                    table_name,
                    duplicate_count,
                },
            )?,
            Err(e) => report.push_failure(SortKey::table(&table_name), table_name, None, &e),
        }
    }
    Ok(report.finish())
}

/// Check 3: declared foreign keys that existing rows violate.
///
/// One statement per enabled constraint; only constraints with violations
/// produce a row.
pub(super) async fn constraint_violations(
    catalog: &CatalogIntrospector<'_>,
    backend: &dyn AuditBackend,
    settings: &AuditSettings,
) -> Result<AuditReport> {
    let dialect = catalog.dialect();
    let scope = catalog.user_tables().await?;
    let foreign_keys = catalog.foreign_keys(&scope).await?;

    let units: Vec<(&ForeignKey, Statement)> = foreign_keys
        .iter()
        .filter(|fk| fk.is_enabled)
        .map(|fk| (fk, synth::violation_statement(dialect, fk)))
        .collect();

    let mut report = ReportBuilder::new(AuditKind::ConstraintViolations).units(units.len());
    for (fk, outcome) in execute_counts(backend, units, settings).await {
        let parent_table = fk.table.display_name();
        let referenced_table = fk.referenced_table.display_name();
        let key = SortKey::table(&parent_table)
            .then(&referenced_table)
            .then(&fk.name);
        match outcome {
            Ok(0) => {}
            Ok(violation_count) => report.push_row(
                key,
                &ConstraintViolationRow {
                    foreign_key_name: fk.name.clone(),
                    parent_table,
                    referenced_table,
                    violation_count,
                },
            )?,
            Err(e) => report.push_failure(key, parent_table, Some(fk.name.clone()), &e),
        }
    }
    Ok(report.finish())
}

/// Check 6: tables without any index flagged primary.
pub(super) async fn missing_primary_keys(catalog: &CatalogIntrospector<'_>) -> Result<AuditReport> {
    let scope = catalog.user_tables().await?;
    let indexes = catalog.indexes(&scope).await?;

    let mut report = ReportBuilder::new(AuditKind::MissingPrimaryKeys).units(scope.len());
    for table in scope.iter().filter(|t| !synth::has_primary_key(t, &indexes)) {
        let table_name = table.display_name();
        report.push_row(
            SortKey::table(&table_name),
            &MissingPrimaryKeyRow {
                table_name,
                primary_key_status: NO_PRIMARY_KEY,
            },
        )?;
    }
    Ok(report.finish())
}
