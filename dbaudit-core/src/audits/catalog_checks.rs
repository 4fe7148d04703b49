//! Checks computed from catalog metadata alone.

use super::AuditKind;
use super::rows::{
    DeclaredForeignKeyRow, ImpliedRelationRow, NullableForeignKeyRow, ReferentialActionRow,
    TriggerRelationRow,
};
use crate::Result;
use crate::catalog::CatalogIntrospector;
use crate::models::{Column, ForeignKey, TableRef};
use crate::report::{AuditReport, ReportBuilder, SortKey};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

fn foreign_key_sort_key(fk: &ForeignKey) -> SortKey {
    SortKey::table(fk.table.display_name())
        .then(fk.referenced_table.display_name())
        .then(&fk.name)
}

/// Check 4: foreign keys whose delete or update action is neither CASCADE
/// nor NO_ACTION. One row per constraint.
pub(super) async fn referential_actions(catalog: &CatalogIntrospector<'_>) -> Result<AuditReport> {
    let scope = catalog.user_tables().await?;
    let foreign_keys = catalog.foreign_keys(&scope).await?;

    let mut report = ReportBuilder::new(AuditKind::ReferentialActions).units(foreign_keys.len());
    for fk in foreign_keys
        .iter()
        .filter(|fk| !fk.on_delete.is_standard() || !fk.on_update.is_standard())
    {
        report.push_row(
            foreign_key_sort_key(fk),
            &ReferentialActionRow {
                foreign_key_name: fk.name.clone(),
                parent_table: fk.table.display_name(),
                referenced_table: fk.referenced_table.display_name(),
                delete_action: fk.on_delete.to_string(),
                update_action: fk.on_update.to_string(),
            },
        )?;
    }
    Ok(report.finish())
}

/// Check 5: nullable foreign-key columns, one row per column in key order.
pub(super) async fn nullable_foreign_keys(catalog: &CatalogIntrospector<'_>) -> Result<AuditReport> {
    let scope = catalog.user_tables().await?;
    let foreign_keys = catalog.foreign_keys(&scope).await?;
    let columns = catalog.columns(&scope).await?;

    let by_name: HashMap<(&TableRef, &str), &Column> = columns
        .iter()
        .map(|c| ((&c.table, c.name.as_str()), c))
        .collect();

    let mut report = ReportBuilder::new(AuditKind::NullableForeignKeys).units(foreign_keys.len());
    for fk in &foreign_keys {
        for column in &fk.columns {
            let nullable = by_name
                .get(&(&fk.table, column.as_str()))
                .is_some_and(|c| c.is_nullable);
            if !nullable {
                continue;
            }
            report.push_row(
                foreign_key_sort_key(fk),
                &NullableForeignKeyRow {
                    foreign_key_name: fk.name.clone(),
                    parent_table: fk.table.display_name(),
                    referenced_table: fk.referenced_table.display_name(),
                    parent_column: column.clone(),
                    is_nullable: true,
                },
            )?;
        }
    }
    Ok(report.finish())
}

/// Whole-word, case-insensitive INSERT, UPDATE or DELETE.
fn mutation_keyword() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(insert|update|delete)\b").expect("Invalid trigger keyword pattern")
    })
}

/// Whether a trigger body mentions a row-mutation keyword.
pub(crate) fn mutates_rows(body: &str) -> bool {
    mutation_keyword().is_match(body)
}

/// Check 7: triggers whose definition mentions INSERT, UPDATE or DELETE.
pub(super) async fn trigger_relations(catalog: &CatalogIntrospector<'_>) -> Result<AuditReport> {
    let scope = catalog.user_tables().await?;
    let triggers = catalog.triggers(&scope).await?;

    let mut report = ReportBuilder::new(AuditKind::TriggerRelations).units(triggers.len());
    for trigger in &triggers {
        let Some(body) = trigger.body.as_deref().filter(|b| mutates_rows(b)) else {
            continue;
        };
        let parent_table = trigger.table.display_name();
        report.push_row(
            SortKey::table(&parent_table).then(&trigger.name),
            &TriggerRelationRow {
                trigger_name: trigger.name.clone(),
                parent_table,
                trigger_definition: body.to_string(),
            },
        )?;
    }
    Ok(report.finish())
}

/// Strips `suffix` from the end of `name`, ignoring case.
///
/// Returns `None` unless something is left before the suffix.
pub(crate) fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if split == 0 {
        return None;
    }
    let head = name.get(..split)?;
    let tail = name.get(split..)?;
    (tail.to_lowercase() == suffix.to_lowercase()).then_some(head)
}

/// Check 8: columns named like foreign keys that are neither part of a
/// declared foreign key nor of the primary key.
pub(super) async fn implied_relations(
    catalog: &CatalogIntrospector<'_>,
    suffix: &str,
) -> Result<AuditReport> {
    let scope = catalog.user_tables().await?;
    let columns = catalog.columns(&scope).await?;
    let foreign_keys = catalog.foreign_keys(&scope).await?;
    let indexes = catalog.indexes(&scope).await?;

    let primary_key_columns: HashSet<(&TableRef, &str)> = indexes
        .iter()
        .filter(|i| i.is_primary)
        .flat_map(|i| i.columns.iter().map(move |c| (&i.table, c.as_str())))
        .collect();

    let mut report = ReportBuilder::new(AuditKind::ImpliedRelations).units(columns.len());
    for column in &columns {
        let Some(potential) = strip_suffix_ignore_case(&column.name, suffix) else {
            continue;
        };
        let declared = foreign_keys
            .iter()
            .any(|fk| fk.table == column.table && fk.covers(&column.name));
        if declared || primary_key_columns.contains(&(&column.table, column.name.as_str())) {
            continue;
        }
        let parent_table = column.table.display_name();
        report.push_row(
            SortKey::table(&parent_table).then(&column.name),
            &ImpliedRelationRow {
                parent_table,
                parent_column: column.name.clone(),
                potential_referenced_table: potential.to_string(),
            },
        )?;
    }
    Ok(report.finish())
}

/// Check 9: every declared foreign key, one row per column pair.
pub(super) async fn declared_foreign_keys(catalog: &CatalogIntrospector<'_>) -> Result<AuditReport> {
    let scope = catalog.user_tables().await?;
    let foreign_keys = catalog.foreign_keys(&scope).await?;

    let mut report = ReportBuilder::new(AuditKind::DeclaredForeignKeys).units(foreign_keys.len());
    for fk in &foreign_keys {
        for (column, referenced) in fk.column_pairs() {
            report.push_row(
                foreign_key_sort_key(fk),
                &DeclaredForeignKeyRow {
                    foreign_key_name: fk.name.clone(),
                    parent_table: fk.table.display_name(),
                    parent_column: column.to_string(),
                    referenced_table: fk.referenced_table.display_name(),
                    referenced_column: referenced.to_string(),
                },
            )?;
        }
    }
    Ok(report.finish())
}
