//! Per-table statement synthesis.
//!
//! Every statement returns one integer. Identifiers come from catalog
//! snapshots only and are quoted with the dialect's rule; no caller-supplied
//! value is ever interpolated.

use crate::adapters::Statement;
use crate::models::{Column, Dialect, ForeignKey, Index, TableRef};

/// Alias of the audited table inside synthesized statements.
const PARENT_ALIAS: &str = "p";
/// Alias of the referenced table inside anti-join subqueries.
const REFERENCED_ALIAS: &str = "r";

/// Rows of `fk.table` whose key is fully non-NULL and has no referenced row.
///
/// Renders as
/// `p.c1 IS NOT NULL AND ... AND NOT EXISTS (SELECT 1 FROM ref AS r WHERE r.x1 = p.c1 AND ...)`.
fn dangling_reference(dialect: Dialect, fk: &ForeignKey) -> String {
    let not_null = fk
        .columns
        .iter()
        .map(|c| format!("{}.{} IS NOT NULL", PARENT_ALIAS, dialect.quote(c)))
        .collect::<Vec<_>>()
        .join(" AND ");

    let matches = fk
        .column_pairs()
        .map(|(column, referenced)| {
            format!(
                "{}.{} = {}.{}",
                REFERENCED_ALIAS,
                dialect.quote(referenced),
                PARENT_ALIAS,
                dialect.quote(column)
            )
        })
        .collect::<Vec<_>>()
        .join(" AND ");

    format!(
        "{} AND NOT EXISTS (SELECT 1 FROM {} AS {} WHERE {})",
        not_null,
        fk.referenced_table.qualified(dialect),
        REFERENCED_ALIAS,
        matches
    )
}

/// Counts rows of `table` that violate at least one of `foreign_keys`.
///
/// Returns `None` when the table has no enabled foreign key: there is
/// nothing to check.
pub fn orphan_statement(
    dialect: Dialect,
    table: &TableRef,
    foreign_keys: &[&ForeignKey],
) -> Option<Statement> {
    let predicates: Vec<String> = foreign_keys
        .iter()
        .filter(|fk| fk.is_enabled && &fk.table == table)
        .map(|fk| format!("({})", dangling_reference(dialect, fk)))
        .collect();

    if predicates.is_empty() {
        return None;
    }

    Some(Statement::new(
        table.display_name(),
        format!(
            "SELECT {} AS orphan_count FROM {} AS {} WHERE {}",
            dialect.count_function(),
            table.qualified(dialect),
            PARENT_ALIAS,
            predicates.join(" OR ")
        ),
    ))
}

/// Counts groups of two or more rows identical across all groupable columns.
///
/// Returns `None` when the table has no groupable column.
pub fn duplicate_statement(
    dialect: Dialect,
    table: &TableRef,
    columns: &[&Column],
) -> Option<Statement> {
    let group_by: Vec<String> = columns
        .iter()
        .filter(|c| &c.table == table && c.is_groupable())
        .map(|c| dialect.quote(&c.name))
        .collect();

    if group_by.is_empty() {
        return None;
    }

    Some(Statement::new(
        table.display_name(),
        format!(
            "SELECT {} AS duplicate_count FROM (SELECT 1 AS g FROM {} GROUP BY {} HAVING COUNT(*) > 1) AS duplicate_groups",
            dialect.count_function(),
            table.qualified(dialect),
            group_by.join(", ")
        ),
    ))
}

/// Counts rows that currently violate one foreign key.
pub fn violation_statement(dialect: Dialect, fk: &ForeignKey) -> Statement {
    Statement::new(
        format!("{} ({})", fk.table.display_name(), fk.name),
        format!(
            "SELECT {} AS violation_count FROM {} AS {} WHERE {}",
            dialect.count_function(),
            fk.table.qualified(dialect),
            PARENT_ALIAS,
            dangling_reference(dialect, fk)
        ),
    )
}

/// Whether any index on `table` is flagged primary.
pub fn has_primary_key(table: &TableRef, indexes: &[Index]) -> bool {
    indexes.iter().any(|i| &i.table == table && i.is_primary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReferentialAction, StorageClass};

    fn fk(name: &str, table: &str, columns: &[&str], referenced: &str, referenced_columns: &[&str]) -> ForeignKey {
        ForeignKey {
            name: name.to_string(),
            table: TableRef::new(table),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            referenced_table: TableRef::new(referenced),
            referenced_columns: referenced_columns.iter().map(|c| c.to_string()).collect(),
            on_delete: ReferentialAction::NoAction,
            on_update: ReferentialAction::NoAction,
            is_enabled: true,
        }
    }

    fn column(table: &str, name: &str, storage_class: StorageClass) -> Column {
        Column {
            table: TableRef::new(table),
            name: name.to_string(),
            ordinal_position: 1,
            is_nullable: true,
            data_type: "int".to_string(),
            storage_class,
        }
    }

    #[test]
    fn test_orphan_statement_single_key() {
        let orders = TableRef::new("Orders");
        let key = fk("fk_orders_customers", "Orders", &["customer_id"], "Customers", &["id"]);
        let statement = orphan_statement(Dialect::PostgreSQL, &orders, &[&key]).unwrap();

        assert_eq!(statement.unit, "Orders");
        assert_eq!(
            statement.sql,
            "SELECT COUNT(*) AS orphan_count FROM \"public\".\"Orders\" AS p WHERE \
             (p.\"customer_id\" IS NOT NULL AND NOT EXISTS \
             (SELECT 1 FROM \"public\".\"Customers\" AS r WHERE r.\"id\" = p.\"customer_id\"))"
        );
    }

    #[test]
    fn test_orphan_statement_composite_and_multiple_keys() {
        let lines = TableRef::new("lines");
        let a = fk("fk_a", "lines", &["order_id", "region"], "orders", &["id", "region"]);
        let b = fk("fk_b", "lines", &["sku"], "products", &["sku"]);
        let statement = orphan_statement(Dialect::SqlServer, &lines, &[&a, &b]).unwrap();

        assert!(statement.sql.starts_with("SELECT COUNT_BIG(*) AS orphan_count FROM [dbo].[lines] AS p"));
        assert!(statement.sql.contains(
            "p.[order_id] IS NOT NULL AND p.[region] IS NOT NULL AND NOT EXISTS \
             (SELECT 1 FROM [dbo].[orders] AS r WHERE r.[id] = p.[order_id] AND r.[region] = p.[region])"
        ));
        assert!(statement.sql.contains(") OR ("));
    }

    #[test]
    fn test_orphan_statement_skips_tables_without_keys() {
        let customers = TableRef::new("Customers");
        assert!(orphan_statement(Dialect::PostgreSQL, &customers, &[]).is_none());

        let mut disabled = fk("fk_x", "Customers", &["region_id"], "regions", &["id"]);
        disabled.is_enabled = false;
        assert!(orphan_statement(Dialect::PostgreSQL, &customers, &[&disabled]).is_none());
    }

    #[test]
    fn test_duplicate_statement_excludes_large_objects() {
        let docs = TableRef::new("docs");
        let a = column("docs", "title", StorageClass::Scalar);
        let b = column("docs", "body", StorageClass::LargeObject);
        let c = column("docs", "author", StorageClass::Scalar);
        let statement = duplicate_statement(Dialect::SqlServer, &docs, &[&a, &b, &c]).unwrap();

        assert_eq!(
            statement.sql,
            "SELECT COUNT_BIG(*) AS duplicate_count FROM (SELECT 1 AS g FROM [dbo].[docs] \
             GROUP BY [title], [author] HAVING COUNT(*) > 1) AS duplicate_groups"
        );
    }

    #[test]
    fn test_duplicate_statement_none_without_groupable_columns() {
        let blobs = TableRef::new("blobs");
        let only = column("blobs", "payload", StorageClass::LargeObject);
        assert!(duplicate_statement(Dialect::SqlServer, &blobs, &[&only]).is_none());
    }

    #[test]
    fn test_identifiers_are_quoted() {
        let table = TableRef::new("we\"ird");
        let a = column("we\"ird", "co\"l", StorageClass::Scalar);
        let statement = duplicate_statement(Dialect::PostgreSQL, &table, &[&a]).unwrap();
        assert!(statement.sql.contains("\"public\".\"we\"\"ird\""));
        assert!(statement.sql.contains("GROUP BY \"co\"\"l\""));
    }

    #[test]
    fn test_violation_statement() {
        let key = fk("fk_orders_customers", "Orders", &["customer_id"], "Customers", &["id"]);
        let statement = violation_statement(Dialect::PostgreSQL, &key);
        assert_eq!(statement.unit, "Orders (fk_orders_customers)");
        assert!(statement.sql.starts_with("SELECT COUNT(*) AS violation_count FROM \"public\".\"Orders\" AS p WHERE"));
    }

    #[test]
    fn test_has_primary_key() {
        let table = TableRef::new("t");
        let indexes = vec![
            Index {
                table: TableRef::new("t"),
                name: "ix_t_name".to_string(),
                is_primary: false,
                columns: vec!["name".to_string()],
            },
            Index {
                table: TableRef::new("u"),
                name: "pk_u".to_string(),
                is_primary: true,
                columns: vec!["id".to_string()],
            },
        ];
        assert!(!has_primary_key(&table, &indexes));
        assert!(has_primary_key(&TableRef::new("u"), &indexes));
    }
}
