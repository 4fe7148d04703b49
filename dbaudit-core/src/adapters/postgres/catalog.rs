//! pg_catalog reads.
//!
//! All queries cast names to `text` and counters to `integer` so they decode
//! without relying on PostgreSQL-specific Rust types. Partitions are skipped;
//! their parent table stands for them.

use super::type_mapping::{referential_action, storage_class};
use crate::Result;
use crate::adapters::helpers::RowExt;
use crate::fetch_catalog;
use crate::models::{
    Column, Dialect, ForeignKey, Index, ObjectOrigin, Table, TableRef, Trigger,
};
use sqlx::PgPool;

const TABLES_QUERY: &str = r#"
    SELECT
        n.nspname::text AS schema_name,
        c.relname::text AS table_name,
        EXISTS (
            SELECT 1 FROM pg_depend d
            WHERE d.classid = 'pg_class'::regclass
              AND d.objid = c.oid
              AND d.deptype = 'e'
        ) AS is_extension_member
    FROM pg_class c
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind IN ('r', 'p')
      AND NOT c.relispartition
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND n.nspname NOT LIKE 'pg\_toast%'
      AND n.nspname NOT LIKE 'pg\_temp%'
    ORDER BY n.nspname, c.relname
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT
        n.nspname::text AS schema_name,
        c.relname::text AS table_name,
        a.attname::text AS column_name,
        a.attnum::integer AS ordinal_position,
        NOT a.attnotnull AS is_nullable,
        format_type(a.atttypid, a.atttypmod) AS data_type,
        COALESCE(et.typname, bt.typname, t.typname)::text AS base_type,
        COALESCE(et.typcategory, bt.typcategory, t.typcategory)::text AS type_category
    FROM pg_attribute a
    JOIN pg_class c ON c.oid = a.attrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_type t ON t.oid = a.atttypid
    LEFT JOIN pg_type et ON et.oid = t.typelem AND t.typcategory = 'A'
    LEFT JOIN pg_type bt ON bt.oid = t.typbasetype AND t.typtype = 'd'
    WHERE c.relkind IN ('r', 'p')
      AND NOT c.relispartition
      AND a.attnum > 0
      AND NOT a.attisdropped
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND n.nspname NOT LIKE 'pg\_toast%'
      AND n.nspname NOT LIKE 'pg\_temp%'
    ORDER BY n.nspname, c.relname, a.attnum
"#;

const INDEXES_QUERY: &str = r#"
    SELECT
        n.nspname::text AS schema_name,
        c.relname::text AS table_name,
        i.relname::text AS index_name,
        ix.indisprimary AS is_primary,
        ARRAY(
            SELECT a.attname::text
            FROM unnest(ix.indkey::int2[]) WITH ORDINALITY AS k(attnum, ord)
            JOIN pg_attribute a ON a.attrelid = c.oid AND a.attnum = k.attnum
            ORDER BY k.ord
        ) AS column_names
    FROM pg_index ix
    JOIN pg_class c ON c.oid = ix.indrelid
    JOIN pg_class i ON i.oid = ix.indexrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    WHERE c.relkind IN ('r', 'p')
      AND NOT c.relispartition
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND n.nspname NOT LIKE 'pg\_toast%'
      AND n.nspname NOT LIKE 'pg\_temp%'
    ORDER BY n.nspname, c.relname, i.relname
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT
        con.conname::text AS constraint_name,
        pn.nspname::text AS schema_name,
        pc.relname::text AS table_name,
        rn.nspname::text AS referenced_schema,
        rc.relname::text AS referenced_table,
        pa.attname::text AS column_name,
        ra.attname::text AS referenced_column,
        k.ord::integer AS position,
        con.confdeltype::text AS delete_code,
        con.confupdtype::text AS update_code
    FROM pg_constraint con
    JOIN pg_class pc ON pc.oid = con.conrelid
    JOIN pg_namespace pn ON pn.oid = pc.relnamespace
    JOIN pg_class rc ON rc.oid = con.confrelid
    JOIN pg_namespace rn ON rn.oid = rc.relnamespace
    CROSS JOIN LATERAL unnest(con.conkey, con.confkey) WITH ORDINALITY AS k(attnum, refattnum, ord)
    JOIN pg_attribute pa ON pa.attrelid = con.conrelid AND pa.attnum = k.attnum
    JOIN pg_attribute ra ON ra.attrelid = con.confrelid AND ra.attnum = k.refattnum
    WHERE con.contype = 'f'
      AND NOT pc.relispartition
      AND pn.nspname NOT IN ('pg_catalog', 'information_schema')
      AND pn.nspname NOT LIKE 'pg\_toast%'
      AND pn.nspname NOT LIKE 'pg\_temp%'
    ORDER BY pn.nspname, pc.relname, con.conname, k.ord
"#;

const TRIGGERS_QUERY: &str = r#"
    SELECT
        t.tgname::text AS trigger_name,
        n.nspname::text AS schema_name,
        c.relname::text AS table_name,
        p.prosrc AS trigger_body
    FROM pg_trigger t
    JOIN pg_class c ON c.oid = t.tgrelid
    JOIN pg_namespace n ON n.oid = c.relnamespace
    JOIN pg_proc p ON p.oid = t.tgfoid
    WHERE NOT t.tgisinternal
      AND c.relkind IN ('r', 'p')
      AND n.nspname NOT IN ('pg_catalog', 'information_schema')
      AND n.nspname NOT LIKE 'pg\_toast%'
      AND n.nspname NOT LIKE 'pg\_temp%'
    ORDER BY n.nspname, c.relname, t.tgname
"#;

fn table_ref(schema: String, name: String) -> TableRef {
    TableRef::in_schema(Dialect::PostgreSQL, schema, name)
}

pub(super) async fn tables(pool: &PgPool) -> Result<Vec<Table>> {
    let rows = fetch_catalog!(pool, TABLES_QUERY, "pg_class")?;

    let mut tables = Vec::with_capacity(rows.len());
    for row in &rows {
        let is_extension_member: bool = row.get_field("is_extension_member", Some("pg_class"))?;
        tables.push(Table {
            table: table_ref(
                row.get_field("schema_name", Some("pg_class"))?,
                row.get_field("table_name", Some("pg_class"))?,
            ),
            origin: if is_extension_member {
                ObjectOrigin::System
            } else {
                ObjectOrigin::User
            },
        });
    }

    tracing::debug!("Discovered {} PostgreSQL tables", tables.len());
    Ok(tables)
}

pub(super) async fn columns(pool: &PgPool) -> Result<Vec<Column>> {
    let rows = fetch_catalog!(pool, COLUMNS_QUERY, "pg_attribute")?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in &rows {
        let base_type: String = row.get_field("base_type", Some("pg_attribute"))?;
        let category: String = row.get_field("type_category", Some("pg_attribute"))?;
        columns.push(Column {
            table: table_ref(
                row.get_field("schema_name", Some("pg_attribute"))?,
                row.get_field("table_name", Some("pg_attribute"))?,
            ),
            name: row.get_field("column_name", Some("pg_attribute"))?,
            ordinal_position: row.get_field("ordinal_position", Some("pg_attribute"))?,
            is_nullable: row.get_field("is_nullable", Some("pg_attribute"))?,
            data_type: row.get_field("data_type", Some("pg_attribute"))?,
            storage_class: storage_class(&base_type, &category),
        });
    }

    Ok(columns)
}

pub(super) async fn indexes(pool: &PgPool) -> Result<Vec<Index>> {
    let rows = fetch_catalog!(pool, INDEXES_QUERY, "pg_index")?;

    let mut indexes = Vec::with_capacity(rows.len());
    for row in &rows {
        indexes.push(Index {
            table: table_ref(
                row.get_field("schema_name", Some("pg_index"))?,
                row.get_field("table_name", Some("pg_index"))?,
            ),
            name: row.get_field("index_name", Some("pg_index"))?,
            is_primary: row.get_field("is_primary", Some("pg_index"))?,
            columns: row.get_field("column_names", Some("pg_index"))?,
        });
    }

    Ok(indexes)
}

pub(super) async fn foreign_keys(pool: &PgPool) -> Result<Vec<ForeignKey>> {
    let rows = fetch_catalog!(pool, FOREIGN_KEYS_QUERY, "pg_constraint")?;

    // Rows arrive grouped by constraint and ordered by key position.
    let mut foreign_keys: Vec<ForeignKey> = Vec::new();
    for row in &rows {
        let name: String = row.get_field("constraint_name", Some("pg_constraint"))?;
        let table = table_ref(
            row.get_field("schema_name", Some("pg_constraint"))?,
            row.get_field("table_name", Some("pg_constraint"))?,
        );
        let column: String = row.get_field("column_name", Some("pg_constraint"))?;
        let referenced_column: String = row.get_field("referenced_column", Some("pg_constraint"))?;

        if let Some(current) = foreign_keys.last_mut()
            && current.name == name
            && current.table == table
        {
            current.columns.push(column);
            current.referenced_columns.push(referenced_column);
            continue;
        }

        let delete_code: String = row.get_field("delete_code", Some("pg_constraint"))?;
        let update_code: String = row.get_field("update_code", Some("pg_constraint"))?;
        foreign_keys.push(ForeignKey {
            name,
            table,
            columns: vec![column],
            referenced_table: table_ref(
                row.get_field("referenced_schema", Some("pg_constraint"))?,
                row.get_field("referenced_table", Some("pg_constraint"))?,
            ),
            referenced_columns: vec![referenced_column],
            on_delete: referential_action(&delete_code)?,
            on_update: referential_action(&update_code)?,
            is_enabled: true,
        });
    }

    tracing::debug!("Discovered {} PostgreSQL foreign keys", foreign_keys.len());
    Ok(foreign_keys)
}

pub(super) async fn triggers(pool: &PgPool) -> Result<Vec<Trigger>> {
    let rows = fetch_catalog!(pool, TRIGGERS_QUERY, "pg_trigger")?;

    let mut triggers = Vec::with_capacity(rows.len());
    for row in &rows {
        triggers.push(Trigger {
            name: row.get_field("trigger_name", Some("pg_trigger"))?,
            table: table_ref(
                row.get_field("schema_name", Some("pg_trigger"))?,
                row.get_field("table_name", Some("pg_trigger"))?,
            ),
            body: row.get_field("trigger_body", Some("pg_trigger"))?,
            origin: ObjectOrigin::User,
        });
    }

    Ok(triggers)
}
