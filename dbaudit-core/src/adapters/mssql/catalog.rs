//! sys.* catalog view reads.

use super::type_mapping::{referential_action, storage_class};
use crate::Result;
use crate::error::AuditError;
use crate::models::{
    Column, Dialect, ForeignKey, Index, ObjectOrigin, Table, TableRef, Trigger,
};
use tiberius::Row;

pub(super) const TABLES_QUERY: &str = "
    SELECT s.name AS schema_name, t.name AS table_name, t.is_ms_shipped
    FROM sys.tables t
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    ORDER BY s.name, t.name";

pub(super) const COLUMNS_QUERY: &str = "
    SELECT
        s.name AS schema_name,
        t.name AS table_name,
        c.name AS column_name,
        CAST(c.column_id AS int) AS ordinal_position,
        CAST(c.is_nullable AS bit) AS is_nullable,
        ty.name AS data_type,
        CASE WHEN ty.is_assembly_type = 1 THEN ty.name ELSE TYPE_NAME(c.system_type_id) END AS base_type
    FROM sys.columns c
    JOIN sys.tables t ON t.object_id = c.object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    JOIN sys.types ty ON ty.user_type_id = c.user_type_id
    ORDER BY s.name, t.name, c.column_id";

pub(super) const INDEXES_QUERY: &str = "
    SELECT
        s.name AS schema_name,
        t.name AS table_name,
        i.name AS index_name,
        i.is_primary_key AS is_primary,
        c.name AS column_name
    FROM sys.indexes i
    JOIN sys.tables t ON t.object_id = i.object_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    LEFT JOIN sys.index_columns ic
        ON ic.object_id = i.object_id AND ic.index_id = i.index_id AND ic.key_ordinal > 0
    LEFT JOIN sys.columns c ON c.object_id = ic.object_id AND c.column_id = ic.column_id
    WHERE i.type > 0
    ORDER BY s.name, t.name, i.name, ic.key_ordinal";

pub(super) const FOREIGN_KEYS_QUERY: &str = "
    SELECT
        fk.name AS constraint_name,
        ps.name AS schema_name,
        pt.name AS table_name,
        rs.name AS referenced_schema,
        rt.name AS referenced_table,
        pc.name AS column_name,
        rc.name AS referenced_column,
        fk.delete_referential_action_desc AS delete_action,
        fk.update_referential_action_desc AS update_action,
        fk.is_disabled
    FROM sys.foreign_keys fk
    JOIN sys.foreign_key_columns fkc ON fkc.constraint_object_id = fk.object_id
    JOIN sys.tables pt ON pt.object_id = fk.parent_object_id
    JOIN sys.schemas ps ON ps.schema_id = pt.schema_id
    JOIN sys.tables rt ON rt.object_id = fk.referenced_object_id
    JOIN sys.schemas rs ON rs.schema_id = rt.schema_id
    JOIN sys.columns pc
        ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id
    JOIN sys.columns rc
        ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id
    ORDER BY ps.name, pt.name, fk.name, fkc.constraint_column_id";

pub(super) const TRIGGERS_QUERY: &str = "
    SELECT
        tr.name AS trigger_name,
        s.name AS schema_name,
        t.name AS table_name,
        m.definition AS trigger_body,
        tr.is_ms_shipped
    FROM sys.triggers tr
    JOIN sys.tables t ON t.object_id = tr.parent_id
    JOIN sys.schemas s ON s.schema_id = t.schema_id
    LEFT JOIN sys.sql_modules m ON m.object_id = tr.object_id
    ORDER BY s.name, t.name, tr.name";

fn optional_text(row: &Row, field: &str, catalog: &str) -> Result<Option<String>> {
    row.try_get::<&str, _>(field)
        .map(|value| value.map(str::to_string))
        .map_err(|e| AuditError::parse_field(field, Some(catalog), e))
}

fn text(row: &Row, field: &str, catalog: &str) -> Result<String> {
    optional_text(row, field, catalog)?.ok_or_else(|| unexpected_null(field, catalog))
}

fn flag(row: &Row, field: &str, catalog: &str) -> Result<bool> {
    row.try_get::<bool, _>(field)
        .map_err(|e| AuditError::parse_field(field, Some(catalog), e))?
        .ok_or_else(|| unexpected_null(field, catalog))
}

fn integer(row: &Row, field: &str, catalog: &str) -> Result<i32> {
    row.try_get::<i32, _>(field)
        .map_err(|e| AuditError::parse_field(field, Some(catalog), e))?
        .ok_or_else(|| unexpected_null(field, catalog))
}

fn unexpected_null(field: &str, catalog: &str) -> AuditError {
    AuditError::Introspection {
        context: format!("Unexpected NULL in field '{}' from '{}'", field, catalog),
        source: "column is not nullable in the catalog".into(),
    }
}

fn table_ref(row: &Row, schema_field: &str, table_field: &str, catalog: &str) -> Result<TableRef> {
    Ok(TableRef::in_schema(
        Dialect::SqlServer,
        text(row, schema_field, catalog)?,
        text(row, table_field, catalog)?,
    ))
}

fn origin(is_ms_shipped: bool) -> ObjectOrigin {
    if is_ms_shipped {
        ObjectOrigin::System
    } else {
        ObjectOrigin::User
    }
}

pub(super) fn tables(rows: &[Row]) -> Result<Vec<Table>> {
    let tables = rows
        .iter()
        .map(|row| {
            Ok(Table {
                table: table_ref(row, "schema_name", "table_name", "sys.tables")?,
                origin: origin(flag(row, "is_ms_shipped", "sys.tables")?),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    tracing::debug!("Discovered {} SQL Server tables", tables.len());
    Ok(tables)
}

pub(super) fn columns(rows: &[Row]) -> Result<Vec<Column>> {
    rows.iter()
        .map(|row| {
            let base_type = text(row, "base_type", "sys.columns")?;
            Ok(Column {
                table: table_ref(row, "schema_name", "table_name", "sys.columns")?,
                name: text(row, "column_name", "sys.columns")?,
                ordinal_position: integer(row, "ordinal_position", "sys.columns")?,
                is_nullable: flag(row, "is_nullable", "sys.columns")?,
                data_type: text(row, "data_type", "sys.columns")?,
                storage_class: storage_class(&base_type),
            })
        })
        .collect()
}

pub(super) fn indexes(rows: &[Row]) -> Result<Vec<Index>> {
    let mut indexes: Vec<Index> = Vec::new();
    for row in rows {
        let table = table_ref(row, "schema_name", "table_name", "sys.indexes")?;
        let name = text(row, "index_name", "sys.indexes")?;
        let column = optional_text(row, "column_name", "sys.indexes")?;

        match indexes.last_mut() {
            Some(current) if current.table == table && current.name == name => {
                current.columns.extend(column);
            }
            _ => indexes.push(Index {
                table,
                name,
                is_primary: flag(row, "is_primary", "sys.indexes")?,
                columns: column.into_iter().collect(),
            }),
        }
    }
    Ok(indexes)
}

pub(super) fn foreign_keys(rows: &[Row]) -> Result<Vec<ForeignKey>> {
    let mut foreign_keys: Vec<ForeignKey> = Vec::new();
    for row in rows {
        let name = text(row, "constraint_name", "sys.foreign_keys")?;
        let table = table_ref(row, "schema_name", "table_name", "sys.foreign_keys")?;
        let column = text(row, "column_name", "sys.foreign_key_columns")?;
        let referenced_column = text(row, "referenced_column", "sys.foreign_key_columns")?;

        match foreign_keys.last_mut() {
            Some(current) if current.table == table && current.name == name => {
                current.columns.push(column);
                current.referenced_columns.push(referenced_column);
            }
            _ => foreign_keys.push(ForeignKey {
                name,
                table,
                columns: vec![column],
                referenced_table: table_ref(
                    row,
                    "referenced_schema",
                    "referenced_table",
                    "sys.foreign_keys",
                )?,
                referenced_columns: vec![referenced_column],
                on_delete: referential_action(&text(row, "delete_action", "sys.foreign_keys")?)?,
                on_update: referential_action(&text(row, "update_action", "sys.foreign_keys")?)?,
                is_enabled: !flag(row, "is_disabled", "sys.foreign_keys")?,
            }),
        }
    }

    tracing::debug!("Discovered {} SQL Server foreign keys", foreign_keys.len());
    Ok(foreign_keys)
}

pub(super) fn triggers(rows: &[Row]) -> Result<Vec<Trigger>> {
    rows.iter()
        .map(|row| {
            Ok(Trigger {
                name: text(row, "trigger_name", "sys.triggers")?,
                table: table_ref(row, "schema_name", "table_name", "sys.triggers")?,
                body: optional_text(row, "trigger_body", "sys.sql_modules")?,
                origin: origin(flag(row, "is_ms_shipped", "sys.triggers")?),
            })
        })
        .collect()
}
