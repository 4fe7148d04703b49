//! Typed result rows, serialized with PascalCase field names.

use serde::Serialize;

/// Check 1: orphan count of a table with at least one checked foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrphanRow {
    /// Table holding the foreign-key columns
    pub table_name: String,
    /// Rows whose non-NULL key has no referenced row
    pub orphan_count: i64,
}

/// Check 2: duplicate groups of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DuplicateRow {
    /// Table whose groupable columns were compared
    pub table_name: String,
    /// Number of duplicate groups, not duplicate rows
    pub duplicate_count: i64,
}

/// Check 3: a declared foreign key that existing rows violate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConstraintViolationRow {
    /// Constraint name from the catalog
    pub foreign_key_name: String,
    /// Table holding the key columns
    pub parent_table: String,
    /// Table the key points at
    pub referenced_table: String,
    /// Rows failing re-validation; always positive
    pub violation_count: i64,
}

/// Check 4: a foreign key with a delete or update action other than no action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReferentialActionRow {
    /// Constraint name from the catalog
    pub foreign_key_name: String,
    /// Table holding the key columns
    pub parent_table: String,
    /// Table the key points at
    pub referenced_table: String,
    /// Action on delete, e.g. `CASCADE`
    pub delete_action: String,
    /// Action on update, e.g. `SET_NULL`
    pub update_action: String,
}

/// Check 5: a nullable foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NullableForeignKeyRow {
    /// Constraint name from the catalog
    pub foreign_key_name: String,
    /// Table holding the key columns
    pub parent_table: String,
    /// Table the key points at
    pub referenced_table: String,
    /// The nullable key column
    pub parent_column: String,
    /// Always true for reported rows
    pub is_nullable: bool,
}

/// Value of `PrimaryKeyStatus` for every reported table.
pub const NO_PRIMARY_KEY: &str = "No Primary Key";

/// Check 6: a table without a primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MissingPrimaryKeyRow {
    /// Table lacking a primary key
    pub table_name: String,
    /// Always [`NO_PRIMARY_KEY`]
    pub primary_key_status: &'static str,
}

/// Check 7: a trigger whose body writes to other rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TriggerRelationRow {
    /// Trigger name from the catalog
    pub trigger_name: String,
    /// Table the trigger is attached to
    pub parent_table: String,
    /// Full trigger definition text
    pub trigger_definition: String,
}

/// Check 8: a column named like a foreign key without a declared constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImpliedRelationRow {
    /// Table holding the column
    pub parent_table: String,
    /// Column whose name ends in the foreign-key suffix
    pub parent_column: String,
    /// Column name with the suffix removed
    pub potential_referenced_table: String,
}

/// Check 9: one column pair of a declared foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeclaredForeignKeyRow {
    /// Constraint name from the catalog
    pub foreign_key_name: String,
    /// Table holding the key columns
    pub parent_table: String,
    /// Key column in the parent table
    pub parent_column: String,
    /// Table the key points at
    pub referenced_table: String,
    /// Column the key column is paired with
    pub referenced_column: String,
}
