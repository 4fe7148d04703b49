//! Catalog snapshot types.
//!
//! Everything here is read once from the target catalog at the start of an
//! audit and never mutated afterwards. Identifiers are carried verbatim as
//! the catalog reports them; quoting happens only at synthesis time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported target engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL
    PostgreSQL,
    /// Microsoft SQL Server
    SqlServer,
}

impl Dialect {
    /// Quotes an identifier using the engine's quoting rule.
    ///
    /// Embedded closing quote characters are doubled, so any catalog-sourced
    /// name is safe to interpolate.
    ///
    /// ```rust
    /// use dbaudit_core::models::Dialect;
    ///
    /// assert_eq!(Dialect::PostgreSQL.quote("Order \"Lines\""), "\"Order \"\"Lines\"\"\"");
    /// assert_eq!(Dialect::SqlServer.quote("weird]name"), "[weird]]name]");
    /// ```
    pub fn quote(self, identifier: &str) -> String {
        match self {
            Self::PostgreSQL => format!("\"{}\"", identifier.replace('"', "\"\"")),
            Self::SqlServer => format!("[{}]", identifier.replace(']', "]]")),
        }
    }

    /// Schema that user tables land in when none is given.
    pub fn default_schema(self) -> &'static str {
        match self {
            Self::PostgreSQL => "public",
            Self::SqlServer => "dbo",
        }
    }

    /// Row-count aggregate that yields a 64-bit integer on this engine.
    pub fn count_function(self) -> &'static str {
        match self {
            Self::PostgreSQL => "COUNT(*)",
            Self::SqlServer => "COUNT_BIG(*)",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostgreSQL => write!(f, "PostgreSQL"),
            Self::SqlServer => write!(f, "SQL Server"),
        }
    }
}

/// Who created a catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectOrigin {
    /// Created by a user of the database
    User,
    /// Shipped with the engine or an extension
    System,
}

/// Schema-qualified table name.
///
/// `schema` is `None` when the table lives in the engine's default schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Owning schema, `None` for the default schema
    pub schema: Option<String>,
    /// Table name
    pub name: String,
}

impl TableRef {
    /// Creates a reference into the default schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Creates a reference, folding the dialect's default schema to `None`.
    pub fn in_schema(dialect: Dialect, schema: impl Into<String>, name: impl Into<String>) -> Self {
        let schema = schema.into();
        Self {
            schema: (schema != dialect.default_schema()).then_some(schema),
            name: name.into(),
        }
    }

    /// Name as reported to callers: `table` or `schema.table`.
    pub fn display_name(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    /// Fully qualified, quoted name for statement text.
    pub fn qualified(&self, dialect: Dialect) -> String {
        let schema = self
            .schema
            .as_deref()
            .unwrap_or_else(|| dialect.default_schema());
        format!("{}.{}", dialect.quote(schema), dialect.quote(&self.name))
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// A base table discovered in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Schema-qualified name
    pub table: TableRef,
    /// Whether the table was created by a user or shipped with the engine
    pub origin: ObjectOrigin,
}

impl Table {
    /// Whether the table is in audit scope.
    pub fn is_user_defined(&self) -> bool {
        self.origin == ObjectOrigin::User
    }
}

/// Storage class of a column, deciding whether it can take part in grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageClass {
    /// Comparable scalar value
    Scalar,
    /// Large object or unorderable text/document type
    LargeObject,
}

/// A column of a discovered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Owning table
    pub table: TableRef,
    /// Column name as stored in the catalog
    pub name: String,
    /// 1-based position within the table
    pub ordinal_position: i32,
    /// Whether the column accepts NULL
    pub is_nullable: bool,
    /// Engine type name as reported by the catalog
    pub data_type: String,
    /// Decides whether the column can be grouped on
    pub storage_class: StorageClass,
}

impl Column {
    /// Whether the column can be part of a full-row GROUP BY.
    pub fn is_groupable(&self) -> bool {
        self.storage_class == StorageClass::Scalar
    }
}

/// An index of a discovered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    /// Indexed table
    pub table: TableRef,
    /// Index name from the catalog
    pub name: String,
    /// Whether the index backs the primary key
    pub is_primary: bool,
    /// Key columns in index order
    pub columns: Vec<String>,
}

/// Action applied to dependent rows when a referenced row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReferentialAction {
    /// Reject the change if dependents exist (checked at statement end)
    #[serde(rename = "NO_ACTION")]
    NoAction,
    /// Apply the change to dependent rows
    #[serde(rename = "CASCADE")]
    Cascade,
    /// Set dependent key columns to NULL
    #[serde(rename = "SET_NULL")]
    SetNull,
    /// Set dependent key columns to their defaults
    #[serde(rename = "SET_DEFAULT")]
    SetDefault,
    /// Reject the change immediately
    #[serde(rename = "RESTRICT")]
    Restrict,
}

impl ReferentialAction {
    /// Canonical upper-case name, e.g. `SET_NULL`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoAction => "NO_ACTION",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET_NULL",
            Self::SetDefault => "SET_DEFAULT",
            Self::Restrict => "RESTRICT",
        }
    }

    /// CASCADE and NO_ACTION are the expected actions; anything else is
    /// surfaced for review.
    pub fn is_standard(self) -> bool {
        matches!(self, Self::Cascade | Self::NoAction)
    }

    /// Parses a PostgreSQL `confdeltype`/`confupdtype` code.
    pub fn from_pg_code(code: &str) -> Option<Self> {
        match code {
            "a" => Some(Self::NoAction),
            "r" => Some(Self::Restrict),
            "c" => Some(Self::Cascade),
            "n" => Some(Self::SetNull),
            "d" => Some(Self::SetDefault),
            _ => None,
        }
    }

    /// Parses a SQL Server `*_referential_action_desc` value.
    pub fn from_description(description: &str) -> Option<Self> {
        match description.trim().to_ascii_uppercase().replace(' ', "_").as_str() {
            "NO_ACTION" => Some(Self::NoAction),
            "CASCADE" => Some(Self::Cascade),
            "SET_NULL" => Some(Self::SetNull),
            "SET_DEFAULT" => Some(Self::SetDefault),
            "RESTRICT" => Some(Self::Restrict),
            _ => None,
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared foreign-key constraint.
///
/// `columns` and `referenced_columns` are paired by position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name from the catalog
    pub name: String,
    /// Table holding the key columns
    pub table: TableRef,
    /// Key columns in key order
    pub columns: Vec<String>,
    /// Table the key points at
    pub referenced_table: TableRef,
    /// Referenced columns in key order
    pub referenced_columns: Vec<String>,
    /// Action on delete of a referenced row
    pub on_delete: ReferentialAction,
    /// Action on update of a referenced key
    pub on_update: ReferentialAction,
    /// False for disabled (SQL Server) constraints
    pub is_enabled: bool,
}

impl ForeignKey {
    /// Column pairs `(parent, referenced)` in key order.
    pub fn column_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.referenced_columns.iter().map(String::as_str))
    }

    /// Whether `column` is one of this key's parent columns.
    pub fn covers(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// A trigger attached to a discovered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Trigger name from the catalog
    pub name: String,
    /// Table the trigger is attached to
    pub table: TableRef,
    /// Definition text; `None` when the engine hides it (e.g. encrypted)
    pub body: Option<String>,
    /// Whether the trigger was created by a user or shipped with the engine
    pub origin: ObjectOrigin,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_doubles_closing_characters() {
        assert_eq!(Dialect::PostgreSQL.quote("orders"), "\"orders\"");
        assert_eq!(Dialect::PostgreSQL.quote("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::SqlServer.quote("orders"), "[orders]");
        assert_eq!(Dialect::SqlServer.quote("a]b[c"), "[a]]b[c]");
    }

    #[test]
    fn test_table_ref_default_schema_is_folded() {
        let table = TableRef::in_schema(Dialect::PostgreSQL, "public", "Orders");
        assert_eq!(table.schema, None);
        assert_eq!(table.display_name(), "Orders");
        assert_eq!(table.qualified(Dialect::PostgreSQL), "\"public\".\"Orders\"");

        let table = TableRef::in_schema(Dialect::SqlServer, "sales", "Orders");
        assert_eq!(table.display_name(), "sales.Orders");
        assert_eq!(table.qualified(Dialect::SqlServer), "[sales].[Orders]");
    }

    #[test]
    fn test_table_ref_ordering_puts_default_schema_first() {
        let mut tables = vec![
            TableRef::in_schema(Dialect::PostgreSQL, "audit", "a"),
            TableRef::new("b"),
            TableRef::new("a"),
        ];
        tables.sort();
        let names: Vec<String> = tables.iter().map(TableRef::display_name).collect();
        assert_eq!(names, vec!["a", "b", "audit.a"]);
    }

    #[test]
    fn test_referential_action_parsing() {
        assert_eq!(
            ReferentialAction::from_pg_code("n"),
            Some(ReferentialAction::SetNull)
        );
        assert_eq!(ReferentialAction::from_pg_code("x"), None);
        assert_eq!(
            ReferentialAction::from_description("SET_DEFAULT"),
            Some(ReferentialAction::SetDefault)
        );
        assert_eq!(
            ReferentialAction::from_description("no action"),
            Some(ReferentialAction::NoAction)
        );
    }

    #[test]
    fn test_standard_actions() {
        assert!(ReferentialAction::Cascade.is_standard());
        assert!(ReferentialAction::NoAction.is_standard());
        assert!(!ReferentialAction::SetNull.is_standard());
        assert!(!ReferentialAction::SetDefault.is_standard());
        assert!(!ReferentialAction::Restrict.is_standard());
    }

    #[test]
    fn test_referential_action_serializes_canonical_name() {
        let json = serde_json::to_string(&ReferentialAction::SetNull).unwrap();
        assert_eq!(json, "\"SET_NULL\"");
    }

    #[test]
    fn test_foreign_key_column_pairs() {
        let fk = ForeignKey {
            name: "fk_lines_orders".to_string(),
            table: TableRef::new("order_lines"),
            columns: vec!["order_id".to_string(), "region".to_string()],
            referenced_table: TableRef::new("orders"),
            referenced_columns: vec!["id".to_string(), "region".to_string()],
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::NoAction,
            is_enabled: true,
        };
        let pairs: Vec<_> = fk.column_pairs().collect();
        assert_eq!(pairs, vec![("order_id", "id"), ("region", "region")]);
        assert!(fk.covers("region"));
        assert!(!fk.covers("id"));
    }
}
