//! PostgreSQL type and action decoding.

use crate::Result;
use crate::error::AuditError;
use crate::models::{ReferentialAction, StorageClass};

/// Types without a default equality operator, which cannot be grouped.
const UNGROUPABLE_TYPES: &[&str] = &["json", "xml", "point", "line", "lseg", "box", "path", "polygon", "circle"];

/// Classifies a column type for full-row grouping.
///
/// # Arguments
/// * `base_type` - `pg_type.typname` of the column, or of the element type for
///   arrays and the base type for domains
/// * `category` - `pg_type.typcategory` of the same type
pub fn storage_class(base_type: &str, category: &str) -> StorageClass {
    if category == "G" || UNGROUPABLE_TYPES.contains(&base_type) {
        StorageClass::LargeObject
    } else {
        StorageClass::Scalar
    }
}

/// Decodes a `pg_constraint.confdeltype`/`confupdtype` code.
///
/// # Errors
/// Returns `UnsupportedFeature` for codes this build does not know.
pub fn referential_action(code: &str) -> Result<ReferentialAction> {
    ReferentialAction::from_pg_code(code).ok_or_else(|| {
        AuditError::unsupported_feature(format!("referential action code '{}'", code), "PostgreSQL")
    })
}
