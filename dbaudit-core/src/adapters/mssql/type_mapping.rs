//! SQL Server type and action decoding.

use crate::Result;
use crate::error::AuditError;
use crate::models::{ReferentialAction, StorageClass};

/// Types SQL Server refuses to compare or group by.
const UNGROUPABLE_TYPES: &[&str] = &["text", "ntext", "image", "xml", "geometry", "geography"];

/// Classifies a column type for full-row grouping.
pub fn storage_class(base_type: &str) -> StorageClass {
    if UNGROUPABLE_TYPES
        .iter()
        .any(|t| t.eq_ignore_ascii_case(base_type))
    {
        StorageClass::LargeObject
    } else {
        StorageClass::Scalar
    }
}

/// Decodes a `*_referential_action_desc` value.
///
/// # Errors
/// Returns `UnsupportedFeature` for descriptions this build does not know.
pub fn referential_action(description: &str) -> Result<ReferentialAction> {
    ReferentialAction::from_description(description).ok_or_else(|| {
        AuditError::unsupported_feature(
            format!("referential action '{}'", description),
            "SQL Server",
        )
    })
}
