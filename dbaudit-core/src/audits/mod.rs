//! The nine audit checks.
//!
//! Checks 1, 2, 3 and 6 evaluate per table or per constraint; 4, 5, 7, 8
//! and 9 are computed from catalog metadata alone. All of them return the
//! same [`AuditReport`] shape.
//!
//! # Module Structure
//! - `per_table`: orphans, duplicates, constraint re-validation, primary keys
//! - `catalog_checks`: referential actions, nullable keys, triggers,
//!   naming-implied relations, declared keys
//! - `rows`: typed result rows

mod catalog_checks;
mod per_table;
pub mod rows;

use crate::Result;
use crate::adapters::AuditBackend;
use crate::catalog::CatalogIntrospector;
use crate::config::AuditSettings;
use crate::error::AuditError;
use crate::report::AuditReport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the nine checks, numbered 1 to 9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditKind {
    /// 1: rows whose foreign key points at nothing
    Orphans,
    /// 2: groups of identical rows
    Duplicates,
    /// 3: declared foreign keys that existing data violates
    ConstraintViolations,
    /// 4: delete/update actions other than CASCADE or NO_ACTION
    ReferentialActions,
    /// 5: nullable foreign-key columns
    NullableForeignKeys,
    /// 6: tables without a primary key
    MissingPrimaryKeys,
    /// 7: triggers that modify rows
    TriggerRelations,
    /// 8: columns named like foreign keys without a constraint
    ImpliedRelations,
    /// 9: every declared foreign key
    DeclaredForeignKeys,
}

impl AuditKind {
    /// All checks in numeric order.
    pub const ALL: [Self; 9] = [
        Self::Orphans,
        Self::Duplicates,
        Self::ConstraintViolations,
        Self::ReferentialActions,
        Self::NullableForeignKeys,
        Self::MissingPrimaryKeys,
        Self::TriggerRelations,
        Self::ImpliedRelations,
        Self::DeclaredForeignKeys,
    ];

    /// Check number, 1 to 9.
    pub fn number(self) -> u8 {
        match self {
            Self::Orphans => 1,
            Self::Duplicates => 2,
            Self::ConstraintViolations => 3,
            Self::ReferentialActions => 4,
            Self::NullableForeignKeys => 5,
            Self::MissingPrimaryKeys => 6,
            Self::TriggerRelations => 7,
            Self::ImpliedRelations => 8,
            Self::DeclaredForeignKeys => 9,
        }
    }

    /// Looks a check up by number.
    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.number() == number)
    }

    /// Kebab-case name used on the command line and in logs.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Orphans => "orphans",
            Self::Duplicates => "duplicates",
            Self::ConstraintViolations => "constraint-violations",
            Self::ReferentialActions => "referential-actions",
            Self::NullableForeignKeys => "nullable-foreign-keys",
            Self::MissingPrimaryKeys => "missing-primary-keys",
            Self::TriggerRelations => "trigger-relations",
            Self::ImpliedRelations => "implied-relations",
            Self::DeclaredForeignKeys => "declared-foreign-keys",
        }
    }

    /// Human-readable summary attached to every report of this check.
    pub fn message(self) -> &'static str {
        match self {
            Self::Orphans => "Orphaned data anomaly check",
            Self::Duplicates => "Duplicate rows anomaly check",
            Self::ConstraintViolations => "Foreign key compliance check",
            Self::ReferentialActions => {
                "Referential integrity definition check for delete and update"
            }
            Self::NullableForeignKeys => "Referential integrity definition check for insert",
            Self::MissingPrimaryKeys => "Primary key definition check",
            Self::TriggerRelations => "Possible relationships (triggers)",
            Self::ImpliedRelations => "Relationships that should exist",
            Self::DeclaredForeignKeys => "Existing relationships (foreign keys)",
        }
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for AuditKind {
    type Err = AuditError;

    /// Accepts a check number (`"1"`..`"9"`) or a slug (`"orphans"`).
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let found = match s.parse::<u8>() {
            Ok(number) => Self::from_number(number),
            Err(_) => Self::ALL
                .into_iter()
                .find(|k| k.slug().eq_ignore_ascii_case(s)),
        };
        found.ok_or_else(|| {
            AuditError::configuration(format!(
                "unknown check '{}': expected 1-9 or one of {}",
                s,
                Self::ALL.map(Self::slug).join(", ")
            ))
        })
    }
}

/// Runs one check against an open backend.
///
/// # Errors
/// Returns an error only for fatal conditions: invalid settings, or a
/// catalog read that fails or times out. Per-unit failures are embedded in
/// the report.
pub async fn run_check(
    backend: &dyn AuditBackend,
    kind: AuditKind,
    settings: &AuditSettings,
) -> Result<AuditReport> {
    settings.validate()?;
    tracing::info!(check = kind.slug(), "Running audit check {}", kind.number());

    let catalog = CatalogIntrospector::new(backend, settings.introspection_timeout);
    let report = match kind {
        AuditKind::Orphans => per_table::orphans(&catalog, backend, settings).await?,
        AuditKind::Duplicates => per_table::duplicates(&catalog, backend, settings).await?,
        AuditKind::ConstraintViolations => {
            per_table::constraint_violations(&catalog, backend, settings).await?
        }
        AuditKind::MissingPrimaryKeys => per_table::missing_primary_keys(&catalog).await?,
        AuditKind::ReferentialActions => catalog_checks::referential_actions(&catalog).await?,
        AuditKind::NullableForeignKeys => catalog_checks::nullable_foreign_keys(&catalog).await?,
        AuditKind::TriggerRelations => catalog_checks::trigger_relations(&catalog).await?,
        AuditKind::ImpliedRelations => {
            catalog_checks::implied_relations(&catalog, &settings.foreign_key_suffix).await?
        }
        AuditKind::DeclaredForeignKeys => catalog_checks::declared_foreign_keys(&catalog).await?,
    };

    tracing::info!(
        check = kind.slug(),
        status = %report.status,
        rows = report.result.len(),
        failed = report.units_failed,
        "Audit check {} finished",
        kind.number()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_round_trip() {
        for kind in AuditKind::ALL {
            assert_eq!(AuditKind::from_number(kind.number()), Some(kind));
        }
        assert_eq!(AuditKind::from_number(0), None);
        assert_eq!(AuditKind::from_number(10), None);
    }

    #[test]
    fn test_parse_number_or_slug() {
        assert_eq!("1".parse::<AuditKind>().unwrap(), AuditKind::Orphans);
        assert_eq!("6".parse::<AuditKind>().unwrap(), AuditKind::MissingPrimaryKeys);
        assert_eq!(
            "Referential-Actions".parse::<AuditKind>().unwrap(),
            AuditKind::ReferentialActions
        );
        assert!("12".parse::<AuditKind>().is_err());
        assert!("orphan".parse::<AuditKind>().is_err());
    }

    #[test]
    fn test_serialized_name_matches_slug() {
        for kind in AuditKind::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.slug());
        }
    }
}
