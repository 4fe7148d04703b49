//! Report assembly.
//!
//! Collects typed result rows and per-unit failures, orders them by a sort
//! key independent of execution order, and derives the audit status.

use crate::Result;
use crate::audits::AuditKind;
use crate::error::AuditError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome class of one audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    /// Every unit was evaluated and nothing was found
    Clean,
    /// Every unit was evaluated and at least one row was produced
    Findings,
    /// Some units failed; the rows cover the rest
    Partial,
    /// There were units to evaluate and all of them failed
    Unevaluated,
}

impl AuditStatus {
    /// Derives the status from unit counts and the number of rows.
    pub fn derive(units_total: usize, units_failed: usize, rows: usize) -> Self {
        if units_failed > 0 && units_failed >= units_total {
            Self::Unevaluated
        } else if units_failed > 0 {
            Self::Partial
        } else if rows == 0 {
            Self::Clean
        } else {
            Self::Findings
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Clean => "clean",
            Self::Findings => "findings",
            Self::Partial => "partial",
            Self::Unevaluated => "unevaluated",
        })
    }
}

/// Ordering key of a row or failure: table first, then check-specific parts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey(Vec<String>);

impl SortKey {
    /// Starts a key with the table display name.
    pub fn table(table: impl Into<String>) -> Self {
        Self(vec![table.into()])
    }

    /// Appends a tiebreaker such as a constraint or column name.
    pub fn then(mut self, part: impl Into<String>) -> Self {
        self.0.push(part.into());
        self
    }
}

/// A unit that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitFailure {
    /// Table the failed statement ran against
    pub table_name: String,
    /// Constraint, for checks that evaluate one key per unit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint_name: Option<String>,
    /// Driver or timeout message
    pub error: String,
}

/// Normalized result of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Check that produced the report
    pub check: AuditKind,
    /// Human-readable summary of the check
    pub message: String,
    /// Outcome derived from rows and failures
    pub status: AuditStatus,
    /// Flat JSON records; shape depends on the check
    pub result: Vec<serde_json::Value>,
    /// Units that could not be evaluated, sorted like the rows
    pub failures: Vec<UnitFailure>,
    /// Units attempted, including failed ones
    pub units_total: usize,
    /// Units that produced a failure entry
    pub units_failed: usize,
    /// When the report was finished
    pub completed_at: DateTime<Utc>,
}

/// Incremental builder for an [`AuditReport`].
#[derive(Debug)]
pub struct ReportBuilder {
    check: AuditKind,
    rows: Vec<(SortKey, serde_json::Value)>,
    failures: Vec<(SortKey, UnitFailure)>,
    units_total: usize,
}

impl ReportBuilder {
    /// Creates an empty builder for one check.
    pub fn new(check: AuditKind) -> Self {
        Self {
            check,
            rows: Vec::new(),
            failures: Vec::new(),
            units_total: 0,
        }
    }

    /// Records how many units the check evaluated (or tried to).
    pub fn units(mut self, units_total: usize) -> Self {
        self.units_total = units_total;
        self
    }

    /// Adds one row.
    ///
    /// # Errors
    /// Returns a serialization error if the row cannot become JSON.
    pub fn push_row<R: Serialize>(&mut self, key: SortKey, row: &R) -> Result<()> {
        let value = serde_json::to_value(row).map_err(|e| AuditError::Serialization {
            context: format!("{} result row", self.check.slug()),
            source: e,
        })?;
        self.rows.push((key, value));
        Ok(())
    }

    /// Adds a failure entry for a unit.
    pub fn push_failure(
        &mut self,
        key: SortKey,
        table_name: String,
        constraint_name: Option<String>,
        error: &AuditError,
    ) {
        self.failures.push((
            key,
            UnitFailure {
                table_name,
                constraint_name,
                error: error.to_string(),
            },
        ));
    }

    /// Sorts rows and failures by key and computes the status.
    ///
    /// Sorting is stable, so rows sharing a key keep insertion order.
    pub fn finish(mut self) -> AuditReport {
        self.rows.sort_by(|a, b| a.0.cmp(&b.0));
        self.failures.sort_by(|a, b| a.0.cmp(&b.0));

        let units_failed = self.failures.len();
        let status = AuditStatus::derive(self.units_total, units_failed, self.rows.len());

        AuditReport {
            check: self.check,
            message: self.check.message().to_string(),
            status,
            result: self.rows.into_iter().map(|(_, row)| row).collect(),
            failures: self.failures.into_iter().map(|(_, f)| f).collect(),
            units_total: self.units_total,
            units_failed,
            completed_at: Utc::now(),
        }
    }
}
