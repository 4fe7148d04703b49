//! Per-run audit settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on concurrently executing per-table statements.
pub const MAX_CONCURRENCY: usize = 64;

/// Settings that shape one audit run.
///
/// # Example
/// ```rust
/// use dbaudit_core::config::AuditSettings;
/// use std::time::Duration;
///
/// let settings = AuditSettings::default()
///     .with_max_concurrency(8)
///     .with_unit_timeout(Duration::from_secs(10))
///     .with_foreign_key_suffix("Id");
///
/// assert!(settings.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSettings {
    /// Maximum number of per-table statements in flight
    pub max_concurrency: usize,
    /// Time limit for one per-table statement; expiry fails only that unit
    pub unit_timeout: Duration,
    /// Time limit for each catalog read; expiry aborts the audit
    pub introspection_timeout: Duration,
    /// Column-name suffix marking a probable foreign-key column
    pub foreign_key_suffix: String,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            unit_timeout: Duration::from_secs(30),
            introspection_timeout: Duration::from_secs(30),
            foreign_key_suffix: "_id".to_string(),
        }
    }
}

impl AuditSettings {
    /// Validates the settings.
    ///
    /// # Errors
    /// Returns a configuration error if any value is out of range
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::AuditError;

        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY {
            return Err(AuditError::configuration(format!(
                "max_concurrency must be between 1 and {}",
                MAX_CONCURRENCY
            )));
        }

        if self.unit_timeout.is_zero() {
            return Err(AuditError::configuration(
                "unit_timeout must be greater than 0",
            ));
        }

        if self.introspection_timeout.is_zero() {
            return Err(AuditError::configuration(
                "introspection_timeout must be greater than 0",
            ));
        }

        if self.foreign_key_suffix.is_empty() {
            return Err(AuditError::configuration(
                "foreign_key_suffix cannot be empty",
            ));
        }

        Ok(())
    }

    /// Builder method to set the worker bound.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Builder method to set the per-unit timeout.
    pub fn with_unit_timeout(mut self, timeout: Duration) -> Self {
        self.unit_timeout = timeout;
        self
    }

    /// Builder method to set the catalog read timeout.
    pub fn with_introspection_timeout(mut self, timeout: Duration) -> Self {
        self.introspection_timeout = timeout;
        self
    }

    /// Builder method to set the foreign-key naming suffix.
    pub fn with_foreign_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.foreign_key_suffix = suffix.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = AuditSettings::default();
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.unit_timeout, Duration::from_secs(30));
        assert_eq!(settings.foreign_key_suffix, "_id");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_concurrency_bounds() {
        assert!(AuditSettings::default().with_max_concurrency(0).validate().is_err());
        assert!(AuditSettings::default().with_max_concurrency(1).validate().is_ok());
        assert!(AuditSettings::default().with_max_concurrency(64).validate().is_ok());
        assert!(AuditSettings::default().with_max_concurrency(65).validate().is_err());
    }

    #[test]
    fn test_empty_suffix_rejected() {
        let settings = AuditSettings::default().with_foreign_key_suffix("");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        assert!(
            AuditSettings::default()
                .with_unit_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
        assert!(
            AuditSettings::default()
                .with_introspection_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
