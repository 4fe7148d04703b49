//! Audit request parsing and validation.
//!
//! A request is checked before anything touches the network: a missing or
//! empty user, password or database is a client error.

use crate::audits::AuditKind;
use crate::error::AuditError;
use crate::security::Credentials;
use std::fmt;
use zeroize::Zeroizing;

/// One audit request as received from a caller.
#[derive(Clone)]
pub struct AuditRequest {
    /// Credential principal
    pub user: Option<String>,
    /// Credential secret
    pub password: Option<Zeroizing<String>>,
    /// Target database whose schema is audited
    pub database: Option<String>,
    /// Which of the nine checks to run
    pub check: AuditKind,
}

/// A request whose required parameters are all present.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    /// User and password for this audit only
    pub credentials: Credentials,
    /// Database to audit; never empty
    pub database: String,
    /// Check to run
    pub check: AuditKind,
}

impl AuditRequest {
    /// Creates a request for one check with no parameters set.
    pub fn new(check: AuditKind) -> Self {
        Self {
            user: None,
            password: None,
            database: None,
            check,
        }
    }

    /// Builder method to set the user.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Builder method to set the password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(Zeroizing::new(password.into()));
        self
    }

    /// Builder method to set the database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Checks that user, password and database are present and non-empty.
    ///
    /// # Errors
    /// Returns `AuditError::Validation` naming every missing parameter.
    ///
    /// # Example
    /// ```rust
    /// use dbaudit_core::audits::AuditKind;
    /// use dbaudit_core::request::AuditRequest;
    ///
    /// let err = AuditRequest::new(AuditKind::Orphans)
    ///     .with_user("auditor")
    ///     .validate()
    ///     .unwrap_err();
    /// assert_eq!(err.to_string(), "Missing parameters: password, database");
    /// ```
    pub fn validate(&self) -> crate::Result<ValidatedRequest> {
        let present = |value: Option<&str>| value.is_some_and(|v| !v.trim().is_empty());

        let mut missing = Vec::new();
        if !present(self.user.as_deref()) {
            missing.push("user");
        }
        if !present(self.password.as_deref().map(String::as_str)) {
            missing.push("password");
        }
        if !present(self.database.as_deref()) {
            missing.push("database");
        }

        match (&self.user, &self.password, &self.database) {
            (Some(user), Some(password), Some(database)) if missing.is_empty() => {
                Ok(ValidatedRequest {
                    credentials: Credentials::new(
                        user.clone(),
                        Some(password.as_str().to_string()),
                    ),
                    database: database.clone(),
                    check: self.check,
                })
            }
            _ => Err(AuditError::missing_parameters(missing)),
        }
    }
}

impl fmt::Debug for AuditRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuditRequest")
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "****"))
            .field("database", &self.database)
            .field("check", &self.check)
            .finish()
    }
}
