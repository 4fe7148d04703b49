//! Caller-facing response envelope.
//!
//! Callers always receive either a structured report or a structured error.
//! Server errors carry a fixed summary; driver messages never reach the
//! caller through this type.

use crate::error::AuditError;
use crate::report::{AuditReport, AuditStatus, UnitFailure};
use serde::{Deserialize, Serialize};

/// Summary returned for every connection or catalog failure.
pub const SERVER_ERROR_MESSAGE: &str = "Error querying the database";

/// Coarse outcome class, mapped to exit codes by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// The check ran; rows and failures are in the body
    Success,
    /// The request was rejected before contacting the database
    ClientError,
    /// Connection or catalog introspection failed
    ServerError,
}

impl ResponseKind {
    /// Process exit code for this outcome.
    pub fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::ServerError => 1,
            Self::ClientError => 2,
        }
    }
}

/// Response body for one audit invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuditResponse {
    /// The check ran; rows and failures are embedded
    Success {
        /// Summary of the check
        message: String,
        /// Outcome derived from rows and failures
        status: AuditStatus,
        /// Rows in report order
        result: Vec<serde_json::Value>,
        /// Units that could not be evaluated
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        failures: Vec<UnitFailure>,
    },
    /// The check could not run
    Error {
        /// Rejection reason or the generic server error
        message: String,
    },
}

impl AuditResponse {
    /// Builds the response for a finished invocation.
    pub fn from_outcome(outcome: &crate::Result<AuditReport>) -> Self {
        match outcome {
            Ok(report) => Self::from(report),
            Err(error) => Self::from(error),
        }
    }

    /// Outcome class of this response.
    pub fn kind(&self) -> ResponseKind {
        match self {
            Self::Success { .. } => ResponseKind::Success,
            Self::Error { message } if message == SERVER_ERROR_MESSAGE => ResponseKind::ServerError,
            Self::Error { .. } => ResponseKind::ClientError,
        }
    }

    /// Summary string shown to the caller.
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Error { message } => message,
        }
    }
}

impl From<&AuditReport> for AuditResponse {
    fn from(report: &AuditReport) -> Self {
        Self::Success {
            message: report.message.clone(),
            status: report.status,
            result: report.result.clone(),
            failures: report.failures.clone(),
        }
    }
}

impl From<&AuditError> for AuditResponse {
    fn from(error: &AuditError) -> Self {
        let message = if error.is_client_error() {
            error.to_string()
        } else {
            SERVER_ERROR_MESSAGE.to_string()
        };
        Self::Error { message }
    }
}
