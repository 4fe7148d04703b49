//! Logging setup and the audit log.
//!
//! Diagnostics go to stderr at the verbosity chosen on the command line.
//! Audit log lines are ordinary `tracing` events on [`AUDIT_LOG_TARGET`];
//! when a log file is configured they are appended there with a timestamp
//! and level, one line per invocation.

use crate::Result;
use crate::audits::AuditKind;
use crate::error::AuditError;
use crate::report::AuditReport;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::*;

/// Target of audit log events.
pub const AUDIT_LOG_TARGET: &str = "dbaudit::audit_log";

/// Default location of the append-only audit log.
pub const DEFAULT_AUDIT_LOG: &str = "logs/dbaudit.log";

fn verbosity_level(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes logging based on verbosity level.
///
/// # Arguments
/// * `verbose` - Verbosity level (0=INFO, 1=DEBUG, 2+=TRACE)
/// * `quiet` - If true, only show ERROR level logs
/// * `audit_log` - File that receives audit log lines, created if missing
///
/// # Errors
/// Returns an error if the audit log cannot be opened or a global
/// subscriber is already installed.
///
/// # Example
/// ```rust,no_run
/// use dbaudit_core::logging::init_logging;
/// use std::path::Path;
///
/// init_logging(1, false, Some(Path::new("logs/dbaudit.log"))).expect("Failed to initialize logging");
/// ```
pub fn init_logging(verbose: u8, quiet: bool, audit_log: Option<&Path>) -> Result<()> {
    let level = verbosity_level(verbose, quiet);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(filter_fn(move |meta| {
            meta.target() != AUDIT_LOG_TARGET && *meta.level() <= level
        }));

    let file_layer = match audit_log {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| AuditError::Io {
                    context: format!("Failed to create log directory {}", parent.display()),
                    source: e,
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| AuditError::Io {
                    context: format!("Failed to open audit log {}", path.display()),
                    source: e,
                })?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(Mutex::new(file))
                    .with_ansi(false)
                    .with_target(false)
                    .with_filter(filter_fn(|meta| meta.target() == AUDIT_LOG_TARGET)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| AuditError::configuration(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Appends the audit log line for a completed check.
pub fn record_report(report: &AuditReport) {
    let result = serde_json::to_string(&report.result).unwrap_or_default();
    tracing::info!(
        target: AUDIT_LOG_TARGET,
        check = report.check.slug(),
        status = %report.status,
        failed = report.units_failed,
        "{}: {}",
        report.message,
        result
    );
}

/// Appends the audit log line for a check that could not run.
pub fn record_failure(check: AuditKind, error: &AuditError) {
    let summary = if error.is_client_error() {
        "Rejected request"
    } else {
        "Error querying the database"
    };
    tracing::error!(
        target: AUDIT_LOG_TARGET,
        check = check.slug(),
        "{}: {}",
        summary,
        error
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    // Logging can only be initialized once per test process, so the
    // subscriber itself is not installed here.

    #[test]
    fn test_verbosity_levels() {
        let test_cases = [
            ((true, 0), tracing::Level::ERROR),
            ((true, 5), tracing::Level::ERROR),
            ((false, 0), tracing::Level::INFO),
            ((false, 1), tracing::Level::DEBUG),
            ((false, 2), tracing::Level::TRACE),
            ((false, 10), tracing::Level::TRACE),
        ];

        for ((quiet, verbose), expected) in test_cases {
            assert_eq!(
                verbosity_level(verbose, quiet),
                expected,
                "Failed for quiet={}, verbose={}",
                quiet,
                verbose
            );
        }
    }
}
