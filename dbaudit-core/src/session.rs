//! Session boundary: one connection lifetime per audit invocation.
//!
//! [`audit`] is the single entry point. It validates the request before any
//! network activity, opens a backend through a [`Connector`], runs one check,
//! closes the backend on every path and writes the audit log line. Dropping
//! the returned future mid-flight drops the backend, which releases its
//! connections without a graceful close.

use crate::Result;
use crate::adapters::{self, AuditBackend};
use crate::audits::{self, AuditKind};
use crate::config::{AuditSettings, ConnectionConfig};
use crate::logging;
use crate::models::Dialect;
use crate::report::AuditReport;
use crate::request::{AuditRequest, ValidatedRequest};
use async_trait::async_trait;
use tracing::Instrument;
use uuid::Uuid;

/// Opens backends for validated requests.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connects with the request's credentials to the request's database.
    ///
    /// `settings` sizes the backend so it can serve the run's concurrency.
    ///
    /// # Errors
    /// Returns a connection error if the target cannot be reached.
    async fn connect(
        &self,
        request: &ValidatedRequest,
        settings: &AuditSettings,
    ) -> Result<Box<dyn AuditBackend>>;
}

/// Connector for a real engine at a fixed host.
#[derive(Debug, Clone)]
pub struct EngineConnector {
    /// Engine behind the host
    pub dialect: Dialect,
    /// Host, port and timeouts; database, user and pool size come from each
    /// request and its settings
    pub config: ConnectionConfig,
}

impl EngineConnector {
    /// Creates a connector for one engine at the configured host.
    pub fn new(dialect: Dialect, config: ConnectionConfig) -> Self {
        Self { dialect, config }
    }

    /// Connection config for one request, with one pooled connection per
    /// concurrent unit.
    pub fn config_for(&self, request: &ValidatedRequest, settings: &AuditSettings) -> ConnectionConfig {
        let pool_size = u32::try_from(settings.max_concurrency)
            .unwrap_or(u32::MAX)
            .clamp(1, 100);
        self.config
            .clone()
            .with_database(request.database.clone())
            .with_username(request.credentials.username().to_string())
            .with_max_connections(pool_size)
    }
}

#[async_trait]
impl Connector for EngineConnector {
    async fn connect(
        &self,
        request: &ValidatedRequest,
        settings: &AuditSettings,
    ) -> Result<Box<dyn AuditBackend>> {
        let config = self.config_for(request, settings);
        adapters::connect(self.dialect, &config, &request.credentials).await
    }
}

/// An open backend scoped to one audit.
pub struct AuditSession {
    backend: Box<dyn AuditBackend>,
}

impl AuditSession {
    /// Wraps an already open backend.
    pub fn new(backend: Box<dyn AuditBackend>) -> Self {
        Self { backend }
    }

    /// Opens a session for a validated request.
    ///
    /// # Errors
    /// Returns a connection error if the backend cannot be opened.
    pub async fn open(
        connector: &dyn Connector,
        request: &ValidatedRequest,
        settings: &AuditSettings,
    ) -> Result<Self> {
        let backend = connector.connect(request, settings).await?;
        tracing::debug!("Opened {} session", backend.dialect());
        Ok(Self::new(backend))
    }

    /// Runs one check and closes the backend whatever the outcome.
    pub async fn run(self, kind: AuditKind, settings: &AuditSettings) -> Result<AuditReport> {
        let outcome = audits::run_check(self.backend.as_ref(), kind, settings).await;
        self.backend.close().await;
        tracing::debug!("Closed session");
        outcome
    }
}

/// Runs one audit invocation end to end.
///
/// Validation failures return before the connector is used. Every call
/// writes exactly one audit log line.
///
/// # Errors
/// - `Validation` for missing user, password or database
/// - `Connection`, `Introspection`, `Timeout` or `InsufficientPrivileges`
///   when the audit cannot run at all
pub async fn audit(
    connector: &dyn Connector,
    request: &AuditRequest,
    settings: &AuditSettings,
) -> Result<AuditReport> {
    let span = tracing::info_span!("audit", run_id = %Uuid::new_v4(), check = request.check.slug());

    async {
        let outcome = match request.validate() {
            Ok(validated) => match AuditSession::open(connector, &validated, settings).await {
                Ok(session) => session.run(validated.check, settings).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        match &outcome {
            Ok(report) => logging::record_report(report),
            Err(e) => logging::record_failure(request.check, e),
        }
        outcome
    }
    .instrument(span)
    .await
}
