//! TDS connection setup and teardown.

use super::SqlServerBackend;
use crate::Result;
use crate::config::ConnectionConfig;
use crate::error::AuditError;
use crate::security::Credentials;
use tiberius::{AuthMethod, Client, Config};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::TokioAsyncWriteCompatExt;

/// SQL Server default port.
const DEFAULT_PORT: u16 = 1433;

impl SqlServerBackend {
    /// Opens one TDS connection to the target database.
    ///
    /// # Security
    /// - Requests a read-only application intent when `config.read_only` is set
    /// - The password is passed straight to the driver and not stored
    ///
    /// # Errors
    /// Returns a connection error if the server is unreachable, the login
    /// fails, or `config.connect_timeout` expires first.
    pub async fn connect(config: &ConnectionConfig, credentials: &Credentials) -> Result<Self> {
        let database = config
            .database
            .as_deref()
            .filter(|db| !db.is_empty())
            .ok_or_else(|| AuditError::configuration("database name is required"))?;

        let mut tiberius_config = Config::new();
        tiberius_config.host(&config.host);
        tiberius_config.port(config.port.unwrap_or(DEFAULT_PORT));
        tiberius_config.database(database);
        tiberius_config.application_name(concat!("dbaudit-", env!("CARGO_PKG_VERSION")));
        tiberius_config.readonly(config.read_only);
        tiberius_config.authentication(AuthMethod::sql_server(
            credentials.username(),
            credentials.password().unwrap_or_default(),
        ));
        if config.trust_server_certificate {
            tiberius_config.trust_cert();
        }

        let client = tokio::time::timeout(config.connect_timeout, async move {
            let tcp = TcpStream::connect(tiberius_config.get_addr())
                .await
                .map_err(AuditError::connection_failed)?;
            tcp.set_nodelay(true).map_err(AuditError::connection_failed)?;

            let mut client = Client::connect(tiberius_config, tcp.compat_write())
                .await
                .map_err(AuditError::connection_failed)?;

            let lock_timeout_ms = config.query_timeout.as_millis();
            client
                .simple_query(format!("SET LOCK_TIMEOUT {}", lock_timeout_ms))
                .await
                .map_err(AuditError::connection_failed)?
                .into_results()
                .await
                .map_err(AuditError::connection_failed)?;

            Ok::<_, AuditError>(client)
        })
        .await
        .map_err(|_| AuditError::timeout("SQL Server connection", config.connect_timeout))??;

        tracing::debug!("Connected to {}", config);

        Ok(Self {
            client: Mutex::new(Some(client)),
            config: config.clone(),
        })
    }

    /// Sends a graceful close; later calls are no-ops.
    pub(crate) async fn disconnect(&self) {
        let client = self.client.lock().await.take();
        if let Some(client) = client {
            if let Err(e) = client.close().await {
                tracing::debug!("SQL Server connection closed with error: {}", e);
            } else {
                tracing::debug!("Closed SQL Server connection for {}", self.config);
            }
        }
    }
}
