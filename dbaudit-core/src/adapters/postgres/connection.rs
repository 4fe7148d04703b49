//! PostgreSQL connection pool creation.

use super::PostgresBackend;
use crate::Result;
use crate::config::ConnectionConfig;
use crate::error::AuditError;
use crate::security::Credentials;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

/// PostgreSQL default port.
const DEFAULT_PORT: u16 = 5432;

impl PostgresBackend {
    /// Opens a pool to the target database and verifies it with one
    /// connection.
    ///
    /// # Security
    /// - Every pooled connection is switched to read-only mode when
    ///   `config.read_only` is set (the default)
    /// - `statement_timeout` is set from `config.query_timeout`
    /// - The password is passed straight to the driver and not stored
    ///
    /// # Errors
    /// Returns a connection error if the server is unreachable or rejects
    /// the credentials, or a configuration error if no database is given.
    pub async fn connect(config: &ConnectionConfig, credentials: &Credentials) -> Result<Self> {
        let database = config
            .database
            .as_deref()
            .filter(|db| !db.is_empty())
            .ok_or_else(|| AuditError::configuration("database name is required"))?;

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port.unwrap_or(DEFAULT_PORT))
            .username(credentials.username())
            .database(database)
            .application_name(concat!("dbaudit-", env!("CARGO_PKG_VERSION")));
        if let Some(password) = credentials.password() {
            options = options.password(password);
        }

        let pool = Self::create_connection_pool(options, config).await?;
        tracing::debug!("Connected to {}", config);

        Ok(Self {
            pool,
            config: config.clone(),
        })
    }

    /// Creates the pool and applies session settings to every connection.
    async fn create_connection_pool(
        options: PgConnectOptions,
        config: &ConnectionConfig,
    ) -> Result<PgPool> {
        use sqlx::Executor;

        let query_timeout_ms = config.query_timeout.as_millis();
        let read_only = config.read_only;

        PgPoolOptions::new()
            .max_connections(config.max_connections.clamp(1, 100))
            .min_connections(0)
            .acquire_timeout(config.connect_timeout)
            .test_before_acquire(true)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    conn.execute(format!("SET statement_timeout = {}", query_timeout_ms).as_str())
                        .await?;
                    conn.execute("SET lock_timeout = '30s'").await?;
                    if read_only {
                        conn.execute("SET default_transaction_read_only = on")
                            .await?;
                    }
                    conn.execute("SET timezone = 'UTC'").await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(AuditError::connection_failed)
    }

    /// Closes the pool; in-flight statements are abandoned.
    pub(crate) async fn close_pool(&self) {
        if !self.pool.is_closed() {
            self.pool.close().await;
            tracing::debug!("Closed connection pool for {}", self.config);
        }
    }
}
