//! Schema integrity audit tool.
//!
//! This binary connects to a relational database with the caller's
//! credentials, runs one or all of the nine integrity checks and prints
//! the JSON response on stdout.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - No credentials stored or logged
//! - Connection and catalog failures are reported without driver detail

use clap::{Args, Parser, Subcommand, ValueEnum};
use dbaudit_core::{
    AuditError, AuditKind, AuditRequest, AuditResponse, AuditSettings, ConnectionConfig,
    Connector, Dialect, EngineConnector, ResponseKind, Result, audit,
    error::redact_database_url,
    logging::{DEFAULT_AUDIT_LOG, init_logging},
    security::parse_database_url,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

/// Exit code after Ctrl-C, as a shell reports SIGINT.
const INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "dbaudit")]
#[command(about = "Schema integrity audit tool")]
#[command(version)]
#[command(long_about = "
dbaudit - Structural and content integrity audits for relational schemas

Reads the catalog of a database it has never seen and reports:
  1 orphans                 Rows whose foreign key has no referenced row
  2 duplicates              Fully duplicated rows per table
  3 constraint-violations   Declared foreign keys violated by existing rows
  4 referential-actions     Foreign keys with unusual delete/update actions
  5 nullable-foreign-keys   Nullable foreign-key columns
  6 missing-primary-keys    Tables without a primary key
  7 trigger-relations       Triggers that write to other rows
  8 implied-relations       Columns named like undeclared foreign keys
  9 declared-foreign-keys   Every declared foreign-key column pair

SECURITY FEATURES:
- Read-only operations only
- No credentials stored or logged
- Append-only audit log of every invocation

EXAMPLES:
  dbaudit --user auditor --prompt-password --database sales run orphans
  dbaudit --database-url postgres://auditor@db.internal/sales --prompt-password all
  DBAUDIT_ENGINE=mssql dbaudit --user sa --password secret --database shop run 3
")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(flatten)]
    target: TargetArgs,

    #[command(flatten)]
    tuning: TuningArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one check, by number (1-9) or name
    Run {
        #[arg(value_parser = parse_check)]
        check: AuditKind,
    },
    /// Run all nine checks in order
    All,
    /// Test the database connection
    Test,
    /// List the checks and supported engines
    List,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Engine {
    Postgres,
    Mssql,
}

impl From<Engine> for Dialect {
    fn from(engine: Engine) -> Self {
        match engine {
            Engine::Postgres => Self::PostgreSQL,
            Engine::Mssql => Self::SqlServer,
        }
    }
}

#[derive(Args)]
struct TargetArgs {
    /// Database connection URL; discrete flags override its parts
    #[arg(long, env = "DBAUDIT_DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Database engine
    #[arg(long, env = "DBAUDIT_ENGINE", value_enum, default_value = "postgres")]
    engine: Engine,

    /// Database host
    #[arg(long, env = "DBAUDIT_HOST")]
    host: Option<String>,

    /// Database port (engine default when omitted)
    #[arg(long, env = "DBAUDIT_PORT")]
    port: Option<u16>,

    /// User to connect as
    #[arg(short = 'U', long, env = "DBAUDIT_USER")]
    user: Option<String>,

    /// Password of the user
    #[arg(long, env = "DBAUDIT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Read the password from the terminal
    #[arg(long, conflicts_with = "password")]
    prompt_password: bool,

    /// Database whose schema is audited
    #[arg(short = 'd', long, env = "DBAUDIT_DATABASE")]
    database: Option<String>,

    /// Accept self-signed server certificates (SQL Server)
    #[arg(long, env = "DBAUDIT_TRUST_SERVER_CERTIFICATE")]
    trust_server_certificate: bool,
}

#[derive(Args)]
struct TuningArgs {
    /// Maximum number of per-table statements in flight
    #[arg(long, env = "DBAUDIT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Seconds allowed for each per-table statement
    #[arg(long, env = "DBAUDIT_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Seconds allowed for each catalog read
    #[arg(long, env = "DBAUDIT_CATALOG_TIMEOUT", default_value_t = 30)]
    catalog_timeout: u64,

    /// Seconds allowed to establish the connection
    #[arg(long, env = "DBAUDIT_CONNECT_TIMEOUT", default_value_t = 30)]
    connect_timeout: u64,

    /// Column-name suffix that marks a probable foreign key
    #[arg(long, env = "DBAUDIT_FK_SUFFIX", default_value = "_id")]
    fk_suffix: String,
}

#[derive(Args)]
struct GlobalArgs {
    /// Increase verbosity
    #[arg(
        short,
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    verbose: u8,

    /// Suppress output
    #[arg(short, long, global = true, help = "Suppress all output except errors")]
    quiet: bool,

    /// Append-only audit log file
    #[arg(long, env = "DBAUDIT_AUDIT_LOG", default_value = DEFAULT_AUDIT_LOG)]
    audit_log: PathBuf,

    /// Do not write the audit log file
    #[arg(long)]
    no_audit_log: bool,
}

fn parse_check(value: &str) -> std::result::Result<AuditKind, String> {
    value.parse::<AuditKind>().map_err(|e| e.to_string())
}

/// Connection target and request resolved from flags, env and URL.
struct Target {
    connector: EngineConnector,
    user: Option<String>,
    password: Option<Zeroizing<String>>,
    database: Option<String>,
}

impl Target {
    fn request(&self, check: AuditKind) -> AuditRequest {
        AuditRequest {
            user: self.user.clone(),
            password: self.password.clone(),
            database: self.database.clone(),
            check,
        }
    }
}

fn resolve_target(args: &TargetArgs, tuning: &TuningArgs) -> Result<Target> {
    let (dialect, mut config, url_user, url_password) = match &args.database_url {
        Some(url) => {
            info!("Target: {}", redact_database_url(url));
            let parsed = parse_database_url(url)?;
            let (user, password) = match &parsed.credentials {
                Some(c) => (
                    Some(c.username().to_string()),
                    c.password().map(|p| Zeroizing::new(p.to_string())),
                ),
                None => (None, None),
            };
            (parsed.dialect, parsed.config, user, password)
        }
        None => (
            Dialect::from(args.engine),
            ConnectionConfig::default(),
            None,
            None,
        ),
    };

    if let Some(host) = &args.host {
        config.host = host.clone();
    }
    if let Some(port) = args.port {
        config = config.with_port(port);
    }
    let trust_server_certificate = args.trust_server_certificate || config.trust_server_certificate;
    config = config
        .with_trust_server_certificate(trust_server_certificate)
        .with_query_timeout(Duration::from_secs(tuning.timeout));
    config.connect_timeout = Duration::from_secs(tuning.connect_timeout);

    let password = if args.prompt_password {
        let entered = rpassword::prompt_password("Password: ").map_err(|e| AuditError::Io {
            context: "Failed to read password".to_string(),
            source: e,
        })?;
        Some(Zeroizing::new(entered))
    } else {
        args.password.clone().map(Zeroizing::new).or(url_password)
    };

    Ok(Target {
        user: args.user.clone().or(url_user),
        password,
        database: args.database.clone().or_else(|| config.database.clone()),
        connector: EngineConnector::new(dialect, config),
    })
}

fn settings(tuning: &TuningArgs) -> AuditSettings {
    AuditSettings::default()
        .with_max_concurrency(tuning.concurrency)
        .with_unit_timeout(Duration::from_secs(tuning.timeout))
        .with_introspection_timeout(Duration::from_secs(tuning.catalog_timeout))
        .with_foreign_key_suffix(tuning.fk_suffix.clone())
}

/// One entry of the `all` output.
#[derive(Serialize)]
struct CheckOutcome {
    check: AuditKind,
    #[serde(flatten)]
    response: AuditResponse,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| AuditError::Serialization {
        context: "response".to_string(),
        source: e,
    })?;
    println!("{}", json);
    Ok(())
}

/// Worst outcome across several checks; server errors outrank client errors.
fn combined_kind(kinds: &[ResponseKind]) -> ResponseKind {
    if kinds.contains(&ResponseKind::ServerError) {
        ResponseKind::ServerError
    } else if kinds.contains(&ResponseKind::ClientError) {
        ResponseKind::ClientError
    } else {
        ResponseKind::Success
    }
}

async fn run_one(target: &Target, check: AuditKind, settings: &AuditSettings) -> Result<ResponseKind> {
    let outcome = audit(&target.connector, &target.request(check), settings).await;
    let response = AuditResponse::from_outcome(&outcome);
    print_json(&response)?;
    Ok(response.kind())
}

async fn run_all(target: &Target, settings: &AuditSettings) -> Result<ResponseKind> {
    let mut outcomes = Vec::with_capacity(AuditKind::ALL.len());
    for check in AuditKind::ALL {
        let outcome = audit(&target.connector, &target.request(check), settings).await;
        let response = AuditResponse::from_outcome(&outcome);
        let rejected = response.kind() == ResponseKind::ClientError;
        outcomes.push(CheckOutcome { check, response });
        // Every remaining check would be rejected for the same reason
        if rejected {
            break;
        }
    }

    print_json(&outcomes)?;
    let kinds: Vec<ResponseKind> = outcomes.iter().map(|o| o.response.kind()).collect();
    Ok(combined_kind(&kinds))
}

/// Tests the database connection without running a check
async fn test_connection(target: &Target, settings: &AuditSettings) -> Result<ResponseKind> {
    info!("Testing database connection...");

    let validated = target.request(AuditKind::Orphans).validate()?;
    let backend = target.connector.connect(&validated, settings).await.map_err(|e| {
        error!("Failed to connect: {}", e);
        e
    })?;

    let outcome = backend.test_connection().await;
    backend.close().await;
    outcome.map_err(|e| {
        error!("Connection test failed: {}", e);
        e
    })?;

    info!("Connection test successful");
    println!(
        "Connection to {} database successful",
        target.connector.dialect
    );
    Ok(ResponseKind::Success)
}

/// Lists the checks and the engines compiled into this build
fn list_checks() {
    println!("Checks:");
    for check in AuditKind::ALL {
        println!("  {} {:<24} {}", check.number(), check.slug(), check.message());
    }
    println!();
    println!("Supported Database Engines:");

    #[cfg(feature = "postgresql")]
    {
        println!("  PostgreSQL:  --engine postgres  or  postgres://user@host:5432/database");
    }

    #[cfg(feature = "mssql")]
    {
        println!("  SQL Server:  --engine mssql     or  mssql://user@host:1433/database");
    }
}

async fn execute(cli: &Cli) -> Result<ResponseKind> {
    if matches!(cli.command, Command::List) {
        list_checks();
        return Ok(ResponseKind::Success);
    }

    let target = resolve_target(&cli.target, &cli.tuning)?;
    let settings = settings(&cli.tuning);
    settings.validate()?;

    match &cli.command {
        Command::Run { check } => run_one(&target, *check, &settings).await,
        Command::All => run_all(&target, &settings).await,
        Command::Test => test_connection(&target, &settings).await,
        Command::List => Ok(ResponseKind::Success),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let audit_log = (!cli.global.no_audit_log).then_some(cli.global.audit_log.as_path());
    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet, audit_log) {
        eprintln!("Error: {}", e);
        return ExitCode::from(ResponseKind::ServerError.exit_code());
    }

    tokio::select! {
        outcome = execute(&cli) => match outcome {
            Ok(kind) => ExitCode::from(kind.exit_code()),
            Err(e) => {
                error!("{}", e);
                let kind = if e.is_client_error() {
                    ResponseKind::ClientError
                } else {
                    ResponseKind::ServerError
                };
                ExitCode::from(kind.exit_code())
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted; in-flight statements abandoned");
            ExitCode::from(INTERRUPTED)
        }
    }
}
