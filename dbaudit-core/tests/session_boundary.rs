//! Session boundary: validation, connection lifetime and caller envelope.

mod common;

use common::{MockBackend, MockConnector, fk};
use dbaudit_core::logging::AUDIT_LOG_TARGET;
use dbaudit_core::response::SERVER_ERROR_MESSAGE;
use dbaudit_core::{
    AuditError, AuditKind, AuditRequest, AuditResponse, AuditSettings, ResponseKind, audit,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::prelude::*;

/// Records the level of every event on the audit log target.
#[derive(Clone, Default)]
struct AuditLogCapture {
    levels: Arc<Mutex<Vec<Level>>>,
}

impl AuditLogCapture {
    fn levels(&self) -> Vec<Level> {
        self.levels.lock().unwrap().clone()
    }
}

impl<S: Subscriber> Layer<S> for AuditLogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() == AUDIT_LOG_TARGET {
            self.levels.lock().unwrap().push(*event.metadata().level());
        }
    }
}

/// Runs one audit on a current-thread runtime with the capture installed.
fn audit_log_levels(connector: &MockConnector, request: &AuditRequest) -> Vec<Level> {
    let capture = AuditLogCapture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    tracing::subscriber::with_default(subscriber, || {
        let _ = runtime.block_on(audit(connector, request, &AuditSettings::default()));
    });
    capture.levels()
}

fn request(check: AuditKind) -> AuditRequest {
    AuditRequest::new(check)
        .with_user("auditor")
        .with_password("s3cret")
        .with_database("shop")
}

fn shop() -> MockBackend {
    MockBackend::default()
        .table("Customers")
        .column("Customers", "id")
        .primary_key("Customers", &["id"])
        .table("Orders")
        .column("Orders", "id")
        .nullable_column("Orders", "customer_id")
        .foreign_key(fk("fk_orders_customers", "Orders", "customer_id", "Customers", "id"))
}

#[tokio::test]
async fn test_missing_password_rejected_before_connecting() {
    let connector = MockConnector::new(shop());
    let request = AuditRequest::new(AuditKind::Orphans)
        .with_user("auditor")
        .with_database("shop");

    let outcome = audit(&connector, &request, &AuditSettings::default()).await;

    assert_eq!(connector.attempts(), 0);
    assert!(matches!(outcome, Err(AuditError::Validation { .. })));

    let response = AuditResponse::from_outcome(&outcome);
    assert_eq!(response.kind(), ResponseKind::ClientError);
    assert_eq!(response.message(), "Missing parameters: password");
}

#[tokio::test]
async fn test_blank_parameters_are_missing() {
    let connector = MockConnector::new(shop());
    let request = AuditRequest::new(AuditKind::Duplicates)
        .with_user("  ")
        .with_password("")
        .with_database("shop");

    let outcome = audit(&connector, &request, &AuditSettings::default()).await;

    assert_eq!(connector.attempts(), 0);
    assert_eq!(
        AuditResponse::from_outcome(&outcome).message(),
        "Missing parameters: user, password"
    );
}

#[tokio::test]
async fn test_successful_audit_closes_backend() {
    let backend = shop().count("Orders", 2);
    let observer = backend.observer();
    let connector = MockConnector::new(backend);

    let outcome = audit(&connector, &request(AuditKind::Orphans), &AuditSettings::default()).await;

    assert_eq!(connector.attempts(), 1);
    assert_eq!(observer.close_calls(), 1);

    let response = AuditResponse::from_outcome(&outcome);
    assert_eq!(response.kind(), ResponseKind::Success);
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({
            "message": "Orphaned data anomaly check",
            "status": "findings",
            "result": [{"TableName": "Orders", "OrphanCount": 2}],
        })
    );
}

#[tokio::test]
async fn test_catalog_failure_still_closes_backend() {
    let backend = shop().broken_catalog("permission denied for relation pg_constraint");
    let observer = backend.observer();
    let connector = MockConnector::new(backend);

    let outcome = audit(
        &connector,
        &request(AuditKind::DeclaredForeignKeys),
        &AuditSettings::default(),
    )
    .await;

    assert!(outcome.is_err());
    assert_eq!(observer.close_calls(), 1);

    let response = AuditResponse::from_outcome(&outcome);
    assert_eq!(response.kind(), ResponseKind::ServerError);
    assert_eq!(response.message(), SERVER_ERROR_MESSAGE);
    assert!(!serde_json::to_string(&response).unwrap().contains("pg_constraint"));
}

#[tokio::test]
async fn test_connection_refused_is_server_error() {
    let connector = MockConnector::refusing();

    let outcome = audit(&connector, &request(AuditKind::Orphans), &AuditSettings::default()).await;

    assert_eq!(connector.attempts(), 1);
    assert!(matches!(outcome, Err(AuditError::Connection { .. })));

    let response = AuditResponse::from_outcome(&outcome);
    assert_eq!(response.kind(), ResponseKind::ServerError);
    assert_eq!(response.kind().exit_code(), 1);
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({"message": "Error querying the database"})
    );
}

#[tokio::test]
async fn test_partial_audit_lists_failures() {
    let backend = shop()
        .table("Lines")
        .column("Lines", "sku")
        .fail("Lines", "canceling statement due to statement timeout");
    let connector = MockConnector::new(backend);

    let outcome = audit(&connector, &request(AuditKind::Duplicates), &AuditSettings::default()).await;
    let response = AuditResponse::from_outcome(&outcome);

    assert_eq!(response.kind(), ResponseKind::Success);
    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["status"], "partial");
    assert_eq!(body["result"], json!([]));
    assert_eq!(body["failures"][0]["TableName"], "Lines");
}

#[test]
fn test_audit_log_line_on_success() {
    let connector = MockConnector::new(shop().count("Orders", 1));
    let levels = audit_log_levels(&connector, &request(AuditKind::Orphans));
    assert_eq!(levels, vec![Level::INFO]);
}

#[test]
fn test_audit_log_line_on_rejected_request() {
    let connector = MockConnector::new(shop());
    let request = AuditRequest::new(AuditKind::Orphans).with_user("auditor");

    let levels = audit_log_levels(&connector, &request);
    assert_eq!(connector.attempts(), 0);
    assert_eq!(levels, vec![Level::ERROR]);
}

#[test]
fn test_audit_log_line_on_connection_failure() {
    let connector = MockConnector::refusing();
    let levels = audit_log_levels(&connector, &request(AuditKind::Duplicates));
    assert_eq!(levels, vec![Level::ERROR]);
}

#[test]
fn test_audit_log_line_on_partial_run() {
    let backend = shop()
        .table("Lines")
        .column("Lines", "sku")
        .fail("Lines", "permission denied for table lines");
    let connector = MockConnector::new(backend);

    let levels = audit_log_levels(&connector, &request(AuditKind::Duplicates));
    assert_eq!(levels, vec![Level::INFO]);
}
