//! In-memory backend for engine tests.
//!
//! Catalog contents are declared up front; counting statements answer from a
//! table keyed by `Statement::unit`. Units without an entry count zero.

#![allow(dead_code)]

use async_trait::async_trait;
use dbaudit_core::{
    AuditBackend, AuditError, Column, Dialect, ForeignKey, Index, ObjectOrigin,
    ReferentialAction, Result, Statement, StorageClass, Table, TableRef, Trigger,
    AuditSettings, request::ValidatedRequest, session::Connector,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Observes a backend after it has been boxed and handed over.
#[derive(Clone, Default)]
pub struct Observer {
    closed: Arc<AtomicUsize>,
    executed: Arc<Mutex<Vec<Statement>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl Observer {
    /// Highest number of statements that were executing at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn executed_units(&self) -> Vec<String> {
        let mut units: Vec<String> = self
            .executed
            .lock()
            .unwrap()
            .iter()
            .map(|s| s.unit.clone())
            .collect();
        units.sort();
        units
    }

    pub fn executed_sql(&self, unit: &str) -> Option<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.unit == unit)
            .map(|s| s.sql.clone())
    }
}

enum Answer {
    Count(i64),
    Fail(String),
}

pub struct MockBackend {
    dialect: Dialect,
    tables: Vec<Table>,
    columns: Vec<Column>,
    indexes: Vec<Index>,
    foreign_keys: Vec<ForeignKey>,
    triggers: Vec<Trigger>,
    answers: HashMap<String, Answer>,
    delays: HashMap<String, Duration>,
    catalog_delay: Option<Duration>,
    catalog_error: Option<String>,
    connection: Option<Arc<tokio::sync::Mutex<()>>>,
    observer: Observer,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(Dialect::PostgreSQL)
    }
}

impl MockBackend {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            tables: Vec::new(),
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            triggers: Vec::new(),
            answers: HashMap::new(),
            delays: HashMap::new(),
            catalog_delay: None,
            catalog_error: None,
            connection: None,
            observer: Observer::default(),
        }
    }

    pub fn observer(&self) -> Observer {
        self.observer.clone()
    }

    pub fn boxed(self) -> Box<dyn AuditBackend> {
        Box::new(self)
    }

    pub fn table(mut self, name: &str) -> Self {
        self.tables.push(Table {
            table: TableRef::new(name),
            origin: ObjectOrigin::User,
        });
        self
    }

    pub fn system_table(mut self, name: &str) -> Self {
        self.tables.push(Table {
            table: TableRef::new(name),
            origin: ObjectOrigin::System,
        });
        self
    }

    fn push_column(mut self, table: &str, name: &str, nullable: bool, storage_class: StorageClass) -> Self {
        let position = self
            .columns
            .iter()
            .filter(|c| c.table.name == table)
            .count() as i32
            + 1;
        self.columns.push(Column {
            table: TableRef::new(table),
            name: name.to_string(),
            ordinal_position: position,
            is_nullable: nullable,
            data_type: match storage_class {
                StorageClass::Scalar => "integer".to_string(),
                StorageClass::LargeObject => "xml".to_string(),
            },
            storage_class,
        });
        self
    }

    pub fn column(self, table: &str, name: &str) -> Self {
        self.push_column(table, name, false, StorageClass::Scalar)
    }

    pub fn nullable_column(self, table: &str, name: &str) -> Self {
        self.push_column(table, name, true, StorageClass::Scalar)
    }

    pub fn large_object_column(self, table: &str, name: &str) -> Self {
        self.push_column(table, name, true, StorageClass::LargeObject)
    }

    pub fn primary_key(mut self, table: &str, columns: &[&str]) -> Self {
        self.indexes.push(Index {
            table: TableRef::new(table),
            name: format!("{}_pkey", table),
            is_primary: true,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn index(mut self, table: &str, name: &str, columns: &[&str]) -> Self {
        self.indexes.push(Index {
            table: TableRef::new(table),
            name: name.to_string(),
            is_primary: false,
            columns: columns.iter().map(|c| c.to_string()).collect(),
        });
        self
    }

    pub fn foreign_key(mut self, fk: ForeignKey) -> Self {
        self.foreign_keys.push(fk);
        self
    }

    pub fn trigger(mut self, table: &str, name: &str, body: &str) -> Self {
        self.triggers.push(Trigger {
            name: name.to_string(),
            table: TableRef::new(table),
            body: Some(body.to_string()),
            origin: ObjectOrigin::User,
        });
        self
    }

    pub fn count(mut self, unit: &str, value: i64) -> Self {
        self.answers.insert(unit.to_string(), Answer::Count(value));
        self
    }

    pub fn fail(mut self, unit: &str, message: &str) -> Self {
        self.answers
            .insert(unit.to_string(), Answer::Fail(message.to_string()));
        self
    }

    pub fn delay(mut self, unit: &str, delay: Duration) -> Self {
        self.delays.insert(unit.to_string(), delay);
        self
    }

    /// Runs statements one at a time over a single shared connection.
    pub fn single_connection(mut self) -> Self {
        self.connection = Some(Arc::new(tokio::sync::Mutex::new(())));
        self
    }

    pub fn slow_catalog(mut self, delay: Duration) -> Self {
        self.catalog_delay = Some(delay);
        self
    }

    pub fn broken_catalog(mut self, message: &str) -> Self {
        self.catalog_error = Some(message.to_string());
        self
    }

    async fn catalog<T: Clone>(&self, items: &[T]) -> Result<Vec<T>> {
        if let Some(delay) = self.catalog_delay {
            tokio::time::sleep(delay).await;
        }
        match &self.catalog_error {
            Some(message) => Err(AuditError::introspection_failed(
                "Failed to query catalog",
                std::io::Error::other(message.clone()),
            )),
            None => Ok(items.to_vec()),
        }
    }
}

/// Builds a single-column foreign key in the default schema.
pub fn fk(name: &str, table: &str, column: &str, referenced: &str, referenced_column: &str) -> ForeignKey {
    ForeignKey {
        name: name.to_string(),
        table: TableRef::new(table),
        columns: vec![column.to_string()],
        referenced_table: TableRef::new(referenced),
        referenced_columns: vec![referenced_column.to_string()],
        on_delete: ReferentialAction::NoAction,
        on_update: ReferentialAction::NoAction,
        is_enabled: true,
    }
}

#[async_trait]
impl AuditBackend for MockBackend {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn max_parallelism(&self) -> usize {
        if self.connection.is_some() { 1 } else { usize::MAX }
    }

    async fn test_connection(&self) -> Result<()> {
        Ok(())
    }

    async fn tables(&self) -> Result<Vec<Table>> {
        self.catalog(&self.tables).await
    }

    async fn columns(&self) -> Result<Vec<Column>> {
        self.catalog(&self.columns).await
    }

    async fn indexes(&self) -> Result<Vec<Index>> {
        self.catalog(&self.indexes).await
    }

    async fn foreign_keys(&self) -> Result<Vec<ForeignKey>> {
        self.catalog(&self.foreign_keys).await
    }

    async fn triggers(&self) -> Result<Vec<Trigger>> {
        self.catalog(&self.triggers).await
    }

    async fn count(&self, statement: &Statement) -> Result<i64> {
        let _connection = match &self.connection {
            Some(connection) => Some(connection.lock().await),
            None => None,
        };
        let running = self.observer.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.observer.peak_in_flight.fetch_max(running, Ordering::SeqCst);

        self.observer.executed.lock().unwrap().push(statement.clone());
        if let Some(delay) = self.delays.get(&statement.unit) {
            tokio::time::sleep(*delay).await;
        }
        self.observer.in_flight.fetch_sub(1, Ordering::SeqCst);
        match self.answers.get(&statement.unit) {
            Some(Answer::Count(value)) => Ok(*value),
            Some(Answer::Fail(message)) => Err(AuditError::query_failed(message.clone())),
            None => Ok(0),
        }
    }

    async fn close(&self) {
        self.observer.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out one prepared backend, counting connection attempts.
pub struct MockConnector {
    backend: Mutex<Option<MockBackend>>,
    refuse: bool,
    attempts: AtomicUsize,
}

impl MockConnector {
    pub fn new(backend: MockBackend) -> Self {
        Self {
            backend: Mutex::new(Some(backend)),
            refuse: false,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn refusing() -> Self {
        Self {
            backend: Mutex::new(None),
            refuse: true,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        _request: &ValidatedRequest,
        _settings: &AuditSettings,
    ) -> Result<Box<dyn AuditBackend>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(AuditError::connection_failed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "login failed for user 'auditor'",
            )));
        }
        self.backend
            .lock()
            .unwrap()
            .take()
            .map(MockBackend::boxed)
            .ok_or_else(|| AuditError::query_failed("backend already handed out"))
    }
}
