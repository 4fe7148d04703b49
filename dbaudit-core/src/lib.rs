//! Structural and content integrity audits for relational schemas.
//!
//! Given credentials for a database it has never seen, the engine reads the
//! catalog, synthesizes one counting statement per table or constraint where
//! a check needs data, runs those statements with per-unit failure isolation
//! and normalizes the outcome of each of the nine checks into one report
//! shape.
//!
//! # Security Guarantees
//! - All database operations are read-only
//! - Credentials are never stored, logged or serialized
//! - Identifiers in synthesized statements come from the catalog only and
//!   are quoted for the target engine
//!
//! # Architecture
//! - `catalog`: timed, filtered catalog reads over an [`AuditBackend`]
//! - `synth`: per-table statement synthesis
//! - `executor`: bounded concurrent execution with per-unit timeouts
//! - `audits`: the nine checks
//! - `report` / `response`: result normalization and caller envelope
//! - `session`: connection lifetime and the audit log line

pub mod adapters;
pub mod audits;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod report;
pub mod request;
pub mod response;
pub mod security;
pub mod session;
pub mod synth;

// Re-export commonly used types
pub use adapters::{AuditBackend, Statement};
pub use audits::{AuditKind, run_check};
pub use config::{AuditSettings, ConnectionConfig};
pub use error::{AuditError, Result};
pub use models::{
    Column, Dialect, ForeignKey, Index, ObjectOrigin, ReferentialAction, StorageClass, Table,
    TableRef, Trigger,
};
pub use report::{AuditReport, AuditStatus, UnitFailure};
pub use request::AuditRequest;
pub use response::{AuditResponse, ResponseKind};
pub use session::{AuditSession, Connector, EngineConnector, audit};
