//! Configuration types for the audit engine.
//!
//! - `ConnectionConfig`: where and how to connect
//! - `AuditSettings`: concurrency, timeouts and heuristics for one audit run
//!
//! # Security
//! Neither struct stores passwords. Credentials travel separately through
//! the security module.

mod audit;
mod connection;

pub use audit::AuditSettings;
pub use connection::ConnectionConfig;
