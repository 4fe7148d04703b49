//! Credential handling.
//!
//! - `credentials`: secret container with automatic memory zeroing
//! - `connection`: database URL parsing with credential extraction
//!
//! # Security Guarantees
//! - Passwords live only in `Zeroizing` containers
//! - `Debug` output never contains the password
//! - URLs are redacted before they reach logs or errors

mod connection;
mod credentials;

pub use connection::{DatabaseUrl, parse_database_url};
pub use credentials::Credentials;
