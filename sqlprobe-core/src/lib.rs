//! Connection-string parsing and shared utilities for sqlprobe.
//!
//! This crate turns a human-written SQL Server connection string into a
//! fully-defaulted [`ConnectionConfig`]. Parsing is pure: no I/O, no
//! retries, no caching, and it never fails for a non-empty string.
//!
//! # Security Guarantees
//! - Passwords live in `Zeroizing` containers and are wiped on drop
//! - `Debug`/`Display` output of configurations never includes the password
//! - [`error::redact_connection_string`] masks passwords in both dialects
//!
//! # Example
//! ```rust
//! use sqlprobe_core::parse;
//!
//! let config = parse(Some("Server=myhost,1500;Database=sales;User Id=admin;Password=p@ss"))
//!     .expect("non-empty input always parses");
//! assert_eq!(config.server, "myhost");
//! assert_eq!(config.database, "sales");
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod connection_string;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{ConnectionConfig, DEFAULT_DATABASE, DEFAULT_PORT, Port};
pub use connection_string::{ConnectionString, Dialect, parse};
pub use error::{Result, SqlProbeError, redact_connection_string};
pub use logging::init_logging;
