//! SQL Server connection tester.
//!
//! Reads numbered connection strings from a [`source::ConnectionSource`],
//! parses them with `sqlprobe-core`, and probes each server with a
//! [`probe::Prober`]. The binary in `main.rs` wires these together with the
//! process environment and a real TDS connection.
//!
//! # Security Guarantees
//! - Read-only queries only
//! - Passwords are redacted before anything is logged or reported

pub mod cli;
pub mod probe;
pub mod report;
pub mod runner;
pub mod source;
