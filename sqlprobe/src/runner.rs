//! The probing loop.
//!
//! Individual server failures are recorded in the report and logged; they
//! never abort the run.

use sqlprobe_core::{ConnectionConfig, parse, redact_connection_string};
use tracing::{error, info, warn};

use crate::probe::{CpuCheck, ProbeOutcome, ProbeStage, Prober};
use crate::report::{ProbeReport, ServerReport};
use crate::source::{ConnectionSource, connection_var};

/// Characters of the redacted connection string shown in logs.
pub const PREVIEW_CHARS: usize = 50;

/// Hints logged after a failed connection attempt.
pub const TROUBLESHOOTING_HINTS: [&str; 5] = [
    "Check if SQL Server is running",
    "Check if username/password are correct",
    "Check if server accepts remote connections",
    "Check if firewall allows the configured port",
    "Check if SQL Server Authentication is enabled",
];

/// Which servers to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Only this server; reported as not configured if it has no connection string
    Single(u32),
    /// Every configured server from 1 to `max_servers`; unconfigured ones are skipped
    All {
        /// Highest server index to look at
        max_servers: u32,
    },
}

/// A configured server ready to be probed.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerTarget {
    /// Server number
    pub index: u32,
    /// Display name, `Server <index>` when not configured
    pub name: String,
    /// Raw connection string
    pub raw: String,
}

impl std::fmt::Debug for ServerTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerTarget")
            .field("index", &self.index)
            .field("name", &self.name)
            .field("raw", &redact_connection_string(&self.raw))
            .finish()
    }
}

/// Default display name for server `index`.
pub fn default_name(index: u32) -> String {
    format!("Server {index}")
}

impl ServerTarget {
    /// Reads server `index` from `source`, or `None` if it has no connection string.
    pub fn resolve(source: &dyn ConnectionSource, index: u32) -> Option<Self> {
        let raw = source.connection_string(index)?;
        Some(Self {
            index,
            name: source
                .server_name(index)
                .unwrap_or_else(|| default_name(index)),
            raw,
        })
    }
}

/// Probes the selected servers and collects the results.
pub async fn run_probes(
    source: &dyn ConnectionSource,
    prober: &dyn Prober,
    selection: Selection,
) -> ProbeReport {
    let mut report = ProbeReport::new();

    match selection {
        Selection::Single(index) => match ServerTarget::resolve(source, index) {
            Some(target) => report.servers.push(probe_target(&target, prober).await),
            None => {
                warn!("{} not configured", connection_var(index));
                let name = source
                    .server_name(index)
                    .unwrap_or_else(|| default_name(index));
                report.servers.push(ServerReport::not_configured(index, name));
            }
        },
        Selection::All { max_servers } => {
            info!("Testing all configured servers...");
            for index in 1..=max_servers {
                if let Some(target) = ServerTarget::resolve(source, index) {
                    report.servers.push(probe_target(&target, prober).await);
                }
            }
            if report.servers.is_empty() {
                warn!("No servers configured (looked at 1..={max_servers})");
            }
        }
    }

    report
}

/// Parses, validates and probes one server.
pub async fn probe_target(target: &ServerTarget, prober: &dyn Prober) -> ServerReport {
    info!("Testing: {}", target.name);
    info!("Connection string: {}...", preview(&target.raw));

    let Some(config) = parse(Some(&target.raw)) else {
        // Sources never hand out empty strings, but an empty one means "not configured"
        return ServerReport::not_configured(target.index, target.name.clone());
    };
    log_config(&config);

    let outcome = match config.validate() {
        Ok(()) => {
            info!("Connecting...");
            prober.probe(&config).await
        }
        Err(e) => ProbeOutcome::from_error(&e),
    };
    log_outcome(&outcome);

    ServerReport {
        index: target.index,
        name: target.name.clone(),
        target: Some(config.to_string()),
        outcome: Some(outcome),
    }
}

/// First [`PREVIEW_CHARS`] characters of the redacted connection string.
pub fn preview(raw: &str) -> String {
    redact_connection_string(raw)
        .chars()
        .take(PREVIEW_CHARS)
        .collect()
}

fn log_config(config: &ConnectionConfig) {
    info!("Server: {}:{}", config.server, config.port);
    info!("Database: {}", config.database);
    info!("User: {}", config.user);
    info!("Encrypt: {}", config.encrypt);
    info!("TrustServerCertificate: {}", config.trust_server_certificate);
}

fn log_outcome(outcome: &ProbeOutcome) {
    match outcome {
        ProbeOutcome::Success(diagnostics) => {
            info!("✓ Connected successfully");
            info!("Server: {}", diagnostics.server_name);
            info!("Version: {}...", diagnostics.version);
            info!("  ✓ Active sessions: {}", diagnostics.active_sessions);
            match diagnostics.cpu {
                CpuCheck::Measured { sql_percent, .. } => {
                    info!("  ✓ SQL Server CPU: {sql_percent}%");
                }
                CpuCheck::Unsupported => warn!("  ⚠ CPU query not supported on this version"),
            }
            info!("✓ All tests passed");
        }
        ProbeOutcome::Failure { stage, message } => {
            error!("Probe failed during {stage:?}: {message}");
            if *stage == ProbeStage::Connect {
                info!("Possible solutions:");
                for (number, hint) in (1..).zip(TROUBLESHOOTING_HINTS) {
                    info!("{number}. {hint}");
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::source::MapSource;

    #[test]
    fn test_resolve_target_with_default_name() {
        let source = MapSource::new().with_server(2, "Server=h");

        let target = ServerTarget::resolve(&source, 2).unwrap();
        assert_eq!(target.name, "Server 2");
        assert_eq!(target.raw, "Server=h");
        assert!(ServerTarget::resolve(&source, 1).is_none());
    }

    #[test]
    fn test_resolve_target_with_name() {
        let source = MapSource::new()
            .with_server(1, "Server=h")
            .with_name(1, "Primary");

        let target = ServerTarget::resolve(&source, 1).unwrap();
        assert_eq!(target.name, "Primary");
    }

    #[test]
    fn test_preview_is_redacted_and_truncated() {
        let raw = "Server=a-very-long-host-name.example.internal,1500;User Id=admin;Password=secret";
        let shown = preview(raw);

        assert_eq!(shown.chars().count(), PREVIEW_CHARS);
        assert!(!shown.contains("secret"));

        assert_eq!(preview("mssql://u:pw@h"), "mssql://u:****@h");
    }

    #[test]
    fn test_target_debug_hides_password() {
        let target = ServerTarget {
            index: 1,
            name: "Primary".to_string(),
            raw: "mssql://sa:hunter2@db/master".to_string(),
        };
        assert!(!format!("{target:?}").contains("hunter2"));
    }
}
