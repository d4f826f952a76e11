//! Aggregated results of a probing run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlprobe_core::{Result, SqlProbeError};

use crate::probe::ProbeOutcome;

/// Result for a single server index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerReport {
    /// Server number from the configuration source
    pub index: u32,
    /// Display name
    pub name: String,
    /// Credential-free description of the parsed configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// `None` when the server has no connection string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ProbeOutcome>,
}

impl ServerReport {
    /// Report for a server that has no connection string.
    pub fn not_configured(index: u32, name: String) -> Self {
        Self {
            index,
            name,
            target: None,
            outcome: None,
        }
    }

    /// Whether the server had a connection string.
    pub const fn is_configured(&self) -> bool {
        self.outcome.is_some()
    }
}

/// Results of one run over the configured servers.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    /// When the run started
    pub checked_at: DateTime<Utc>,
    /// One entry per server that was looked at
    pub servers: Vec<ServerReport>,
}

/// Counts derived from a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProbeSummary {
    /// Servers that connected and answered the queries
    pub succeeded: usize,
    /// Servers that were configured but failed
    pub failed: usize,
    /// Servers explicitly requested without a connection string
    pub not_configured: usize,
}

impl ProbeReport {
    /// Starts an empty report stamped with the current time.
    pub fn new() -> Self {
        Self {
            checked_at: Utc::now(),
            servers: Vec::new(),
        }
    }

    /// Tallies outcomes.
    pub fn summary(&self) -> ProbeSummary {
        let outcomes = || self.servers.iter().filter_map(|s| s.outcome.as_ref());
        ProbeSummary {
            succeeded: outcomes().filter(|o| o.is_success()).count(),
            failed: outcomes().filter(|o| !o.is_success()).count(),
            not_configured: self.servers.iter().filter(|s| !s.is_configured()).count(),
        }
    }

    /// Serializes the report, with its summary, as pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a serialization error if the report cannot be encoded.
    pub fn to_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Document<'a> {
            #[serde(flatten)]
            report: &'a ProbeReport,
            summary: ProbeSummary,
        }

        serde_json::to_string_pretty(&Document {
            report: self,
            summary: self.summary(),
        })
        .map_err(|e| SqlProbeError::Serialization {
            context: "Probe report".to_string(),
            source: e,
        })
    }
}

impl Default for ProbeReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::probe::{CpuCheck, ProbeStage, ServerDiagnostics};

    fn sample_report() -> ProbeReport {
        let mut report = ProbeReport::new();
        report.servers.push(ServerReport {
            index: 1,
            name: "Primary".to_string(),
            target: Some("ConnectionConfig(db1:1433/master)".to_string()),
            outcome: Some(ProbeOutcome::Success(ServerDiagnostics {
                server_name: "DB1".to_string(),
                version: "Microsoft SQL Server 2019".to_string(),
                active_sessions: 2,
                cpu: CpuCheck::Measured {
                    sql_percent: 4,
                    other_percent: 10,
                },
            })),
        });
        report.servers.push(ServerReport {
            index: 2,
            name: "Server 2".to_string(),
            target: Some("ConnectionConfig(db2:1433/master)".to_string()),
            outcome: Some(ProbeOutcome::Failure {
                stage: ProbeStage::Connect,
                message: "timed out".to_string(),
            }),
        });
        report
            .servers
            .push(ServerReport::not_configured(3, "Server 3".to_string()));
        report
    }

    #[test]
    fn test_summary_counts() {
        assert_eq!(
            sample_report().summary(),
            ProbeSummary {
                succeeded: 1,
                failed: 1,
                not_configured: 1,
            }
        );
        assert_eq!(ProbeReport::new().summary(), ProbeSummary::default());
    }

    #[test]
    fn test_json_report() {
        let json: serde_json::Value =
            serde_json::from_str(&sample_report().to_json().unwrap()).unwrap();

        assert!(json["checked_at"].is_string());
        assert_eq!(json["servers"].as_array().unwrap().len(), 3);
        assert_eq!(json["servers"][0]["outcome"]["result"], "success");
        assert_eq!(json["servers"][0]["outcome"]["cpu"]["sql_percent"], 4);
        assert_eq!(json["servers"][1]["outcome"]["stage"], "connect");
        assert!(json["servers"][2].get("outcome").is_none());
        assert_eq!(json["summary"]["succeeded"], 1);
        assert_eq!(json["summary"]["not_configured"], 1);
    }
}
