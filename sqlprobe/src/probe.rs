//! Connecting to a server and running the diagnostic queries.
//!
//! All queries are read-only. The CPU query reads the scheduler monitor ring
//! buffer, which is not available on every edition or version; when it fails
//! the check is reported as unsupported and the probe still succeeds.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sqlprobe_core::{ConnectionConfig, Result, SqlProbeError};
use tiberius::{AuthMethod, Client, EncryptionLevel, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

/// Application name reported to the server.
pub const APPLICATION_NAME: &str = "sqlprobe";

/// Longest version string kept in a report.
pub const VERSION_PREVIEW_CHARS: usize = 100;

const VERSION_QUERY: &str = "SELECT @@VERSION AS version, @@SERVERNAME AS serverName";

const ACTIVE_SESSIONS_QUERY: &str = "
    SELECT COUNT(*) AS count
    FROM sys.dm_exec_sessions
    WHERE is_user_process = 1 AND status = 'running'";

const CPU_QUERY: &str = "
    SELECT TOP 1
        SQLProcessUtilization AS sql_cpu,
        100 - SystemIdle - SQLProcessUtilization AS other_cpu
    FROM (
        SELECT
            record.value('(./Record/@id)[1]', 'int') AS record_id,
            record.value('(./Record/SchedulerMonitorEvent/SystemHealth/SystemIdle)[1]', 'int') AS SystemIdle,
            record.value('(./Record/SchedulerMonitorEvent/SystemHealth/ProcessUtilization)[1]', 'int') AS SQLProcessUtilization
        FROM (
            SELECT CAST(record AS xml) AS record
            FROM sys.dm_os_ring_buffers
            WHERE ring_buffer_type = N'RING_BUFFER_SCHEDULER_MONITOR'
            AND record LIKE '%<SystemHealth>%'
        ) AS x
    ) AS y
    ORDER BY record_id DESC";

/// Step of a probe that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStage {
    /// The parsed configuration was unusable (no server, bad port)
    Validate,
    /// TCP connect, TLS or login failed or timed out
    Connect,
    /// A required diagnostic query failed
    Query,
}

/// Result of the best-effort CPU check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CpuCheck {
    /// Latest scheduler monitor sample; zero when no sample was recorded
    Measured {
        /// CPU used by SQL Server, percent
        sql_percent: i32,
        /// CPU used by other processes, percent
        other_percent: i32,
    },
    /// The server rejected the ring buffer query
    Unsupported,
}

/// What a successful probe found out about a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerDiagnostics {
    /// `@@SERVERNAME`
    pub server_name: String,
    /// `@@VERSION`, truncated
    pub version: String,
    /// Running user sessions
    pub active_sessions: i32,
    /// CPU utilization
    pub cpu: CpuCheck,
}

/// Outcome of probing one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ProbeOutcome {
    /// Connected and ran the diagnostic queries
    Success(ServerDiagnostics),
    /// Stopped at `stage`
    Failure {
        /// Step that failed
        stage: ProbeStage,
        /// Sanitized error message
        message: String,
    },
}

impl ProbeOutcome {
    /// Builds a failure from an error, keeping its source chain in the message.
    pub fn from_error(error: &SqlProbeError) -> Self {
        let stage = match error {
            SqlProbeError::Configuration { .. } => ProbeStage::Validate,
            SqlProbeError::Query { .. } | SqlProbeError::Serialization { .. } => ProbeStage::Query,
            SqlProbeError::Connection { .. }
            | SqlProbeError::Timeout { .. }
            | SqlProbeError::Io { .. } => ProbeStage::Connect,
        };
        Self::Failure {
            stage,
            message: error_chain(error),
        }
    }

    /// Whether the probe succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Something that can check a server.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Connects with `config` and gathers diagnostics. Never panics; every
    /// problem is reported through the returned outcome.
    async fn probe(&self, config: &ConnectionConfig) -> ProbeOutcome;
}

/// Time allowed for each diagnostic query when none is configured.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(15);

/// Prober backed by a real TDS connection.
#[derive(Debug, Clone)]
pub struct TiberiusProber {
    connect_timeout: Duration,
    query_timeout: Duration,
}

impl TiberiusProber {
    /// Creates a prober that gives up connecting after `connect_timeout`.
    pub const fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    /// Sets the limit for each diagnostic query.
    #[must_use]
    pub const fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    async fn connect(&self, config: &ConnectionConfig) -> Result<Client<Compat<TcpStream>>> {
        let tds = tds_config(config)?;
        let addr = tds.get_addr();

        let attempt = async {
            let tcp = TcpStream::connect(&addr).await.map_err(|e| {
                SqlProbeError::connection_failed(format!("TCP connect to {addr}"), e)
            })?;
            tcp.set_nodelay(true).map_err(|e| SqlProbeError::Io {
                context: "Failed to set TCP_NODELAY".to_string(),
                source: e,
            })?;
            Client::connect(tds, tcp.compat_write())
                .await
                .map_err(|e| SqlProbeError::connection_failed("Login failed", e))
        };

        tokio::time::timeout(self.connect_timeout, attempt)
            .await
            .map_err(|_| {
                SqlProbeError::timeout(
                    format!("Connecting to {addr}"),
                    self.connect_timeout.as_secs(),
                )
            })?
    }

    async fn diagnostics(
        &self,
        client: &mut Client<Compat<TcpStream>>,
    ) -> Result<ServerDiagnostics> {
        let row = self.first_row(client, VERSION_QUERY, "Version query").await?;
        let version: String = column::<&str>(row.as_ref(), "version")?
            .unwrap_or_default()
            .chars()
            .take(VERSION_PREVIEW_CHARS)
            .collect();
        let server_name = column::<&str>(row.as_ref(), "serverName")?
            .unwrap_or_default()
            .to_string();

        let row = self
            .first_row(client, ACTIVE_SESSIONS_QUERY, "Active sessions query")
            .await?;
        let active_sessions = column::<i32>(row.as_ref(), "count")?.unwrap_or_default();

        let cpu = best_effort(self.cpu_usage(client).await);

        Ok(ServerDiagnostics {
            server_name,
            version,
            active_sessions,
            cpu,
        })
    }

    async fn cpu_usage(&self, client: &mut Client<Compat<TcpStream>>) -> Result<CpuCheck> {
        let row = self.first_row(client, CPU_QUERY, "CPU query").await?;
        Ok(CpuCheck::Measured {
            sql_percent: column::<i32>(row.as_ref(), "sql_cpu")?.unwrap_or_default(),
            other_percent: column::<i32>(row.as_ref(), "other_cpu")?.unwrap_or_default(),
        })
    }

    async fn first_row(
        &self,
        client: &mut Client<Compat<TcpStream>>,
        query: &str,
        context: &str,
    ) -> Result<Option<Row>> {
        within(self.query_timeout, context, async {
            let stream = client
                .simple_query(query)
                .await
                .map_err(|e| SqlProbeError::query_failed(context, e))?;
            stream
                .into_row()
                .await
                .map_err(|e| SqlProbeError::query_failed(context, e))
        })
        .await
    }
}

#[async_trait]
impl Prober for TiberiusProber {
    async fn probe(&self, config: &ConnectionConfig) -> ProbeOutcome {
        let mut client = match self.connect(config).await {
            Ok(client) => client,
            Err(e) => return ProbeOutcome::from_error(&e),
        };

        let outcome = match self.diagnostics(&mut client).await {
            Ok(diagnostics) => ProbeOutcome::Success(diagnostics),
            Err(e) => ProbeOutcome::from_error(&e),
        };

        if let Err(e) = client.close().await {
            tracing::debug!("Error while closing connection: {e}");
        }

        outcome
    }
}

/// Builds the TDS configuration for a validated connection config.
///
/// # Errors
/// Returns a configuration error if the config does not validate.
pub fn tds_config(config: &ConnectionConfig) -> Result<tiberius::Config> {
    config.validate()?;
    let port = config
        .port
        .tcp()
        .ok_or_else(|| SqlProbeError::configuration("port out of range"))?;

    let mut tds = tiberius::Config::new();
    tds.host(&config.server);
    tds.port(port);
    tds.database(&config.database);
    tds.application_name(APPLICATION_NAME);
    tds.authentication(AuthMethod::sql_server(&config.user, config.password.as_str()));
    tds.encryption(if config.encrypt {
        EncryptionLevel::Required
    } else {
        EncryptionLevel::Off
    });
    if config.trust_server_certificate {
        tds.trust_cert();
    }

    Ok(tds)
}

/// Any failure of the CPU check, query or decoding, means it is unsupported.
fn best_effort(cpu: Result<CpuCheck>) -> CpuCheck {
    cpu.unwrap_or_else(|e| {
        tracing::debug!("CPU query not supported: {}", error_chain(&e));
        CpuCheck::Unsupported
    })
}

/// Runs a query step, failing it as a query error once `limit` has passed.
async fn within<T, F>(limit: Duration, context: &str, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::time::timeout(limit, operation).await.map_err(|_| {
        SqlProbeError::query_failed(context, SqlProbeError::timeout(context, limit.as_secs()))
    })?
}

fn column<'a, R>(row: Option<&'a Row>, name: &str) -> Result<Option<R>>
where
    R: tiberius::FromSql<'a>,
{
    let Some(row) = row else {
        return Ok(None);
    };
    row.try_get::<R, _>(name)
        .map_err(|e| SqlProbeError::query_failed(format!("Failed to read column '{name}'"), e))
}
