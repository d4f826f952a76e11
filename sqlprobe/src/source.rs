//! Where server connection strings come from.
//!
//! Servers are numbered from 1. Server `n` is configured by
//! `SQL_SERVER_<n>_CONNECTION` and optionally named by `SQL_SERVER_<n>_NAME`.
//! The probing loop only ever sees the [`ConnectionSource`] trait, so tests
//! can hand it an in-memory [`MapSource`] instead of the process environment.

use std::collections::HashMap;
use std::env::{self, VarError};
use std::path::Path;

use sqlprobe_core::{Result, SqlProbeError};

/// Name of the variable holding server `index`'s connection string.
pub fn connection_var(index: u32) -> String {
    format!("SQL_SERVER_{index}_CONNECTION")
}

/// Name of the variable holding server `index`'s display name.
pub fn name_var(index: u32) -> String {
    format!("SQL_SERVER_{index}_NAME")
}

/// A provider of per-server configuration.
///
/// Empty values are reported as absent.
pub trait ConnectionSource: Send + Sync {
    /// Looks up a raw variable.
    fn var(&self, key: &str) -> Option<String>;

    /// Raw connection string for server `index`, if configured.
    fn connection_string(&self, index: u32) -> Option<String> {
        self.var(&connection_var(index))
    }

    /// Display name for server `index`, if configured.
    fn server_name(&self, index: u32) -> Option<String> {
        self.var(&name_var(index))
    }
}

/// In-memory source.
#[derive(Debug, Clone, Default)]
pub struct MapSource {
    vars: HashMap<String, String>,
}

impl MapSource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection string for server `index`.
    #[must_use]
    pub fn with_server(mut self, index: u32, connection_string: impl Into<String>) -> Self {
        self.vars
            .insert(connection_var(index), connection_string.into());
        self
    }

    /// Adds a display name for server `index`.
    #[must_use]
    pub fn with_name(mut self, index: u32, name: impl Into<String>) -> Self {
        self.vars.insert(name_var(index), name.into());
        self
    }
}

impl FromIterator<(String, String)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

impl ConnectionSource for MapSource {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).filter(|value| !value.is_empty()).cloned()
    }
}

/// Process environment, optionally backed by a dotenv-style file.
///
/// A variable present in the process environment always wins over the file,
/// even when it is empty.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    file_vars: HashMap<String, String>,
}

impl EnvSource {
    /// Reads only the process environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the process environment with `path` layered underneath.
    ///
    /// A missing file is not an error; it just contributes nothing.
    ///
    /// # Errors
    /// Returns an I/O error if the file exists but cannot be read.
    pub fn with_env_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No env file at {}", path.display());
                return Ok(Self::new());
            }
            Err(e) => {
                return Err(SqlProbeError::Io {
                    context: format!("Failed to read {}", path.display()),
                    source: e,
                });
            }
        };

        let file_vars = parse_env_file(&contents);
        tracing::debug!(
            "Loaded {} variables from {}",
            file_vars.len(),
            path.display()
        );
        Ok(Self { file_vars })
    }
}

impl ConnectionSource for EnvSource {
    fn var(&self, key: &str) -> Option<String> {
        let value = match env::var(key) {
            Ok(value) => Some(value),
            Err(VarError::NotPresent) => self.file_vars.get(key).cloned(),
            Err(VarError::NotUnicode(_)) => {
                tracing::warn!("Ignoring {key}: value is not valid UTF-8");
                None
            }
        };
        value.filter(|value| !value.is_empty())
    }
}

/// Parses `KEY=VALUE` lines.
///
/// Blank lines and `#` comments are skipped, an `export ` prefix is allowed,
/// and one pair of matching surrounding quotes is removed from the value.
pub fn parse_env_file(contents: &str) -> HashMap<String, String> {
    contents
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}
