//! Normalized connection configuration.
//!
//! [`ConnectionConfig`] is the single output of connection-string parsing.
//! Every field always carries a value: anything the input does not mention
//! keeps the defaults below.

use std::fmt;

use zeroize::Zeroizing;

/// Default SQL Server TCP port.
pub const DEFAULT_PORT: u32 = 1433;

/// Database selected when the connection string does not name one.
pub const DEFAULT_DATABASE: &str = "master";

/// Port as written in a connection string.
///
/// Parsing never fails on a bad port. A fragment that does not start with a
/// non-negative integer is kept as [`Port::Invalid`] and it is up to the
/// caller to reject it, see [`ConnectionConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Port {
    /// A non-negative integer, not yet checked against the TCP port range
    Number(u32),
    /// The raw fragment that could not be read as a number
    Invalid(String),
}

impl Default for Port {
    fn default() -> Self {
        Self::Number(DEFAULT_PORT)
    }
}

impl Port {
    /// Reads a port fragment the lenient way connection strings are usually
    /// read: leading whitespace and a sign are accepted, and parsing stops at
    /// the first non-digit (`"1500abc"` reads as 1500).
    ///
    /// # Example
    /// ```rust
    /// use sqlprobe_core::Port;
    ///
    /// assert_eq!(Port::parse_lenient(" 1500"), Port::Number(1500));
    /// assert_eq!(Port::parse_lenient("1500abc"), Port::Number(1500));
    /// assert_eq!(Port::parse_lenient("abc"), Port::Invalid("abc".to_string()));
    /// ```
    pub fn parse_lenient(fragment: &str) -> Self {
        let trimmed = fragment.trim_start();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let digits_end = unsigned
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(unsigned.len());
        let digits = &unsigned[..digits_end];

        match digits.parse::<u32>() {
            Ok(0) => Self::Number(0),
            Ok(value) if !negative => Self::Number(value),
            _ => Self::Invalid(fragment.to_string()),
        }
    }

    /// Returns the port if it is usable for a TCP connection (1..=65535).
    pub fn tcp(&self) -> Option<u16> {
        match self {
            Self::Number(value) => u16::try_from(*value).ok().filter(|port| *port != 0),
            Self::Invalid(_) => None,
        }
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Invalid(raw) => write!(f, "<invalid: {raw:?}>"),
        }
    }
}

/// Connection settings produced from a connection string.
///
/// # Security
/// The password is kept in a `Zeroizing` container and is left out of both
/// the `Debug` and `Display` output.
///
/// # Example
/// ```rust
/// use sqlprobe_core::ConnectionConfig;
///
/// let config = ConnectionConfig::new("dbhost")
///     .with_port(1434)
///     .with_database("sales")
///     .with_user("admin");
///
/// assert!(config.validate().is_ok());
/// assert_eq!(config.to_string(), "ConnectionConfig(dbhost:1434/sales)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Login name, may be empty
    pub user: String,
    /// Login password, may be empty
    pub password: Zeroizing<String>,
    /// Host name or address
    pub server: String,
    /// TCP port
    pub port: Port,
    /// Initial database
    pub database: String,
    /// Whether the connection must be encrypted
    pub encrypt: bool,
    /// Whether the server certificate is accepted without validation
    pub trust_server_certificate: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            user: String::new(),
            password: Zeroizing::new(String::new()),
            server: String::new(),
            port: Port::default(),
            database: DEFAULT_DATABASE.to_string(),
            encrypt: false,
            trust_server_certificate: true,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("user", &self.user)
            .field("password", &crate::error::REDACTED)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .finish()
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConnectionConfig({}:{}/{})",
            self.server, self.port, self.database
        )
        // Intentionally omit user and never include credentials
    }
}

impl ConnectionConfig {
    /// Creates a config for `server` with every other field defaulted.
    pub fn new(server: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            ..Default::default()
        }
    }

    /// Checks that the configuration can be used to open a connection.
    ///
    /// Parsing accepts anything; this is where a missing server or an
    /// unusable port is turned into an error.
    ///
    /// # Errors
    /// Returns a configuration error if the server is empty or the port is
    /// not a number in `1..=65535`.
    pub fn validate(&self) -> crate::Result<()> {
        if self.server.is_empty() {
            return Err(crate::error::SqlProbeError::configuration(
                "server cannot be empty",
            ));
        }

        if self.port.tcp().is_none() {
            return Err(crate::error::SqlProbeError::configuration(format!(
                "port must be between 1 and 65535, got {}",
                self.port
            )));
        }

        Ok(())
    }

    /// Builder method to set port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Port::Number(u32::from(port));
        self
    }

    /// Builder method to set database.
    #[must_use]
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Builder method to set user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Builder method to set password.
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Zeroizing::new(password.into());
        self
    }

    /// Builder method to set the encryption flags.
    #[must_use]
    pub fn with_encryption(mut self, encrypt: bool, trust_server_certificate: bool) -> Self {
        self.encrypt = encrypt;
        self.trust_server_certificate = trust_server_certificate;
        self
    }
}
