//! ADO/ODBC-style `Key=Value;Key=Value` connection strings.
//!
//! Keys are case-insensitive and surrounding whitespace is ignored. Unknown
//! keys are skipped so strings written for other drivers still parse.
//!
//! | Key | Field |
//! |---|---|
//! | `Server`, `Data Source` | server, and port after a `,` |
//! | `Database`, `Initial Catalog` | database |
//! | `User Id`, `UID`, `User` | user |
//! | `Password`, `PWD` | password |
//! | `Encrypt` | encrypt (`true`/`yes`) |
//! | `TrustServerCertificate` | trust server certificate (`true`/`yes`) |

use zeroize::Zeroizing;

use crate::ConnectionConfig;
use crate::config::Port;

/// One recognized (or skipped) `Key=Value` segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyValueAttribute<'a> {
    /// `Server` / `Data Source`, split on the first `,`
    Server {
        /// Host part before the comma
        host: &'a str,
        /// Port fragment after the comma, if non-empty
        port: Option<&'a str>,
    },
    /// `Database` / `Initial Catalog`
    Database(&'a str),
    /// `User Id` / `UID` / `User`
    User(&'a str),
    /// `Password` / `PWD`
    Password(&'a str),
    /// `Encrypt`
    Encrypt(bool),
    /// `TrustServerCertificate`
    TrustServerCertificate(bool),
    /// Any other key; its value is never retained
    Unknown {
        /// Key as written, trimmed
        key: &'a str,
    },
}

impl<'a> KeyValueAttribute<'a> {
    fn from_pair(key: &'a str, value: &'a str) -> Self {
        match key.to_lowercase().as_str() {
            "server" | "data source" => {
                let mut parts = value.split(',');
                let host = parts.next().unwrap_or_default();
                let port = parts.next().filter(|port| !port.is_empty());
                Self::Server { host, port }
            }
            "database" | "initial catalog" => Self::Database(value),
            "user id" | "uid" | "user" => Self::User(value),
            "password" | "pwd" => Self::Password(value),
            "encrypt" => Self::Encrypt(is_truthy(value)),
            "trustservercertificate" => Self::TrustServerCertificate(is_truthy(value)),
            _ => Self::Unknown { key },
        }
    }
}

/// A key-value connection string split into attributes, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueForm<'a> {
    /// Attributes from segments that contained `=` and a non-empty key
    pub attributes: Vec<KeyValueAttribute<'a>>,
}

impl<'a> KeyValueForm<'a> {
    /// Splits `raw` into segments on `;` and each segment on its first `=`.
    ///
    /// Segments without `=` or with an empty key are dropped.
    pub fn tokenize(raw: &'a str) -> Self {
        let attributes = raw
            .split(';')
            .filter_map(|segment| {
                let Some((key, value)) = segment.split_once('=') else {
                    if !segment.trim().is_empty() {
                        tracing::debug!("ignoring connection string segment without '='");
                    }
                    return None;
                };
                let key = key.trim();
                if key.is_empty() {
                    tracing::debug!("ignoring connection string segment with empty key");
                    return None;
                }
                let attribute = KeyValueAttribute::from_pair(key, value.trim());
                if let KeyValueAttribute::Unknown { key } = attribute {
                    tracing::debug!(key = key, "ignoring unknown connection string option");
                }
                Some(attribute)
            })
            .collect();

        Self { attributes }
    }

    /// Writes the attributes over the defaults in `config`. Later attributes
    /// win over earlier ones.
    pub(crate) fn apply(&self, config: &mut ConnectionConfig) {
        for attribute in &self.attributes {
            match *attribute {
                KeyValueAttribute::Server { host, port } => {
                    config.server = host.to_string();
                    if let Some(port) = port {
                        config.port = Port::parse_lenient(port);
                    }
                }
                KeyValueAttribute::Database(database) => config.database = database.to_string(),
                KeyValueAttribute::User(user) => config.user = user.to_string(),
                KeyValueAttribute::Password(password) => {
                    config.password = Zeroizing::new(password.to_string());
                }
                KeyValueAttribute::Encrypt(encrypt) => config.encrypt = encrypt,
                KeyValueAttribute::TrustServerCertificate(trust) => {
                    config.trust_server_certificate = trust;
                }
                KeyValueAttribute::Unknown { .. } => {}
            }
        }
    }
}

/// Returns true for the keys whose value is a password.
pub(crate) fn is_password_key(key: &str) -> bool {
    matches!(key.to_lowercase().as_str(), "password" | "pwd")
}

/// Truth rule for key-value flags: `true` or `yes`, in any case.
fn is_truthy(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "true" || value == "yes"
}
