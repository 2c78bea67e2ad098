use std::{fmt::Display, str::FromStr};

use secrecy::Secret;
use url::Url;

use crate::Result;

pub const DEFAULT_WAREHOUSE_HOST: &str = "127.0.0.1";
pub const DEFAULT_WAREHOUSE_PORT: u16 = 10099;
pub const DEFAULT_DATABASE: &str = "default";

/// How the gateway authenticates against the warehouse
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthMechanism {
    /// No credentials at all
    NoSasl,
    /// User name with an optional password, `anonymous` when unset
    #[default]
    Plain,
    /// User name and a mandatory password
    Ldap,
    Kerberos,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown auth mechanism {0:?}, expected one of NOSASL, NONE, PLAIN, LDAP, KERBEROS")]
pub struct ParseAuthMechanismError(String);

impl FromStr for AuthMechanism {
    type Err = ParseAuthMechanismError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NOSASL" | "NONE" => Ok(Self::NoSasl),
            "PLAIN" => Ok(Self::Plain),
            "LDAP" => Ok(Self::Ldap),
            "KERBEROS" => Ok(Self::Kerberos),
            _ => Err(ParseAuthMechanismError(s.to_string())),
        }
    }
}

impl Display for AuthMechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSasl => write!(f, "NOSASL"),
            Self::Plain => write!(f, "PLAIN"),
            Self::Ldap => write!(f, "LDAP"),
            Self::Kerberos => write!(f, "KERBEROS"),
        }
    }
}

/// Static connection parameters for the warehouse
///
/// Built once at startup and handed to [`Gateway::new`](crate::Gateway::new);
/// every call opens its own session from it.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub auth_mechanism: AuthMechanism,
    pub username: Option<String>,
    pub password: Option<Secret<String>>,
    /// Database sessions start in, and that selects are qualified with
    pub database: String,
    pub use_tls: bool,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_WAREHOUSE_HOST.to_string(),
            port: DEFAULT_WAREHOUSE_PORT,
            auth_mechanism: AuthMechanism::default(),
            username: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
            use_tls: false,
        }
    }
}

impl WarehouseConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    pub fn with_auth(mut self, auth_mechanism: AuthMechanism) -> Self {
        self.auth_mechanism = auth_mechanism;
        self
    }

    pub fn with_credentials<U: Into<String>, P: Into<String>>(
        mut self,
        username: U,
        password: Option<P>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password.map(|p| Secret::new(p.into()));
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_tls(mut self, use_tls: bool) -> Self {
        self.use_tls = use_tls;
        self
    }

    /// Root URL of the warehouse REST endpoint
    pub fn base_url(&self) -> Result<Url> {
        let scheme = if self.use_tls { "https" } else { "http" };
        Ok(Url::parse(&format!("{scheme}://{}:{}/", self.host, self.port))?)
    }
}
