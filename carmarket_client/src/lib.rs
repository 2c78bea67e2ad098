//! The warehouse gateway: runs one statement per call against the warehouse
//! and reports the outcome as an [`Envelope`](carmarket_types::Envelope).

pub mod config;
pub mod connection;
mod gateway;
pub mod kyuubi;
pub mod mock;

use reqwest::{Method, StatusCode};

pub use config::{AuthMechanism, ParseAuthMechanismError, WarehouseConfig};
pub use connection::{Connection, Connector, ResultSet};
pub use gateway::Gateway;
pub use kyuubi::KyuubiConnector;

/// Failures talking to the warehouse
///
/// These never leave a [`Gateway`] call; they are folded into error envelopes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("request URL error: {0}")]
    RequestUrl(#[from] url::ParseError),

    #[error("failed to send {method} {url} request: {source}")]
    RequestSend {
        method: Method,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("warehouse responded with error [{code}]: {message}")]
    ApiError { code: StatusCode, message: String },

    #[error("failed to parse JSON response: {0}")]
    Json(#[source] reqwest::Error),

    #[error("failed to read plaintext response: {0}")]
    Text(#[source] reqwest::Error),

    #[error("auth mechanism {0} is not supported")]
    UnsupportedAuth(AuthMechanism),

    #[error("auth mechanism {0} requires a password")]
    MissingPassword(AuthMechanism),

    #[error("warehouse unavailable: {0}")]
    Unavailable(String),

    #[error("statement ended in {state}: {message}")]
    Statement { state: String, message: String },

    #[error("statement execution panicked: {0}")]
    Panicked(String),
}

impl Error {
    fn request_send(method: Method, url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::RequestSend {
            method,
            url: url.into(),
            source,
        }
    }

    fn panicked(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic payload".to_string());
        Self::Panicked(message)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
