use serde::{Deserialize, Serialize};

use crate::value::Record;

/// Outcome of a gateway operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
    /// Nothing was done, but nothing went wrong either
    Warning,
}

/// The uniform `{status, data, message}` result of every gateway operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Record>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Envelope {
    pub fn rows(data: Vec<Record>, message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            data: Some(data),
            message: Some(message.into()),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: Status::Success,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            status: Status::Warning,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// The returned rows, or the error message if the operation failed
    ///
    /// Warnings and data-less successes yield no rows.
    pub fn into_rows(self) -> Result<Vec<Record>, String> {
        match self.status {
            Status::Error => Err(self.message.unwrap_or_default()),
            Status::Success | Status::Warning => Ok(self.data.unwrap_or_default()),
        }
    }
}
