use serde::Serialize;
use thiserror::Error;

use crate::system::platform::ProbeError;

/// Failure taxonomy shared by every action and lookup the monitor exposes.
#[derive(Debug, Error)]
pub enum Error {
    #[error("process {0} not found")]
    NotFound(u32),

    #[error("permission denied for process {pid}: {reason}")]
    PermissionDenied { pid: u32, reason: String },

    #[error("process {pid} ({name}) is protected")]
    Protected { pid: u32, name: String },

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    PermissionDenied,
    Protected,
    Internal,
}

/// Outcome class an outer transport maps a failure onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportStatus {
    NotFound,
    Forbidden,
    ServerError,
}

impl TransportStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransportStatus::NotFound => "not found",
            TransportStatus::Forbidden => "forbidden",
            TransportStatus::ServerError => "server error",
        }
    }
}

impl Error {
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Error::Protected { .. } => ErrorKind::Protected,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn transport_status(&self) -> TransportStatus {
        match self.kind() {
            ErrorKind::NotFound => TransportStatus::NotFound,
            ErrorKind::PermissionDenied | ErrorKind::Protected => TransportStatus::Forbidden,
            ErrorKind::Internal => TransportStatus::ServerError,
        }
    }

    /// Message safe to hand across the outer boundary. Internal failures are
    /// logged with full detail and reported generically.
    pub fn public_message(&self) -> String {
        match self {
            Error::Internal(detail) => {
                tracing::error!(%detail, "internal failure");
                "internal error while talking to the operating system".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Lift a native-layer failure for `pid` into the taxonomy.
    pub fn from_probe(pid: u32, err: ProbeError) -> Self {
        match err {
            ProbeError::NoSuchProcess(_) => Error::NotFound(pid),
            ProbeError::PermissionDenied(_) => Error::PermissionDenied {
                pid,
                reason: "insufficient privilege".to_string(),
            },
            ProbeError::Unsupported(what) => Error::PermissionDenied {
                pid,
                reason: format!("{what} is not supported on this platform"),
            },
            ProbeError::Unavailable(what) => Error::Internal(format!("{what} unavailable")),
            ProbeError::Io(e) => Error::Internal(e.to_string()),
        }
    }
}
