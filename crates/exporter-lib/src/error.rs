//! Error taxonomy for a collection cycle
//!
//! None of these errors is fatal to the process. Authentication and
//! inventory failures end the current cycle early, alarm failures are
//! local to one cluster, probe failures never touch liveness.

use std::path::PathBuf;

/// Credentials rejected or controller unreachable.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The controller answered but refused the credentials.
    #[error("authentication rejected by controller: {0}")]
    Rejected(String),

    /// The controller could not be reached at all.
    #[error("controller unreachable: {0}")]
    Unreachable(String),

    /// The configured endpoint is not a usable URL.
    #[error("invalid controller endpoint: {0}")]
    InvalidEndpoint(String),
}

/// A data query failed after authentication succeeded.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Transport level failure (connection reset, timeout, TLS).
    #[error("{operation} request failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    /// Non-2xx HTTP status.
    #[error("{operation} returned HTTP {status}")]
    Status { operation: &'static str, status: u16 },

    /// The controller replied with a request_status other than Ok.
    #[error("{operation} rejected by controller: {status}: {message}")]
    Rejected {
        operation: &'static str,
        status: String,
        message: String,
    },

    /// The reply body could not be decoded.
    #[error("{operation} reply could not be decoded: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl FetchError {
    /// Name of the controller operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            FetchError::Transport { operation, .. }
            | FetchError::Status { operation, .. }
            | FetchError::Rejected { operation, .. }
            | FetchError::Decode { operation, .. } => operation,
        }
    }
}

/// Filesystem scan problem; always non-fatal.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("probe task did not complete: {0}")]
    Join(String),
}
