//! Error kinds surfaced by the query core.
//!
//! Only `MissingCredential` is fatal. Request-level failures are retried by the
//! batch runner and end up recorded on the affected row instead of aborting
//! the run.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("login credential (euisToken) not found; sign in to the target system first")]
    MissingCredential,
    #[error("API request failed: {status}")]
    RequestFailed { status: u16 },
    #[error("API request could not be sent: {0}")]
    Transport(String),
    #[error("API response could not be decoded: {0}")]
    Decode(String),
    #[error("no query values were entered")]
    EmptyInput,
    #[error("no results to {action}")]
    NoResults { action: &'static str },
    #[error("{format} export writer failed: {reason}")]
    ExportLibraryUnavailable { format: &'static str, reason: String },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
    #[error("unknown environment '{0}' (expected UAT or PROD)")]
    UnknownEnvironment(String),
    #[error("unknown query field '{0}'")]
    UnknownField(String),
    #[error("storage error at {path}: {reason}")]
    Storage { path: String, reason: String },
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;
