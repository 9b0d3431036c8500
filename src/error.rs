use std::fmt;

/// Result alias used across the reconciliation pipeline.
pub type Result<T> = std::result::Result<T, Error>;

/// Failure taxonomy for a reconciliation pass.
///
/// Only `DirectoryUnavailable` on the top-level structure listing and
/// `Config` at startup are fatal. Every other variant is logged and counted
/// by the engine so the pass can continue with the remaining sensors.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Structure or sensor listing failed, or returned a non-success status
    DirectoryUnavailable(String),
    /// Expected fields absent from a directory payload
    MalformedResponse(String),
    /// Read or write of a persisted sensor record failed
    StoreFailure(String),
    /// Notification or metrics delivery failed
    SinkFailure(String),
    /// Missing or invalid configuration value
    Config(String),
}

impl Error {
    /// Wraps an `anyhow` chain, keeping every context layer in the message.
    pub(crate) fn directory(err: anyhow::Error) -> Self {
        Error::DirectoryUnavailable(format!("{:#}", err))
    }

    pub(crate) fn store(err: anyhow::Error) -> Self {
        Error::StoreFailure(format!("{:#}", err))
    }

    pub(crate) fn sink(err: anyhow::Error) -> Self {
        Error::SinkFailure(format!("{:#}", err))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DirectoryUnavailable(msg) => write!(f, "structure directory unavailable: {}", msg),
            Error::MalformedResponse(msg) => write!(f, "malformed directory response: {}", msg),
            Error::StoreFailure(msg) => write!(f, "sensor state store failure: {}", msg),
            Error::SinkFailure(msg) => write!(f, "sink delivery failure: {}", msg),
            Error::Config(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
