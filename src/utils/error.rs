use anyhow::anyhow;
use thiserror::Error;

/// The crate-wide error taxonomy (see `SPEC_FULL.md` §7).
///
/// User-facing `Controller` calls validate synchronously and fail fast with
/// one of the typed variants below. Internal event handlers never raise
/// through this type; they log and continue, except for structural invariant
/// violations which `debug_assert!` instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no simulation is currently running")]
    NotRunning,
    #[error("a simulation is already running")]
    AlreadyRunning,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error("host not found: {0}")]
    HostNotFound(u32),
    #[error("insufficient resources for job {job_id}: requested {requested}, got {got}")]
    InsufficientResources {
        job_id: String,
        requested: usize,
        got: usize,
    },
    #[error("resource {0} is already reserved")]
    AlreadyReserved(u32),
    #[error("invalid power-state transition for host {host_id}: {reason}")]
    InvalidState { host_id: u32, reason: String },
    #[error("simulator backend unavailable: {0}")]
    AdapterUnavailable(String),
    #[error(transparent)]
    InvalidConfig(anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Logging(anyhow::Error),
    #[error(transparent)]
    Others(#[from] anyhow::Error),
}

/// A type alias that forces the usage of the custom error type.
pub type Result<T> = std::result::Result<T, Error>;

impl From<tracing::subscriber::SetGlobalDefaultError> for Error {
    fn from(err: tracing::subscriber::SetGlobalDefaultError) -> Self {
        Self::Logging(anyhow::Error::from(err))
    }
}

impl From<tracing_subscriber::util::TryInitError> for Error {
    fn from(err: tracing_subscriber::util::TryInitError) -> Self {
        Self::Logging(anyhow::Error::from(err))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::InvalidConfig(anyhow::Error::from(err))
    }
}

impl Error {
    pub fn adhoc(msg: &'static str) -> Self {
        Self::Others(anyhow!(msg))
    }

    pub fn invalid_config(msg: &'static str) -> Self {
        Self::InvalidConfig(anyhow!(msg))
    }
}
