use gatekeeper_gateway::GatewayError;
use gatekeeper_groups::GroupError;
use gatekeeper_store::StoreError;
use gatekeeper_store_lmdb::LmdbError;
use gatekeeper_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("store error: {0}")]
    Store(StoreError),

    #[error("group error: {0}")]
    Group(#[from] GroupError),

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("database error: {0}")]
    Lmdb(#[from] LmdbError),

    /// Malformed input from a user or administrator. Nothing was changed.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The write would break a uniqueness rule. Nothing was changed.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("missing required credential: {0}")]
    MissingCredential(&'static str),

    #[error("config error: {0}")]
    Config(String),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for AdmissionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(what) => Self::Conflict(what),
            other => Self::Store(other),
        }
    }
}

impl From<TypeError> for AdmissionError {
    fn from(e: TypeError) -> Self {
        Self::Validation(e.to_string())
    }
}
