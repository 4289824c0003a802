use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("unknown region code: {0}")]
    UnknownRegion(String),
}
