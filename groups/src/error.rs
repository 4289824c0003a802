use gatekeeper_store::StoreError;
use gatekeeper_types::TypeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GroupError {
    #[error("invalid invite link: {0}")]
    InvalidLink(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("group store error: {0}")]
    Store(#[from] StoreError),
}

impl From<TypeError> for GroupError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::EmptyField(field) => Self::EmptyField(field),
            other => Self::InvalidLink(other.to_string()),
        }
    }
}
