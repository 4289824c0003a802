use thiserror::Error;

/// Outcome of a failed platform call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// The bot lacks the right to act (blocked by the user, not an admin, ...).
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    /// The platform answered with a server-side failure.
    #[error("platform unavailable: {0}")]
    Unavailable(String),

    /// The request never produced an answer (connect failure, timeout).
    #[error("platform unreachable: {0}")]
    Unreachable(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("client configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether repeating the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Unavailable(_) | Self::Unreachable(_)
        )
    }

    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::RateLimited { .. } => "rate_limited",
            Self::Unavailable(_) => "unavailable",
            Self::Unreachable(_) => "unreachable",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Config(_) => "config",
        }
    }
}
