//! Error types for credential storage and token refresh

/// Errors from credential storage and refresh operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("token refresh not supported for provider {0} (not an oauth provider)")]
    RefreshUnavailable(String),

    #[error("no refresh token on record for provider {0}")]
    MissingRefreshToken(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("credential parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
