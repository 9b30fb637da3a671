//! Error types for request dispatch
//!
//! Each failure a caller can observe is a distinct variant, so the
//! presentation layer can tell a configuration mistake from an auth
//! rejection from a network fault without string matching.

use thiserror::Error;

/// Errors surfaced by [`crate::Client::send`].
#[derive(Debug, Error)]
pub enum Error {
    /// Unknown provider or malformed configuration. Never retried.
    #[error(transparent)]
    Config(#[from] common::Error),

    /// The provider answered 401 and no (further) refresh was possible.
    #[error("provider {0} rejected the request (401 unauthorized)")]
    Unauthorized(String),

    /// Refresh preconditions failed (non-oauth provider, no refresh token).
    #[error(transparent)]
    Refresh(#[from] provider_auth::Error),

    /// Network-level failure from the transport. Propagated, never retried.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body could not be read or parsed as requested.
    #[error("response decode failed: {0}")]
    Decode(String),
}

/// Result alias for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;
