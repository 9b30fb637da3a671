//! Configuration-level error types
//!
//! Covers everything that can go wrong before a request is ever issued:
//! unreadable config files, malformed TOML, invalid provider definitions,
//! and lookups of providers that were never registered.

use thiserror::Error;

/// Error for configuration loading and provider resolution.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result alias using the configuration Error
pub type Result<T> = std::result::Result<T, Error>;
