//! Credential storage and OAuth token refresh
//!
//! This crate owns the two stateful pieces of the request layer:
//!
//! 1. `CredentialStore` — durable per-provider access/refresh token strings,
//!    persisted as a JSON file that survives process restarts.
//! 2. `Refresher` — the refresh-token exchange against a provider's token
//!    endpoint, serialized per provider so concurrent 401s share a single
//!    exchange instead of racing each other's rotation.
//!
//! Refresh flow:
//! 1. Dispatcher receives 401 from an oauth provider
//! 2. `Refresher::refresh()` acquires the provider's refresh lock
//! 3. If another caller already refreshed, the stored token is reused
//! 4. Otherwise `token::exchange()` posts the refresh grant to `auth_url`
//! 5. New tokens overwrite the store; the dispatcher retries once

pub mod error;
pub mod refresh;
pub mod store;
pub mod token;

pub use error::{Error, Result};
pub use refresh::Refresher;
pub use store::CredentialStore;
pub use token::{TokenResponse, exchange};
