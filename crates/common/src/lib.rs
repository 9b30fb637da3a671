//! Shared types for the multi-provider request layer

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
