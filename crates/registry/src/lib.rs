//! Provider registry: configuration types and loading
//!
//! Maps a logical provider id to its base URL and authentication policy.
//! Loaded once at startup from a TOML file, overlaid with per-provider
//! secrets from environment variables, validated, and then held as
//! read-only state for the life of the process — there is no reload path.
//!
//! The auth policy is a tagged enum selected by the `method` key, so a
//! mismatched auth shape is a TOML parse error at load time rather than
//! something the request path can encounter.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::{Error, Result, Secret};
use serde::Deserialize;
use tracing::info;

/// Where api-key credentials are placed on the outgoing request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddTo {
    #[default]
    Header,
    Query,
}

/// Authentication policy for one provider, tagged by `method`.
///
/// The variant payloads are exactly the fields each method needs; any
/// other combination fails deserialization.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum Auth {
    None,
    Basic {
        username: String,
        password: Secret<String>,
        /// Declared for parity with api-key placement, but basic
        /// credentials are header-only: `query` is rejected at load time.
        #[serde(default)]
        add_to: AddTo,
    },
    ApiKey {
        key: String,
        value: Secret<String>,
        #[serde(default)]
        add_to: AddTo,
    },
    Bearer {
        token: Secret<String>,
    },
    Oauth {
        header_prefix: String,
        client_id: String,
        client_secret: Secret<String>,
        auth_url: String,
    },
}

impl Auth {
    /// Method label for logging and error messages.
    pub fn method(&self) -> &'static str {
        match self {
            Auth::None => "none",
            Auth::Basic { .. } => "basic",
            Auth::ApiKey { .. } => "apiKey",
            Auth::Bearer { .. } => "bearer",
            Auth::Oauth { .. } => "oauth",
        }
    }
}

/// Connection and authentication settings for one provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Absolute URL prefix for all requests to this provider
    pub base_url: String,
    pub auth: Auth,
}

fn default_timeout() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

/// Immutable provider registry, the process-wide source of provider
/// configuration.
#[derive(Debug, Deserialize)]
pub struct Registry {
    /// Request timeout applied to every outgoing call
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Durable token storage for oauth providers
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    pub providers: HashMap<String, ProviderConfig>,
}

impl Registry {
    /// Load the registry from a TOML file.
    ///
    /// After parsing, per-provider secrets are overlaid from environment
    /// variables (see [`secret_env_var`]), then the whole registry is
    /// validated. Any failure here is a startup error; nothing is
    /// retried or deferred to request time.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut registry: Registry = toml::from_str(&contents)?;

        registry.overlay_env();
        registry.validate()?;

        info!(
            path = %path.display(),
            providers = registry.providers.len(),
            "provider registry loaded"
        );
        Ok(registry)
    }

    /// Resolve a provider id to its configuration.
    ///
    /// The returned reference is valid for the registry's lifetime and the
    /// underlying values never change, so repeated calls observe identical
    /// configuration.
    pub fn resolve(&self, provider: &str) -> Result<&ProviderConfig> {
        self.providers
            .get(provider)
            .ok_or_else(|| Error::UnknownProvider(provider.to_string()))
    }

    /// Request timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("member-fetch.toml")
    }

    /// Replace configured secrets with environment values where present.
    ///
    /// Env vars take precedence over the TOML so deployments can keep
    /// credential material out of the config file entirely (the TOML value
    /// then acts as a placeholder).
    fn overlay_env(&mut self) {
        for (id, provider) in &mut self.providers {
            let Ok(value) = std::env::var(secret_env_var(id, &provider.auth)) else {
                continue;
            };
            match &mut provider.auth {
                Auth::None => {}
                Auth::Basic { password, .. } => *password = Secret::new(value),
                Auth::ApiKey { value: v, .. } => *v = Secret::new(value),
                Auth::Bearer { token } => *token = Secret::new(value),
                Auth::Oauth { client_secret, .. } => *client_secret = Secret::new(value),
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than 0".into()));
        }

        for (id, provider) in &self.providers {
            validate_url(id, "base_url", &provider.base_url)?;

            match &provider.auth {
                Auth::Basic {
                    add_to: AddTo::Query,
                    ..
                } => {
                    return Err(Error::Config(format!(
                        "provider {id}: basic auth supports add_to = \"header\" only"
                    )));
                }
                Auth::Oauth { auth_url, .. } => validate_url(id, "auth_url", auth_url)?,
                _ => {}
            }
        }
        Ok(())
    }
}

fn validate_url(provider: &str, field: &str, url: &str) -> Result<()> {
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(Error::Config(format!(
            "provider {provider}: {field} must start with http:// or https://, got: {url}"
        )));
    }
    Ok(())
}

/// Environment variable holding the secret for a provider's auth method,
/// e.g. `API_BILLING_CLIENT_SECRET` for an oauth provider named `billing`.
pub fn secret_env_var(provider: &str, auth: &Auth) -> String {
    let id: String = provider
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    let suffix = match auth {
        Auth::None => "NONE",
        Auth::Basic { .. } => "PASSWORD",
        Auth::ApiKey { .. } => "API_KEY",
        Auth::Bearer { .. } => "TOKEN",
        Auth::Oauth { .. } => "CLIENT_SECRET",
    };
    format!("API_{id}_{suffix}")
}
