//! Request dispatcher
//!
//! The sole public entry point of the request layer: callers hand
//! [`Client::send`] a provider name and a request description, and get back
//! the provider's response or a kind-distinguishable error. The dispatcher
//! resolves provider configuration, decorates the request with credentials,
//! issues it, and — for oauth providers only — refreshes the access token
//! on a 401 and retries exactly once.
//!
//! The retry bound is structural: `send` is straight-line code with one
//! refresh and one reissue, never a loop or recursion.

mod decorate;
mod error;
mod response;

pub use decorate::decorate;
pub use error::{Error, Result};
pub use response::ApiResponse;

use std::collections::BTreeMap;
use std::sync::Arc;

use provider_auth::{CredentialStore, Refresher};
use registry::{Auth, ProviderConfig, Registry};
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use tracing::{debug, warn};
use uuid::Uuid;

/// Optional parts of a request: query parameters, JSON body, extra headers.
///
/// Owned by the call; the dispatcher clones from it for each attempt so the
/// retry after a token refresh reissues the original request unchanged.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub params: BTreeMap<String, String>,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
}

/// Multi-provider HTTP client.
///
/// Holds the read-only provider registry, the shared credential store, and
/// one reqwest client with the configured timeout. Cheap to share behind an
/// `Arc`; all state mutation lives in the credential store.
pub struct Client {
    registry: Arc<Registry>,
    store: Arc<CredentialStore>,
    refresher: Refresher,
    http: reqwest::Client,
}

impl Client {
    /// Build a client over a loaded registry and credential store.
    pub fn new(registry: Arc<Registry>, store: Arc<CredentialStore>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(registry.timeout())
            .build()?;
        let refresher = Refresher::new(store.clone(), http.clone());
        Ok(Self {
            registry,
            store,
            refresher,
            http,
        })
    }

    /// Send a request to a named provider.
    ///
    /// `path` is relative to the provider's `base_url`. The response is
    /// returned verbatim whatever its status, with one exception: a 401 is
    /// surfaced as [`Error::Unauthorized`] — after a single transparent
    /// refresh-and-retry when the provider uses oauth.
    ///
    /// A failed token exchange is logged and converted into the original
    /// call's `Unauthorized` outcome so token-endpoint internals don't leak
    /// to callers; missing-refresh-token and non-oauth-refresh conditions
    /// surface as [`Error::Refresh`].
    #[tracing::instrument(
        skip(self, options),
        fields(request_id = %Uuid::new_v4(), method = %method)
    )]
    pub async fn send(
        &self,
        provider: &str,
        method: Method,
        path: &str,
        options: SendOptions,
    ) -> Result<ApiResponse> {
        let config = self.registry.resolve(provider)?;

        // The token this attempt goes out with; the refresher uses it to
        // detect a concurrent refresh that already replaced it.
        let sent_token = match &config.auth {
            Auth::Oauth { .. } => self.store.access_token(provider).await,
            _ => None,
        };

        let response = self
            .issue(config, method.clone(), path, &options, sent_token.as_deref())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        if !matches!(config.auth, Auth::Oauth { .. }) {
            return Err(Error::Unauthorized(provider.to_string()));
        }

        debug!(provider, "401 from oauth provider, refreshing access token");
        let fresh = match self
            .refresher
            .refresh(provider, config, sent_token.as_deref())
            .await
        {
            Ok(token) => token,
            Err(
                e @ (provider_auth::Error::MissingRefreshToken(_)
                | provider_auth::Error::RefreshUnavailable(_)),
            ) => return Err(e.into()),
            Err(e) => {
                warn!(provider, error = %e, "token refresh failed, surfacing original 401");
                return Err(Error::Unauthorized(provider.to_string()));
            }
        };

        // Exactly one reissue of the original request with the new token.
        let retried = self
            .issue(config, method, path, &options, Some(&fresh))
            .await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            return Err(Error::Unauthorized(provider.to_string()));
        }
        Ok(retried)
    }

    /// Decorate and issue one attempt.
    async fn issue(
        &self,
        config: &ProviderConfig,
        method: Method,
        path: &str,
        options: &SendOptions,
        access_token: Option<&str>,
    ) -> Result<ApiResponse> {
        let mut headers = options.headers.clone();
        let mut params = options.params.clone();
        decorate(&mut headers, &mut params, &config.auth, access_token)?;

        let url = format!(
            "{}/{}",
            config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );

        let mut request = self.http.request(method, url).headers(headers);
        if !params.is_empty() {
            request = request.query(&params);
        }
        if let Some(body) = &options.body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(Error::Transport)?;
        ApiResponse::read(response).await
    }
}
