//! Single-flight token refresh per provider
//!
//! Two calls hitting the same provider can both see a 401 and both decide
//! to refresh. Without coordination each would post its own exchange, and
//! whichever lands second would rotate away the refresh token the other
//! just stored. The refresher holds one async mutex per provider: the
//! first caller performs the exchange, later callers find a newer access
//! token in the store and reuse it without touching the token endpoint.

use std::collections::HashMap;
use std::sync::Arc;

use registry::{Auth, ProviderConfig};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::store::CredentialStore;
use crate::token;

/// Performs refresh-token exchanges, serialized per provider.
pub struct Refresher {
    store: Arc<CredentialStore>,
    http: reqwest::Client,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Refresher {
    pub fn new(store: Arc<CredentialStore>, http: reqwest::Client) -> Self {
        Self {
            store,
            http,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Refresh the access token for an oauth provider.
    ///
    /// `stale_token` is the access token the failing request was sent with
    /// (`None` if it went out unauthenticated). If the store holds a
    /// different token by the time the provider lock is acquired, another
    /// caller already refreshed and that token is returned as-is.
    ///
    /// On a successful exchange both tokens are overwritten in the store;
    /// if the response omitted `refresh_token`, the previous refresh token
    /// is kept. The exchange itself is never retried.
    pub async fn refresh(
        &self,
        provider: &str,
        config: &ProviderConfig,
        stale_token: Option<&str>,
    ) -> Result<String> {
        let Auth::Oauth {
            client_id,
            client_secret,
            auth_url,
            ..
        } = &config.auth
        else {
            return Err(Error::RefreshUnavailable(provider.to_string()));
        };

        let lock = self.provider_lock(provider).await;
        let _guard = lock.lock().await;

        if let Some(current) = self.store.access_token(provider).await {
            if stale_token != Some(current.as_str()) {
                debug!(provider, "access token already refreshed by concurrent caller");
                return Ok(current);
            }
        }

        let refresh_token = self
            .store
            .refresh_token(provider)
            .await
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::MissingRefreshToken(provider.to_string()))?;

        let response = token::exchange(
            &self.http,
            auth_url,
            client_id,
            client_secret.expose(),
            &refresh_token,
        )
        .await?;

        self.store
            .set_access_token(provider, &response.access_token)
            .await?;
        match &response.refresh_token {
            Some(rotated) => self.store.set_refresh_token(provider, rotated).await?,
            None => debug!(provider, "token response omitted refresh_token, keeping previous"),
        }

        info!(provider, "access token refreshed");
        Ok(response.access_token)
    }

    async fn provider_lock(&self, provider: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
