//! OAuth refresh-token exchange
//!
//! A single POST to the provider's token endpoint with the
//! `refresh_token` grant. The exchange is never retried — on failure the
//! caller surfaces the original request's 401.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Response from a provider's token endpoint.
///
/// `refresh_token` is optional: some endpoints rotate it on every exchange,
/// others omit it and expect the previous one to stay valid. The refresher
/// only overwrites the stored refresh token when a new one is present.
#[derive(Debug, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Exchange a refresh token for a new access token.
///
/// Sends `{client_id, client_secret, grant_type: "refresh_token",
/// refresh_token}` as a JSON body and expects a JSON response carrying at
/// least `access_token`.
pub async fn exchange(
    client: &reqwest::Client,
    auth_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenResponse> {
    let response = client
        .post(auth_url)
        .json(&serde_json::json!({
            "client_id": client_id,
            "client_secret": client_secret,
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
        }))
        .send()
        .await
        .map_err(|e| Error::RefreshFailed(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::RefreshFailed(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::RefreshFailed(format!("invalid token response: {e}")))
}
