//! Auth strategy resolver
//!
//! `decorate` is a pure transformation of the outgoing headers and query
//! parameters according to the provider's auth policy. It performs no I/O:
//! for oauth the current access token is read by the dispatcher and passed
//! in, so the same function can re-decorate the retry after a refresh.

use std::collections::BTreeMap;
use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use registry::{AddTo, Auth};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};

use crate::error::{Error, Result};

/// Attach authentication material to an outgoing request description.
///
/// Existing headers and params are preserved; decoration only ever adds
/// (or overwrites) the single entry its auth method calls for.
///
/// - `none`: unchanged
/// - `basic`: `Authorization: Basic base64(username:password)` (header
///   only; query placement is rejected by the registry at load time)
/// - `apiKey`: exactly one of `headers[key]` / `params[key]` per `add_to`
/// - `bearer`: `Authorization: Bearer <static token>`
/// - `oauth`: `Authorization: <header_prefix> <access token>` when a token
///   is on record, otherwise no Authorization header at all
pub fn decorate(
    headers: &mut HeaderMap,
    params: &mut BTreeMap<String, String>,
    auth: &Auth,
    access_token: Option<&str>,
) -> Result<()> {
    match auth {
        Auth::None => {}
        Auth::Basic {
            username, password, ..
        } => {
            let encoded = BASE64.encode(format!("{username}:{}", password.expose()));
            headers.insert(AUTHORIZATION, header_value(&format!("Basic {encoded}"))?);
        }
        Auth::ApiKey { key, value, add_to } => match add_to {
            AddTo::Header => {
                let name = HeaderName::from_str(key).map_err(|e| {
                    config_error(format!("invalid api-key header name {key:?}: {e}"))
                })?;
                headers.insert(name, header_value(value.expose())?);
            }
            AddTo::Query => {
                params.insert(key.clone(), value.expose().clone());
            }
        },
        Auth::Bearer { token } => {
            headers.insert(
                AUTHORIZATION,
                header_value(&format!("Bearer {}", token.expose()))?,
            );
        }
        Auth::Oauth { header_prefix, .. } => {
            if let Some(token) = access_token {
                headers.insert(
                    AUTHORIZATION,
                    header_value(&format!("{header_prefix} {token}"))?,
                );
            }
        }
    }
    Ok(())
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| config_error(format!("credential is not a valid header value: {e}")))
}

fn config_error(msg: String) -> Error {
    Error::Config(common::Error::Config(msg))
}
