//! Member list fetch
//!
//! Small CLI consumer of the request layer:
//! 1. Loads the provider registry and credential store
//! 2. Fetches `user.json` from the configured provider
//! 3. Maps each `data.data[]` record into a `Member` entity
//! 4. Prints the members as JSON
//!
//! On any fetch failure the error is logged and an empty member list is
//! printed — the layer underneath has already classified the failure.

use std::sync::Arc;

use anyhow::{Context, Result};
use dispatch::{Client, SendOptions};
use provider_auth::CredentialStore;
use registry::Registry;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_PROVIDER: &str = "members";

/// Wire shape of the member list endpoint: `{"data": [record, ...]}`.
#[derive(Debug, Deserialize)]
struct MemberListBody {
    data: Vec<MemberRecord>,
}

// Records are mapped leniently: only email is required, so one sparse
// record doesn't fail the whole list.
#[derive(Debug, Deserialize)]
struct MemberRecord {
    #[serde(default)]
    id: Option<u64>,
    email: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    age: Option<u32>,
}

/// Domain entity presented to the user.
#[derive(Debug, Serialize)]
struct Member {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<u64>,
    email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    age: Option<u32>,
}

impl From<MemberRecord> for Member {
    fn from(record: MemberRecord) -> Self {
        Member {
            id: record.id,
            email: record.email,
            name: record.full_name,
            age: record.age,
        }
    }
}

/// Fetch and map the member list from the given provider.
async fn fetch_members(client: &Client, provider: &str) -> Result<Vec<Member>> {
    let response = client
        .send(provider, Method::GET, "user.json", SendOptions::default())
        .await?;
    anyhow::ensure!(
        response.status().is_success(),
        "member list fetch returned {}",
        response.status()
    );
    let body: MemberListBody = response.json()?;
    Ok(body.data.into_iter().map(Member::from).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // CLI: simple --config / --provider flag parsing
    let args: Vec<String> = std::env::args().collect();
    let flag = |name: &str| {
        args.iter()
            .position(|a| a == name)
            .and_then(|i| args.get(i + 1))
            .map(|s| s.as_str())
    };

    let config_path = Registry::resolve_path(flag("--config"));
    let provider = flag("--provider").unwrap_or(DEFAULT_PROVIDER).to_string();

    info!(path = %config_path.display(), provider, "loading configuration");
    let registry = Arc::new(
        Registry::load(&config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?,
    );

    let store = Arc::new(
        CredentialStore::load(registry.credentials_path.clone())
            .await
            .context("failed to load credential store")?,
    );

    let client = Client::new(registry, store).context("failed to build client")?;

    // Fetch failures are not fatal to the process: log and show an empty set
    let members = match fetch_members(&client, &provider).await {
        Ok(members) => {
            info!(count = members.len(), "fetched member list");
            members
        }
        Err(e) => {
            error!(error = %e, provider, "failed to fetch member list");
            Vec::new()
        }
    };

    println!("{}", serde_json::to_string_pretty(&members)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::{Auth, ProviderConfig};
    use serde_json::json;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use wiremock::matchers::{method as http_method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_against(server: &MockServer, dir: &tempfile::TempDir) -> Client {
        let registry = Arc::new(Registry {
            timeout_secs: 5,
            credentials_path: PathBuf::from("unused"),
            providers: HashMap::from([(
                "members".to_string(),
                ProviderConfig {
                    base_url: server.uri(),
                    auth: Auth::None,
                },
            )]),
        });
        let store = Arc::new(
            CredentialStore::load(dir.path().join("credentials.json"))
                .await
                .unwrap(),
        );
        Client::new(registry, store).unwrap()
    }

    #[tokio::test]
    async fn maps_full_name_to_name() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(url_path("/user.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"id": 1, "email": "ada@example.com", "full_name": "Ada Lovelace", "age": 36},
                    {"email": "anon@example.com", "age": 20},
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, &dir).await;

        let members = fetch_members(&client, "members").await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].id, Some(1));
        assert_eq!(members[0].name.as_deref(), Some("Ada Lovelace"));
        assert_eq!(members[0].email, "ada@example.com");
        assert_eq!(members[0].age, Some(36));
        assert!(members[1].id.is_none());
        assert!(members[1].name.is_none());
    }

    #[tokio::test]
    async fn record_without_age_does_not_fail_the_list() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(url_path("/user.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    {"email": "sparse@example.com"},
                    {"id": 2, "email": "bob@example.com", "full_name": "Bob", "age": 41},
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, &dir).await;

        let members = fetch_members(&client, "members").await.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].email, "sparse@example.com");
        assert!(members[0].age.is_none());
        assert_eq!(members[1].age, Some(41));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(http_method("GET"))
            .and(url_path("/user.json"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, &dir).await;

        let err = fetch_members(&client, "members").await.unwrap_err();
        assert!(err.to_string().contains("500"), "got: {err}");
    }

    #[tokio::test]
    async fn unknown_provider_is_an_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let client = client_against(&server, &dir).await;

        let result = fetch_members(&client, "provider9").await;
        assert!(result.is_err());
    }
}
