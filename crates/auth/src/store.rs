//! Durable credential storage
//!
//! A JSON file of flat string key/value pairs, keyed `{provider}_asess` for
//! access tokens and `{provider}_rsess` for refresh tokens. All writes use
//! atomic temp-file + rename to prevent corruption on crash; a tokio Mutex
//! serializes concurrent writers.
//!
//! The store holds only the token strings — no expiry metadata. Staleness
//! is discovered reactively when a provider answers 401.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

const ACCESS_SUFFIX: &str = "asess";
const REFRESH_SUFFIX: &str = "rsess";

/// Thread-safe credential file manager.
///
/// The Mutex serializes all access. Reads clone the requested value while
/// holding the lock briefly, so request-time reads don't block on writes
/// for longer than a map lookup.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    state: Mutex<HashMap<String, String>>,
}

impl CredentialStore {
    /// Load credentials from the given file path.
    ///
    /// If the file doesn't exist, creates it as `{}` — a cold start with no
    /// tokens. The first oauth call will then go out unauthenticated and
    /// fail, which is the expected bootstrap path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading credential file: {e}")))?;
            let state: HashMap<String, String> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing credential file: {e}")))?;
            info!(path = %path.display(), entries = state.len(), "loaded credentials");
            state
        } else {
            info!(path = %path.display(), "credential file not found, starting with empty store");
            let state = HashMap::new();
            // Create the empty file so future loads don't need the cold-start path
            write_atomic(&path, &state).await?;
            state
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Current access token for a provider, if any.
    pub async fn access_token(&self, provider: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.get(&key(provider, ACCESS_SUFFIX)).cloned()
    }

    /// Current refresh token for a provider, if any.
    pub async fn refresh_token(&self, provider: &str) -> Option<String> {
        let state = self.state.lock().await;
        state.get(&key(provider, REFRESH_SUFFIX)).cloned()
    }

    /// Overwrite the access token for a provider and persist to disk.
    pub async fn set_access_token(&self, provider: &str, token: &str) -> Result<()> {
        self.set(key(provider, ACCESS_SUFFIX), token).await
    }

    /// Overwrite the refresh token for a provider and persist to disk.
    pub async fn set_refresh_token(&self, provider: &str, token: &str) -> Result<()> {
        self.set(key(provider, REFRESH_SUFFIX), token).await
    }

    async fn set(&self, key: String, token: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.insert(key.clone(), token.to_string());
        debug!(key, "stored credential");
        write_atomic(&self.path, &state).await
    }
}

/// Storage key for one of a provider's two token slots.
fn key(provider: &str, suffix: &str) -> String {
    format!("{provider}_{suffix}")
}

/// Write credentials to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains live tokens.
async fn write_atomic(path: &Path, data: &HashMap<String, String>) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing credentials: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("credential path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".credentials.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp credential file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting credential file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp credential file: {e}")))?;

    debug!(path = %path.display(), "persisted credentials");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn roundtrip_save_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set_access_token("billing", "at-1").await.unwrap();
        store.set_refresh_token("billing", "rt-1").await.unwrap();

        // Load into a new store instance
        let store2 = CredentialStore::load(path).await.unwrap();
        assert_eq!(store2.access_token("billing").await.as_deref(), Some("at-1"));
        assert_eq!(
            store2.refresh_token("billing").await.as_deref(),
            Some("rt-1")
        );
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        assert!(!path.exists());
        let store = CredentialStore::load(path.clone()).await.unwrap();
        assert!(path.exists());
        assert!(store.access_token("billing").await.is_none());
        assert!(store.refresh_token("billing").await.is_none());

        // Verify the file contains valid empty JSON
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn keys_are_namespaced_by_provider() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set_access_token("billing", "at-billing").await.unwrap();
        store.set_access_token("metrics", "at-metrics").await.unwrap();

        assert_eq!(
            store.access_token("billing").await.as_deref(),
            Some("at-billing")
        );
        assert_eq!(
            store.access_token("metrics").await.as_deref(),
            Some("at-metrics")
        );

        // On-disk layout uses the `{provider}_asess` / `{provider}_rsess` keys
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.get("billing_asess").map(String::as_str), Some("at-billing"));
        assert_eq!(parsed.get("metrics_asess").map(String::as_str), Some("at-metrics"));
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = CredentialStore::load(path).await.unwrap();
        store.set_refresh_token("billing", "rt-old").await.unwrap();
        store.set_refresh_token("billing", "rt-new").await.unwrap();

        assert_eq!(
            store.refresh_token("billing").await.as_deref(),
            Some("rt-new")
        );
    }

    #[tokio::test]
    async fn store_is_debug_formattable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = CredentialStore::load(path).await.unwrap();
        let debug = format!("{store:?}");
        assert!(
            debug.contains("CredentialStore"),
            "Debug should include the type name, got: {debug}"
        );
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        tokio::fs::write(&path, "not json").await.unwrap();

        let result = CredentialStore::load(path).await;
        assert!(matches!(result, Err(Error::Parse(_))), "got: {result:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");

        let store = CredentialStore::load(path.clone()).await.unwrap();
        store.set_access_token("billing", "at-1").await.unwrap();

        let metadata = tokio::fs::metadata(&path).await.unwrap();
        let mode = metadata.permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "credential file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn concurrent_writes_dont_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        let store = std::sync::Arc::new(CredentialStore::load(path.clone()).await.unwrap());

        // Spawn multiple concurrent writes
        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_access_token(&format!("provider{i}"), &format!("at-{i}"))
                    .await
                    .unwrap();
            }));
        }

        for h in handles {
            h.await.unwrap();
        }

        // File should be valid JSON with all 10 entries
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: HashMap<String, String> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 10);
    }
}
