use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use super::Storage;
use crate::error::StorageError;

/// Vault KV read envelope: {"data":{"value":"<base64>"}}
#[derive(Debug, Deserialize)]
struct VaultKvResponse {
    data: VaultKvData,
}

#[derive(Debug, Deserialize)]
struct VaultKvData {
    value: String,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    data: ListData,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    keys: Vec<String>,
}

/// Storage backend on a Vault KV (v1) secrets mount.
///
/// Values are stored base64-encoded under a single `value` field so that
/// arbitrary bytes survive the JSON round trip.
#[derive(Clone)]
pub struct VaultKvStorage {
    base_url: Url,
    token: String,
    mount: String,
    http_client: Client,
}

impl std::fmt::Debug for VaultKvStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultKvStorage")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .field("mount", &self.mount)
            .finish()
    }
}

impl VaultKvStorage {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        mount: impl Into<String>,
    ) -> Result<Self, StorageError> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| StorageError::Unavailable(format!("creating HTTP client: {e}")))?;

        let base_url: String = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| {
                StorageError::Unavailable(format!("invalid Vault address {base_url:?}"))
            })?;
        let mount = mount.into().trim_matches('/').to_string();
        debug!(base_url = %base_url, mount = %mount, "Vault storage initialized");

        Ok(Self {
            base_url,
            token: token.into(),
            mount,
            http_client,
        })
    }

    /// Create a Vault storage backend from environment variables.
    ///
    /// Environment variables:
    /// - `VAULT_ADDRESS`: Base URL (e.g., http://127.0.0.1:8200)
    /// - `VAULT_TOKEN`: Authentication token
    /// - `VAULT_MOUNT_PATH`: KV mount (e.g., secret/matrix)
    pub fn from_env() -> Result<Option<Self>, StorageError> {
        let base_url = std::env::var("VAULT_ADDRESS").ok();
        let token = std::env::var("VAULT_TOKEN").ok();
        let mount = std::env::var("VAULT_MOUNT_PATH").ok();

        match (base_url, token, mount) {
            (Some(base), Some(tok), Some(mount)) => Self::new(base, tok, mount).map(Some),
            _ => {
                debug!("Vault not configured (missing VAULT_ADDRESS, VAULT_TOKEN, or VAULT_MOUNT_PATH)");
                Ok(None)
            }
        }
    }

    /// Build `{base}/v1/{mount}/{key}`, escaping each key segment.
    ///
    /// Dot segments and empty inner segments are refused; a trailing `/`
    /// is kept for folder listings.
    fn url(&self, key: &str) -> Result<Url, StorageError> {
        let segments: Vec<&str> = key.split('/').collect();
        let last = segments.len() - 1;
        let bad_segment = segments
            .iter()
            .enumerate()
            .any(|(i, seg)| matches!(*seg, "." | "..") || (seg.is_empty() && i != last));
        if key.is_empty() || bad_segment {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
            });
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                StorageError::Unavailable(format!("invalid Vault address {}", self.base_url))
            })?
            .pop_if_empty()
            .push("v1")
            .extend(self.mount.split('/').filter(|s| !s.is_empty()))
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, method: Method, url: Url) -> Result<reqwest::Response, StorageError> {
        self.http_client
            .request(method, url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }
}

async fn backend_failure(op: &str, response: reqwest::Response) -> StorageError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    StorageError::Backend(format!("Vault {op} failed with status {status}: {body}"))
}

#[async_trait]
impl Storage for VaultKvStorage {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let url = self.url(key)?;
        debug!("Reading from Vault: {}", url);

        let response = self.send(Method::GET, url).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(backend_failure("read", response).await);
        }

        let body: VaultKvResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Backend(format!("parsing Vault response: {e}")))?;
        general_purpose::STANDARD
            .decode(body.data.value)
            .map(Some)
            .map_err(|_| StorageError::InvalidValue {
                key: key.to_string(),
            })
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let url = self.url(key)?;
        debug!("Writing to Vault: {}", url);

        let payload = serde_json::json!({
            "value": general_purpose::STANDARD.encode(value)
        });

        let response = self
            .http_client
            .post(url)
            .header("X-Vault-Token", &self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(backend_failure("write", response).await);
        }
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let url = self.url(prefix)?;
        debug!("Listing from Vault: {}", url);

        let method = Method::from_bytes(b"LIST").unwrap_or(Method::GET);
        let response = self.send(method, url).await?;

        if response.status() == StatusCode::NOT_FOUND {
            // Nothing stored under this prefix yet
            return Ok(vec![]);
        }
        if !response.status().is_success() {
            return Err(backend_failure("list", response).await);
        }

        let body: ListResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Backend(format!("parsing Vault list response: {e}")))?;

        let mut keys = body.data.keys;
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let url = self.url(key)?;
        debug!("Deleting from Vault: {}", url);

        let response = self.send(Method::DELETE, url).await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!("Vault delete of {} returned 404 (already absent)", key);
            return Ok(());
        }
        if !status.is_success() {
            return Err(backend_failure("delete", response).await);
        }
        Ok(())
    }
}
