//! Configuration records kept in an external key-value secret store.
//!
//! The store itself is reached through [`Storage`]; [`ConfigStore`] layers
//! the two record kinds on top of it:
//!
//! - `config/homeserver/<domain>` holds a homeserver's client-server URL
//! - `config/user/@<localpart>:<domain>` holds a user's login secret

pub mod memory;
pub mod vault;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::issuance::UserId;

pub use memory::MemoryStorage;
pub use vault::VaultKvStorage;

const HOMESERVER_PREFIX: &str = "config/homeserver/";
const USER_PREFIX: &str = "config/user/";

/// Key-value backend scoped by path prefix.
///
/// `list` returns the immediate children of `prefix`, ordered, with the
/// prefix stripped. Deleting an absent key is not an error.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Shared login secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginSecret(String);

impl LoginSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for LoginSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("LoginSecret(<redacted>)")
    }
}

/// Typed access to homeserver and user secret records.
#[derive(Clone)]
pub struct ConfigStore {
    storage: Arc<dyn Storage>,
}

impl ConfigStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn get_homeserver_url(&self, domain: &str) -> Result<Option<String>, StorageError> {
        self.get_string(&homeserver_key(domain)).await
    }

    pub async fn put_homeserver_url(&self, domain: &str, url: &str) -> Result<(), StorageError> {
        self.storage.put(&homeserver_key(domain), url.as_bytes()).await
    }

    pub async fn delete_homeserver_url(&self, domain: &str) -> Result<(), StorageError> {
        self.storage.delete(&homeserver_key(domain)).await
    }

    pub async fn list_homeserver_domains(&self) -> Result<Vec<String>, StorageError> {
        self.storage.list(HOMESERVER_PREFIX).await
    }

    pub async fn get_user_secret(&self, user: &UserId) -> Result<Option<LoginSecret>, StorageError> {
        Ok(self.get_string(&user_key(user)).await?.map(LoginSecret))
    }

    pub async fn put_user_secret(
        &self,
        user: &UserId,
        secret: &LoginSecret,
    ) -> Result<(), StorageError> {
        self.storage
            .put(&user_key(user), secret.expose().as_bytes())
            .await
    }

    pub async fn delete_user_secret(&self, user: &UserId) -> Result<(), StorageError> {
        self.storage.delete(&user_key(user)).await
    }

    pub async fn list_user_ids(&self) -> Result<Vec<String>, StorageError> {
        self.storage.list(USER_PREFIX).await
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.storage.get(key).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|_| StorageError::InvalidValue {
                    key: key.to_string(),
                }),
            None => Ok(None),
        }
    }
}

fn homeserver_key(domain: &str) -> String {
    format!("{HOMESERVER_PREFIX}{domain}")
}

fn user_key(user: &UserId) -> String {
    format!("{USER_PREFIX}{user}")
}
