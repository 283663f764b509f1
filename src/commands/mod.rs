//! Request handlers, expressed as one command type per resource.
//!
//! An outer router (see `comms::local_api`) turns inbound requests into
//! these commands; executing a command yields a [`Reply`] or a
//! [`CommandError`].

pub mod config;
pub mod token;

use serde::Serialize;
use thiserror::Error;

use crate::error::{IssueError, StorageError};
use crate::issuance::{InvalidUserId, IssuedCredential};

pub use config::{HomeserverCommand, UserCommand};
pub use token::TokenCommand;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeserverEntry {
    pub cs_url: String,
}

/// Result of reading a user record. The secret itself is never returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserEntry {
    pub user_id: String,
}

/// Write acknowledgment for a user record, the one place the secret is echoed.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct SecretStored {
    pub login_secret: String,
}

impl std::fmt::Debug for SecretStored {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretStored(<redacted>)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Keys(Vec<String>),
    Homeserver(HomeserverEntry),
    User(UserEntry),
    SecretStored(SecretStored),
    Credential(IssuedCredential),
    NotFound,
    Deleted,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Issue(#[from] IssueError),
}

impl From<InvalidUserId> for CommandError {
    fn from(e: InvalidUserId) -> Self {
        CommandError::InvalidRequest(e.to_string())
    }
}
