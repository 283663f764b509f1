use std::fmt;

use thiserror::Error;

use crate::transport::TransportError;

/// Failures raised by a storage backend. Propagated unchanged by the
/// configuration adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("stored value at {key} is not valid UTF-8")]
    InvalidValue { key: String },

    #[error("storage key {key:?} is not a valid path")]
    InvalidKey { key: String },
}

/// Remote exchange during which a failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FlowDiscovery,
    Login,
    Logout,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::FlowDiscovery => "login flow discovery",
            Stage::Login => "login",
            Stage::Logout => "logout",
        };
        f.write_str(name)
    }
}

/// Coarse classification of an [`IssueError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Storage,
    ConfigMissing,
    ProtocolMismatch,
    UnsupportedFlow,
    RemoteRejected,
    Transport,
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("homeserver client/server url not configured for {0}")]
    HomeserverNotConfigured(String),

    #[error("login secret not configured for {0}")]
    SecretNotConfigured(String),

    #[error("{stage}: unexpected response from homeserver: {reason}")]
    ProtocolMismatch { stage: Stage, reason: String },

    #[error("homeserver does not support the io.t2bot.vault login flow")]
    UnsupportedFlow,

    #[error("{stage}: homeserver rejected the request: {errcode}{}", message_suffix(.error))]
    RemoteRejected {
        stage: Stage,
        errcode: String,
        error: Option<String>,
    },

    #[error("{stage}: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: TransportError,
    },
}

fn message_suffix(error: &Option<String>) -> String {
    error
        .as_deref()
        .map(|msg| format!(" ({msg})"))
        .unwrap_or_default()
}

impl IssueError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IssueError::Storage(_) => ErrorKind::Storage,
            IssueError::HomeserverNotConfigured(_) | IssueError::SecretNotConfigured(_) => {
                ErrorKind::ConfigMissing
            }
            IssueError::ProtocolMismatch { .. } => ErrorKind::ProtocolMismatch,
            IssueError::UnsupportedFlow => ErrorKind::UnsupportedFlow,
            IssueError::RemoteRejected { .. } => ErrorKind::RemoteRejected,
            IssueError::Transport { .. } => ErrorKind::Transport,
        }
    }

    pub(crate) fn mismatch(stage: Stage, reason: impl Into<String>) -> Self {
        IssueError::ProtocolMismatch {
            stage,
            reason: reason.into(),
        }
    }

    pub(crate) fn transport(stage: Stage) -> impl FnOnce(TransportError) -> Self {
        move |source| IssueError::Transport { stage, source }
    }
}
