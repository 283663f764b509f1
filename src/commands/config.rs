use tracing::debug;
use url::Url;

use super::{CommandError, HomeserverEntry, Reply, SecretStored, UserEntry};
use crate::issuance::user_id::validate_server_name;
use crate::issuance::UserId;
use crate::security::audit_log::AuditLogger;
use crate::store::{ConfigStore, LoginSecret};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeserverCommand {
    List,
    Read { domain: String },
    Write { domain: String, cs_url: String },
    Delete { domain: String },
}

#[derive(Clone, PartialEq, Eq)]
pub enum UserCommand {
    List,
    Read { localpart: String, domain: String },
    Write {
        localpart: String,
        domain: String,
        login_secret: String,
    },
    Delete { localpart: String, domain: String },
}

impl std::fmt::Debug for UserCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserCommand::List => f.write_str("List"),
            UserCommand::Read { localpart, domain } => f
                .debug_struct("Read")
                .field("localpart", localpart)
                .field("domain", domain)
                .finish(),
            UserCommand::Write {
                localpart, domain, ..
            } => f
                .debug_struct("Write")
                .field("localpart", localpart)
                .field("domain", domain)
                .field("login_secret", &"<redacted>")
                .finish(),
            UserCommand::Delete { localpart, domain } => f
                .debug_struct("Delete")
                .field("localpart", localpart)
                .field("domain", domain)
                .finish(),
        }
    }
}

impl HomeserverCommand {
    pub async fn execute(
        self,
        store: &ConfigStore,
        audit: &AuditLogger,
    ) -> Result<Reply, CommandError> {
        match self {
            HomeserverCommand::List => Ok(Reply::Keys(store.list_homeserver_domains().await?)),
            HomeserverCommand::Read { domain } => {
                validate_domain(&domain)?;
                debug!(domain = %domain, "reading homeserver");
                Ok(match store.get_homeserver_url(&domain).await? {
                    Some(cs_url) => Reply::Homeserver(HomeserverEntry { cs_url }),
                    None => Reply::NotFound,
                })
            }
            HomeserverCommand::Write { domain, cs_url } => {
                validate_domain(&domain)?;
                let parsed = Url::parse(&cs_url).map_err(|e| {
                    CommandError::InvalidRequest(format!("cs_url {cs_url:?} is not a url: {e}"))
                })?;
                if !matches!(parsed.scheme(), "http" | "https") {
                    return Err(CommandError::InvalidRequest(format!(
                        "cs_url {cs_url:?} must be an http(s) url"
                    )));
                }
                store.put_homeserver_url(&domain, &cs_url).await?;
                audit.config_written("homeserver", &domain);
                Ok(Reply::Homeserver(HomeserverEntry { cs_url }))
            }
            HomeserverCommand::Delete { domain } => {
                validate_domain(&domain)?;
                store.delete_homeserver_url(&domain).await?;
                audit.config_deleted("homeserver", &domain);
                Ok(Reply::Deleted)
            }
        }
    }
}

impl UserCommand {
    pub async fn execute(
        self,
        store: &ConfigStore,
        audit: &AuditLogger,
    ) -> Result<Reply, CommandError> {
        match self {
            UserCommand::List => Ok(Reply::Keys(store.list_user_ids().await?)),
            UserCommand::Read { localpart, domain } => {
                let user = UserId::new(&localpart, &domain)?;
                debug!(user_id = %user, "reading user");
                Ok(match store.get_user_secret(&user).await? {
                    Some(_) => Reply::User(UserEntry {
                        user_id: user.to_string(),
                    }),
                    None => Reply::NotFound,
                })
            }
            UserCommand::Write {
                localpart,
                domain,
                login_secret,
            } => {
                let user = UserId::new(&localpart, &domain)?;
                if login_secret.is_empty() {
                    return Err(CommandError::InvalidRequest(
                        "login_secret must be non-empty".to_string(),
                    ));
                }
                store
                    .put_user_secret(&user, &LoginSecret::new(login_secret.clone()))
                    .await?;
                audit.config_written("user", &user.to_string());
                Ok(Reply::SecretStored(SecretStored { login_secret }))
            }
            UserCommand::Delete { localpart, domain } => {
                let user = UserId::new(&localpart, &domain)?;
                store.delete_user_secret(&user).await?;
                audit.config_deleted("user", &user.to_string());
                Ok(Reply::Deleted)
            }
        }
    }
}

fn validate_domain(domain: &str) -> Result<(), CommandError> {
    validate_server_name(domain).map_err(|e| {
        CommandError::InvalidRequest(format!("invalid homeserver domain: {e}"))
    })
}
