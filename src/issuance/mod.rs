//! Credential issuance against a homeserver's `io.t2bot.vault` login flow.
//!
//! A single issuance runs flow discovery, derives the `token_hash` proof
//! from the stored login secret, submits the login and validates the reply.
//! With `logout_other_devices`, [`CredentialIssuer::credentials`] chains two
//! issuances around a logout-all call; only the credential from the final
//! exchange is returned.

pub mod protocol;
pub mod user_id;

use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{IssueError, Stage};
use crate::security::audit_log::AuditLogger;
use crate::security::proof::compute_token_hash;
use crate::store::{ConfigStore, LoginSecret};
use crate::transport::MatrixClient;

pub use protocol::IssuedCredential;
pub use user_id::{InvalidUserId, UserId};

use protocol::{VaultLoginRequest, LOGIN_PATH, LOGOUT_ALL_PATH};

/// Issues access tokens using records from the configuration store.
#[derive(Clone)]
pub struct CredentialIssuer {
    store: ConfigStore,
    client: MatrixClient,
    audit: AuditLogger,
}

impl CredentialIssuer {
    pub fn new(store: ConfigStore, client: MatrixClient) -> Self {
        Self {
            store,
            client,
            audit: AuditLogger::new(),
        }
    }

    /// Issue a credential, optionally logging out every other session first.
    pub async fn credentials(
        &self,
        user: &UserId,
        logout_other_devices: bool,
    ) -> Result<IssuedCredential, IssueError> {
        let request_id = Uuid::new_v4().to_string();
        let user_id = user.to_string();
        info!(request_id = %request_id, user_id = %user_id, logout_other_devices, "generating credentials");

        let result = if logout_other_devices {
            self.revoke_and_issue(&request_id, user).await
        } else {
            self.issue(user).await
        };

        match &result {
            Ok(creds) => self
                .audit
                .credential_issued(&request_id, &user_id, &creds.device_id),
            Err(e) => self
                .audit
                .issuance_failed(&request_id, &user_id, &e.to_string()),
        }
        result
    }

    /// Run one full exchange: flow discovery, proof, login.
    pub async fn issue(&self, user: &UserId) -> Result<IssuedCredential, IssueError> {
        let cs_url = self.homeserver_url(user).await?;
        let secret = self.login_secret(user).await?;
        self.login(&cs_url, &secret, user).await
    }

    /// Issue once, log out all sessions with that credential, then issue
    /// again and return the second credential.
    async fn revoke_and_issue(
        &self,
        request_id: &str,
        user: &UserId,
    ) -> Result<IssuedCredential, IssueError> {
        let interim = self.issue(user).await?;

        info!(request_id, "logging out of all devices before continuing");
        let cs_url = self.homeserver_url(user).await?;
        let response = self
            .client
            .post_json_with_token(&cs_url, LOGOUT_ALL_PATH, &json!({}), &interim.access_token)
            .await
            .map_err(IssueError::transport(Stage::Logout))?;
        protocol::ensure_no_error(Stage::Logout, &response)?;
        self.audit.sessions_revoked(request_id, &user.to_string());

        info!(request_id, "all devices logged out, generating new credentials");
        self.issue(user).await
    }

    async fn login(
        &self,
        cs_url: &str,
        secret: &LoginSecret,
        user: &UserId,
    ) -> Result<IssuedCredential, IssueError> {
        let flows = self
            .client
            .get_json(cs_url, LOGIN_PATH)
            .await
            .map_err(IssueError::transport(Stage::FlowDiscovery))?;
        protocol::ensure_vault_flow(flows)?;
        debug!(cs_url, "homeserver advertises the vault login flow");

        let user_id = user.to_string();
        let token_hash = compute_token_hash(secret.expose(), &user_id);

        let body = self
            .client
            .post_json(cs_url, LOGIN_PATH, &VaultLoginRequest::new(&user_id, &token_hash))
            .await
            .map_err(IssueError::transport(Stage::Login))?;
        protocol::parse_login_response(body)
    }

    async fn homeserver_url(&self, user: &UserId) -> Result<String, IssueError> {
        match self.store.get_homeserver_url(user.domain()).await? {
            Some(url) if !url.is_empty() => Ok(url),
            _ => Err(IssueError::HomeserverNotConfigured(user.domain().to_string())),
        }
    }

    async fn login_secret(&self, user: &UserId) -> Result<LoginSecret, IssueError> {
        match self.store.get_user_secret(user).await? {
            Some(secret) if !secret.expose().is_empty() => Ok(secret),
            _ => Err(IssueError::SecretNotConfigured(user.to_string())),
        }
    }
}
