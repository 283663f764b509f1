use super::{CommandError, Reply};
use crate::issuance::{CredentialIssuer, UserId};

/// Request for a fresh access token for `@localpart:domain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenCommand {
    pub localpart: String,
    pub domain: String,
    pub logout_other_devices: bool,
}

impl TokenCommand {
    pub async fn execute(self, issuer: &CredentialIssuer) -> Result<Reply, CommandError> {
        let user = UserId::new(&self.localpart, &self.domain)?;
        let creds = issuer
            .credentials(&user, self.logout_other_devices)
            .await?;
        Ok(Reply::Credential(creds))
    }
}
