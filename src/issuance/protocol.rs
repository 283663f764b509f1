//! Wire shapes for the `io.t2bot.vault` login extension.
//!
//! Every homeserver response is checked against an explicit schema before
//! any field is used. A response that deviates is a protocol mismatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{IssueError, Stage};
use crate::transport::JsonObject;

pub const VAULT_LOGIN_TYPE: &str = "io.t2bot.vault";
pub const USER_IDENTIFIER_TYPE: &str = "m.id.user";

pub const LOGIN_PATH: &str = "/_matrix/client/r0/login";
pub const LOGOUT_ALL_PATH: &str = "/_matrix/client/r0/logout/all";

#[derive(Debug, Deserialize)]
struct LoginFlows {
    flows: Vec<LoginFlow>,
}

#[derive(Debug, Deserialize)]
struct LoginFlow {
    #[serde(rename = "type")]
    kind: String,
}

/// Body of the vault login request.
#[derive(Debug, Serialize)]
pub struct VaultLoginRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    token_hash: &'a str,
    identifier: UserIdentifier<'a>,
}

#[derive(Debug, Serialize)]
struct UserIdentifier<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    user: &'a str,
}

impl<'a> VaultLoginRequest<'a> {
    pub fn new(user_id: &'a str, token_hash: &'a str) -> Self {
        Self {
            kind: VAULT_LOGIN_TYPE,
            token_hash,
            identifier: UserIdentifier {
                kind: USER_IDENTIFIER_TYPE,
                user: user_id,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    device_id: String,
}

/// Access token and device pair returned by a successful login.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct IssuedCredential {
    pub access_token: String,
    pub device_id: String,
}

impl std::fmt::Debug for IssuedCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCredential")
            .field("access_token", &"<redacted>")
            .field("device_id", &self.device_id)
            .finish()
    }
}

/// Validate the login flows document and look for the vault flow.
pub fn ensure_vault_flow(document: JsonObject) -> Result<(), IssueError> {
    let flows: LoginFlows = serde_json::from_value(Value::Object(document))
        .map_err(|e| IssueError::mismatch(Stage::FlowDiscovery, e.to_string()))?;

    if flows.flows.iter().any(|flow| flow.kind == VAULT_LOGIN_TYPE) {
        Ok(())
    } else {
        Err(IssueError::UnsupportedFlow)
    }
}

/// Fail with the homeserver's error if the body is a Matrix error document.
pub fn ensure_no_error(stage: Stage, body: &JsonObject) -> Result<(), IssueError> {
    let Some(errcode) = body.get("errcode") else {
        return Ok(());
    };
    let Value::String(errcode) = errcode else {
        return Err(IssueError::mismatch(stage, "errcode is not a string"));
    };
    let error = match body.get("error") {
        None => None,
        Some(Value::String(msg)) => Some(msg.clone()),
        Some(_) => return Err(IssueError::mismatch(stage, "error is not a string")),
    };

    Err(IssueError::RemoteRejected {
        stage,
        errcode: errcode.clone(),
        error,
    })
}

/// Validate a login response into a credential pair.
pub fn parse_login_response(body: JsonObject) -> Result<IssuedCredential, IssueError> {
    ensure_no_error(Stage::Login, &body)?;

    let response: LoginResponse = serde_json::from_value(Value::Object(body))
        .map_err(|e| IssueError::mismatch(Stage::Login, e.to_string()))?;

    Ok(IssuedCredential {
        access_token: response.access_token,
        device_id: response.device_id,
    })
}
