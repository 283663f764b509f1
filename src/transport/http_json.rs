use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use super::{JsonObject, TransportError};

/// Minimal JSON-over-HTTP client for the Matrix client-server API.
///
/// Status codes are logged but never inspected: homeservers report failures
/// as structured error bodies, so callers decide success from the decoded
/// object. A single attempt is made per call.
#[derive(Debug, Clone, Default)]
pub struct MatrixClient {
    http: Client,
}

impl MatrixClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    /// Resolve `path` against `base` as an RFC 3986 reference.
    pub fn resolve(base: &str, path: &str) -> Result<Url, TransportError> {
        let invalid = |source| TransportError::InvalidUrl {
            base: base.to_string(),
            path: path.to_string(),
            source,
        };
        Url::parse(base).and_then(|b| b.join(path)).map_err(invalid)
    }

    pub async fn get_json(&self, base: &str, path: &str) -> Result<JsonObject, TransportError> {
        let url = Self::resolve(base, path)?;
        trace!(url = %url, "sending GET request");

        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        read_object(url, response).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        base: &str,
        path: &str,
        body: &T,
    ) -> Result<JsonObject, TransportError> {
        self.post(base, path, body, None).await
    }

    /// POST as the session identified by `access_token`.
    pub async fn post_json_with_token<T: Serialize + ?Sized>(
        &self,
        base: &str,
        path: &str,
        body: &T,
        access_token: &str,
    ) -> Result<JsonObject, TransportError> {
        self.post(base, path, body, Some(access_token)).await
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        base: &str,
        path: &str,
        body: &T,
        access_token: Option<&str>,
    ) -> Result<JsonObject, TransportError> {
        let url = Self::resolve(base, path)?;
        let body = serde_json::to_vec(body).map_err(TransportError::Encode)?;
        trace!(url = %url, authorized = access_token.is_some(), "sending POST request");

        let mut request = self
            .http
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = access_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;
        read_object(url, response).await
    }
}

async fn read_object(url: Url, response: reqwest::Response) -> Result<JsonObject, TransportError> {
    let status_code = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|source| TransportError::Request {
            url: url.to_string(),
            source,
        })?;
    debug!(url = %url, status_code, bytes = body.len(), "received homeserver response");

    let value: Value = serde_json::from_slice(&body).map_err(|source| TransportError::Decode {
        url: url.to_string(),
        source,
    })?;

    match value {
        Value::Object(map) => Ok(map),
        other => Err(TransportError::NotAnObject {
            url: url.to_string(),
            found: json_type_name(&other),
        }),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
