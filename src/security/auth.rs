use std::fmt;

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

/// Shared bearer token guarding the administrative and issuance routes.
///
/// When no token is configured every request is accepted.
#[derive(Clone, Default)]
pub struct ApiToken {
    token: Option<String>,
}

impl ApiToken {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Accepts `Authorization: Bearer <token>` or `X-Api-Token: <token>`.
    pub fn verify(&self, headers: &HeaderMap) -> Result<(), &'static str> {
        let Some(expected) = &self.token else {
            return Ok(());
        };

        let provided = headers
            .get("X-Api-Token")
            .and_then(|v| v.to_str().ok())
            .or_else(|| {
                headers
                    .get("Authorization")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.strip_prefix("Bearer "))
            })
            .ok_or("missing api token")?;

        if provided.as_bytes().ct_eq(expected.as_bytes()).into() {
            Ok(())
        } else {
            Err("invalid api token")
        }
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiToken")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
