use anyhow::Result;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::commands::{CommandError, HomeserverCommand, Reply, TokenCommand, UserCommand};
use crate::error::ErrorKind;
use crate::issuance::CredentialIssuer;
use crate::security::audit_log::AuditLogger;
use crate::security::auth::ApiToken;
use crate::store::ConfigStore;
use crate::transport::MatrixClient;

type SharedState = Arc<AppState>;

/// Context shared by every request: the configuration store, the issuance
/// engine built over it, and the API token guard.
#[derive(Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub issuer: CredentialIssuer,
    pub api_token: ApiToken,
    pub audit: AuditLogger,
}

impl AppState {
    pub fn new(store: ConfigStore, client: MatrixClient, api_token: ApiToken) -> Self {
        Self {
            issuer: CredentialIssuer::new(store.clone(), client),
            store,
            api_token,
            audit: AuditLogger::new(),
        }
    }
}

// Rejects the request unless it carries the configured API token
struct Authorized;

impl FromRequestParts<SharedState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        match state.api_token.verify(&parts.headers) {
            Ok(()) => Ok(Authorized),
            Err(reason) => {
                state.audit.unauthorized(parts.uri.path(), reason);
                Err(ApiError {
                    status: StatusCode::UNAUTHORIZED,
                    message: reason.to_string(),
                })
            }
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl From<CommandError> for ApiError {
    fn from(err: CommandError) -> Self {
        let status = match &err {
            CommandError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CommandError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CommandError::Issue(e) => match e.kind() {
                ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::ConfigMissing => StatusCode::NOT_FOUND,
                ErrorKind::ProtocolMismatch
                | ErrorKind::UnsupportedFlow
                | ErrorKind::RemoteRejected
                | ErrorKind::Transport => StatusCode::BAD_GATEWAY,
            },
        };
        if status.is_server_error() {
            error!("request failed: {}", err);
        } else {
            warn!("request rejected: {}", err);
        }
        ApiError {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

impl IntoResponse for Reply {
    fn into_response(self) -> Response {
        match self {
            Reply::Keys(keys) => Json(json!({ "keys": keys })).into_response(),
            Reply::Homeserver(entry) => Json(entry).into_response(),
            Reply::User(entry) => Json(entry).into_response(),
            Reply::SecretStored(ack) => Json(ack).into_response(),
            Reply::Credential(creds) => Json(creds).into_response(),
            Reply::NotFound => StatusCode::NOT_FOUND.into_response(),
            Reply::Deleted => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

#[derive(Deserialize)]
pub struct HomeserverBody {
    pub cs_url: String,
}

#[derive(Deserialize)]
pub struct UserBody {
    pub login_secret: String,
}

#[derive(Deserialize, Default)]
pub struct TokenQuery {
    #[serde(default)]
    pub logout_other_devices: bool,
}

type ApiResult = Result<Reply, ApiError>;

// Health check
async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn homeserver_list(_: Authorized, State(state): State<SharedState>) -> ApiResult {
    Ok(HomeserverCommand::List
        .execute(&state.store, &state.audit)
        .await?)
}

async fn homeserver_read(
    _: Authorized,
    State(state): State<SharedState>,
    Path(domain): Path<String>,
) -> ApiResult {
    Ok(HomeserverCommand::Read { domain }
        .execute(&state.store, &state.audit)
        .await?)
}

async fn homeserver_write(
    _: Authorized,
    State(state): State<SharedState>,
    Path(domain): Path<String>,
    Json(body): Json<HomeserverBody>,
) -> ApiResult {
    Ok(HomeserverCommand::Write {
        domain,
        cs_url: body.cs_url,
    }
    .execute(&state.store, &state.audit)
    .await?)
}

async fn homeserver_delete(
    _: Authorized,
    State(state): State<SharedState>,
    Path(domain): Path<String>,
) -> ApiResult {
    Ok(HomeserverCommand::Delete { domain }
        .execute(&state.store, &state.audit)
        .await?)
}

async fn user_list(_: Authorized, State(state): State<SharedState>) -> ApiResult {
    Ok(UserCommand::List.execute(&state.store, &state.audit).await?)
}

async fn user_read(
    _: Authorized,
    State(state): State<SharedState>,
    Path((localpart, domain)): Path<(String, String)>,
) -> ApiResult {
    Ok(UserCommand::Read { localpart, domain }
        .execute(&state.store, &state.audit)
        .await?)
}

async fn user_write(
    _: Authorized,
    State(state): State<SharedState>,
    Path((localpart, domain)): Path<(String, String)>,
    Json(body): Json<UserBody>,
) -> ApiResult {
    Ok(UserCommand::Write {
        localpart,
        domain,
        login_secret: body.login_secret,
    }
    .execute(&state.store, &state.audit)
    .await?)
}

async fn user_delete(
    _: Authorized,
    State(state): State<SharedState>,
    Path((localpart, domain)): Path<(String, String)>,
) -> ApiResult {
    Ok(UserCommand::Delete { localpart, domain }
        .execute(&state.store, &state.audit)
        .await?)
}

async fn access_token(
    _: Authorized,
    State(state): State<SharedState>,
    Path((localpart, domain)): Path<(String, String)>,
    Query(query): Query<TokenQuery>,
) -> ApiResult {
    Ok(TokenCommand {
        localpart,
        domain,
        logout_other_devices: query.logout_other_devices,
    }
    .execute(&state.issuer)
    .await?)
}

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/config/homeserver", get(homeserver_list))
        .route(
            "/config/homeserver/{homeserver}",
            get(homeserver_read)
                .put(homeserver_write)
                .post(homeserver_write)
                .delete(homeserver_delete),
        )
        .route("/config/user", get(user_list))
        .route(
            "/config/user/{localpart}/{domain}",
            get(user_read)
                .put(user_write)
                .post(user_write)
                .delete(user_delete),
        )
        .route("/user/{localpart}/{domain}", get(access_token))
        .with_state(state)
}

pub async fn serve(state: AppState, port: u16) -> Result<()> {
    if !state.api_token.is_enabled() {
        warn!("no api token configured, the HTTP API is unauthenticated");
    }

    let app = create_router(Arc::new(state));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app).into_future().await?;
    Ok(())
}
