use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use matrix_secrets::comms::local_api::{create_router, AppState};
use matrix_secrets::security::auth::ApiToken;
use matrix_secrets::store::{ConfigStore, MemoryStorage};
use matrix_secrets::transport::MatrixClient;
use mockito::{Matcher, Server};
use serde_json::{json, Value};
use sha2::Sha256;
use std::sync::Arc;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "admin-token";

// Homeserver side of the vault login: recompute the proof and compare
fn token_hash_matches(secret: &str, user_id: &str, presented: &str) -> bool {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(user_id.as_bytes());
    let expected: String = mac
        .finalize()
        .into_bytes()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect();
    expected == presented
}

// Helper to create router over a fresh in-memory store
fn test_router() -> Router {
    let store = ConfigStore::new(Arc::new(MemoryStorage::new()));
    let state = AppState::new(
        store,
        MatrixClient::new(),
        ApiToken::new(Some(ADMIN_TOKEN.to_string())),
    );
    create_router(Arc::new(state))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Authorization", format!("Bearer {ADMIN_TOKEN}"));
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

fn json_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes).unwrap()
}

#[tokio::test]
async fn test_health_endpoint_needs_no_token() {
    let app = test_router();

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = test_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/config/homeserver")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(json_body(&body)["error"], "missing api token");
}

#[tokio::test]
async fn test_homeserver_crud() {
    let app = test_router();

    let (status, body) = send(&app, "GET", "/config/homeserver", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"keys": []}));

    let (status, body) = send(
        &app,
        "PUT",
        "/config/homeserver/example.org",
        Some(json!({"cs_url": "https://example.org"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"cs_url": "https://example.org"}));

    let (status, body) = send(&app, "GET", "/config/homeserver/example.org", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"cs_url": "https://example.org"}));

    let (_, body) = send(&app, "GET", "/config/homeserver", None).await;
    assert_eq!(json_body(&body), json!({"keys": ["example.org"]}));

    let (status, _) = send(&app, "DELETE", "/config/homeserver/example.org", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(&app, "GET", "/config/homeserver/example.org", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.is_empty());

    // Deleting again is still fine
    let (status, _) = send(&app, "DELETE", "/config/homeserver/example.org", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_homeserver_write_rejects_invalid_url() {
    let app = test_router();

    let (status, body) = send(
        &app,
        "POST",
        "/config/homeserver/example.org",
        Some(json!({"cs_url": "not a url"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json_body(&body)["error"]
        .as_str()
        .unwrap()
        .contains("invalid request"));
}

#[tokio::test]
async fn test_user_secret_is_only_echoed_on_write() {
    let app = test_router();

    let (status, body) = send(
        &app,
        "PUT",
        "/config/user/alice/example.org",
        Some(json!({"login_secret": "s3cr3t"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"login_secret": "s3cr3t"}));

    let (status, body) = send(&app, "GET", "/config/user/alice/example.org", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body), json!({"user_id": "@alice:example.org"}));
    assert!(!String::from_utf8_lossy(&body).contains("s3cr3t"));

    let (_, body) = send(&app, "GET", "/config/user", None).await;
    assert_eq!(json_body(&body), json!({"keys": ["@alice:example.org"]}));

    let (status, _) = send(&app, "DELETE", "/config/user/alice/example.org", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/config/user/alice/example.org", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_token_for_unconfigured_user_is_not_found() {
    let app = test_router();

    let (status, body) = send(&app, "GET", "/user/alice/example.org", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json_body(&body)["error"]
        .as_str()
        .unwrap()
        .contains("not configured"));
}

#[tokio::test]
async fn test_end_to_end_issuance() {
    let mut homeserver = Server::new_async().await;
    let flows = homeserver
        .mock("GET", "/_matrix/client/r0/login")
        .with_status(200)
        .with_body(json!({"flows": [{"type": "io.t2bot.vault"}]}).to_string())
        .create_async()
        .await;
    let login = homeserver
        .mock("POST", "/_matrix/client/r0/login")
        .match_body(Matcher::PartialJson(json!({
            "type": "io.t2bot.vault",
            "identifier": {"type": "m.id.user", "user": "@alice:example.org"}
        })))
        .with_status(200)
        .with_body_from_request(|request| {
            let body: Value = serde_json::from_slice(request.body().unwrap()).unwrap();
            let presented = body["token_hash"].as_str().unwrap_or_default();
            if token_hash_matches("s3cr3t", "@alice:example.org", presented) {
                json!({"access_token": "tok123", "device_id": "DEV1"})
                    .to_string()
                    .into()
            } else {
                json!({"errcode": "M_FORBIDDEN", "error": "Invalid token hash"})
                    .to_string()
                    .into()
            }
        })
        .create_async()
        .await;

    let app = test_router();
    let (status, _) = send(
        &app,
        "PUT",
        "/config/homeserver/example.org",
        Some(json!({"cs_url": homeserver.url()})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "PUT",
        "/config/user/alice/example.org",
        Some(json!({"login_secret": "s3cr3t"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "GET",
        "/user/alice/example.org?logout_other_devices=false",
        None,
    )
    .await;

    flows.assert_async().await;
    login.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json_body(&body),
        json!({"access_token": "tok123", "device_id": "DEV1"})
    );
}

#[tokio::test]
async fn test_remote_rejection_is_bad_gateway() {
    let mut homeserver = Server::new_async().await;
    let _flows = homeserver
        .mock("GET", "/_matrix/client/r0/login")
        .with_status(200)
        .with_body(json!({"flows": [{"type": "io.t2bot.vault"}]}).to_string())
        .create_async()
        .await;
    let _login = homeserver
        .mock("POST", "/_matrix/client/r0/login")
        .with_status(403)
        .with_body(json!({"errcode": "M_FORBIDDEN", "error": "Invalid token hash"}).to_string())
        .create_async()
        .await;

    let app = test_router();
    send(
        &app,
        "PUT",
        "/config/homeserver/example.org",
        Some(json!({"cs_url": homeserver.url()})),
    )
    .await;
    send(
        &app,
        "PUT",
        "/config/user/alice/example.org",
        Some(json!({"login_secret": "wrong"})),
    )
    .await;

    let (status, body) = send(&app, "GET", "/user/alice/example.org", None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let message = json_body(&body)["error"].as_str().unwrap().to_string();
    assert!(message.contains("M_FORBIDDEN"));
    assert!(!message.contains("wrong"));
}

#[tokio::test]
async fn test_encoded_dot_segment_domain_is_rejected() {
    let app = test_router();

    for uri in [
        "/config/homeserver/%2E%2E",
        "/config/homeserver/victim.org%3Fx=1",
        "/config/user/%2E%2E/example.org",
    ] {
        let (status, _) = send(
            &app,
            "PUT",
            uri,
            Some(json!({"cs_url": "https://attacker.example", "login_secret": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
    }

    let (_, body) = send(&app, "GET", "/config/homeserver", None).await;
    assert_eq!(json_body(&body), json!({"keys": []}));
}
