//! Integration tests for token renewal.
//!
//! These tests verify that a configured provider:
//! - Logs in once while its token is fresh
//! - Logs in again once the token is inside the expiration window
//! - Hands out a client that is authorized after renewal
//! - Surfaces login failures on every call until a login succeeds

use std::io::Write;

use serde_json::json;
use tempfile::NamedTempFile;
use vaultlease_core::{
    AuthConfig, AuthError, ClientProvider, Config, TransportConfig, VaultAuth,
};
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

fn login_response(token: &str, lease_secs: u64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "auth": {
            "client_token": token,
            "accessor": format!("accessor-{token}"),
            "policies": ["default"],
            "lease_duration": lease_secs,
            "renewable": true
        }
    }))
}

fn app_role_config(server: &MockServer) -> Config {
    Config::new(TransportConfig::new(server.uri()))
        .with_auth(AuthConfig::app_role("svc", "r1", "s1"))
}

#[tokio::test]
async fn test_fresh_token_means_one_handshake() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(login_response("s.first", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let auth = VaultAuth::build(&app_role_config(&server)).unwrap();

    let first = auth.client().await.unwrap();
    let second = auth.client().await.unwrap();

    assert_eq!(first.token().unwrap().expose(), "s.first");
    assert_eq!(second.token().unwrap().expose(), "s.first");
}

#[tokio::test]
async fn test_lapsed_token_is_renewed_and_authorized() {
    let server = MockServer::start().await;

    // First login hands out a token that is already inside the window.
    Mock::given(method("PUT"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(login_response("s.stale", 1))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(login_response("s.renewed", 3600))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/secret/app"))
        .and(header("X-Vault-Token", "s.stale"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"errors": ["permission denied"]})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/secret/app"))
        .and(header("X-Vault-Token", "s.renewed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"foo": "bar"}})))
        .mount(&server)
        .await;

    let auth = VaultAuth::build(&app_role_config(&server)).unwrap();

    let client = auth.client().await.unwrap();
    let err = client.read("secret/app").await.unwrap_err();
    assert_eq!(err.status(), Some(403));

    let client = auth.client().await.unwrap();
    assert_eq!(client.token().unwrap().expose(), "s.renewed");
    let response = client.read("secret/app").await.unwrap().unwrap();
    assert_eq!(response.data.unwrap()["foo"], "bar");
}

#[tokio::test]
async fn test_handshake_failure_propagates_until_login_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(
            ResponseTemplate::new(503).set_body_json(json!({"errors": ["Vault is sealed"]})),
        )
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/auth/approle/login"))
        .respond_with(login_response("s.unsealed", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let auth = VaultAuth::build(&app_role_config(&server)).unwrap();

    for _ in 0..2 {
        let err = auth.client().await.unwrap_err();
        assert!(matches!(err, AuthError::Handshake { .. }));
        assert!(err.to_string().contains("Vault is sealed"));
    }

    let client = auth.client().await.unwrap();
    assert_eq!(client.token().unwrap().expose(), "s.unsealed");
}

#[tokio::test]
async fn test_kubernetes_renewal_rereads_token_file() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/auth/k8s-payments/login"))
        .respond_with(login_response("s.k8s", 1))
        .expect(2)
        .mount(&server)
        .await;

    let mut jwt = NamedTempFile::new().unwrap();
    write!(jwt, "first.jwt.sig").unwrap();

    let config = Config::new(TransportConfig::new(server.uri())).with_auth(AuthConfig::Kubernetes {
        role: "payments".to_string(),
        mount_path: "k8s-payments".to_string(),
        jwt_path: jwt.path().to_path_buf(),
    });
    let auth = VaultAuth::build(&config).unwrap();

    auth.client().await.unwrap();
    std::fs::write(jwt.path(), "rotated.jwt.sig").unwrap();
    auth.client().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let jwts: Vec<String> = requests
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["jwt"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(jwts, vec!["first.jwt.sig", "rotated.jwt.sig"]);
}

#[tokio::test]
async fn test_static_token_never_logs_in() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(login_response("s.unused", 3600))
        .expect(0)
        .mount(&server)
        .await;

    let config = Config::new(TransportConfig::new(server.uri()))
        .with_auth(AuthConfig::token("s.static"));
    let auth = VaultAuth::build(&config).unwrap();

    for _ in 0..3 {
        let client = auth.client().await.unwrap();
        assert_eq!(client.token().unwrap().expose(), "s.static");
    }
}
