//! Kubernetes service account authentication.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::json;

use super::{AuthError, LoginMethod, login_path, login_with};
use crate::config::{AuthKind, DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH};
use crate::token::Credential;
use crate::transport::VaultTransport;

/// Logs in with the pod's service account JWT.
///
/// The token file is re-read on every login so rotated tokens are picked up.
#[derive(Debug, Clone)]
pub struct KubernetesLogin {
    role: String,
    mount_path: String,
    jwt_path: PathBuf,
}

impl KubernetesLogin {
    /// Login as `role` on `mount_path`, reading the default token file.
    pub fn new(role: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            mount_path: mount_path.into(),
            jwt_path: PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH),
        }
    }

    pub fn with_jwt_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.jwt_path = path.into();
        self
    }

    pub fn jwt_path(&self) -> &Path {
        &self.jwt_path
    }

    async fn read_jwt(&self) -> Result<String, AuthError> {
        let jwt = tokio::fs::read_to_string(&self.jwt_path)
            .await
            .map_err(|source| AuthError::Read {
                path: self.jwt_path.clone(),
                source,
            })?;
        Ok(jwt.trim().to_string())
    }
}

#[async_trait]
impl LoginMethod for KubernetesLogin {
    fn kind(&self) -> AuthKind {
        AuthKind::Kubernetes
    }

    async fn login(&self, transport: &VaultTransport) -> Result<Credential, AuthError> {
        let jwt = self.read_jwt().await?;
        tracing::debug!(role = %self.role, mount = %self.mount_path, "kubernetes login");
        let payload = json!({ "jwt": jwt, "role": self.role });
        login_with(self.kind(), transport, &login_path(&self.mount_path), &payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_login_sends_jwt_and_role() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/auth/k8s-payments/login"))
            .and(body_json(json!({"jwt": "eyJhbGciOi.payload.sig", "role": "payments"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "auth": {"client_token": "s.k8s", "lease_duration": 3600}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut jwt_file = NamedTempFile::new().unwrap();
        writeln!(jwt_file, "eyJhbGciOi.payload.sig").unwrap();

        let transport = VaultTransport::new(&TransportConfig::new(server.uri())).unwrap();
        let login =
            KubernetesLogin::new("payments", "k8s-payments").with_jwt_path(jwt_file.path());

        let credential = login.login(&transport).await.unwrap();
        assert_eq!(credential.token.expose(), "s.k8s");
    }

    #[tokio::test]
    async fn test_missing_token_file_is_read_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let transport = VaultTransport::new(&TransportConfig::new(server.uri())).unwrap();
        let login = KubernetesLogin::new("payments", "k8s-payments")
            .with_jwt_path("/nonexistent/serviceaccount/token");

        let err = login.login(&transport).await.unwrap_err();
        match err {
            AuthError::Read { path, .. } => {
                assert_eq!(path, PathBuf::from("/nonexistent/serviceaccount/token"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_default_jwt_path() {
        let login = KubernetesLogin::new("payments", "k8s-payments");
        assert_eq!(login.jwt_path(), Path::new(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH));
    }
}
