//! App-role authentication.

use async_trait::async_trait;
use serde_json::json;

use super::{AuthError, LoginMethod, login_path, login_with};
use crate::config::{AuthKind, DEFAULT_APP_ROLE_MOUNT};
use crate::secret::Secret;
use crate::token::Credential;
use crate::transport::VaultTransport;

/// Logs in with a `role_id` / `secret_id` pair.
///
/// The same pair is presented on every renewal.
#[derive(Debug, Clone)]
pub struct AppRoleLogin {
    role: String,
    role_id: String,
    secret_id: Secret,
    mount_path: String,
}

impl AppRoleLogin {
    pub fn new(role: impl Into<String>, role_id: impl Into<String>, secret_id: Secret) -> Self {
        Self {
            role: role.into(),
            role_id: role_id.into(),
            secret_id,
            mount_path: DEFAULT_APP_ROLE_MOUNT.to_string(),
        }
    }

    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = mount_path.into();
        self
    }

    pub fn role(&self) -> &str {
        &self.role
    }
}

#[async_trait]
impl LoginMethod for AppRoleLogin {
    fn kind(&self) -> AuthKind {
        AuthKind::AppRole
    }

    async fn login(&self, transport: &VaultTransport) -> Result<Credential, AuthError> {
        tracing::debug!(role = %self.role, mount = %self.mount_path, "app-role login");
        let payload = json!({
            "role_id": self.role_id,
            "secret_id": self.secret_id.expose(),
        });
        login_with(self.kind(), transport, &login_path(&self.mount_path), &payload).await
    }
}
