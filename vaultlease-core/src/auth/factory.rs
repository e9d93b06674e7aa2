//! Building an auth method from configuration.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    AppRoleLogin, AuthError, ClientProvider, IamLogin, KubernetesLogin, TokenAuth, TokenGuard,
};
use crate::config::{AuthConfig, AuthKind, Config, ConfigError};
use crate::transport::VaultTransport;

/// A configured auth method.
///
/// Static tokens are used as-is; every other method sits behind a
/// [`TokenGuard`] that logs in on first use and again before expiry.
pub enum VaultAuth {
    Token(TokenAuth),
    AppRole(TokenGuard<AppRoleLogin>),
    Iam(TokenGuard<IamLogin>),
    Kubernetes(TokenGuard<KubernetesLogin>),
}

impl VaultAuth {
    /// Build the transport and the auth method selected by `config`.
    ///
    /// No network calls are made here; the first login happens on the first
    /// [`ClientProvider::client`] call.
    pub fn build(config: &Config) -> Result<Self, AuthError> {
        let auth = config.auth.as_ref().ok_or(ConfigError::UnknownAuthType)?;
        let transport = Arc::new(
            VaultTransport::new(&config.transport).map_err(AuthError::TransportConstruction)?,
        );

        tracing::debug!(method = %auth.kind(), address = %transport.address(), "building vault auth");

        Ok(match auth {
            AuthConfig::Token { token } => Self::Token(TokenAuth::new(transport, token.clone())),
            AuthConfig::AppRole {
                role,
                role_id,
                secret_id,
                mount_path,
            } => {
                let login = AppRoleLogin::new(role.clone(), role_id.clone(), secret_id.clone())
                    .with_mount_path(mount_path.clone());
                Self::AppRole(TokenGuard::new(login, transport))
            }
            AuthConfig::Iam(iam) => {
                Self::Iam(TokenGuard::new(IamLogin::from_config(iam), transport))
            }
            AuthConfig::Kubernetes {
                role,
                mount_path,
                jwt_path,
            } => {
                let login = KubernetesLogin::new(role.clone(), mount_path.clone())
                    .with_jwt_path(jwt_path.clone());
                Self::Kubernetes(TokenGuard::new(login, transport))
            }
        })
    }

    /// Build from the process environment.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::build(&Config::from_env()?)
    }
}

#[async_trait]
impl ClientProvider for VaultAuth {
    fn kind(&self) -> AuthKind {
        match self {
            Self::Token(auth) => auth.kind(),
            Self::AppRole(guard) => guard.kind(),
            Self::Iam(guard) => guard.kind(),
            Self::Kubernetes(guard) => guard.kind(),
        }
    }

    async fn client(&self) -> Result<Arc<VaultTransport>, AuthError> {
        match self {
            Self::Token(auth) => auth.client().await,
            Self::AppRole(guard) => guard.live_client().await,
            Self::Iam(guard) => guard.live_client().await,
            Self::Kubernetes(guard) => guard.live_client().await,
        }
    }
}

impl std::fmt::Debug for VaultAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("VaultAuth").field(&self.kind()).finish()
    }
}
