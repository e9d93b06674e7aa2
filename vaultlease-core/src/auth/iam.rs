//! AWS IAM authentication.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;

use super::{AuthError, LoginMethod, credential_from_response, login_path};
use crate::aws::{EndpointResolution, IamLoginBuilder};
use crate::config::{AuthKind, IamConfig};
use crate::token::Credential;
use crate::transport::VaultTransport;

/// Logs in with a signed `sts:GetCallerIdentity` request.
///
/// The request is first signed for the regional (or `AWS_STS_REGION`
/// pinned) endpoint. If that login attempt fails for any reason, whether
/// Vault rejects it or the request never gets a response, it is signed again
/// for the default global endpoint and sent once more. The second result is
/// final. Failing to obtain credentials or sign is not retried.
#[derive(Debug, Clone)]
pub struct IamLogin {
    config: IamConfig,
    builder: OnceCell<IamLoginBuilder>,
}

impl IamLogin {
    pub fn new(
        role: impl Into<String>,
        mount_path: impl Into<String>,
        builder: IamLoginBuilder,
    ) -> Self {
        Self {
            config: IamConfig::new(role).with_mount_path(mount_path),
            builder: OnceCell::from(builder),
        }
    }

    /// Build from configuration.
    ///
    /// AWS region and credential providers are loaded on the first login.
    pub fn from_config(config: &IamConfig) -> Self {
        Self {
            config: config.clone(),
            builder: OnceCell::new(),
        }
    }

    async fn builder(&self) -> Result<&IamLoginBuilder, AuthError> {
        Ok(self
            .builder
            .get_or_try_init(|| IamLoginBuilder::load(&self.config))
            .await?)
    }

    async fn attempt(
        &self,
        transport: &VaultTransport,
        resolution: EndpointResolution,
    ) -> Result<Result<Credential, AuthError>, AuthError> {
        let payload = self
            .builder()
            .await?
            .build(resolution)
            .await?
            .into_payload(&self.config.role);
        let issued_at = Utc::now();
        Ok(
            match transport
                .login(&login_path(&self.config.mount_path), &payload)
                .await
            {
                Ok(response) => credential_from_response(AuthKind::Iam, response, issued_at),
                Err(e) => Err(AuthError::handshake(AuthKind::Iam, e)),
            },
        )
    }
}

#[async_trait]
impl LoginMethod for IamLogin {
    fn kind(&self) -> AuthKind {
        AuthKind::Iam
    }

    async fn login(&self, transport: &VaultTransport) -> Result<Credential, AuthError> {
        tracing::debug!(role = %self.config.role, mount = %self.config.mount_path, "aws iam login");

        // Outer errors come from credentials or signing and are not retried.
        match self.attempt(transport, EndpointResolution::Regional).await? {
            Ok(credential) => Ok(credential),
            Err(e) => {
                tracing::warn!(
                    role = %self.config.role,
                    error = %e,
                    "regional iam login failed, retrying with global sts endpoint"
                );
                self.attempt(transport, EndpointResolution::GlobalDefault)
                    .await?
            }
        }
    }
}
