//! Authentication methods and live-client handles.
//!
//! This module provides:
//! - [`LoginMethod`] - A login handshake producing a [`Credential`]
//! - [`ClientProvider`] - The "give me a live client" contract
//! - [`TokenGuard`] - Wraps a [`LoginMethod`] and renews its token lazily
//! - [`VaultAuth`] - One variant per supported method, built from a [`Config`](crate::Config)

pub mod approle;
pub mod factory;
pub mod guard;
pub mod iam;
pub mod kubernetes;
pub mod token;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::aws::AwsError;
use crate::config::{AuthKind, ConfigError};
use crate::token::Credential;
use crate::transport::{TransportError, VaultResponse, VaultTransport};

pub use approle::AppRoleLogin;
pub use factory::VaultAuth;
pub use guard::TokenGuard;
pub use iam::IamLogin;
pub use kubernetes::KubernetesLogin;
pub use token::TokenAuth;

/// Error type for authentication.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No usable auth method was configured.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The transport to Vault could not be built.
    #[error("failed to construct vault transport: {0}")]
    TransportConstruction(#[source] TransportError),

    /// The login call failed or returned something unusable.
    #[error("{kind} login failed: {message}")]
    Handshake { kind: AuthKind, message: String },

    /// The platform identity token could not be read.
    #[error("failed to read identity token {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// AWS credentials could not be found or the request could not be signed.
    #[error("aws error: {0}")]
    Aws(#[from] AwsError),
}

impl AuthError {
    pub(crate) fn handshake(kind: AuthKind, message: impl std::fmt::Display) -> Self {
        Self::Handshake {
            kind,
            message: message.to_string(),
        }
    }
}

/// A login handshake against one Vault auth backend.
#[async_trait]
pub trait LoginMethod: Send + Sync {
    /// Which method this is.
    fn kind(&self) -> AuthKind;

    /// Perform the handshake and return the issued token.
    ///
    /// Must not touch the transport's bearer token; the caller installs the
    /// result.
    async fn login(&self, transport: &VaultTransport) -> Result<Credential, AuthError>;
}

/// Hands out a transport that carries a currently valid token.
#[async_trait]
pub trait ClientProvider: Send + Sync {
    /// Which method backs this provider.
    fn kind(&self) -> AuthKind;

    /// Return the shared transport, logging in first if the token is missing
    /// or about to expire.
    async fn client(&self) -> Result<Arc<VaultTransport>, AuthError>;
}

/// `auth/<mount>/login`.
pub(crate) fn login_path(mount_path: &str) -> String {
    format!("auth/{}/login", mount_path.trim_matches('/'))
}

/// Turn a login response into a credential whose lease started at `issued_at`.
pub(crate) fn credential_from_response(
    kind: AuthKind,
    response: VaultResponse,
    issued_at: DateTime<Utc>,
) -> Result<Credential, AuthError> {
    let auth = response
        .auth
        .ok_or_else(|| AuthError::handshake(kind, "response has no auth block"))?;

    let lease = std::time::Duration::from_secs(auth.lease_duration);
    Credential::from_lease(auth.client_token, issued_at, lease).ok_or_else(|| {
        AuthError::handshake(
            kind,
            format!("lease duration {}s is out of range", auth.lease_duration),
        )
    })
}

/// Send a login payload and parse the result.
pub(crate) async fn login_with(
    kind: AuthKind,
    transport: &VaultTransport,
    path: &str,
    payload: &serde_json::Value,
) -> Result<Credential, AuthError> {
    let issued_at = Utc::now();
    let response = transport
        .login(path, payload)
        .await
        .map_err(|e| AuthError::handshake(kind, e))?;
    credential_from_response(kind, response, issued_at)
}
