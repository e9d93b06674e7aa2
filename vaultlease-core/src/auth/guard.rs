//! Lazy token renewal.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tokio::sync::Mutex;

use super::{AuthError, ClientProvider, LoginMethod};
use crate::config::AuthKind;
use crate::token::{Credential, EXPIRATION_WINDOW};
use crate::transport::VaultTransport;

/// Keeps the transport's token fresh for one login method.
///
/// Renewal happens on the calling task when a client is requested and the
/// held credential is missing or within the expiration window of its expiry.
/// Renewals are serialized: a caller that waited for another caller's
/// renewal re-checks the credential and reuses it instead of logging in
/// again. A failed handshake leaves the previous credential and token in
/// place and is returned to the caller; the next call tries again.
pub struct TokenGuard<M> {
    method: M,
    transport: Arc<VaultTransport>,
    current: Mutex<Option<Credential>>,
    window: Duration,
}

impl<M: LoginMethod> TokenGuard<M> {
    /// Wrap `method`, installing renewed tokens on `transport`.
    pub fn new(method: M, transport: Arc<VaultTransport>) -> Self {
        Self {
            method,
            transport,
            current: Mutex::new(None),
            window: EXPIRATION_WINDOW,
        }
    }

    /// Use a different safety margin than [`EXPIRATION_WINDOW`].
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn method(&self) -> &M {
        &self.method
    }

    /// The transport, whatever state its token is in.
    pub fn transport(&self) -> &Arc<VaultTransport> {
        &self.transport
    }

    /// The credential currently held, if any login has succeeded.
    pub async fn credential(&self) -> Option<Credential> {
        self.current.lock().await.clone()
    }

    /// Return the transport, logging in first if needed.
    pub async fn live_client(&self) -> Result<Arc<VaultTransport>, AuthError> {
        let mut current = self.current.lock().await;
        let kind = self.method.kind();

        if let Some(credential) = current
            .as_ref()
            .filter(|c| !c.is_expired_at(Utc::now(), self.window))
        {
            tracing::debug!(method = %kind, expires_at = %credential.expiry, "reusing vault token");
            return Ok(Arc::clone(&self.transport));
        }

        match self.method.login(&self.transport).await {
            Ok(credential) => {
                tracing::info!(
                    method = %kind,
                    ttl_secs = (credential.expiry - Utc::now()).num_seconds(),
                    "vault login succeeded"
                );
                self.transport.set_token(credential.token.clone());
                *current = Some(credential);
                Ok(Arc::clone(&self.transport))
            }
            Err(e) => {
                tracing::warn!(method = %kind, error = %e, "vault login failed");
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<M: LoginMethod> ClientProvider for TokenGuard<M> {
    fn kind(&self) -> AuthKind {
        self.method.kind()
    }

    async fn client(&self) -> Result<Arc<VaultTransport>, AuthError> {
        self.live_client().await
    }
}
