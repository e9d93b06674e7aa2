//! Static token authentication.

use std::sync::Arc;

use async_trait::async_trait;

use super::{AuthError, ClientProvider};
use crate::config::AuthKind;
use crate::secret::Secret;
use crate::transport::VaultTransport;

/// A pre-issued token, installed once and never renewed.
#[derive(Debug)]
pub struct TokenAuth {
    transport: Arc<VaultTransport>,
}

impl TokenAuth {
    pub fn new(transport: Arc<VaultTransport>, token: Secret) -> Self {
        transport.set_token(token);
        Self { transport }
    }
}

#[async_trait]
impl ClientProvider for TokenAuth {
    fn kind(&self) -> AuthKind {
        AuthKind::Token
    }

    async fn client(&self) -> Result<Arc<VaultTransport>, AuthError> {
        Ok(Arc::clone(&self.transport))
    }
}
