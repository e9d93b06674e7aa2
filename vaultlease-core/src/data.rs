//! Generic secret read, write, list and delete.
//!
//! [`SecretData`] owns a [`ClientProvider`] and asks it for a live transport
//! on every call, so token renewal is invisible to callers.
//!
//! All operations distinguish "succeeded with no data" (`Ok(None)`) from a
//! failure (`Err`).

use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::{AuthError, ClientProvider, VaultAuth};
use crate::config::Config;
use crate::transport::{TransportError, VaultResponse};

/// Error type for secret data operations.
#[derive(Debug, Error)]
pub enum DataError {
    /// A live client could not be obtained.
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Vault rejected the operation or could not be reached.
    #[error("{operation} {path} failed: {source}")]
    Operation {
        operation: &'static str,
        path: String,
        #[source]
        source: TransportError,
    },

    /// A list response had data but no `keys`.
    #[error("list {path} returned no keys")]
    MissingKeys { path: String },

    /// A list response's `keys` was not an array of strings.
    #[error("list {path} returned malformed keys")]
    InvalidKeys { path: String },
}

/// Secret operations through an owned client provider.
#[derive(Debug)]
pub struct SecretData<P = VaultAuth> {
    provider: P,
}

impl SecretData<VaultAuth> {
    /// Build the auth method for `config` and log in once.
    ///
    /// Fails if the configuration is unusable or the first login fails.
    pub async fn configure(config: &Config) -> Result<Self, DataError> {
        let provider = VaultAuth::build(config)?;
        provider.client().await?;
        Ok(Self { provider })
    }

    /// [`configure`](Self::configure) with configuration from the environment.
    pub async fn configure_default() -> Result<Self, DataError> {
        let config = Config::from_env().map_err(AuthError::from)?;
        Self::configure(&config).await
    }
}

impl<P: ClientProvider> SecretData<P> {
    /// Wrap an existing provider without logging in.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Read the data stored at `path`.
    pub async fn read_data(&self, path: &str) -> Result<Option<Map<String, Value>>, DataError> {
        let client = self.provider.client().await?;
        let response = client
            .read(path)
            .await
            .map_err(|source| operation_error("read", path, source))?;
        Ok(response.and_then(|r| r.data))
    }

    /// Write `data` to `path`, returning whatever Vault sends back.
    pub async fn write_data(
        &self,
        path: &str,
        data: &Map<String, Value>,
    ) -> Result<Option<Map<String, Value>>, DataError> {
        let client = self.provider.client().await?;
        let response = client
            .write(path, data)
            .await
            .map_err(|source| operation_error("write", path, source))?;
        Ok(response.and_then(|r| r.data))
    }

    /// Delete `path`.
    pub async fn delete_data(&self, path: &str) -> Result<Option<Map<String, Value>>, DataError> {
        let client = self.provider.client().await?;
        let response = client
            .delete(path)
            .await
            .map_err(|source| operation_error("delete", path, source))?;
        Ok(response.and_then(|r| r.data))
    }

    /// List the key names under `path`, in the order Vault returns them.
    pub async fn list_data(&self, path: &str) -> Result<Option<Vec<String>>, DataError> {
        let client = self.provider.client().await?;
        let response = client
            .list(path)
            .await
            .map_err(|source| operation_error("list", path, source))?;

        match response.and_then(|r: VaultResponse| r.data) {
            Some(data) => parse_keys(path, &data).map(Some),
            None => Ok(None),
        }
    }
}

fn operation_error(operation: &'static str, path: &str, source: TransportError) -> DataError {
    DataError::Operation {
        operation,
        path: path.to_string(),
        source,
    }
}

fn parse_keys(path: &str, data: &Map<String, Value>) -> Result<Vec<String>, DataError> {
    let keys = data.get("keys").ok_or_else(|| DataError::MissingKeys {
        path: path.to_string(),
    })?;
    let invalid = || DataError::InvalidKeys {
        path: path.to_string(),
    };

    keys.as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|key| key.as_str().map(String::from).ok_or_else(invalid))
        .collect()
}
