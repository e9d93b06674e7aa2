//! HTTP transport to the Vault API.
//!
//! [`VaultTransport`] is the long-lived connection handle shared between an
//! auth method and its callers. The only state that changes after
//! construction is the bearer token, which is swapped under a lock so
//! concurrent readers see either the old or the new token, never a mix.

use parking_lot::RwLock;
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::TransportConfig;
use crate::secret::Secret;

/// Header carrying the Vault client token.
pub const TOKEN_HEADER: &str = "X-Vault-Token";

/// Error type for Vault transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("failed to build vault transport: {message}")]
    Build { message: String },

    /// The request could not be sent or the response could not be read.
    #[error("request to vault failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Vault answered with a non-success status.
    #[error("vault returned {status}: {}", .errors.join("; "))]
    Status { status: u16, errors: Vec<String> },

    /// The response body was not a valid Vault envelope.
    #[error("invalid vault response: {message}")]
    Decode { message: String },

    /// An operation that must return a body returned none.
    #[error("vault returned an empty response for {path}")]
    EmptyResponse { path: String },
}

impl TransportError {
    /// HTTP status of a rejected request, if that is what this error is.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Auth block of a login response.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthInfo {
    pub client_token: Secret,
    #[serde(default)]
    pub accessor: String,
    #[serde(default)]
    pub policies: Vec<String>,
    /// Token TTL in seconds.
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

/// Vault's generic response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
    #[serde(default)]
    pub auth: Option<AuthInfo>,
    #[serde(default)]
    pub warnings: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
}

/// Connection to a Vault server.
pub struct VaultTransport {
    http: Client,
    address: String,
    token: RwLock<Option<Secret>>,
}

impl VaultTransport {
    /// Build a transport from the given settings.
    ///
    /// Fails if the CA certificate cannot be read or the TLS backend rejects
    /// the configuration.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure);

        if let Some(path) = &config.ca_cert {
            let pem = std::fs::read(path).map_err(|e| TransportError::Build {
                message: format!("failed to read CA certificate {}: {}", path.display(), e),
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| TransportError::Build {
                message: format!("invalid CA certificate {}: {}", path.display(), e),
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder.build().map_err(|e| TransportError::Build {
            message: e.to_string(),
        })?;

        Ok(Self {
            http,
            address: config.address.trim_end_matches('/').to_string(),
            token: RwLock::new(None),
        })
    }

    /// Base address of the Vault server.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Replace the bearer token used on subsequent requests.
    pub fn set_token(&self, token: Secret) {
        *self.token.write() = Some(token);
    }

    /// The bearer token currently attached to requests.
    pub fn token(&self) -> Option<Secret> {
        self.token.read().clone()
    }

    /// Read a path. `Ok(None)` means nothing is stored there.
    pub async fn read(&self, path: &str) -> Result<Option<VaultResponse>, TransportError> {
        self.send(Method::GET, path, &[], None, true).await
    }

    /// List the keys under a path.
    pub async fn list(&self, path: &str) -> Result<Option<VaultResponse>, TransportError> {
        self.send(Method::GET, path, &[("list", "true")], None, true)
            .await
    }

    /// Write JSON data to a path.
    pub async fn write(
        &self,
        path: &str,
        data: &Map<String, Value>,
    ) -> Result<Option<VaultResponse>, TransportError> {
        let body = Value::Object(data.clone());
        self.send(Method::PUT, path, &[], Some(&body), true).await
    }

    /// Delete a path.
    pub async fn delete(&self, path: &str) -> Result<Option<VaultResponse>, TransportError> {
        self.send(Method::DELETE, path, &[], None, true).await
    }

    /// Post a login payload to an auth endpoint.
    ///
    /// The current bearer token is not sent; a login must stand on the
    /// payload alone.
    pub async fn login(&self, path: &str, body: &Value) -> Result<VaultResponse, TransportError> {
        self.send(Method::PUT, path, &[], Some(body), false)
            .await?
            .ok_or_else(|| TransportError::EmptyResponse {
                path: path.to_string(),
            })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.address, path.trim_start_matches('/'))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
        with_token: bool,
    ) -> Result<Option<VaultResponse>, TransportError> {
        let url = self.url(path);
        tracing::trace!(%method, %url, "vault request");

        let mut request = self.http.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let token = if with_token { self.token() } else { None };
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token.expose());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await?;

        if !status.is_success() {
            let errors = serde_json::from_slice::<ErrorBody>(&bytes)
                .map(|b| b.errors)
                .unwrap_or_else(|_| vec![String::from_utf8_lossy(&bytes).into_owned()]);
            return Err(TransportError::Status {
                status: status.as_u16(),
                errors,
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| TransportError::Decode {
                message: e.to_string(),
            })
    }
}

impl std::fmt::Debug for VaultTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultTransport")
            .field("address", &self.address)
            .field("has_token", &self.token.read().is_some())
            .finish()
    }
}
