//! AWS identity proof for the Vault AWS IAM auth method.
//!
//! This module provides:
//! - [`AwsCredentials`] - Static credentials supplied through configuration
//! - [`IamLoginBuilder`] - The pre-signed `sts:GetCallerIdentity` login payload
//!
//! Credentials and the home region come from the AWS SDK's default chains
//! (`aws-config`), signing from `aws-sigv4`. The signed request is never
//! sent to AWS. Vault replays it to STS to learn who the caller is.

pub mod login;

use aws_credential_types::Credentials;
use thiserror::Error;

use crate::secret::Secret;

pub use login::{EndpointResolution, IamLoginBuilder, IamLoginData, StsEndpoint};

/// Provider name reported for credentials passed in through configuration.
const EXPLICIT_PROVIDER: &str = "VaultleaseConfig";

/// Error type for AWS credential lookup and request signing.
#[derive(Debug, Error)]
pub enum AwsError {
    /// The SDK credential chain produced no credentials.
    #[error("no AWS credentials available: {message}")]
    Credentials { message: String },

    /// An STS endpoint URL could not be constructed.
    #[error("invalid STS endpoint {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    /// The request could not be signed.
    #[error("request signing failed: {message}")]
    Signing { message: String },
}

/// Static AWS signing credentials.
///
/// Used in place of the SDK's default chain when set on
/// [`IamConfig`](crate::IamConfig).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: Secret,
    pub session_token: Option<Secret>,
}

impl AwsCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<Secret>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: None,
        }
    }

    pub fn with_session_token(mut self, token: impl Into<Secret>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Convert into the SDK credential type.
    pub fn to_sdk(&self) -> Credentials {
        Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.expose(),
            self.session_token.as_ref().map(|t| t.expose().to_string()),
            None,
            EXPLICIT_PROVIDER,
        )
    }
}
