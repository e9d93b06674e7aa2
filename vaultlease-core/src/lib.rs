//! # Vaultlease Core
//!
//! Vault client authentication with lazy token renewal.
//!
//! This crate provides:
//! - Auth method selection from explicit configuration or the environment
//! - Static token, app-role, Kubernetes and AWS IAM logins
//! - A guard that renews tokens shortly before they expire
//! - Secret read, write, list and delete helpers on top of a live client
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use vaultlease_core::SecretData;
//!
//! async fn database_password() -> Result<Option<String>, vaultlease_core::DataError> {
//!     let secrets = SecretData::configure_default().await?;
//!     let data = secrets.read_data("secret/database").await?;
//!     Ok(data.and_then(|d| d.get("password")?.as_str().map(String::from)))
//! }
//! ```

pub mod auth;
pub mod aws;
pub mod config;
pub mod data;
pub mod secret;
pub mod token;
pub mod transport;

// Re-export commonly used types at crate root
pub use config::{
    AuthConfig,
    AuthKind,
    Config,
    ConfigError,
    IamConfig,
    TransportConfig,
};

pub use auth::{
    AuthError,
    ClientProvider,
    LoginMethod,
    TokenGuard,
    VaultAuth,
};

pub use aws::{AwsCredentials, AwsError};

pub use data::{DataError, SecretData};

pub use secret::Secret;

pub use token::{Credential, EXPIRATION_WINDOW};

pub use transport::{TransportError, VaultResponse, VaultTransport};
