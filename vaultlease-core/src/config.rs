//! Client configuration and authentication method selection.
//!
//! This module provides:
//! - [`AuthKind`] - The four supported authentication methods
//! - [`AuthConfig`] - Method-specific parameters, one variant per method
//! - [`TransportConfig`] - Vault address, TLS trust and timeout settings
//! - [`Config`] - The pair of the above, selected explicitly or from the environment
//!
//! # Environment selection
//!
//! [`Config::from_env`] inspects the environment in a fixed priority order and
//! picks the first method whose inputs are all present:
//!
//! 1. `VAULT_APP_ROLE` + `VAULT_APP_ROLE_ID` + `VAULT_APP_SECRET_ID` → app-role
//! 2. `VAULT_K8S_ROLE` (mount path from `VAULT_K8S_PATH`, default `k8s-<role>`) → kubernetes
//! 3. `VAULT_ROLE` → AWS IAM
//! 4. `VAULT_TOKEN` → static token
//!
//! Empty variables count as unset.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::aws::AwsCredentials;
use crate::secret::Secret;

/// Default Vault address, matching the Vault CLI.
pub const DEFAULT_ADDRESS: &str = "https://127.0.0.1:8200";

/// Default request timeout for the Vault transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the kubelet mounts the pod's service account token.
pub const DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH: &str =
    "/var/run/secrets/kubernetes.io/serviceaccount/token";

/// Default mount path of the app-role auth backend.
pub const DEFAULT_APP_ROLE_MOUNT: &str = "approle";

/// Default mount path of the AWS auth backend.
pub const DEFAULT_AWS_MOUNT: &str = "aws";

pub const ENV_VAULT_ADDR: &str = "VAULT_ADDR";
pub const ENV_VAULT_SKIP_VERIFY: &str = "VAULT_SKIP_VERIFY";
pub const ENV_VAULT_CACERT: &str = "VAULT_CACERT";
pub const ENV_VAULT_CLIENT_TIMEOUT: &str = "VAULT_CLIENT_TIMEOUT";
pub const ENV_VAULT_TOKEN: &str = "VAULT_TOKEN";
pub const ENV_VAULT_ROLE: &str = "VAULT_ROLE";
pub const ENV_VAULT_APP_ROLE: &str = "VAULT_APP_ROLE";
pub const ENV_VAULT_APP_ROLE_ID: &str = "VAULT_APP_ROLE_ID";
pub const ENV_VAULT_APP_SECRET_ID: &str = "VAULT_APP_SECRET_ID";
pub const ENV_VAULT_K8S_ROLE: &str = "VAULT_K8S_ROLE";
pub const ENV_VAULT_K8S_PATH: &str = "VAULT_K8S_PATH";
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_AWS_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";
pub const ENV_AWS_STS_REGION: &str = "AWS_STS_REGION";

/// Error type for configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// None of the supported methods had all of its inputs present.
    #[error("cannot determine auth type from environment")]
    UndeterminedAuth,

    /// A client was requested from a configuration without an auth method.
    #[error("unknown auth type")]
    UnknownAuthType,

    /// A configuration value could not be parsed.
    #[error("invalid value for {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Supported authentication methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthKind {
    /// A pre-issued token that is used as-is and never renewed.
    Token,
    /// AWS IAM identity proven with a signed `sts:GetCallerIdentity` request.
    Iam,
    /// App-role `role_id` / `secret_id` pair.
    AppRole,
    /// Kubernetes service account token.
    Kubernetes,
}

impl AuthKind {
    /// Get the method name as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Iam => "aws-iam",
            Self::AppRole => "approle",
            Self::Kubernetes => "kubernetes",
        }
    }
}

impl fmt::Display for AuthKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for the AWS IAM method.
#[derive(Debug, Clone)]
pub struct IamConfig {
    /// Vault role to log in as.
    pub role: String,
    /// Mount path of the AWS auth backend.
    pub mount_path: String,
    /// Home region; resolved through the AWS SDK region chain when unset.
    pub region: Option<String>,
    /// Region pin for the primary signed request.
    pub sts_region: Option<String>,
    /// Explicit credentials, used instead of the AWS SDK default chain.
    pub credentials: Option<AwsCredentials>,
}

impl IamConfig {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            mount_path: DEFAULT_AWS_MOUNT.to_string(),
            region: None,
            sts_region: None,
            credentials: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_sts_region(mut self, region: impl Into<String>) -> Self {
        self.sts_region = Some(region.into());
        self
    }

    pub fn with_credentials(mut self, credentials: AwsCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_mount_path(mut self, mount_path: impl Into<String>) -> Self {
        self.mount_path = mount_path.into();
        self
    }
}

/// Method-specific authentication parameters.
///
/// Each variant carries exactly the inputs its method needs, so a
/// configuration can never hold a half-populated mix of methods.
#[derive(Debug, Clone)]
pub enum AuthConfig {
    Token {
        token: Secret,
    },
    AppRole {
        role: String,
        role_id: String,
        secret_id: Secret,
        mount_path: String,
    },
    Iam(IamConfig),
    Kubernetes {
        role: String,
        mount_path: String,
        jwt_path: PathBuf,
    },
}

impl AuthConfig {
    /// Static token configuration.
    pub fn token(token: impl Into<Secret>) -> Self {
        Self::Token {
            token: token.into(),
        }
    }

    /// App-role configuration on the default `approle` mount.
    pub fn app_role(
        role: impl Into<String>,
        role_id: impl Into<String>,
        secret_id: impl Into<Secret>,
    ) -> Self {
        Self::AppRole {
            role: role.into(),
            role_id: role_id.into(),
            secret_id: secret_id.into(),
            mount_path: DEFAULT_APP_ROLE_MOUNT.to_string(),
        }
    }

    /// Kubernetes configuration.
    ///
    /// The mount path defaults to `k8s-<role>` and the token is read from the
    /// standard service account location.
    pub fn kubernetes(role: impl Into<String>, mount_path: Option<String>) -> Self {
        let role = role.into();
        let mount_path = mount_path.unwrap_or_else(|| format!("k8s-{role}"));
        Self::Kubernetes {
            role,
            mount_path,
            jwt_path: PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH),
        }
    }

    /// Which method this configuration selects.
    pub fn kind(&self) -> AuthKind {
        match self {
            Self::Token { .. } => AuthKind::Token,
            Self::AppRole { .. } => AuthKind::AppRole,
            Self::Iam(_) => AuthKind::Iam,
            Self::Kubernetes { .. } => AuthKind::Kubernetes,
        }
    }
}

/// Settings for the HTTP transport to Vault.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base address, e.g. `https://vault.example.com:8200`.
    pub address: String,
    /// Skip TLS certificate verification.
    pub insecure: bool,
    /// Additional PEM root certificate to trust.
    pub ca_cert: Option<PathBuf>,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            insecure: false,
            ca_cert: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TransportConfig {
    /// Transport settings for the given address with default TLS and timeout.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Default::default()
        }
    }

    /// Skip (or enforce) TLS certificate verification.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Read transport settings through `lookup`, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(address) = lookup(ENV_VAULT_ADDR) {
            config.address = address;
        }
        if let Some(value) = lookup(ENV_VAULT_SKIP_VERIFY) {
            config.insecure = parse_bool(ENV_VAULT_SKIP_VERIFY, &value)?;
        }
        if let Some(path) = lookup(ENV_VAULT_CACERT) {
            config.ca_cert = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup(ENV_VAULT_CLIENT_TIMEOUT) {
            config.timeout = parse_timeout(&value)?;
        }

        Ok(config)
    }
}

/// Complete client configuration.
///
/// Created once at startup and not modified afterwards. A configuration
/// without an auth method is valid to hold but cannot produce a client.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub transport: TransportConfig,
    pub auth: Option<AuthConfig>,
}

impl Config {
    /// Configuration with the given transport and no auth method yet.
    pub fn new(transport: TransportConfig) -> Self {
        Self {
            transport,
            auth: None,
        }
    }

    /// Set the auth method.
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = Some(auth);
        self
    }

    /// The selected method, if any.
    pub fn kind(&self) -> Option<AuthKind> {
        self.auth.as_ref().map(AuthConfig::kind)
    }

    /// Select transport settings and auth method from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }

    /// Select transport settings and auth method through `lookup`.
    ///
    /// `lookup` returns `None` for unset variables; empty strings are
    /// treated as unset as well.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let transport = TransportConfig::from_lookup(&get)?;
        let auth = select_auth(&get).ok_or(ConfigError::UndeterminedAuth)?;

        tracing::debug!(method = %auth.kind(), "selected auth method from environment");

        Ok(Self {
            transport,
            auth: Some(auth),
        })
    }
}

fn select_auth<F>(get: F) -> Option<AuthConfig>
where
    F: Fn(&str) -> Option<String>,
{
    if let (Some(role), Some(role_id), Some(secret_id)) = (
        get(ENV_VAULT_APP_ROLE),
        get(ENV_VAULT_APP_ROLE_ID),
        get(ENV_VAULT_APP_SECRET_ID),
    ) {
        return Some(AuthConfig::app_role(role, role_id, secret_id));
    }

    if let Some(role) = get(ENV_VAULT_K8S_ROLE) {
        return Some(AuthConfig::kubernetes(role, get(ENV_VAULT_K8S_PATH)));
    }

    if let Some(role) = get(ENV_VAULT_ROLE) {
        let mut iam = IamConfig::new(role);
        iam.region = get(ENV_AWS_REGION).or_else(|| get(ENV_AWS_DEFAULT_REGION));
        iam.sts_region = get(ENV_AWS_STS_REGION);
        return Some(AuthConfig::Iam(iam));
    }

    get(ENV_VAULT_TOKEN).map(AuthConfig::token)
}

/// Process environment lookup, treating empty values as unset.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Ok(true),
        "0" | "f" | "false" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("expected a boolean, got {value:?}"),
        }),
    }
}

fn parse_timeout(value: &str) -> Result<Duration, ConfigError> {
    let digits = value.strip_suffix('s').unwrap_or(value);
    digits
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|e| ConfigError::Invalid {
            key: ENV_VAULT_CLIENT_TIMEOUT.to_string(),
            message: format!("expected seconds, got {value:?}: {e}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_app_role_has_highest_priority() {
        let config = Config::from_lookup(lookup_from(&[
            ("VAULT_APP_ROLE", "svc"),
            ("VAULT_APP_ROLE_ID", "r1"),
            ("VAULT_APP_SECRET_ID", "s1"),
            ("VAULT_ROLE", "ignored-role"),
            ("VAULT_TOKEN", "ignored-token"),
        ]))
        .unwrap();

        assert_eq!(config.kind(), Some(AuthKind::AppRole));
        match config.auth.unwrap() {
            AuthConfig::AppRole {
                role,
                role_id,
                secret_id,
                mount_path,
            } => {
                assert_eq!(role, "svc");
                assert_eq!(role_id, "r1");
                assert_eq!(secret_id.expose(), "s1");
                assert_eq!(mount_path, "approle");
            }
            other => panic!("unexpected auth config: {other:?}"),
        }
    }

    #[test]
    fn test_incomplete_app_role_falls_through() {
        let config = Config::from_lookup(lookup_from(&[
            ("VAULT_APP_ROLE", "svc"),
            ("VAULT_APP_ROLE_ID", "r1"),
            ("VAULT_TOKEN", "t"),
        ]))
        .unwrap();

        assert_eq!(config.kind(), Some(AuthKind::Token));
    }

    #[test]
    fn test_kubernetes_default_mount_path() {
        let config = Config::from_lookup(lookup_from(&[
            ("VAULT_K8S_ROLE", "payments"),
            ("VAULT_ROLE", "iam-role"),
        ]))
        .unwrap();

        match config.auth.unwrap() {
            AuthConfig::Kubernetes {
                role,
                mount_path,
                jwt_path,
            } => {
                assert_eq!(role, "payments");
                assert_eq!(mount_path, "k8s-payments");
                assert_eq!(jwt_path, PathBuf::from(DEFAULT_SERVICE_ACCOUNT_TOKEN_PATH));
            }
            other => panic!("unexpected auth config: {other:?}"),
        }
    }

    #[test]
    fn test_kubernetes_mount_path_override() {
        let config = Config::from_lookup(lookup_from(&[
            ("VAULT_K8S_ROLE", "payments"),
            ("VAULT_K8S_PATH", "kubernetes-eu"),
        ]))
        .unwrap();

        match config.auth.unwrap() {
            AuthConfig::Kubernetes { mount_path, .. } => assert_eq!(mount_path, "kubernetes-eu"),
            other => panic!("unexpected auth config: {other:?}"),
        }
    }

    #[test]
    fn test_iam_role_with_regions() {
        let config = Config::from_lookup(lookup_from(&[
            ("VAULT_ROLE", "foo"),
            ("AWS_REGION", "eu-west-2"),
            ("AWS_STS_REGION", "eu-west-1"),
            ("VAULT_TOKEN", "ignored"),
        ]))
        .unwrap();

        match config.auth.unwrap() {
            AuthConfig::Iam(iam) => {
                assert_eq!(iam.role, "foo");
                assert_eq!(iam.mount_path, "aws");
                assert_eq!(iam.region.as_deref(), Some("eu-west-2"));
                assert_eq!(iam.sts_region.as_deref(), Some("eu-west-1"));
            }
            other => panic!("unexpected auth config: {other:?}"),
        }
    }

    #[test]
    fn test_iam_region_falls_back_to_default_region() {
        let config = Config::from_lookup(lookup_from(&[
            ("VAULT_ROLE", "foo"),
            ("AWS_DEFAULT_REGION", "ap-south-1"),
        ]))
        .unwrap();

        match config.auth.unwrap() {
            AuthConfig::Iam(iam) => assert_eq!(iam.region.as_deref(), Some("ap-south-1")),
            other => panic!("unexpected auth config: {other:?}"),
        }
    }

    #[test]
    fn test_token_selected_last() {
        let config = Config::from_lookup(lookup_from(&[(
            "VAULT_TOKEN",
            "ff1779db-fb69-4a4f-b224-8029f98f8d10",
        )]))
        .unwrap();

        match config.auth.unwrap() {
            AuthConfig::Token { token } => {
                assert_eq!(token.expose(), "ff1779db-fb69-4a4f-b224-8029f98f8d10")
            }
            other => panic!("unexpected auth config: {other:?}"),
        }
    }

    #[test]
    fn test_nothing_present_is_an_error() {
        let result = Config::from_lookup(lookup_from(&[("VAULT_ADDR", "http://vault:8200")]));
        assert!(matches!(result, Err(ConfigError::UndeterminedAuth)));
    }

    #[test]
    fn test_empty_values_count_as_unset() {
        let result = Config::from_lookup(lookup_from(&[("VAULT_TOKEN", ""), ("VAULT_ROLE", "")]));
        assert!(matches!(result, Err(ConfigError::UndeterminedAuth)));
    }

    #[test]
    fn test_transport_settings_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("VAULT_ADDR", "http://vault:8200"),
            ("VAULT_SKIP_VERIFY", "true"),
            ("VAULT_CACERT", "/etc/vault/ca.pem"),
            ("VAULT_CLIENT_TIMEOUT", "5s"),
            ("VAULT_TOKEN", "t"),
        ]))
        .unwrap();

        assert_eq!(config.transport.address, "http://vault:8200");
        assert!(config.transport.insecure);
        assert_eq!(config.transport.ca_cert, Some(PathBuf::from("/etc/vault/ca.pem")));
        assert_eq!(config.transport.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_transport_defaults() {
        let transport = TransportConfig::from_lookup(|_| None).unwrap();
        assert_eq!(transport.address, DEFAULT_ADDRESS);
        assert!(!transport.insecure);
        assert_eq!(transport.timeout, DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_invalid_skip_verify() {
        let result = Config::from_lookup(lookup_from(&[
            ("VAULT_SKIP_VERIFY", "maybe"),
            ("VAULT_TOKEN", "t"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { key, .. }) if key == "VAULT_SKIP_VERIFY"));
    }

    #[test]
    fn test_invalid_timeout() {
        let result = Config::from_lookup(lookup_from(&[
            ("VAULT_CLIENT_TIMEOUT", "soon"),
            ("VAULT_TOKEN", "t"),
        ]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn test_explicit_config_has_no_auth_until_set() {
        let config = Config::new(TransportConfig::new("http://vault:8200"));
        assert_eq!(config.kind(), None);

        let config = config.with_auth(AuthConfig::token("t"));
        assert_eq!(config.kind(), Some(AuthKind::Token));
    }
}
