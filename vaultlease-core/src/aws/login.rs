//! Pre-signed `sts:GetCallerIdentity` payloads for Vault's AWS auth backend.

use std::collections::BTreeMap;
use std::time::SystemTime;

use aws_config::default_provider::region::DefaultRegionChain;
use aws_config::meta::region::{ProvideRegion, RegionProviderChain};
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{
    SignableBody, SignableRequest, SigningParams, SigningSettings, sign,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::AwsError;
use crate::config::IamConfig;

/// Region assumed when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

const STS_SERVICE: &str = "sts";
const GLOBAL_STS_URL: &str = "https://sts.amazonaws.com/";
const GET_CALLER_IDENTITY_BODY: &str = "Action=GetCallerIdentity&Version=2011-06-15";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

/// Regions that the legacy endpoint resolver sends to the global STS host.
const LEGACY_GLOBAL_REGIONS: &[&str] = &[
    "ap-northeast-1",
    "ap-south-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "aws-global",
    "ca-central-1",
    "eu-central-1",
    "eu-north-1",
    "eu-west-1",
    "eu-west-2",
    "eu-west-3",
    "sa-east-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
];

/// How the STS endpoint for a login attempt is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointResolution {
    /// `https://sts.<region>.<domain>`, pinned to the STS region override if set.
    Regional,
    /// The SDK's default resolution for the home region.
    GlobalDefault,
}

/// Where the identity request is addressed and which region signs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StsEndpoint {
    pub url: Url,
    pub signing_region: String,
}

impl StsEndpoint {
    /// The regional endpoint for `region`.
    pub fn regional(region: &str) -> Result<Self, AwsError> {
        let raw = format!("https://{STS_SERVICE}.{region}.{}/", provider_domain(region));
        let url = Url::parse(&raw).map_err(|e| AwsError::InvalidEndpoint {
            url: raw.clone(),
            message: e.to_string(),
        })?;
        Ok(Self {
            url,
            signing_region: region.to_string(),
        })
    }

    /// The endpoint the legacy resolver picks for `region`.
    ///
    /// Legacy regions go to `sts.amazonaws.com` signed for `us-east-1`; every
    /// other region keeps its regional endpoint.
    pub fn global_default(region: &str) -> Result<Self, AwsError> {
        if !LEGACY_GLOBAL_REGIONS.contains(&region) {
            return Self::regional(region);
        }
        let url = Url::parse(GLOBAL_STS_URL).map_err(|e| AwsError::InvalidEndpoint {
            url: GLOBAL_STS_URL.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            url,
            signing_region: DEFAULT_REGION.to_string(),
        })
    }
}

fn provider_domain(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "amazonaws.com.cn"
    } else {
        "amazonaws.com"
    }
}

/// Resolve the home region: `explicit` first, then `fallback`, then `us-east-1`.
///
/// [`IamLoginBuilder::load`] passes the SDK's default region chain as the
/// fallback (environment, profile config file, instance metadata).
pub async fn home_region<P>(explicit: Option<String>, fallback: P) -> String
where
    P: ProvideRegion + 'static,
{
    RegionProviderChain::first_try(explicit.map(Region::new))
        .or_else(fallback)
        .region()
        .await
        .map(|region| region.to_string())
        .unwrap_or_else(|| DEFAULT_REGION.to_string())
}

fn signing_error(e: impl std::fmt::Display) -> AwsError {
    AwsError::Signing {
        message: e.to_string(),
    }
}

/// `x-amz-date` -> `X-Amz-Date`.
fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

/// The four fields Vault's AWS backend replays to STS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IamLoginData {
    pub iam_http_request_method: String,
    pub iam_request_url: String,
    pub iam_request_headers: String,
    pub iam_request_body: String,
}

impl IamLoginData {
    /// Login body for `role`.
    pub fn into_payload(self, role: &str) -> Value {
        serde_json::json!({
            "role": role,
            "iam_http_request_method": self.iam_http_request_method,
            "iam_request_url": self.iam_request_url,
            "iam_request_headers": self.iam_request_headers,
            "iam_request_body": self.iam_request_body,
        })
    }
}

/// Builds signed identity requests for one region setup.
#[derive(Debug, Clone)]
pub struct IamLoginBuilder {
    credentials: SharedCredentialsProvider,
    region: String,
    sts_region: Option<String>,
}

impl IamLoginBuilder {
    pub fn new(
        credentials: SharedCredentialsProvider,
        region: Option<String>,
        sts_region: Option<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.unwrap_or_else(|| DEFAULT_REGION.to_string()),
            sts_region,
        }
    }

    /// Resolve region and credentials the way the AWS SDK does.
    ///
    /// Explicit credentials in `config` win; otherwise the SDK default chain
    /// is used (environment, web identity, shared profiles with assume-role,
    /// container and instance metadata). Credentials are fetched per login,
    /// so rotated or refreshed credentials are picked up.
    pub async fn load(config: &IamConfig) -> Result<Self, AwsError> {
        let region = home_region(
            config.region.clone(),
            DefaultRegionChain::builder().build(),
        )
        .await;

        let credentials = match &config.credentials {
            Some(explicit) => SharedCredentialsProvider::new(explicit.to_sdk()),
            None => aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.clone()))
                .load()
                .await
                .credentials_provider()
                .ok_or_else(|| AwsError::Credentials {
                    message: "no credentials provider configured".to_string(),
                })?,
        };

        tracing::debug!(region = %region, sts_region = ?config.sts_region, "aws login config loaded");

        Ok(Self::new(credentials, Some(region), config.sts_region.clone()))
    }

    /// Home region used for signing when no override applies.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Resolve the endpoint for a login attempt.
    pub fn endpoint(&self, resolution: EndpointResolution) -> Result<StsEndpoint, AwsError> {
        match resolution {
            EndpointResolution::Regional => {
                StsEndpoint::regional(self.sts_region.as_deref().unwrap_or(&self.region))
            }
            EndpointResolution::GlobalDefault => StsEndpoint::global_default(&self.region),
        }
    }

    /// Resolve credentials and sign a fresh request.
    pub async fn build(&self, resolution: EndpointResolution) -> Result<IamLoginData, AwsError> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| AwsError::Credentials {
                message: e.to_string(),
            })?;
        self.build_with(&credentials, resolution, Utc::now())
    }

    /// Sign a request with the given credentials at the given time.
    pub fn build_with(
        &self,
        credentials: &Credentials,
        resolution: EndpointResolution,
        time: DateTime<Utc>,
    ) -> Result<IamLoginData, AwsError> {
        let endpoint = self.endpoint(resolution)?;
        tracing::debug!(
            url = %endpoint.url,
            signing_region = %endpoint.signing_region,
            "signing sts:GetCallerIdentity request"
        );

        let identity: Identity = credentials.clone().into();
        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&endpoint.signing_region)
            .name(STS_SERVICE)
            .time(SystemTime::from(time))
            .settings(SigningSettings::default())
            .build()
            .map_err(signing_error)?
            .into();

        let request = SignableRequest::new(
            "POST",
            endpoint.url.as_str(),
            std::iter::once(("Content-Type", FORM_CONTENT_TYPE)),
            SignableBody::Bytes(GET_CALLER_IDENTITY_BODY.as_bytes()),
        )
        .map_err(signing_error)?;

        let (instructions, _signature) = sign(request, &params)
            .map_err(signing_error)?
            .into_parts();

        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        headers.insert(
            "Content-Type".to_string(),
            vec![FORM_CONTENT_TYPE.to_string()],
        );
        for (name, value) in instructions.headers() {
            headers
                .entry(canonical_header_name(name))
                .or_default()
                .push(value.to_string());
        }
        let headers = serde_json::to_vec(&headers).map_err(|e| AwsError::Signing {
            message: format!("failed to encode signed headers: {e}"),
        })?;

        Ok(IamLoginData {
            iam_http_request_method: "POST".to_string(),
            iam_request_url: STANDARD.encode(endpoint.url.as_str()),
            iam_request_headers: STANDARD.encode(headers),
            iam_request_body: STANDARD.encode(GET_CALLER_IDENTITY_BODY),
        })
    }
}
