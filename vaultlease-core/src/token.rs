//! Vault tokens issued by a login handshake.
//!
//! This module provides:
//! - [`Credential`] - A client token together with its absolute expiry
//! - [`EXPIRATION_WINDOW`] - Safety margin applied before the real expiry

use chrono::{DateTime, Duration, Utc};

use crate::secret::Secret;

/// Tokens are treated as expired this long before their actual expiry.
///
/// Prevents a token from lapsing while a request that carries it is in flight.
pub const EXPIRATION_WINDOW: Duration = Duration::seconds(10);

/// A Vault client token and the instant it stops being valid.
///
/// Credentials are produced fresh by every login and are never updated in
/// place; a renewal replaces the whole value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// The client token presented as `X-Vault-Token`.
    pub token: Secret,

    /// When the token's lease runs out.
    pub expiry: DateTime<Utc>,
}

impl Credential {
    /// Create a credential expiring at `expiry`.
    pub fn new(token: impl Into<Secret>, expiry: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expiry,
        }
    }

    /// Create a credential from a lease TTL counted from `issued_at`.
    pub fn from_lease(
        token: impl Into<Secret>,
        issued_at: DateTime<Utc>,
        lease: std::time::Duration,
    ) -> Option<Self> {
        let lease = Duration::from_std(lease).ok()?;
        let expiry = issued_at.checked_add_signed(lease)?;
        Some(Self::new(token, expiry))
    }

    /// Check whether the credential is unusable at `now` given a safety `window`.
    ///
    /// A credential is expired once `now + window >= expiry`.
    pub fn is_expired_at(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now + window >= self.expiry
    }

    /// Check against the current time and [`EXPIRATION_WINDOW`].
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now(), EXPIRATION_WINDOW)
    }

    /// Time left before the credential is considered expired, or zero.
    pub fn remaining(&self, now: DateTime<Utc>, window: Duration) -> Duration {
        (self.expiry - window - now).max(Duration::zero())
    }
}
