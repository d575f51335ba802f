//! Token acquisition: request/response types, tiers, and the
//! identity-provider seam.
//!
//! The acquirer in [`acquirer`] walks an ordered list of tiers; the
//! concrete Azure AD client lives in [`aad`].

pub mod aad;
pub mod acquirer;
pub mod ambient;
pub mod cache;
pub mod prompt;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use zeroize::Zeroizing;

use crate::errors::{AuthError, KvFetchError, Result};

pub use aad::AadIdentityProvider;
pub use acquirer::TokenAcquirer;

/// Everything needed to ask the identity provider for one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRequest {
    pub authority: Url,
    pub resource: String,
    pub client_id: String,
    pub redirect_uri: Url,
    pub non_interactive: bool,
}

impl AuthRequest {
    /// Build a request, rejecting a malformed authority or an empty
    /// resource/client id.
    ///
    /// The authority must be `https` unless it points at a loopback host.
    pub fn new(
        authority: &str,
        resource: &str,
        client_id: &str,
        redirect_uri: Url,
        non_interactive: bool,
    ) -> Result<Self> {
        let authority = Url::parse(authority).map_err(|e| {
            KvFetchError::InvalidArgument(format!("authority '{authority}' is not a URL: {e}"))
        })?;

        match authority.scheme() {
            "https" => {}
            "http" if is_loopback(&authority) => {}
            other => {
                return Err(KvFetchError::InvalidArgument(format!(
                    "authority '{authority}' must use https, not {other}"
                )))
            }
        }

        if resource.trim().is_empty() {
            return Err(KvFetchError::InvalidArgument(
                "resource cannot be empty".into(),
            ));
        }
        if client_id.trim().is_empty() {
            return Err(KvFetchError::InvalidArgument(
                "client id cannot be empty".into(),
            ));
        }

        Ok(Self {
            authority,
            resource: resource.to_string(),
            client_id: client_id.to_string(),
            redirect_uri,
            non_interactive,
        })
    }

    /// Authority without a trailing slash, for building endpoint URLs.
    pub fn authority_base(&self) -> &str {
        self.authority.as_str().trim_end_matches('/')
    }
}

fn is_loopback(url: &Url) -> bool {
    matches!(
        url.host_str(),
        Some("localhost") | Some("127.0.0.1") | Some("[::1]")
    )
}

/// A bearer token and its expiry, as reported by the identity provider.
pub struct TokenResult {
    pub access_token: Zeroizing<String>,
    pub expires_on: DateTime<Utc>,
}

impl TokenResult {
    pub fn new(access_token: impl Into<String>, expires_on: DateTime<Utc>) -> Self {
        Self {
            access_token: Zeroizing::new(access_token.into()),
            expires_on,
        }
    }
}

impl fmt::Debug for TokenResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenResult")
            .field("access_token", &"<redacted>")
            .field("expires_on", &self.expires_on)
            .finish()
    }
}

/// How the identity provider should try to obtain a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The identity of the current user or process, no prompt.
    Ambient,
    /// Cached token or refresh token, prompting disabled.
    Silent,
    /// Always show a login surface.
    Interactive,
    /// Silent first, prompt only if that fails.
    SilentOrInteractive,
}

impl Strategy {
    /// The strategy to use when prompting is forbidden, or `None` if the
    /// strategy only makes sense with a prompt.
    pub fn without_prompt(self) -> Option<Strategy> {
        match self {
            Strategy::Ambient | Strategy::Silent => Some(self),
            Strategy::SilentOrInteractive => Some(Strategy::Silent),
            Strategy::Interactive => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Ambient => "ambient",
            Strategy::Silent => "silent",
            Strategy::Interactive => "interactive",
            Strategy::SilentOrInteractive => "silent-or-interactive",
        };
        f.write_str(name)
    }
}

/// Which ordered list of tiers the acquirer walks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPlan {
    /// ambient → silent → interactive
    #[default]
    Tiered,
    /// ambient → silent-or-interactive
    Collapsed,
}

impl FallbackPlan {
    pub fn tiers(self) -> &'static [Strategy] {
        match self {
            FallbackPlan::Tiered => &[Strategy::Ambient, Strategy::Silent, Strategy::Interactive],
            FallbackPlan::Collapsed => &[Strategy::Ambient, Strategy::SilentOrInteractive],
        }
    }
}

/// Obtains tokens from an OAuth authority using a given strategy.
pub trait IdentityProvider {
    fn acquire_token(&self, request: &AuthRequest, strategy: Strategy) -> Result<TokenResult>;
}

impl<T: IdentityProvider + ?Sized> IdentityProvider for &T {
    fn acquire_token(&self, request: &AuthRequest, strategy: Strategy) -> Result<TokenResult> {
        (**self).acquire_token(request, strategy)
    }
}

/// The result of one tier, tagged by whether the next tier may run.
#[derive(Debug)]
pub enum TierOutcome {
    Success(TokenResult),
    AuthFailure(AuthError),
    OtherFailure(KvFetchError),
}

impl From<Result<TokenResult>> for TierOutcome {
    fn from(result: Result<TokenResult>) -> Self {
        match result {
            Ok(token) => TierOutcome::Success(token),
            Err(KvFetchError::Auth(e)) => TierOutcome::AuthFailure(e),
            Err(e) => TierOutcome::OtherFailure(e),
        }
    }
}
