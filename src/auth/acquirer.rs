//! Ordered tier fallback.

use tracing::{debug, info, warn};

use super::{AuthRequest, FallbackPlan, IdentityProvider, TierOutcome, TokenResult};
use crate::errors::{AuthError, Result};

/// Walks the tiers of a [`FallbackPlan`] until one yields a token.
///
/// An authentication failure moves on to the next tier; any other
/// failure is returned at once. Prompting tiers are skipped (or
/// downgraded) when the request is non-interactive. Nothing is cached
/// here: every call reaches the identity provider.
pub struct TokenAcquirer<P> {
    provider: P,
    plan: FallbackPlan,
}

impl<P: IdentityProvider> TokenAcquirer<P> {
    pub fn new(provider: P, plan: FallbackPlan) -> Self {
        Self { provider, plan }
    }

    /// Acquire one token for `request`.
    pub fn acquire(&self, request: &AuthRequest) -> Result<TokenResult> {
        let mut last_failure: Option<AuthError> = None;
        let mut prompt_suppressed = false;

        for &tier in self.plan.tiers() {
            let strategy = if request.non_interactive {
                match tier.without_prompt() {
                    Some(s) => {
                        prompt_suppressed |= s != tier;
                        s
                    }
                    None => {
                        debug!(%tier, "skipping tier: non-interactive");
                        prompt_suppressed = true;
                        continue;
                    }
                }
            } else {
                tier
            };

            debug!(%strategy, authority = %request.authority, resource = %request.resource, "trying tier");

            match TierOutcome::from(self.provider.acquire_token(request, strategy)) {
                TierOutcome::Success(token) => {
                    info!(%strategy, "token acquired");
                    return Ok(token);
                }
                TierOutcome::AuthFailure(e) => {
                    debug!(%strategy, error = %e, "tier failed, falling back");
                    last_failure = Some(e);
                }
                TierOutcome::OtherFailure(e) => {
                    warn!(%strategy, error = %e, "tier failed with a non-authentication error");
                    return Err(e);
                }
            }
        }

        let err = match last_failure {
            Some(e) if prompt_suppressed => AuthError::InteractionDisabled(Box::new(e)),
            Some(e) => e,
            None => AuthError::CredentialUnavailable("no acquisition tier was attempted".into()),
        };
        Err(err.into())
    }
}
