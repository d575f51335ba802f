//! `SecretFetcher`: one secret read with a freshly acquired token.

use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use super::{AuthChallenge, SecretRequest, SecretValue, VaultClient};
use crate::auth::{AuthRequest, IdentityProvider, TokenAcquirer};
use crate::errors::Result;

/// Caller-side authentication parameters. The authority and resource
/// come from the vault's challenge.
#[derive(Debug, Clone)]
pub struct AuthParams {
    pub client_id: String,
    pub redirect_uri: Url,
    pub non_interactive: bool,
}

pub struct SecretFetcher<V, P> {
    client: V,
    acquirer: TokenAcquirer<P>,
    auth: AuthParams,
}

impl<V: VaultClient, P: IdentityProvider> SecretFetcher<V, P> {
    pub fn new(client: V, acquirer: TokenAcquirer<P>, auth: AuthParams) -> Self {
        Self {
            client,
            acquirer,
            auth,
        }
    }

    /// Fetch the current (or requested) version of one secret.
    ///
    /// Errors from token acquisition come back unchanged; vault errors
    /// are not retried.
    pub fn fetch_secret(&self, request: &SecretRequest) -> Result<SecretValue> {
        let acquirer = &self.acquirer;
        let auth = &self.auth;
        let mut token_requests = 0u32;

        let mut provider = |challenge: &AuthChallenge| -> Result<Zeroizing<String>> {
            token_requests += 1;
            let auth_request = AuthRequest::new(
                &challenge.authority,
                &challenge.resource,
                &auth.client_id,
                auth.redirect_uri.clone(),
                auth.non_interactive,
            )?;
            let token = acquirer.acquire(&auth_request)?;
            Ok(token.access_token)
        };

        let result = self.client.get_secret(request, &mut provider);
        debug!(token_requests, ok = result.is_ok(), "secret fetch finished");
        result
    }
}
