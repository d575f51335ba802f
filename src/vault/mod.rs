//! Vault module: reading one secret from Key Vault.
//!
//! This module provides:
//! - `SecretRequest` and `SecretValue` types (`secret`)
//! - Bearer challenge parsing (`challenge`)
//! - The HTTP `VaultClient` implementation (`client`)
//! - `SecretFetcher`, which joins a vault client to a token acquirer (`fetcher`)

pub mod challenge;
pub mod client;
pub mod fetcher;
pub mod secret;

use zeroize::Zeroizing;

use crate::errors::Result;

// Re-export the most commonly used items.
pub use challenge::AuthChallenge;
pub use client::HttpVaultClient;
pub use fetcher::{AuthParams, SecretFetcher};
pub use secret::{SecretRequest, SecretValue};

/// Callback a vault client uses to obtain an access token for the
/// authority and resource named in the vault's challenge.
pub type TokenProvider<'a> = dyn FnMut(&AuthChallenge) -> Result<Zeroizing<String>> + 'a;

/// Reads a secret, asking `token_provider` for a bearer token when the
/// vault demands one.
pub trait VaultClient {
    fn get_secret(
        &self,
        request: &SecretRequest,
        token_provider: &mut TokenProvider<'_>,
    ) -> Result<SecretValue>;
}

impl<T: VaultClient + ?Sized> VaultClient for &T {
    fn get_secret(
        &self,
        request: &SecretRequest,
        token_provider: &mut TokenProvider<'_>,
    ) -> Result<SecretValue> {
        (**self).get_secret(request, token_provider)
    }
}
