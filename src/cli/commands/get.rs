//! `kvfetch`: retrieve and print a single secret's value.

use std::io::Write;
use std::time::Duration;

use crate::auth::{AadIdentityProvider, IdentityProvider, TokenAcquirer};
use crate::cli::{output, Cli};
use crate::config::Settings;
use crate::errors::{AuthError, KvFetchError, Result};
use crate::http;
use crate::vault::{AuthParams, HttpVaultClient, SecretFetcher, SecretRequest, VaultClient};

/// Execute the fetch.
pub fn execute(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;

    let request = SecretRequest::new(
        cli.key_vault_address.clone(),
        &cli.secret_name,
        cli.secret_version.as_deref(),
    )?;
    if request.vault_address.scheme() == "http" {
        output::warning("Vault address uses plain http; the bearer token is sent unencrypted.");
    }

    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| settings.timeout());
    let agent = http::agent(timeout);

    let provider = AadIdentityProvider::from_settings(agent.clone(), &settings);
    let fetcher = SecretFetcher::new(
        HttpVaultClient::from_settings(agent, &settings),
        TokenAcquirer::new(provider, settings.fallback),
        AuthParams {
            client_id: cli.adal_client_id.clone(),
            redirect_uri: cli.adal_redirect_uri.clone(),
            non_interactive: cli.non_interactive,
        },
    );

    let stdout = std::io::stdout();
    write_secret(&fetcher, &request, &mut stdout.lock())
}

/// Fetch the secret and write its value, followed by a newline, to `out`.
pub fn write_secret<V, P, W>(
    fetcher: &SecretFetcher<V, P>,
    request: &SecretRequest,
    out: &mut W,
) -> Result<()>
where
    V: VaultClient,
    P: IdentityProvider,
    W: Write,
{
    let value = fetcher.fetch_secret(request)?;
    writeln!(out, "{}", value.expose())?;
    out.flush()?;
    Ok(())
}

/// A follow-up suggestion for the user, if the error has an obvious one.
pub fn tip_for(err: &KvFetchError) -> Option<&'static str> {
    match err {
        KvFetchError::Auth(AuthError::InteractionDisabled(_)) => {
            Some("Run `az login` first, or drop --NonInteractive to sign in through a browser.")
        }
        KvFetchError::Auth(AuthError::StateMismatch) => {
            Some("Paste the address from the same sign-in you just started.")
        }
        KvFetchError::Vault(crate::errors::VaultError::AccessDenied { .. }) => {
            Some("Check that your identity has 'get' permission on secrets in this vault.")
        }
        _ => None,
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    match &cli.config {
        Some(path) => Settings::load_file(path),
        None => Settings::load(&std::env::current_dir()?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VaultError;

    #[test]
    fn tips_cover_policy_and_permission_errors() {
        let disabled = KvFetchError::from(AuthError::InteractionDisabled(Box::new(
            AuthError::NoCachedToken,
        )));
        assert!(tip_for(&disabled).unwrap().contains("az login"));

        let denied = KvFetchError::from(VaultError::AccessDenied {
            name: "s".into(),
            message: "m".into(),
        });
        assert!(tip_for(&denied).is_some());

        assert!(tip_for(&KvFetchError::Network("x".into())).is_none());
    }
}
