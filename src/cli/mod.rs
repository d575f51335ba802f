//! CLI module: Clap argument parser, output helpers, and the command
//! implementation.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;
use url::Url;

use crate::vault::secret;

/// kvfetch: read one secret from Azure Key Vault.
///
/// Flag names follow the `Get-AzureKeyVaultSecret` cmdlet; kebab-case
/// aliases are accepted too.
#[derive(Parser, Debug)]
#[command(
    name = "kvfetch",
    about = "Fetch a secret from Azure Key Vault",
    long_about = None,
    version
)]
pub struct Cli {
    /// The Application ID of the app registered with Azure Active Directory
    #[arg(
        long = "AdalClientId",
        visible_alias = "adal-client-id",
        env = "KVFETCH_CLIENT_ID",
        value_name = "CLIENT_ID",
        value_parser = parse_client_id
    )]
    pub adal_client_id: String,

    /// A redirect URI registered for the app (nothing needs to listen on it)
    #[arg(
        long = "AdalRedirectUri",
        visible_alias = "adal-redirect-uri",
        env = "KVFETCH_REDIRECT_URI",
        value_name = "URI",
        value_parser = parse_absolute_url
    )]
    pub adal_redirect_uri: Url,

    /// Vault address, e.g. https://yourCoolApp.vault.azure.net/
    #[arg(
        long = "KeyVaultAddress",
        visible_alias = "key-vault-address",
        env = "KVFETCH_VAULT_ADDRESS",
        value_name = "URL",
        value_parser = parse_vault_address
    )]
    pub key_vault_address: Url,

    /// The secret whose value should be retrieved
    #[arg(
        long = "SecretName",
        visible_alias = "secret-name",
        env = "KVFETCH_SECRET_NAME",
        value_name = "NAME",
        value_parser = parse_secret_name
    )]
    pub secret_name: String,

    /// A specific secret version (default: current)
    #[arg(
        long = "SecretVersion",
        visible_alias = "secret-version",
        value_name = "VERSION",
        value_parser = parse_secret_version
    )]
    pub secret_version: Option<String>,

    /// Fail rather than prompt for credentials
    #[arg(
        long = "NonInteractive",
        visible_alias = "non-interactive",
        env = "KVFETCH_NON_INTERACTIVE"
    )]
    pub non_interactive: bool,

    /// HTTP timeout in seconds (overrides the config file)
    #[arg(
        long = "Timeout",
        visible_alias = "timeout",
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout: Option<u64>,

    /// Path to a config file (default: ./.kvfetch.toml if present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
}

// ---------------------------------------------------------------------------
// Value parsers. These run before anything touches the network.
// ---------------------------------------------------------------------------

/// Client ids are GUIDs in practice, but any token without whitespace is
/// passed through.
fn parse_client_id(raw: &str) -> Result<String, String> {
    let id = raw.trim();
    if id.is_empty() {
        return Err("client id cannot be empty".into());
    }
    if id.chars().any(char::is_whitespace) {
        return Err(format!("client id '{id}' cannot contain whitespace"));
    }
    Ok(id.to_string())
}

fn parse_absolute_url(raw: &str) -> Result<Url, String> {
    Url::parse(raw).map_err(|e| format!("'{raw}' is not an absolute URL: {e}"))
}

fn parse_vault_address(raw: &str) -> Result<Url, String> {
    let url = parse_absolute_url(raw)?;
    secret::validate_vault_address(&url).map_err(|e| e.to_string())?;
    Ok(url)
}

fn parse_secret_name(raw: &str) -> Result<String, String> {
    secret::validate_secret_name(raw).map_err(|e| e.to_string())?;
    Ok(raw.to_string())
}

fn parse_secret_version(raw: &str) -> Result<String, String> {
    secret::validate_secret_version(raw).map_err(|e| e.to_string())?;
    Ok(raw.to_string())
}
