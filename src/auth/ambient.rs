//! Ambient credential: the identity already signed in to the Azure CLI.
//!
//! Any failure here means "no ambient identity" and is reported as an
//! authentication error so the acquirer moves on to the silent tier.

use std::io::ErrorKind;
use std::process::Command;

use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{AuthRequest, TokenResult};
use crate::errors::{AuthError, Result};

/// Tenants that the CLI should not be pinned to.
const MULTI_TENANT_AUTHORITIES: &[&str] = &["common", "organizations", "consumers"];

/// Runs `az account get-access-token` for the requested resource.
#[derive(Debug, Clone)]
pub struct AzureCliCredential {
    program: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    #[serde(default)]
    expires_on: Option<String>,
    /// Epoch seconds, present in Azure CLI 2.54 and later.
    #[serde(default, rename = "expires_on")]
    expires_on_epoch: Option<i64>,
}

impl AzureCliCredential {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn get_token(&self, request: &AuthRequest) -> Result<TokenResult> {
        let mut cmd = Command::new(&self.program);
        cmd.args([
            "account",
            "get-access-token",
            "--output",
            "json",
            "--resource",
            &request.resource,
        ]);
        if let Some(tenant) = tenant_of(request) {
            cmd.args(["--tenant", tenant]);
        }

        debug!(program = %self.program, "requesting token from Azure CLI");

        let output = cmd.output().map_err(|e| {
            let msg = if e.kind() == ErrorKind::NotFound {
                format!("'{}' is not installed or not on PATH", self.program)
            } else {
                format!("failed to run '{}': {e}", self.program)
            };
            AuthError::CredentialUnavailable(msg)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let first_line = stderr.lines().next().unwrap_or("").trim();
            return Err(AuthError::CredentialUnavailable(format!(
                "Azure CLI exited with {}: {first_line}",
                output.status
            ))
            .into());
        }

        parse_cli_token(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Tenant segment of the authority, unless it is a multi-tenant alias.
fn tenant_of(request: &AuthRequest) -> Option<&str> {
    let tenant = request.authority.path_segments()?.find(|s| !s.is_empty())?;
    if MULTI_TENANT_AUTHORITIES.contains(&tenant.to_ascii_lowercase().as_str()) {
        None
    } else {
        Some(tenant)
    }
}

/// Parse the JSON the Azure CLI prints for `get-access-token`.
pub(crate) fn parse_cli_token(stdout: &str) -> Result<TokenResult> {
    let token: CliToken = serde_json::from_str(stdout)
        .map_err(|e| AuthError::MalformedResponse(format!("Azure CLI output: {e}")))?;

    let expires_on = match (token.expires_on_epoch, token.expires_on.as_deref()) {
        (Some(epoch), _) => DateTime::<Utc>::from_timestamp(epoch, 0),
        // Older CLIs print local time, e.g. "2024-01-31 17:04:51.000000".
        (None, Some(local)) => NaiveDateTime::parse_from_str(local, "%Y-%m-%d %H:%M:%S%.f")
            .ok()
            .and_then(|naive| Local.from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc)),
        (None, None) => None,
    }
    .ok_or_else(|| AuthError::MalformedResponse("Azure CLI token has no expiry".into()))?;

    Ok(TokenResult::new(token.access_token, expires_on))
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn request(authority: &str) -> AuthRequest {
        AuthRequest::new(
            authority,
            "https://vault.azure.net",
            "client",
            Url::parse("https://myapp/finish").unwrap(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn parses_epoch_expiry() {
        let out = r#"{"accessToken":"abc","expiresOn":"2024-01-31 17:04:51.000000","expires_on":1706720691,"tokenType":"Bearer"}"#;
        let token = parse_cli_token(out).unwrap();
        assert_eq!(token.access_token.as_str(), "abc");
        assert_eq!(token.expires_on.timestamp(), 1_706_720_691);
    }

    #[test]
    fn parses_legacy_local_expiry() {
        let out = r#"{"accessToken":"abc","expiresOn":"2024-01-31 17:04:51.000000"}"#;
        assert!(parse_cli_token(out).is_ok());
    }

    #[test]
    fn garbage_output_is_an_auth_error() {
        let err = parse_cli_token("ERROR: please run az login").unwrap_err();
        assert!(err.as_auth().is_some());
    }

    #[test]
    fn tenant_is_taken_from_authority_path() {
        assert_eq!(
            tenant_of(&request("https://login.windows.net/72f988bf-86f1-41af")),
            Some("72f988bf-86f1-41af")
        );
        assert_eq!(tenant_of(&request("https://login.microsoftonline.com/common")), None);
    }

    #[test]
    fn missing_program_is_credential_unavailable() {
        let cred = AzureCliCredential::new("kvfetch-test-no-such-binary");
        let err = cred
            .get_token(&request("https://login.windows.net/contoso"))
            .unwrap_err();
        assert!(matches!(
            err.as_auth(),
            Some(AuthError::CredentialUnavailable(_))
        ));
    }
}
