//! Bearer challenge parsing.
//!
//! Key Vault answers an unauthenticated request with `401` and a header
//! such as
//!
//! ```text
//! WWW-Authenticate: Bearer authorization="https://login.windows.net/<tenant>", resource="https://vault.azure.net"
//! ```
//!
//! Newer service versions send `scope="https://vault.azure.net/.default"`
//! instead of `resource`.

use std::collections::HashMap;

use url::Url;

use crate::errors::{Result, VaultError};

/// Authority and resource a token must be requested for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub authority: String,
    pub resource: String,
    pub scope: String,
}

impl AuthChallenge {
    /// Parse a `WWW-Authenticate` header value.
    pub fn parse(header: &str) -> Result<Self> {
        let header = header.trim();
        let (scheme, rest) = header.split_once(char::is_whitespace).unwrap_or((header, ""));
        if !scheme.eq_ignore_ascii_case("bearer") {
            return Err(VaultError::MissingChallenge.into());
        }

        let params = parse_params(rest);

        let authority = params
            .get("authorization")
            .or_else(|| params.get("authorization_uri"))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                VaultError::MalformedResponse("challenge has no authorization".into())
            })?
            .clone();

        let scope = params.get("scope").filter(|s| !s.is_empty());
        let resource = match (params.get("resource").filter(|s| !s.is_empty()), scope) {
            (Some(r), _) => r.clone(),
            (None, Some(s)) => s.trim_end_matches("/.default").to_string(),
            (None, None) => {
                return Err(VaultError::MalformedResponse(
                    "challenge has neither resource nor scope".into(),
                )
                .into())
            }
        };
        let scope = scope
            .cloned()
            .unwrap_or_else(|| format!("{}/.default", resource.trim_end_matches('/')));

        Ok(Self {
            authority,
            resource,
            scope,
        })
    }

    /// The resource host must be the vault host or one of its parent
    /// domains, e.g. `vault.azure.net` for `contoso.vault.azure.net`.
    pub fn verify_resource(&self, vault: &Url) -> Result<()> {
        let mismatch = || VaultError::ChallengeMismatch {
            resource: self.resource.clone(),
            host: vault.host_str().unwrap_or_default().to_string(),
        };

        let resource_host = Url::parse(&self.resource)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .ok_or_else(mismatch)?;
        let vault_host = vault
            .host_str()
            .map(str::to_ascii_lowercase)
            .ok_or_else(mismatch)?;

        if vault_host == resource_host || vault_host.ends_with(&format!(".{resource_host}")) {
            Ok(())
        } else {
            Err(mismatch().into())
        }
    }
}

/// Split `key="value", key2=value2` into a map with lowercase keys.
fn parse_params(input: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut rest = input.trim_start();

    while !rest.is_empty() {
        let Some(eq) = rest.find('=') else { break };
        let key = rest[..eq].trim().trim_start_matches(',').trim().to_ascii_lowercase();
        rest = rest[eq + 1..].trim_start();

        let value;
        if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"').unwrap_or(quoted.len());
            value = quoted[..end].to_string();
            rest = quoted.get(end + 1..).unwrap_or("");
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            value = rest[..end].trim().to_string();
            rest = &rest[end..];
        }

        params.insert(key, value);
        rest = rest.trim_start().trim_start_matches(',').trim_start();
    }

    params
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::KvFetchError;

    #[test]
    fn parses_resource_challenge() {
        let c = AuthChallenge::parse(
            r#"Bearer authorization="https://login.windows.net/72f988bf", resource="https://vault.azure.net""#,
        )
        .unwrap();
        assert_eq!(c.authority, "https://login.windows.net/72f988bf");
        assert_eq!(c.resource, "https://vault.azure.net");
        assert_eq!(c.scope, "https://vault.azure.net/.default");
    }

    #[test]
    fn parses_scope_challenge() {
        let c = AuthChallenge::parse(
            r#"Bearer authorization="https://login.microsoftonline.com/tid",scope="https://vault.azure.net/.default""#,
        )
        .unwrap();
        assert_eq!(c.resource, "https://vault.azure.net");
        assert_eq!(c.scope, "https://vault.azure.net/.default");
    }

    #[test]
    fn accepts_authorization_uri_and_unquoted_values() {
        let c = AuthChallenge::parse(
            "bearer authorization_uri=https://login.example.com/t, resource=https://vault.example.com",
        )
        .unwrap();
        assert_eq!(c.authority, "https://login.example.com/t");
        assert_eq!(c.resource, "https://vault.example.com");
    }

    #[test]
    fn rejects_other_schemes() {
        let err = AuthChallenge::parse(r#"Basic realm="vault""#).unwrap_err();
        assert!(matches!(err, KvFetchError::Vault(VaultError::MissingChallenge)));
    }

    #[test]
    fn rejects_challenge_without_authority() {
        assert!(AuthChallenge::parse(r#"Bearer resource="https://vault.azure.net""#).is_err());
    }

    #[test]
    fn resource_must_match_vault_domain() {
        let c = AuthChallenge::parse(
            r#"Bearer authorization="https://login.windows.net/t", resource="https://vault.azure.net""#,
        )
        .unwrap();
        assert!(c
            .verify_resource(&Url::parse("https://contoso.vault.azure.net/").unwrap())
            .is_ok());
        assert!(matches!(
            c.verify_resource(&Url::parse("https://evilvault.azure.net.attacker.io/").unwrap()),
            Err(KvFetchError::Vault(VaultError::ChallengeMismatch { .. }))
        ));
        assert!(c
            .verify_resource(&Url::parse("https://myvault.azure.net/").unwrap())
            .is_err());
    }
}
