//! SecretRequest and SecretValue types.
//!
//! A `SecretRequest` is validated when it is built, so anything that
//! reaches the network already has an absolute vault URL and a legal
//! secret name.

use std::fmt;

use url::Url;
use zeroize::Zeroizing;

use crate::errors::{KvFetchError, Result};

/// Key Vault's limit on object name length.
const MAX_NAME_LEN: usize = 127;

/// Which secret to read, and from where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRequest {
    pub vault_address: Url,
    pub secret_name: String,
    pub version: Option<String>,
}

impl SecretRequest {
    pub fn new(vault_address: Url, secret_name: &str, version: Option<&str>) -> Result<Self> {
        validate_vault_address(&vault_address)?;
        validate_secret_name(secret_name)?;
        if let Some(v) = version {
            validate_secret_version(v)?;
        }

        Ok(Self {
            vault_address,
            secret_name: secret_name.to_string(),
            version: version.map(str::to_string),
        })
    }

    /// Secret name plus version, for messages.
    pub fn label(&self) -> String {
        match &self.version {
            Some(v) => format!("{}/{v}", self.secret_name),
            None => self.secret_name.clone(),
        }
    }
}

/// A secret's value. Wiped from memory on drop, never shown by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(Zeroizing<String>);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue(<redacted>)")
    }
}

/// The vault address must be an absolute http(s) URL with a host.
pub fn validate_vault_address(url: &Url) -> Result<()> {
    if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
        return Err(KvFetchError::InvalidArgument(format!(
            "vault address '{url}' must be an absolute http(s) URL"
        )));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(KvFetchError::InvalidArgument(format!(
            "vault address '{url}' cannot carry a query or fragment"
        )));
    }
    Ok(())
}

/// Allowed: ASCII letters, digits, hyphens. 1 to 127 characters.
pub fn validate_secret_name(name: &str) -> Result<()> {
    validate_segment("secret name", name)?;
    if name.len() > MAX_NAME_LEN {
        return Err(KvFetchError::InvalidArgument(format!(
            "secret name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Versions follow the same character rules as names.
pub fn validate_secret_version(version: &str) -> Result<()> {
    validate_segment("secret version", version)
}

fn validate_segment(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(KvFetchError::InvalidArgument(format!(
            "{what} cannot be empty"
        )));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(KvFetchError::InvalidArgument(format!(
            "{what} '{value}' is invalid: only letters, digits, and hyphens are allowed"
        )));
    }
    Ok(())
}
