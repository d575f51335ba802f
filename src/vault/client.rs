//! Key Vault REST client.
//!
//! One secret read is: unauthenticated probe, parse the bearer
//! challenge, one call to the token provider, authenticated GET.

use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;
use zeroize::Zeroizing;

use super::challenge::AuthChallenge;
use super::secret::{SecretRequest, SecretValue};
use super::{TokenProvider, VaultClient};
use crate::config::Settings;
use crate::errors::{KvFetchError, Result, VaultError};

/// Longest error body echoed back in a message.
const MAX_ERROR_BODY: usize = 200;

pub struct HttpVaultClient {
    agent: ureq::Agent,
    api_version: String,
    verify_challenge_resource: bool,
}

struct Reply {
    status: u16,
    challenge: Option<String>,
    body: Zeroizing<String>,
}

#[derive(Deserialize)]
struct SecretBundle {
    #[serde(default)]
    value: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpVaultClient {
    pub fn new(agent: ureq::Agent, api_version: impl Into<String>) -> Self {
        Self {
            agent,
            api_version: api_version.into(),
            verify_challenge_resource: true,
        }
    }

    pub fn from_settings(agent: ureq::Agent, settings: &Settings) -> Self {
        Self::new(agent, &settings.api_version)
            .verify_challenge_resource(settings.verify_challenge_resource)
    }

    pub fn verify_challenge_resource(mut self, verify: bool) -> Self {
        self.verify_challenge_resource = verify;
        self
    }

    /// `{vault}/secrets/{name}[/{version}]?api-version=...`
    pub fn secret_url(&self, request: &SecretRequest) -> Result<Url> {
        let mut url = request.vault_address.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                KvFetchError::InvalidArgument(format!(
                    "vault address '{}' cannot carry a path",
                    request.vault_address
                ))
            })?;
            segments.pop_if_empty().push("secrets").push(&request.secret_name);
            if let Some(version) = &request.version {
                segments.push(version);
            }
        }
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn send(&self, url: &Url, token: Option<&str>) -> Result<Reply> {
        let mut req = self
            .agent
            .get(url.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", crate::http::user_agent());
        if let Some(token) = token {
            req = req.header("Authorization", format!("Bearer {token}"));
        }

        let mut response = req.call()?;
        let status = response.status().as_u16();
        let challenge = response
            .headers()
            .get("www-authenticate")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = Zeroizing::new(response.body_mut().read_to_vec()?);
        debug!(status, authenticated = token.is_some(), "vault responded");

        // Error bodies only feed messages; a secret bundle must decode.
        let body = match std::str::from_utf8(&bytes) {
            Ok(text) => Zeroizing::new(text.to_string()),
            Err(_) if status == 200 => {
                return Err(VaultError::MalformedResponse("secret bundle is not UTF-8".into()).into())
            }
            Err(_) => Zeroizing::new(String::from_utf8_lossy(&bytes).into_owned()),
        };

        Ok(Reply {
            status,
            challenge,
            body,
        })
    }
}

impl VaultClient for HttpVaultClient {
    #[instrument(skip_all, fields(vault = %request.vault_address, secret = %request.label()))]
    fn get_secret(
        &self,
        request: &SecretRequest,
        token_provider: &mut TokenProvider<'_>,
    ) -> Result<SecretValue> {
        let url = self.secret_url(request)?;

        let probe = self.send(&url, None)?;
        match probe.status {
            200 => return parse_secret_bundle(&probe.body),
            401 => {}
            _ => return Err(classify_failure(request, &probe)),
        }

        let header = probe.challenge.as_deref().ok_or(VaultError::MissingChallenge)?;
        let challenge = AuthChallenge::parse(header)?;
        debug!(authority = %challenge.authority, resource = %challenge.resource, "bearer challenge");
        if self.verify_challenge_resource {
            challenge.verify_resource(&request.vault_address)?;
        }

        let token = token_provider(&challenge)?;
        let reply = self.send(&url, Some(token.as_str()))?;
        match reply.status {
            200 => parse_secret_bundle(&reply.body),
            _ => Err(classify_failure(request, &reply)),
        }
    }
}

fn parse_secret_bundle(body: &str) -> Result<SecretValue> {
    let bundle: SecretBundle = serde_json::from_str(body)
        .map_err(|e| VaultError::MalformedResponse(format!("secret bundle: {e}")))?;
    bundle
        .value
        .map(SecretValue::new)
        .ok_or_else(|| VaultError::MalformedResponse("secret bundle has no value".into()).into())
}

fn classify_failure(request: &SecretRequest, reply: &Reply) -> KvFetchError {
    let message = error_message(&reply.body);
    match reply.status {
        404 => VaultError::NotFound(request.label()).into(),
        401 | 403 => VaultError::AccessDenied {
            name: request.label(),
            message,
        }
        .into(),
        500..=599 => KvFetchError::Network(format!("vault returned {}: {message}", reply.status)),
        status => VaultError::Unexpected { status, message }.into(),
    }
}

/// The `error.message` of a Key Vault error body, else a trimmed body.
fn error_message(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        let ErrorDetail { code, message } = parsed.error;
        match (code, message) {
            (Some(code), Some(message)) => return format!("{code}: {message}"),
            (None, Some(message)) => return message,
            (Some(code), None) => return code,
            (None, None) => {}
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no details".to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY).collect()
}
