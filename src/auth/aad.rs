//! Azure AD (v1 endpoint) identity provider.
//!
//! - ambient: the Azure CLI signed-in identity
//! - silent: cached access token, else refresh-token grant
//! - interactive: authorization-code grant through a [`SignInPrompt`]

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;
use zeroize::Zeroizing;

use super::ambient::AzureCliCredential;
use super::cache::{CachedToken, TokenCache};
use super::prompt::{SignInPrompt, TerminalPrompt};
use super::{AuthRequest, IdentityProvider, Strategy, TokenResult};
use crate::config::Settings;
use crate::errors::{AuthError, KvFetchError, Result};

/// Lifetime assumed when the token endpoint reports no expiry.
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

pub struct AadIdentityProvider {
    agent: ureq::Agent,
    ambient: AzureCliCredential,
    cache: Option<TokenCache>,
    prompt: Box<dyn SignInPrompt>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Seconds {
    Number(i64),
    Text(String),
}

impl Seconds {
    fn value(&self) -> Option<i64> {
        match self {
            Seconds::Number(n) => Some(*n),
            Seconds::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Successful token endpoint response. The v1 endpoint sends the
/// numeric fields as strings.
#[derive(Deserialize)]
pub(crate) struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_on: Option<Seconds>,
    #[serde(default)]
    expires_in: Option<Seconds>,
}

impl TokenResponse {
    fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if let Some(at) = self
            .expires_on
            .as_ref()
            .and_then(Seconds::value)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        {
            return at;
        }
        let lifetime = self
            .expires_in
            .as_ref()
            .and_then(Seconds::value)
            .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        now + Duration::seconds(lifetime)
    }
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl AadIdentityProvider {
    pub fn new(agent: ureq::Agent, ambient: AzureCliCredential) -> Self {
        Self {
            agent,
            ambient,
            cache: None,
            prompt: Box::new(TerminalPrompt),
        }
    }

    /// Build a provider from the loaded settings, with the terminal prompt.
    pub fn from_settings(agent: ureq::Agent, settings: &Settings) -> Self {
        let provider = Self::new(agent, AzureCliCredential::new(&settings.azure_cli));
        match settings.resolved_token_cache_path() {
            Some(path) => provider.with_cache(TokenCache::new(path)),
            None => provider,
        }
    }

    pub fn with_cache(mut self, cache: TokenCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_prompt(mut self, prompt: impl SignInPrompt + 'static) -> Self {
        self.prompt = Box::new(prompt);
        self
    }

    fn silent(&self, request: &AuthRequest) -> Result<TokenResult> {
        let cache = self.cache.as_ref().ok_or(AuthError::NoCachedToken)?;
        let entry = cache.lookup(request).ok_or(AuthError::NoCachedToken)?;

        if entry.is_fresh(Utc::now()) {
            debug!("serving cached access token");
            return Ok(entry.to_token_result());
        }

        let refresh_token = entry.refresh_token.ok_or(AuthError::NoCachedToken)?;
        debug!("redeeming cached refresh token");
        let mut response = self.redeem(
            request,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ],
        )?;
        if response.refresh_token.is_none() {
            response.refresh_token = Some(refresh_token);
        }
        Ok(self.remember(request, response))
    }

    fn interactive(&self, request: &AuthRequest) -> Result<TokenResult> {
        let state = new_state();
        let authorize = authorize_url(request, &state)?;
        let redirected = self.prompt.sign_in(&authorize, &request.redirect_uri)?;
        let code = Zeroizing::new(parse_redirect(&redirected, &state)?);

        let response = self.redeem(
            request,
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", request.redirect_uri.as_str()),
            ],
        )?;
        Ok(self.remember(request, response))
    }

    /// POST a grant to the token endpoint.
    fn redeem(&self, request: &AuthRequest, grant: &[(&str, &str)]) -> Result<TokenResponse> {
        let url = format!("{}/oauth2/token", request.authority_base());
        let mut form: Vec<(&str, &str)> = vec![
            ("client_id", request.client_id.as_str()),
            ("resource", request.resource.as_str()),
        ];
        form.extend_from_slice(grant);

        let mut response = self
            .agent
            .post(url.as_str())
            .header("Accept", "application/json")
            .header("User-Agent", crate::http::user_agent())
            .send_form(form)?;
        let status = response.status().as_u16();
        let bytes = Zeroizing::new(response.body_mut().read_to_vec()?);
        debug!(status, "token endpoint responded");

        let body = match std::str::from_utf8(&bytes) {
            Ok(text) => Zeroizing::new(text.to_string()),
            Err(_) if (200..300).contains(&status) => {
                return Err(AuthError::MalformedResponse("token response is not UTF-8".into()).into())
            }
            Err(_) => Zeroizing::new(String::from_utf8_lossy(&bytes).into_owned()),
        };

        parse_token_response(&url, status, &body)
    }

    /// Record a fresh token in the cache and hand it to the caller.
    fn remember(&self, request: &AuthRequest, response: TokenResponse) -> TokenResult {
        let expires_on = response.expiry(Utc::now());
        if let Some(cache) = &self.cache {
            let entry = CachedToken {
                access_token: response.access_token.clone(),
                refresh_token: response.refresh_token,
                expires_on,
            };
            if let Err(e) = cache.store(request, entry) {
                warn!(path = %cache.path().display(), error = %e, "could not update token cache");
            }
        }
        TokenResult::new(response.access_token, expires_on)
    }
}

impl IdentityProvider for AadIdentityProvider {
    fn acquire_token(&self, request: &AuthRequest, strategy: Strategy) -> Result<TokenResult> {
        match strategy {
            Strategy::Ambient => self.ambient.get_token(request),
            Strategy::Silent => self.silent(request),
            Strategy::Interactive => self.interactive(request),
            Strategy::SilentOrInteractive => match self.silent(request) {
                Err(KvFetchError::Auth(e)) => {
                    debug!(error = %e, "silent acquisition failed, prompting");
                    self.interactive(request)
                }
                other => other,
            },
        }
    }
}

/// Classify a token endpoint reply.
///
/// 5xx is a network-side failure; a 4xx OAuth error body is an
/// authentication failure; any other 4xx points at a bad authority.
pub(crate) fn parse_token_response(url: &str, status: u16, body: &str) -> Result<TokenResponse> {
    match status {
        200..=299 => serde_json::from_str(body).map_err(|e| {
            AuthError::MalformedResponse(format!("token response: {e}")).into()
        }),
        500..=599 => Err(KvFetchError::Network(format!(
            "identity provider returned {status}"
        ))),
        _ => match serde_json::from_str::<OAuthErrorBody>(body) {
            Ok(err) => Err(AuthError::Rejected {
                description: err.error_description.unwrap_or_else(|| err.error.clone()),
                code: err.error,
            }
            .into()),
            Err(_) => Err(KvFetchError::InvalidArgument(format!(
                "token endpoint {url} returned {status}; check the authority"
            ))),
        },
    }
}

fn new_state() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Authorization endpoint URL that forces a login prompt.
pub(crate) fn authorize_url(request: &AuthRequest, state: &str) -> Result<Url> {
    let raw = format!("{}/oauth2/authorize", request.authority_base());
    let mut url = Url::parse(&raw)
        .map_err(|e| KvFetchError::InvalidArgument(format!("authorize URL '{raw}': {e}")))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &request.client_id)
        .append_pair("redirect_uri", request.redirect_uri.as_str())
        .append_pair("resource", &request.resource)
        .append_pair("prompt", "login")
        .append_pair("state", state);
    Ok(url)
}

/// Pull the authorization code out of the URL the browser landed on.
pub(crate) fn parse_redirect(redirected: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(redirected.trim())
        .map_err(|_| AuthError::MalformedResponse("pasted text is not a URL".into()))?;
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();

    if let Some(error) = params.get("error") {
        let reason = params
            .get("error_description")
            .cloned()
            .unwrap_or_else(|| error.clone());
        return Err(AuthError::Declined(reason).into());
    }
    if params.get("state").map(String::as_str) != Some(expected_state) {
        return Err(AuthError::StateMismatch.into());
    }
    params
        .get("code")
        .cloned()
        .ok_or_else(|| AuthError::MalformedResponse("redirect URL has no code".into()).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AuthRequest {
        AuthRequest::new(
            "https://login.windows.net/contoso",
            "https://vault.azure.net",
            "11111111-2222-3333-4444-555555555555",
            Url::parse("https://myapp/finish").unwrap(),
            false,
        )
        .unwrap()
    }

    #[test]
    fn token_response_accepts_string_numbers() {
        let body = r#"{"token_type":"Bearer","access_token":"at","expires_in":"3599","expires_on":"1700000000","refresh_token":"rt"}"#;
        let resp = parse_token_response("u", 200, body).unwrap();
        assert_eq!(resp.access_token, "at");
        assert_eq!(resp.expiry(Utc::now()).timestamp(), 1_700_000_000);
    }

    #[test]
    fn token_response_falls_back_to_expires_in() {
        let now = Utc::now();
        let resp = parse_token_response("u", 200, r#"{"access_token":"at","expires_in":600}"#)
            .unwrap();
        assert_eq!(resp.expiry(now), now + Duration::seconds(600));
    }

    #[test]
    fn oauth_error_is_an_auth_failure() {
        let body = r#"{"error":"invalid_grant","error_description":"AADSTS70008: expired"}"#;
        let err = parse_token_response("u", 400, body).err().unwrap();
        match err {
            KvFetchError::Auth(AuthError::Rejected { code, description }) => {
                assert_eq!(code, "invalid_grant");
                assert!(description.contains("AADSTS70008"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn server_error_is_not_an_auth_failure() {
        let err = parse_token_response("u", 503, "").err().unwrap();
        assert!(matches!(err, KvFetchError::Network(_)));
    }

    #[test]
    fn non_oauth_client_error_points_at_authority() {
        let err = parse_token_response("u", 404, "<html>").err().unwrap();
        assert!(matches!(err, KvFetchError::InvalidArgument(_)));
    }

    #[test]
    fn authorize_url_forces_login() {
        let url = authorize_url(&request(), "abc").unwrap();
        assert_eq!(url.path(), "/contoso/oauth2/authorize");
        let params: HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["prompt"], "login");
        assert_eq!(params["state"], "abc");
        assert_eq!(params["redirect_uri"], "https://myapp/finish");
        assert_eq!(params["resource"], "https://vault.azure.net");
    }

    #[test]
    fn redirect_yields_code() {
        let code = parse_redirect(" https://myapp/finish?code=xyz&state=s1 \n", "s1").unwrap();
        assert_eq!(code, "xyz");
    }

    #[test]
    fn redirect_with_error_is_declined() {
        let err = parse_redirect(
            "https://myapp/finish?error=access_denied&error_description=user+cancelled&state=s1",
            "s1",
        )
        .unwrap_err();
        assert!(matches!(err, KvFetchError::Auth(AuthError::Declined(ref m)) if m == "user cancelled"));
    }

    #[test]
    fn redirect_with_wrong_state_is_rejected() {
        let err = parse_redirect("https://myapp/finish?code=xyz&state=other", "s1").unwrap_err();
        assert!(matches!(err, KvFetchError::Auth(AuthError::StateMismatch)));
    }

    #[test]
    fn state_is_random_hex() {
        let a = new_state();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, new_state());
    }
}
