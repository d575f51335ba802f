use thiserror::Error;

/// All errors that can occur in kvfetch.
#[derive(Debug, Error)]
pub enum KvFetchError {
    // --- Argument errors ---
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // --- Authentication errors (drive tier fallback) ---
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    // --- Transport errors (never fall through to the next tier) ---
    #[error("Network error: {0}")]
    Network(String),

    // --- Vault errors ---
    #[error("Key Vault error: {0}")]
    Vault(#[from] VaultError),

    // --- Config errors ---
    #[error("Config file error: {0}")]
    Config(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A token acquisition failed for an authentication reason.
///
/// Only these errors let the acquirer move on to the next tier.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("ambient credential unavailable: {0}")]
    CredentialUnavailable(String),

    #[error("no cached token for this authority, resource and client")]
    NoCachedToken,

    #[error("identity provider rejected the request ({code}): {description}")]
    Rejected { code: String, description: String },

    #[error("sign-in was declined: {0}")]
    Declined(String),

    #[error("sign-in response state did not match the request")]
    StateMismatch,

    #[error("malformed identity provider response: {0}")]
    MalformedResponse(String),

    #[error("interactive login required but disabled by --NonInteractive ({0})")]
    InteractionDisabled(Box<AuthError>),
}

/// The vault answered, but not with the secret.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("secret '{0}' not found")]
    NotFound(String),

    #[error("access denied to secret '{name}': {message}")]
    AccessDenied { name: String, message: String },

    #[error("vault did not send a bearer challenge")]
    MissingChallenge,

    #[error("challenge resource '{resource}' does not belong to vault host '{host}'")]
    ChallengeMismatch { resource: String, host: String },

    #[error("malformed vault response: {0}")]
    MalformedResponse(String),

    #[error("unexpected vault response {status}: {message}")]
    Unexpected { status: u16, message: String },
}

impl KvFetchError {
    /// The authentication failure, if this error is one.
    pub fn as_auth(&self) -> Option<&AuthError> {
        match self {
            Self::Auth(e) => Some(e),
            _ => None,
        }
    }
}

/// Transport-level failures. Callers decode reply bodies themselves so
/// an undecodable body is not reported here.
impl From<ureq::Error> for KvFetchError {
    fn from(e: ureq::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Convenience type alias for kvfetch results.
pub type Result<T> = std::result::Result<T, KvFetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_disabled_names_the_flag_and_cause() {
        let err = KvFetchError::from(AuthError::InteractionDisabled(Box::new(
            AuthError::NoCachedToken,
        )));
        let msg = err.to_string();
        assert!(msg.contains("--NonInteractive"));
        assert!(msg.contains("no cached token"));
    }

    #[test]
    fn as_auth_only_matches_auth_errors() {
        assert!(KvFetchError::from(AuthError::NoCachedToken)
            .as_auth()
            .is_some());
        assert!(KvFetchError::Network("refused".into()).as_auth().is_none());
        assert!(KvFetchError::from(VaultError::NotFound("x".into()))
            .as_auth()
            .is_none());
    }
}
