//! Login surface for the interactive tier.

use url::Url;

use crate::cli::output;
use crate::errors::{AuthError, Result};

/// Shows the authorize URL to the user and returns the URL the browser
/// was redirected to after sign-in.
pub trait SignInPrompt {
    fn sign_in(&self, authorize_url: &Url, redirect_uri: &Url) -> Result<String>;
}

/// Prints the login URL on stderr and reads the redirected address back
/// from the terminal. Nothing needs to listen on the redirect URI.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl SignInPrompt for TerminalPrompt {
    fn sign_in(&self, authorize_url: &Url, redirect_uri: &Url) -> Result<String> {
        output::info("Sign-in required. Open this URL in a browser:");
        eprintln!("\n  {authorize_url}\n");
        output::tip(&format!(
            "After signing in, the browser lands on {redirect_uri}. Paste that full address here."
        ));

        let redirected: String = dialoguer::Input::new()
            .with_prompt("Redirected URL")
            .interact_text()
            .map_err(|e| AuthError::Declined(format!("sign-in prompt: {e}")))?;
        Ok(redirected)
    }
}
