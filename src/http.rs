//! Shared HTTP agent for the identity provider and the vault client.

use std::time::Duration;

use ureq::Agent;

/// User-Agent sent with every request.
pub fn user_agent() -> String {
    format!("kvfetch/{}", env!("CARGO_PKG_VERSION"))
}

/// Build an agent with a global per-call timeout.
///
/// Non-2xx statuses are returned as responses, not errors, so callers
/// can classify them.
pub fn agent(timeout: Duration) -> Agent {
    let config = Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    Agent::new_with_config(config)
}
