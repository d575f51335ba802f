//! On-disk token cache used by the silent tier.
//!
//! Entries are keyed by authority, resource and client id. A cache that
//! is missing or unreadable behaves as empty.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{AuthRequest, TokenResult};
use crate::errors::Result;

/// Access tokens this close to expiry are not served from the cache.
const EXPIRY_MARGIN_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_on: DateTime<Utc>,
}

impl CachedToken {
    /// Whether the access token is still usable at `now`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_on - Duration::minutes(EXPIRY_MARGIN_MINUTES) > now
    }

    pub fn to_token_result(&self) -> TokenResult {
        TokenResult::new(self.access_token.clone(), self.expires_on)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(default)]
    entries: BTreeMap<String, CachedToken>,
}

/// JSON token cache at a fixed path.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cache key for a request.
    pub fn key(request: &AuthRequest) -> String {
        format!(
            "{}|{}|{}",
            request.authority_base().to_ascii_lowercase(),
            request.resource.trim_end_matches('/'),
            request.client_id
        )
    }

    pub fn lookup(&self, request: &AuthRequest) -> Option<CachedToken> {
        self.read().entries.remove(&Self::key(request))
    }

    pub fn store(&self, request: &AuthRequest, token: CachedToken) -> Result<()> {
        let mut file = self.read();
        file.entries.insert(Self::key(request), token);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&file)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        write_private(&self.path, content.as_bytes())?;
        Ok(())
    }

    fn read(&self) -> CacheFile {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => return CacheFile::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), error = %e, "ignoring unreadable token cache");
            CacheFile::default()
        })
    }
}

/// Write a file readable only by the current user.
#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}
