//! Identity-service configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

pub const DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Errors raised while building [`IdentityConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {var}")]
    MissingVar { var: &'static str },
    #[error("invalid identity URL '{0}' (expected http:// or https://)")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for IdentityTimeouts {
    fn default() -> Self {
        Self {
            request_secs: DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS,
            connect_secs: DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    /// Project base URL, without trailing slash (e.g. `https://xyz.supabase.co`).
    pub url: String,
    /// Public (anon) API key sent as `apikey` on every request.
    pub api_key: String,
    pub timeouts: IdentityTimeouts,
}

impl IdentityConfig {
    /// Build a config from explicit values, validating the URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `url` is not an http(s) URL.
    pub fn new(url: &str, api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self { url: normalize_url(url)?, api_key: api_key.into(), timeouts: IdentityTimeouts::default() })
    }

    /// Build typed identity config from environment variables.
    ///
    /// Required:
    /// - `IDENTITY_URL`: service base URL
    /// - `IDENTITY_API_KEY`: public API key
    ///
    /// Optional:
    /// - `IDENTITY_REQUEST_TIMEOUT_SECS`: default 30
    /// - `IDENTITY_CONNECT_TIMEOUT_SECS`: default 10
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a required variable is missing or the URL
    /// is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`IdentityConfig::from_env`] over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`IdentityConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup("IDENTITY_URL").ok_or(ConfigError::MissingVar { var: "IDENTITY_URL" })?;
        let api_key = lookup("IDENTITY_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::MissingVar { var: "IDENTITY_API_KEY" })?;
        let timeouts = IdentityTimeouts {
            request_secs: parse_u64(&lookup, "IDENTITY_REQUEST_TIMEOUT_SECS", DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(&lookup, "IDENTITY_CONNECT_TIMEOUT_SECS", DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS),
        };

        Ok(Self { url: normalize_url(&url)?, api_key, timeouts })
    }
}

fn parse_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn normalize_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let valid = ["http://", "https://"]
        .iter()
        .any(|scheme| trimmed.len() > scheme.len() && trimmed.starts_with(scheme));
    if !valid {
        return Err(ConfigError::InvalidUrl(raw.to_owned()));
    }
    Ok(trimmed.to_owned())
}
