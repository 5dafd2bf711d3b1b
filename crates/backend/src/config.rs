use std::str::FromStr;

use studio_core::input::DEFAULT_MAX_UPLOAD_BYTES;

/// Errors raised while reading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Read `var` and parse it, falling back to `default` when unset.
///
/// A set-but-malformed value is an error rather than a silent default.
pub fn env_parse<T: FromStr>(
    var: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    var,
                    expected,
                    value,
                })
        }
        _ => Ok(default),
    }
}

/// Like [`env_parse`] for counts and durations where zero is meaningless.
pub fn env_positive(
    var: &'static str,
    default: u64,
    expected: &'static str,
) -> Result<u64, ConfigError> {
    let value = env_parse(var, default, expected)?;
    if value == 0 {
        return Err(ConfigError::Invalid {
            var,
            expected,
            value: "0".to_string(),
        });
    }
    Ok(value)
}

/// Backend client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base HTTP URL of the backend (default: `http://localhost:3000`).
    pub api_url: String,
    /// Bearer token sent on every request, if set.
    pub api_token: Option<String>,
    /// Per-request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Largest local file accepted for upload (default: 25 MiB).
    pub max_upload_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            api_token: None,
            request_timeout_secs: 30,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                  |
    /// |------------------------|--------------------------|
    /// | `STUDIO_API_URL`       | `http://localhost:3000`  |
    /// | `STUDIO_API_TOKEN`     | unset                    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                     |
    /// | `MAX_UPLOAD_BYTES`     | `26214400`               |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_url = std::env::var("STUDIO_API_URL")
            .ok()
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.api_url);

        if !api_url.starts_with("http://") && !api_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: "STUDIO_API_URL",
                expected: "an http:// or https:// URL",
                value: api_url,
            });
        }

        let api_token = std::env::var("STUDIO_API_TOKEN")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let request_timeout_secs = env_positive(
            "REQUEST_TIMEOUT_SECS",
            defaults.request_timeout_secs,
            "a positive whole number of seconds",
        )?;

        let max_upload_bytes = env_parse(
            "MAX_UPLOAD_BYTES",
            defaults.max_upload_bytes,
            "a byte count",
        )?;

        Ok(Self {
            api_url,
            api_token,
            request_timeout_secs,
            max_upload_bytes,
        })
    }
}
