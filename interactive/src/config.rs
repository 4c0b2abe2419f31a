use std::time::Duration;

use tracing::warn;

use crate::error::ApiError;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let api_url =
            std::env::var("PICKBOARD_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let timeout = std::env::var("PICKBOARD_TIMEOUT_SECS")
            .ok()
            .and_then(|raw| {
                raw.parse::<u64>()
                    .map_err(|e| warn!("Invalid PICKBOARD_TIMEOUT_SECS value {raw:?}: {e}"))
                    .ok()
            })
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self {
            api_url,
            timeout: Duration::from_secs(timeout),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }
}

/// Adds a scheme when missing and drops trailing slashes.
pub fn sanitize_base_url(raw: &str) -> Result<String, ApiError> {
    let mut base = raw.trim().to_string();
    if base.is_empty() {
        return Err(ApiError::Invalid("API URL is empty".to_string()));
    }
    if !base.starts_with("http://") && !base.starts_with("https://") {
        base = format!("http://{base}");
    }
    while base.ends_with('/') {
        base.pop();
    }
    reqwest::Url::parse(&base).map_err(|e| ApiError::Invalid(format!("invalid API URL: {e}")))?;
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_base_url() {
        assert_eq!(
            sanitize_base_url("localhost:8000//").unwrap(),
            "http://localhost:8000"
        );
        assert_eq!(
            sanitize_base_url("https://api.example.com/").unwrap(),
            "https://api.example.com"
        );
        assert!(sanitize_base_url("  ").is_err());
    }
}
