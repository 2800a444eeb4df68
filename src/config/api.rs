//! API configuration values and the fixed endpoint constants.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};

/// The API endpoint the provisioned CLI is pointed at.
pub const API_BASE_URL: &str = "https://api.moonshot.cn/anthropic/";

/// Concurrency cap written alongside the rate limit.
pub(crate) const MAX_CONCURRENT_REQUESTS: u32 = 1;

/// Marker comment delimiting the shell-profile block this crate owns.
pub(crate) const PROFILE_MARKER: &str = "# Claude Code K2 Configuration";

/// Environment variable names written by the configuration writer.
pub(crate) mod vars {
    pub const BASE_URL: &str = "ANTHROPIC_BASE_URL";
    pub const API_KEY: &str = "ANTHROPIC_API_KEY";
    /// Always cleared when the API key is set, to avoid a conflicting
    /// authentication method taking precedence.
    pub const AUTH_TOKEN: &str = "ANTHROPIC_AUTH_TOKEN";
    pub const REQUEST_DELAY_MS: &str = "CLAUDE_REQUEST_DELAY_MS";
    pub const MAX_CONCURRENT: &str = "CLAUDE_MAX_CONCURRENT_REQUESTS";
}

/// User-supplied API configuration.
///
/// # Example
///
/// ```rust
/// use claude_provision::ApiConfiguration;
///
/// let api = ApiConfiguration {
///     api_key: "sk-example".to_string(),
///     requests_per_minute: 30,
///     persist_system_wide: false,
/// };
/// assert_eq!(api.request_delay_ms().unwrap(), 2000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfiguration {
    /// The API key to write into configuration stores.
    pub api_key: String,

    /// Requests-per-minute budget the endpoint allows. Must be positive.
    pub requests_per_minute: u32,

    /// When true, write into durable per-user stores (registry or shell
    /// profiles); when false, emit a disposable launch script instead.
    pub persist_system_wide: bool,
}

impl ApiConfiguration {
    /// Delay between requests derived from the rate limit.
    ///
    /// A zero rate is rejected before the division ever happens.
    pub fn request_delay_ms(&self) -> Result<u32, ConfigError> {
        if self.requests_per_minute == 0 {
            return Err(ConfigError::InvalidRateLimit);
        }
        Ok(60_000 / self.requests_per_minute)
    }

    /// Short key prefix safe to show in logs.
    pub(crate) fn redacted_key(&self) -> String {
        let prefix: String = self.api_key.chars().take(10).collect();
        format!("{prefix}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(rpm: u32) -> ApiConfiguration {
        ApiConfiguration {
            api_key: "sk-test-key-123456".to_string(),
            requests_per_minute: rpm,
            persist_system_wide: false,
        }
    }

    #[test]
    fn test_request_delay_exact_values() {
        for (rpm, expected) in [(3, 20_000), (30, 2_000), (200, 300), (500, 120), (5_000, 12)] {
            assert_eq!(api(rpm).request_delay_ms().unwrap(), expected, "rpm {rpm}");
        }
    }

    #[test]
    fn test_zero_rate_rejected_before_division() {
        let result = api(0).request_delay_ms();
        assert!(matches!(result, Err(ConfigError::InvalidRateLimit)));
    }

    #[test]
    fn test_redacted_key_handles_short_keys() {
        let short = ApiConfiguration {
            api_key: "abc".to_string(),
            requests_per_minute: 30,
            persist_system_wide: false,
        };
        assert_eq!(short.redacted_key(), "abc...");
    }
}
