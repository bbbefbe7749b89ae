//! Configuration options for the LexCRM client

use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};
use crate::messages::Language;

/// API address used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Path prefix of every REST endpoint
pub const API_PREFIX: &str = "/api/v1";

/// Configuration options for the LexCRM client
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Backend address without the API prefix
    pub api_url: String,

    /// The request timeout
    pub request_timeout: Option<Duration>,

    /// Whether to refresh the access token shortly before it expires
    pub auto_refresh_token: bool,

    /// How long before expiry the proactive refresh fires
    pub refresh_leeway: Duration,

    /// Lifetime assumed for live tokens that carry no expiry information
    pub default_token_lifetime: Duration,

    /// Whether an unreachable backend falls back to demo data
    pub demo_fallback: bool,

    /// Where callers should send the user after the session is dropped
    pub login_path: String,

    /// Language for error messages
    pub language: Language,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout: Some(Duration::from_secs(30)),
            auto_refresh_token: true,
            refresh_leeway: Duration::from_secs(60),
            default_token_lifetime: Duration::from_secs(30 * 60),
            demo_fallback: true,
            login_path: "/login".to_string(),
            language: Language::default(),
        }
    }
}

impl ClientOptions {
    /// Build options from `LEXCRM_*` environment variables.
    ///
    /// Unset variables keep their defaults. `LEXCRM_API_URL` selects the
    /// backend, `LEXCRM_REQUEST_TIMEOUT_SECS` the timeout (0 disables it),
    /// `LEXCRM_DEMO_FALLBACK` toggles demo mode and `LEXCRM_LANGUAGE` the
    /// message language.
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(url) = std::env::var("LEXCRM_API_URL") {
            if !url.trim().is_empty() {
                options = options.with_api_url(url.trim());
            }
        }

        if let Ok(raw) = std::env::var("LEXCRM_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| Error::config(format!("invalid LEXCRM_REQUEST_TIMEOUT_SECS: {}", raw)))?;
            options.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Ok(raw) = std::env::var("LEXCRM_DEMO_FALLBACK") {
            options.demo_fallback = parse_flag(&raw)
                .ok_or_else(|| Error::config(format!("invalid LEXCRM_DEMO_FALLBACK: {}", raw)))?;
        }

        if let Ok(raw) = std::env::var("LEXCRM_LANGUAGE") {
            options.language = raw.parse().map_err(Error::config)?;
        }

        options.validate()?;
        Ok(options)
    }

    /// Check that the API address is usable
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "api_url must be http or https, got {}",
                url.scheme()
            )));
        }
        if self.refresh_leeway >= self.default_token_lifetime {
            return Err(Error::config("refresh_leeway must be shorter than the token lifetime"));
        }
        Ok(())
    }

    /// Base URL of the REST API, including the version prefix
    pub fn api_base(&self) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), API_PREFIX)
    }

    /// Set the backend address
    pub fn with_api_url(mut self, value: &str) -> Self {
        self.api_url = value.to_string();
        self
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, value: Option<Duration>) -> Self {
        self.request_timeout = value;
        self
    }

    /// Set whether to automatically refresh the token
    pub fn with_auto_refresh_token(mut self, value: bool) -> Self {
        self.auto_refresh_token = value;
        self
    }

    /// Set how long before expiry the refresh fires
    pub fn with_refresh_leeway(mut self, value: Duration) -> Self {
        self.refresh_leeway = value;
        self
    }

    /// Set whether unreachable backends fall back to demo data
    pub fn with_demo_fallback(mut self, value: bool) -> Self {
        self.demo_fallback = value;
        self
    }

    /// Set the login path announced when a session expires
    pub fn with_login_path(mut self, value: &str) -> Self {
        self.login_path = value.to_string();
        self
    }

    /// Set the message language
    pub fn with_language(mut self, value: Language) -> Self {
        self.language = value;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_strips_trailing_slash() {
        let options = ClientOptions::default().with_api_url("https://crm.example.com/");
        assert_eq!(options.api_base(), "https://crm.example.com/api/v1");
        assert_eq!(
            ClientOptions::default().api_base(),
            "http://localhost:8000/api/v1"
        );
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        assert!(ClientOptions::default().validate().is_ok());
        assert!(ClientOptions::default()
            .with_api_url("not a url")
            .validate()
            .is_err());
        assert!(ClientOptions::default()
            .with_api_url("ftp://example.com")
            .validate()
            .is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
