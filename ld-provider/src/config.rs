//! Provider configuration.
//!
//! Values come from the provider block, from `LAUNCHDARKLY_*` environment
//! variables, or both; explicit block values win over the environment.

use crate::error::{ProviderError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

/// Host used when none is configured.
pub const DEFAULT_API_HOST: &str = "https://app.launchdarkly.com";
/// HTTP timeout in seconds used when none is configured.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 20;
/// Concurrent API calls allowed when none is configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 1;
/// Value of the `LD-API-Version` header.
pub const API_VERSION: &str = "20240415";
/// `LD-API-Version` value for beta endpoints.
pub const BETA_API_VERSION: &str = "beta";
/// Page size for list endpoints when none is configured.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Environment variable holding an access token.
pub const ENV_ACCESS_TOKEN: &str = "LAUNCHDARKLY_ACCESS_TOKEN";
/// Environment variable holding an OAuth token.
pub const ENV_OAUTH_TOKEN: &str = "LAUNCHDARKLY_OAUTH_TOKEN";
/// Environment variable holding the API host.
pub const ENV_API_HOST: &str = "LAUNCHDARKLY_API_HOST";
/// Environment variable holding the HTTP timeout in seconds.
pub const ENV_HTTP_TIMEOUT: &str = "LAUNCHDARKLY_HTTP_TIMEOUT";
/// Environment variable holding the concurrency limit.
pub const ENV_MAX_CONCURRENCY: &str = "LAUNCHDARKLY_MAX_CONCURRENCY";

/// How requests authenticate.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Personal or service access token, sent as-is.
    AccessToken(String),
    /// OAuth 2 token, sent as a bearer token.
    OAuth(String),
}

impl Credential {
    /// Value of the `Authorization` header.
    pub fn header_value(&self) -> String {
        match self {
            Credential::AccessToken(token) => token.clone(),
            Credential::OAuth(token) => format!("Bearer {token}"),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            Credential::OAuth(_) => f.write_str("OAuth(<redacted>)"),
        }
    }
}

/// Configuration for the LaunchDarkly client.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Access token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// OAuth token. Takes precedence over `access_token`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oauth_token: Option<String>,

    /// API host, with or without a scheme.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_host: Option<String>,

    /// HTTP timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_timeout: Option<u64>,

    /// Maximum concurrent API calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    /// `LD-API-Version` header value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,

    /// Page size for list endpoints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderConfig")
            .field("access_token", &redact(&self.access_token))
            .field("oauth_token", &redact(&self.oauth_token))
            .field("api_host", &self.api_host)
            .field("http_timeout", &self.http_timeout)
            .field("max_concurrency", &self.max_concurrency)
            .field("api_version", &self.api_version)
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl ProviderConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `LAUNCHDARKLY_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through a variable lookup. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Ok(Self {
            access_token: get(ENV_ACCESS_TOKEN),
            oauth_token: get(ENV_OAUTH_TOKEN),
            api_host: get(ENV_API_HOST),
            http_timeout: get(ENV_HTTP_TIMEOUT)
                .map(|v| parse_number(ENV_HTTP_TIMEOUT, &v))
                .transpose()?,
            max_concurrency: get(ENV_MAX_CONCURRENCY)
                .map(|v| parse_number(ENV_MAX_CONCURRENCY, &v))
                .transpose()?,
            api_version: None,
            page_size: None,
        })
    }

    /// Overlay explicitly set values from `block` onto this config.
    #[must_use]
    pub fn merge(self, block: ProviderConfig) -> Self {
        Self {
            access_token: block.access_token.or(self.access_token),
            oauth_token: block.oauth_token.or(self.oauth_token),
            api_host: block.api_host.or(self.api_host),
            http_timeout: block.http_timeout.or(self.http_timeout),
            max_concurrency: block.max_concurrency.or(self.max_concurrency),
            api_version: block.api_version.or(self.api_version),
            page_size: block.page_size.or(self.page_size),
        }
    }

    /// Set the access token.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Set the OAuth token.
    pub fn with_oauth_token(mut self, token: impl Into<String>) -> Self {
        self.oauth_token = Some(token.into());
        self
    }

    /// Set the API host.
    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.api_host = Some(host.into());
        self
    }

    /// Set the HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout.as_secs());
        self
    }

    /// Set the concurrency limit.
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    /// Set the `LD-API-Version` header value.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Set the page size for list endpoints.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// The credential to send. An OAuth token wins over an access token.
    pub fn credential(&self) -> Result<Credential> {
        let non_empty = |v: &Option<String>| v.clone().filter(|t| !t.is_empty());
        if let Some(token) = non_empty(&self.oauth_token) {
            return Ok(Credential::OAuth(token));
        }
        if let Some(token) = non_empty(&self.access_token) {
            return Ok(Credential::AccessToken(token));
        }
        Err(ProviderError::Configuration(
            "either an \"access_token\" or \"oauth_token\" must be specified".into(),
        ))
    }

    /// Configured host, or the default.
    pub fn api_host(&self) -> &str {
        self.api_host.as_deref().unwrap_or(DEFAULT_API_HOST)
    }

    /// Base URL for requests. A host without a scheme gets `https://`; any path is dropped.
    pub fn base_url(&self) -> Result<Url> {
        let host = self.api_host().trim();
        let mut url = if host.starts_with("http://") || host.starts_with("https://") {
            Url::parse(host)?
        } else {
            Url::parse(&format!("https://{host}"))?
        };
        url.set_path("/");
        url.set_query(None);
        url.set_fragment(None);
        Ok(url)
    }

    /// HTTP timeout for each request.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS))
    }

    /// Concurrency limit for API calls.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY)
    }

    /// `LD-API-Version` header value.
    pub fn api_version(&self) -> &str {
        self.api_version.as_deref().unwrap_or(API_VERSION)
    }

    /// Page size for list endpoints.
    pub fn page_size(&self) -> usize {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Check that the config can build a client.
    pub fn validate(&self) -> Result<()> {
        self.credential()?;
        self.base_url()?;
        if self.http_timeout == Some(0) {
            return Err(ProviderError::Configuration(
                "\"http_timeout\" must be at least 1 second".into(),
            ));
        }
        if self.max_concurrency == Some(0) {
            return Err(ProviderError::Configuration(
                "\"max_concurrency\" must be at least 1".into(),
            ));
        }
        if self.page_size == Some(0) {
            return Err(ProviderError::Configuration(
                "\"page_size\" must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ProviderError::Configuration(format!("{key} must be a positive integer, got {value:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::new().with_access_token("api-123");
        assert_eq!(config.api_host(), DEFAULT_API_HOST);
        assert_eq!(config.http_timeout(), Duration::from_secs(20));
        assert_eq!(config.max_concurrency(), 1);
        assert_eq!(config.api_version(), "20240415");
        assert_eq!(config.page_size(), 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup() {
        let config = ProviderConfig::from_lookup(lookup(&[
            (ENV_ACCESS_TOKEN, "api-123"),
            (ENV_API_HOST, "app.ld.example"),
            (ENV_HTTP_TIMEOUT, "45"),
            (ENV_MAX_CONCURRENCY, "4"),
            (ENV_OAUTH_TOKEN, ""),
        ]))
        .unwrap();

        assert_eq!(config.access_token.as_deref(), Some("api-123"));
        assert_eq!(config.oauth_token, None);
        assert_eq!(config.http_timeout(), Duration::from_secs(45));
        assert_eq!(config.max_concurrency(), 4);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ProviderConfig::from_lookup(lookup(&[(ENV_HTTP_TIMEOUT, "soon")])).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains(ENV_HTTP_TIMEOUT));
    }

    #[test]
    fn test_block_values_override_environment() {
        let env = ProviderConfig::from_lookup(lookup(&[
            (ENV_ACCESS_TOKEN, "from-env"),
            (ENV_API_HOST, "env.example"),
        ]))
        .unwrap();
        let block = ProviderConfig::new()
            .with_access_token("from-block")
            .with_max_concurrency(3);

        let merged = env.merge(block);
        assert_eq!(merged.access_token.as_deref(), Some("from-block"));
        assert_eq!(merged.api_host(), "env.example");
        assert_eq!(merged.max_concurrency(), 3);
    }

    #[test]
    fn test_oauth_wins() {
        let config = ProviderConfig::new()
            .with_access_token("api-123")
            .with_oauth_token("oauth-456");
        let credential = config.credential().unwrap();
        assert_eq!(credential, Credential::OAuth("oauth-456".into()));
        assert_eq!(credential.header_value(), "Bearer oauth-456");
        assert_eq!(
            Credential::AccessToken("api-123".into()).header_value(),
            "api-123"
        );
    }

    #[test]
    fn test_missing_credential() {
        let err = ProviderConfig::new().with_access_token("").validate().unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
    }

    #[rstest]
    #[case("app.launchdarkly.com", "https://app.launchdarkly.com/")]
    #[case("https://app.launchdarkly.com", "https://app.launchdarkly.com/")]
    #[case("https://app.launchdarkly.com/some/path?x=1", "https://app.launchdarkly.com/")]
    #[case("http://127.0.0.1:8080", "http://127.0.0.1:8080/")]
    fn test_base_url(#[case] host: &str, #[case] expected: &str) {
        let config = ProviderConfig::new().with_api_host(host);
        assert_eq!(config.base_url().unwrap().as_str(), expected);
    }

    #[rstest]
    #[case(ProviderConfig::new().with_access_token("t").with_max_concurrency(0))]
    #[case(ProviderConfig::new().with_access_token("t").with_http_timeout(Duration::ZERO))]
    #[case(ProviderConfig::new().with_access_token("t").with_page_size(0))]
    fn test_validate_rejects_zero(#[case] config: ProviderConfig) {
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let config = ProviderConfig::new().with_access_token("api-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("api-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_deserialize_provider_block() {
        let config: ProviderConfig = serde_json::from_str(
            r#"{"access_token": "api-123", "http_timeout": 30, "max_concurrency": 2}"#,
        )
        .unwrap();
        assert_eq!(config.http_timeout(), Duration::from_secs(30));
        assert_eq!(config.max_concurrency(), 2);
        assert_eq!(config.api_host(), DEFAULT_API_HOST);
    }
}
