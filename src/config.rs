use crate::{
    auth::Authentication,
    cache::{CacheConfig, ClientCache, ReqwestClientFactory},
    errors::Result,
    telemetry::TelemetryConfig,
    Error,
};
use secrecy::SecretString;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Per-call connection options
///
/// Everything except `token` configures the underlying HTTP client and is
/// part of the client cache fingerprint. The bearer token is applied at
/// request time only.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ConnectionOptions {
    /// Method of authenticating the request
    pub authentication: Authentication,
    /// Username for basic authentication
    pub username: String,
    /// Password for basic authentication
    pub password: SecretString,
    /// Bearer token for OAuth authentication
    pub token: SecretString,
    /// Timeout in seconds for the connection and operation
    pub connection_timeout_seconds: u64,
    /// When false, 3xx responses are returned to the caller
    pub follow_redirects: bool,
    /// Skip TLS certificate validation
    pub allow_invalid_certificate: bool,
    /// Ignore the charset declared by the response and decode as UTF-8
    pub allow_invalid_response_content_type_charset: bool,
    /// Fail with [`Error::Upstream`] on non-2xx responses
    pub throw_exception_on_error_response: bool,
    /// Keep a cookie jar on the client; when false cookies are handled manually
    pub automatic_cookie_handling: bool,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            authentication: Authentication::None,
            username: String::new(),
            password: SecretString::new(String::new()),
            token: SecretString::new(String::new()),
            connection_timeout_seconds: crate::DEFAULT_TIMEOUT_SECS,
            follow_redirects: true,
            allow_invalid_certificate: false,
            allow_invalid_response_content_type_charset: false,
            throw_exception_on_error_response: false,
            automatic_cookie_handling: true,
        }
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("authentication", &self.authentication)
            .field("username", &self.username)
            .field("password", &"****")
            .field("token", &"****")
            .field("connection_timeout_seconds", &self.connection_timeout_seconds)
            .field("follow_redirects", &self.follow_redirects)
            .field("allow_invalid_certificate", &self.allow_invalid_certificate)
            .field(
                "allow_invalid_response_content_type_charset",
                &self.allow_invalid_response_content_type_charset,
            )
            .field(
                "throw_exception_on_error_response",
                &self.throw_exception_on_error_response,
            )
            .field("automatic_cookie_handling", &self.automatic_cookie_handling)
            .finish()
    }
}

impl ConnectionOptions {
    /// Options using basic authentication
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            authentication: Authentication::Basic,
            username: username.into(),
            password: SecretString::new(password.into()),
            ..Default::default()
        }
    }

    /// Options using an OAuth bearer token
    pub fn oauth(token: impl Into<String>) -> Self {
        Self {
            authentication: Authentication::OAuth,
            token: SecretString::new(token.into()),
            ..Default::default()
        }
    }

    /// Replace the bearer token, keeping every connection-level setting
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = SecretString::new(token.into());
        self
    }

    /// Set the connection timeout in seconds
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.connection_timeout_seconds = secs;
        self
    }

    /// Enable or disable following redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Accept invalid TLS certificates (dangerous)
    pub fn with_allow_invalid_certificate(mut self, allow: bool) -> Self {
        self.allow_invalid_certificate = allow;
        self
    }

    /// Ignore the response charset and decode bodies as UTF-8
    pub fn with_allow_invalid_response_charset(mut self, allow: bool) -> Self {
        self.allow_invalid_response_content_type_charset = allow;
        self
    }

    /// Fail on non-success status codes
    pub fn with_throw_on_error_response(mut self, throw: bool) -> Self {
        self.throw_exception_on_error_response = throw;
        self
    }

    /// Enable or disable the client cookie jar
    pub fn with_automatic_cookie_handling(mut self, enabled: bool) -> Self {
        self.automatic_cookie_handling = enabled;
        self
    }

    /// Cache fingerprint of the connection-level settings
    pub fn fingerprint(&self) -> String {
        crate::cache::compute_key(self)
    }

    /// Copy of these options with authentication and credentials cleared
    ///
    /// Token endpoint calls authenticate through the form body, so their
    /// client depends on transport settings only.
    pub(crate) fn without_credentials(&self) -> Self {
        Self {
            authentication: Authentication::None,
            username: String::new(),
            password: SecretString::new(String::new()),
            token: SecretString::new(String::new()),
            ..self.clone()
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent suffix
    pub user_agent_suffix: Option<String>,
    /// Client cache configuration
    pub cache_config: CacheConfig,
    /// Telemetry configuration
    pub telemetry_config: TelemetryConfig,
}

/// Builder for creating a configured Client
#[derive(Debug)]
pub struct ClientBuilder {
    user_agent_suffix: Option<String>,
    cache: Option<ClientCache>,
    cache_max_entries: u64,
    client_idle_secs: u64,
    telemetry_config: TelemetryConfig,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Create a new client builder with default settings
    pub fn new() -> Self {
        Self {
            user_agent_suffix: None,
            cache: None,
            cache_max_entries: crate::DEFAULT_CLIENT_CACHE_MAX_ENTRIES,
            client_idle_secs: crate::DEFAULT_CLIENT_IDLE_SECS,
            telemetry_config: TelemetryConfig::default(),
        }
    }

    /// Add a custom user agent suffix
    pub fn user_agent_extra(mut self, suffix: impl Into<String>) -> Self {
        self.user_agent_suffix = Some(suffix.into());
        self
    }

    /// Set the maximum number of cached HTTP clients
    pub fn client_cache_max_entries(mut self, max_entries: u64) -> Self {
        self.cache_max_entries = max_entries;
        self
    }

    /// Set the sliding idle timeout for cached HTTP clients in seconds
    pub fn client_idle_timeout_secs(mut self, secs: u64) -> Self {
        self.client_idle_secs = secs;
        self
    }

    /// Share an existing client cache instead of creating a new one
    ///
    /// The cache settings on this builder are ignored when a cache is injected.
    pub fn client_cache(mut self, cache: ClientCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Configure telemetry/metrics
    #[cfg(feature = "metrics")]
    pub fn with_telemetry(mut self, config: TelemetryConfig) -> Self {
        self.telemetry_config = config;
        self
    }

    /// Enable telemetry with default settings
    #[cfg(feature = "metrics")]
    pub fn enable_telemetry(mut self) -> Self {
        self.telemetry_config.enabled = true;
        self
    }

    /// Build the client with the configured options
    pub fn build(self) -> Result<crate::Client> {
        if self.client_idle_secs == 0 {
            return Err(Error::Config(
                "Client idle timeout must be greater than zero".to_string(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(Error::Config(
                "Client cache must hold at least one entry".to_string(),
            ));
        }

        let config = ClientConfig {
            user_agent_suffix: self.user_agent_suffix,
            cache_config: CacheConfig {
                max_entries: self.cache_max_entries,
                idle_timeout_secs: self.client_idle_secs,
            },
            telemetry_config: self.telemetry_config,
        };

        let cache = match self.cache {
            Some(cache) => cache,
            None => {
                let factory = ReqwestClientFactory::new(config.user_agent_suffix.clone());
                ClientCache::with_factory(config.cache_config.clone(), Arc::new(factory))
            }
        };

        Ok(crate::client::Client::new(config, cache))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_connection_options_defaults() {
        let options = ConnectionOptions::default();
        assert_eq!(options.authentication, Authentication::None);
        assert_eq!(options.connection_timeout_seconds, 30);
        assert!(options.follow_redirects);
        assert!(options.automatic_cookie_handling);
        assert!(!options.allow_invalid_certificate);
        assert!(!options.throw_exception_on_error_response);
    }

    #[test]
    fn test_connection_options_deserialize_with_defaults() {
        let options: ConnectionOptions = serde_json::from_str(
            r#"{"authentication":"OAuth","token":"abc","throw_exception_on_error_response":true}"#,
        )
        .unwrap();
        assert_eq!(options.authentication, Authentication::OAuth);
        assert_eq!(options.token.expose_secret(), "abc");
        assert!(options.throw_exception_on_error_response);
        assert_eq!(options.connection_timeout_seconds, 30);
        assert!(options.follow_redirects);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let options = ConnectionOptions::basic("admin", "hunter2").with_token("tok");
        let debug_str = format!("{:?}", options);
        assert!(debug_str.contains("admin"));
        assert!(!debug_str.contains("hunter2"));
        assert!(!debug_str.contains("tok\""));
    }

    #[test]
    fn test_without_credentials_keeps_transport_settings() {
        let options = ConnectionOptions::basic("admin", "pw")
            .with_timeout_secs(5)
            .with_follow_redirects(false);
        let stripped = options.without_credentials();
        assert_eq!(stripped.authentication, Authentication::None);
        assert!(stripped.username.is_empty());
        assert_eq!(stripped.connection_timeout_seconds, 5);
        assert!(!stripped.follow_redirects);
    }

    #[test]
    fn test_builder_rejects_zero_idle_timeout() {
        let result = ClientBuilder::new().client_idle_timeout_secs(0).build();
        assert!(matches!(result.unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn test_builder_rejects_empty_cache() {
        let result = ClientBuilder::new().client_cache_max_entries(0).build();
        assert!(matches!(result.unwrap_err(), Error::Config(_)));
    }

    #[test]
    fn test_builder_defaults() {
        assert!(ClientBuilder::new().user_agent_extra("tests/1.0").build().is_ok());
    }
}
