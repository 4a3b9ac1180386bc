//! Authentication support for the ServiceNow connector
//!
//! ServiceNow REST APIs accept basic authentication or an OAuth bearer token.
//! The Authorization header is synthesized from [`ConnectionOptions`] only when
//! the caller did not already supply one.
//!
//! # Examples
//!
//! ```
//! use servicenow_connector::{Authentication, ConnectionOptions};
//!
//! // Basic authentication
//! let options = ConnectionOptions::basic("admin", "Password123");
//! assert_eq!(options.authentication, Authentication::Basic);
//!
//! // OAuth bearer token
//! let options = ConnectionOptions::oauth("Token123");
//! assert_eq!(options.authentication, Authentication::OAuth);
//! ```

use crate::config::ConnectionOptions;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fmt;
use zeroize::Zeroizing;

/// Request authentication method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum Authentication {
    /// No authentication
    #[default]
    None,
    /// Basic authentication, sent as `Authorization: Basic <base64(user:pass)>`
    Basic,
    /// OAuth, sent as `Authorization: Bearer <token>`
    OAuth,
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authentication::None => write!(f, "None"),
            Authentication::Basic => write!(f, "Basic"),
            Authentication::OAuth => write!(f, "OAuth"),
        }
    }
}

/// Compute the Authorization header value for the given options
///
/// Returns `None` for [`Authentication::None`].
pub(crate) fn authorization_value(options: &ConnectionOptions) -> Option<SecretString> {
    match options.authentication {
        Authentication::None => None,
        Authentication::Basic => {
            let credentials = Zeroizing::new(format!(
                "{}:{}",
                options.username,
                options.password.expose_secret()
            ));
            Some(SecretString::new(format!(
                "Basic {}",
                STANDARD.encode(credentials.as_bytes())
            )))
        }
        Authentication::OAuth => Some(SecretString::new(format!(
            "Bearer {}",
            options.token.expose_secret()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_header() {
        let options = ConnectionOptions::basic("admin", "secret");
        let value = authorization_value(&options).unwrap();
        // base64("admin:secret")
        assert_eq!(value.expose_secret(), "Basic YWRtaW46c2VjcmV0");
    }

    #[test]
    fn test_oauth_header() {
        let options = ConnectionOptions::oauth("token123");
        let value = authorization_value(&options).unwrap();
        assert_eq!(value.expose_secret(), "Bearer token123");
    }

    #[test]
    fn test_no_header_without_authentication() {
        let options = ConnectionOptions::default();
        assert!(authorization_value(&options).is_none());
    }

    #[test]
    fn test_basic_with_empty_password() {
        let options = ConnectionOptions::basic("admin", "");
        let value = authorization_value(&options).unwrap();
        assert_eq!(value.expose_secret(), "Basic YWRtaW46");
    }

    #[test]
    fn test_display() {
        assert_eq!(Authentication::OAuth.to_string(), "OAuth");
        assert_eq!(Authentication::None.to_string(), "None");
    }
}
