//! ServiceNow endpoint URL construction

use crate::errors::{Error, Result};
use percent_encoding::{AsciiSet, CONTROLS};

/// Table API base path
pub const TABLE_API_BASE: &str = "/api/now/table";

/// OAuth token endpoint path
pub const OAUTH_TOKEN_PATH: &str = "/oauth_token.do";

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'%');

/// Endpoint builder for one ServiceNow instance
#[derive(Debug, Clone)]
pub struct Endpoints {
    base_url: String,
}

impl Endpoints {
    /// Create a builder for an instance, e.g. `https://dev123456.service-now.com`
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL of a table
    pub fn table(&self, table: &str) -> String {
        self.url(&format!("{}/{}", TABLE_API_BASE, encode_path(table)))
    }

    /// URL of a single record
    pub fn record(&self, table: &str, sys_id: &str) -> String {
        format!("{}/{}", self.table(table), encode_path(sys_id))
    }

    /// URL of the OAuth token endpoint
    pub fn oauth_token(&self) -> String {
        self.url(OAUTH_TOKEN_PATH)
    }
}

fn encode_path(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, PATH_SEGMENT).to_string()
}

/// Reject blank or non-absolute URLs before any network activity
pub(crate) fn validate_url(url: &str) -> Result<reqwest::Url> {
    if url.trim().is_empty() {
        return Err(Error::Config("Parameter Url can not be empty".to_string()));
    }
    reqwest::Url::parse(url.trim())
        .map_err(|e| Error::Config(format!("Invalid url '{}': {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        let endpoints = Endpoints::new("https://dev123456.service-now.com/");
        assert_eq!(
            endpoints.table("incident"),
            "https://dev123456.service-now.com/api/now/table/incident"
        );
        assert_eq!(
            endpoints.record("incident", "abc 123"),
            "https://dev123456.service-now.com/api/now/table/incident/abc%20123"
        );
        assert_eq!(
            endpoints.oauth_token(),
            "https://dev123456.service-now.com/oauth_token.do"
        );
    }

    #[test]
    fn test_validate_url() {
        assert!(matches!(validate_url(""), Err(Error::Config(_))));
        assert!(matches!(validate_url("   "), Err(Error::Config(_))));
        assert!(matches!(validate_url("not a url"), Err(Error::Config(_))));
        let url = validate_url("https://dev123456.service-now.com/api/now/table/incident?sysparm_limit=1")
            .unwrap();
        assert_eq!(url.query(), Some("sysparm_limit=1"));
    }
}
