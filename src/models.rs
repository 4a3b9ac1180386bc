//! Data models for the ServiceNow connector
//!
//! Inputs for the five task operations and their normalized results.
//!
//! # Key Types
//!
//! * [`RecordBody`] - JSON or XML request payload; the variant selects the content type
//! * [`CreateRecordInput`], [`GetRecordInput`], [`UpdateRecordInput`], [`DeleteRecordInput`]
//! * [`FetchAccessTokenInput`] with [`GrantType`]
//! * [`RecordResult`] and [`TokenResult`]

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single HTTP header supplied by the caller
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    /// Header name, compared case-insensitively
    pub name: String,
    /// Header value
    pub value: String,
}

impl Header {
    /// Create a header
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Format of a request message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageFormat {
    /// `application/json`
    #[serde(rename = "JSON")]
    Json,
    /// `application/xml`
    #[serde(rename = "XML")]
    Xml,
}

impl MessageFormat {
    /// Content type sent for this format
    pub fn content_type(&self) -> &'static str {
        match self {
            MessageFormat::Json => "application/json",
            MessageFormat::Xml => "application/xml",
        }
    }
}

/// Request payload for create and update
///
/// The variant is the format selector; the payload text is never inspected
/// to guess its format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", content = "body")]
pub enum RecordBody {
    /// JSON payload, sent as `application/json`
    #[serde(rename = "JSON")]
    Json(String),
    /// XML payload, sent as `application/xml`
    #[serde(rename = "XML")]
    Xml(String),
}

impl RecordBody {
    /// Selected message format
    pub fn format(&self) -> MessageFormat {
        match self {
            RecordBody::Json(_) => MessageFormat::Json,
            RecordBody::Xml(_) => MessageFormat::Xml,
        }
    }

    /// Payload text
    pub fn as_str(&self) -> &str {
        match self {
            RecordBody::Json(s) | RecordBody::Xml(s) => s,
        }
    }
}

/// HTTP method used by update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateMethod {
    /// Partial update
    #[default]
    Patch,
    /// Full replacement
    Put,
}

impl UpdateMethod {
    pub(crate) fn as_method(&self) -> http::Method {
        match self {
            UpdateMethod::Patch => http::Method::PATCH,
            UpdateMethod::Put => http::Method::PUT,
        }
    }
}

/// Input for creating a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRecordInput {
    /// Table URL, e.g. `https://dev123456.service-now.com/api/now/table/incident`
    pub url: String,
    /// Record payload
    #[serde(flatten)]
    pub body: RecordBody,
    /// Additional request headers
    #[serde(default)]
    pub headers: Vec<Header>,
}

impl CreateRecordInput {
    /// Create with a JSON payload
    pub fn json(url: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: RecordBody::Json(json.into()),
            headers: Vec::new(),
        }
    }

    /// Create with an XML payload
    pub fn xml(url: impl Into<String>, xml: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: RecordBody::Xml(xml.into()),
            headers: Vec::new(),
        }
    }

    /// Append a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

/// Input for reading records
///
/// Query parameters (`sysparm_query`, `sysparm_limit`, ...) go in the URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetRecordInput {
    /// Table or record URL
    pub url: String,
    /// Additional request headers
    #[serde(default)]
    pub headers: Vec<Header>,
}

impl GetRecordInput {
    /// Create for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Append a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

/// Input for updating a record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRecordInput {
    /// Record URL including the `sys_id`
    pub url: String,
    /// Record payload
    #[serde(flatten)]
    pub body: RecordBody,
    /// Additional request headers
    #[serde(default)]
    pub headers: Vec<Header>,
    /// PATCH (default) or PUT
    #[serde(default)]
    pub method: UpdateMethod,
}

impl UpdateRecordInput {
    /// Update with a JSON payload
    pub fn json(url: impl Into<String>, json: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: RecordBody::Json(json.into()),
            headers: Vec::new(),
            method: UpdateMethod::default(),
        }
    }

    /// Update with an XML payload
    pub fn xml(url: impl Into<String>, xml: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: RecordBody::Xml(xml.into()),
            headers: Vec::new(),
            method: UpdateMethod::default(),
        }
    }

    /// Use the given HTTP method
    pub fn method(mut self, method: UpdateMethod) -> Self {
        self.method = method;
        self
    }

    /// Append a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

/// Input for deleting a record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteRecordInput {
    /// Record URL including the `sys_id`
    pub url: String,
    /// Additional request headers
    #[serde(default)]
    pub headers: Vec<Header>,
}

impl DeleteRecordInput {
    /// Create for the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    /// Append a request header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }
}

/// OAuth grant type for the token endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Resource owner password credentials
    #[default]
    Password,
    /// Exchange a refresh token
    RefreshToken,
    /// Caller-supplied form fields
    Custom,
}

impl GrantType {
    /// Value of the `grant_type` form field
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
            GrantType::Custom => "custom",
        }
    }
}

/// Name/value pair for a custom token request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomProperty {
    /// Form field name
    pub name: String,
    /// Form field value
    pub value: String,
}

impl CustomProperty {
    /// Create a property
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Input for fetching an access token
///
/// Fields not used by the selected grant type are ignored. Blank values are
/// sent as-is; nothing besides the URL is validated client-side.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct FetchAccessTokenInput {
    /// Instance base URL, e.g. `https://dev123456.service-now.com`
    pub url: String,
    /// Grant type
    pub grant_type: GrantType,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Username for the password grant
    pub username: String,
    /// Password for the password grant
    pub password: SecretString,
    /// Refresh token for the refresh grant
    pub refresh_token: SecretString,
    /// Form fields for the custom grant
    pub properties: Vec<CustomProperty>,
}

impl Default for FetchAccessTokenInput {
    fn default() -> Self {
        Self {
            url: String::new(),
            grant_type: GrantType::default(),
            client_id: String::new(),
            client_secret: SecretString::new(String::new()),
            username: String::new(),
            password: SecretString::new(String::new()),
            refresh_token: SecretString::new(String::new()),
            properties: Vec::new(),
        }
    }
}

impl fmt::Debug for FetchAccessTokenInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchAccessTokenInput")
            .field("url", &self.url)
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"****")
            .field("username", &self.username)
            .field("password", &"****")
            .field("refresh_token", &"****")
            .field("properties", &self.properties.len())
            .finish()
    }
}

impl FetchAccessTokenInput {
    /// Password grant
    pub fn password(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            grant_type: GrantType::Password,
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            username: username.into(),
            password: SecretString::new(password.into()),
            ..Default::default()
        }
    }

    /// Refresh token grant
    pub fn refresh_token(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            grant_type: GrantType::RefreshToken,
            client_id: client_id.into(),
            client_secret: SecretString::new(client_secret.into()),
            refresh_token: SecretString::new(refresh_token.into()),
            ..Default::default()
        }
    }

    /// Custom grant with caller-supplied form fields
    pub fn custom(url: impl Into<String>, properties: Vec<CustomProperty>) -> Self {
        Self {
            url: url.into(),
            grant_type: GrantType::Custom,
            properties,
            ..Default::default()
        }
    }
}

/// Normalized result of a record operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordResult {
    /// Parsed JSON body; an empty string when the response body was blank
    pub body: serde_json::Value,
    /// Response and content headers, multiple values joined with `;`
    pub headers: HashMap<String, String>,
    /// HTTP status code
    pub status_code: u16,
}

impl RecordResult {
    /// Whether the status code is in 200-299
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// The `result` member ServiceNow wraps table responses in
    pub fn record(&self) -> Option<&serde_json::Value> {
        self.body.get("result")
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Normalized result of a token request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenResult {
    /// Parsed JSON body
    pub body: serde_json::Value,
    /// HTTP status code
    pub status_code: u16,
}

impl TokenResult {
    /// Whether the status code is in 200-299
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// `access_token` from the body
    pub fn access_token(&self) -> Option<&str> {
        self.body.get("access_token").and_then(|v| v.as_str())
    }

    /// `refresh_token` from the body
    pub fn refresh_token(&self) -> Option<&str> {
        self.body.get("refresh_token").and_then(|v| v.as_str())
    }

    /// `expires_in` from the body, in seconds
    pub fn expires_in(&self) -> Option<u64> {
        self.body.get("expires_in").and_then(|v| v.as_u64())
    }
}
