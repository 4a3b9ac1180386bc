//! Request building
//!
//! Turns task input and [`ConnectionOptions`] into a [`RequestSpec`]: method,
//! validated URL, merged headers and an encoded body.
//!
//! Header names are compared case-insensitively and the last write for a
//! name wins. Authorization is synthesized from the options only when the
//! caller did not supply one.

use crate::auth::authorization_value;
use crate::config::ConnectionOptions;
use crate::endpoints::{validate_url, Endpoints};
use crate::errors::{Error, Result};
use crate::models::{FetchAccessTokenInput, GrantType, Header, RecordBody};
use crate::util::media_type_charset;
use secrecy::ExposeSecret;
use std::fmt;
use zeroize::Zeroize;

const AUTHORIZATION: &str = "Authorization";
const CONTENT_TYPE: &str = "Content-Type";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Ordered header collection with case-insensitive names
///
/// Values are wiped from memory on drop since they may carry credentials.
#[derive(Clone, Default)]
pub(crate) struct HeaderList {
    entries: Vec<(String, String)>,
}

impl HeaderList {
    /// Set a header, replacing the value of an existing entry with the same name
    pub(crate) fn insert(&mut self, name: &str, value: String) {
        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
        {
            Some((_, existing)) => {
                existing.zeroize();
                *existing = value;
            }
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Drop for HeaderList {
    fn drop(&mut self) {
        for (_, value) in self.entries.iter_mut() {
            value.zeroize();
        }
    }
}

/// A fully built request, ready to send
#[derive(Clone)]
pub struct RequestSpec {
    method: http::Method,
    url: reqwest::Url,
    headers: HeaderList,
    body: Option<Vec<u8>>,
}

impl fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(name, _)| name).collect();
        f.debug_struct("RequestSpec")
            .field("method", &self.method)
            .field("url", &self.url.as_str())
            .field("headers", &names)
            .field("body_len", &self.body.as_ref().map(Vec::len))
            .finish()
    }
}

impl RequestSpec {
    /// Build a table API request
    ///
    /// Caller headers are merged first, then Authorization if absent, then
    /// the content type selected by `body`, which overrides any caller value.
    /// A charset declared by the caller's content type is kept on the
    /// replacement and used to encode the body.
    pub fn record(
        method: http::Method,
        url: &str,
        headers: &[Header],
        body: Option<&RecordBody>,
        options: &ConnectionOptions,
    ) -> Result<Self> {
        let url = validate_url(url)?;
        let mut headers = merge_headers(headers, options);

        let body = match body {
            Some(body) => {
                let content_type = body.format().content_type();
                let content_type = match headers.get(CONTENT_TYPE).and_then(media_type_charset) {
                    Some(charset) => format!("{}; charset={}", content_type, charset),
                    None => content_type.to_string(),
                };
                headers.insert(CONTENT_TYPE, content_type);
                Some(encode_body(body.as_str(), &headers)?)
            }
            None => None,
        };

        Ok(Self {
            method,
            url,
            headers,
            body,
        })
    }

    /// Build a token endpoint request for the input's grant type
    pub fn token(input: &FetchAccessTokenInput) -> Result<Self> {
        let instance = validate_url(&input.url)?;
        let url = validate_url(&Endpoints::new(instance.as_str()).oauth_token())?;

        let mut headers = HeaderList::default();
        headers.insert(CONTENT_TYPE, FORM_CONTENT_TYPE.to_string());

        let mut form = token_form(input)?;
        let body = form.as_bytes().to_vec();
        form.zeroize();

        Ok(Self {
            method: http::Method::POST,
            url,
            headers,
            body: Some(body),
        })
    }

    /// HTTP method
    pub fn method(&self) -> &http::Method {
        &self.method
    }

    /// Request URL
    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// All headers in insertion order
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers.iter()
    }

    /// Encoded body, if the request carries one
    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub(crate) fn header_list(&self) -> &HeaderList {
        &self.headers
    }
}

/// Merge caller headers and synthesize Authorization when none was given
pub(crate) fn merge_headers(headers: &[Header], options: &ConnectionOptions) -> HeaderList {
    let mut list = HeaderList::default();
    for header in headers {
        list.insert(&header.name, header.value.clone());
    }

    if !list.contains(AUTHORIZATION) {
        if let Some(value) = authorization_value(options) {
            list.insert(AUTHORIZATION, value.expose_secret().clone());
        }
    }

    list
}

/// Encode a body with the charset declared by the content type header
///
/// Falls back to UTF-8 when there is no content type, it is not a valid
/// media type, or it declares no charset.
pub(crate) fn encode_body(text: &str, headers: &HeaderList) -> Result<Vec<u8>> {
    let charset = headers.get(CONTENT_TYPE).and_then(media_type_charset);

    let encoding = match charset {
        Some(label) => encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| Error::Config(format!("Unsupported request charset '{}'", label)))?,
        None => encoding_rs::UTF_8,
    };

    let (bytes, _, _) = encoding.encode(text);
    Ok(bytes.into_owned())
}

fn token_form(input: &FetchAccessTokenInput) -> Result<String> {
    let encoded = match input.grant_type {
        GrantType::Password => serde_urlencoded::to_string([
            ("grant_type", input.grant_type.as_str()),
            ("client_id", input.client_id.as_str()),
            ("client_secret", input.client_secret.expose_secret().as_str()),
            ("username", input.username.as_str()),
            ("password", input.password.expose_secret().as_str()),
        ]),
        GrantType::RefreshToken => serde_urlencoded::to_string([
            ("grant_type", input.grant_type.as_str()),
            ("client_id", input.client_id.as_str()),
            ("refresh_token", input.refresh_token.expose_secret().as_str()),
            ("client_secret", input.client_secret.expose_secret().as_str()),
        ]),
        GrantType::Custom => serde_urlencoded::to_string(
            input
                .properties
                .iter()
                .map(|p| (p.name.as_str(), p.value.as_str()))
                .collect::<Vec<_>>(),
        ),
    };

    encoded.map_err(|e| Error::Config(format!("Failed to encode token form: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CustomProperty;
    use pretty_assertions::assert_eq;

    const URL: &str = "https://dev123456.service-now.com/api/now/table/incident";

    fn names(spec: &RequestSpec) -> Vec<String> {
        spec.headers().map(|(name, _)| name.to_string()).collect()
    }

    #[test]
    fn test_header_list_is_case_insensitive_last_wins() {
        let mut list = HeaderList::default();
        list.insert("Accept", "text/plain".to_string());
        list.insert("accept", "application/json".to_string());
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("ACCEPT"), Some("application/json"));
    }

    #[test]
    fn test_basic_authorization_added() {
        let options = ConnectionOptions::basic("admin", "secret");
        let spec = RequestSpec::record(http::Method::GET, URL, &[], None, &options).unwrap();
        assert_eq!(spec.header("authorization"), Some("Basic YWRtaW46c2VjcmV0"));
        assert!(spec.body().is_none());
    }

    #[test]
    fn test_oauth_authorization_added() {
        let options = ConnectionOptions::oauth("Token123");
        let spec = RequestSpec::record(http::Method::DELETE, URL, &[], None, &options).unwrap();
        assert_eq!(spec.header("Authorization"), Some("Bearer Token123"));
    }

    #[test]
    fn test_existing_authorization_is_kept() {
        let options = ConnectionOptions::basic("admin", "secret");
        let headers = vec![Header::new("authorization", "Bearer caller")];
        let spec = RequestSpec::record(http::Method::GET, URL, &headers, None, &options).unwrap();
        assert_eq!(spec.header("Authorization"), Some("Bearer caller"));
        assert_eq!(names(&spec), vec!["authorization"]);
    }

    #[test]
    fn test_no_authorization_without_authentication() {
        let spec = RequestSpec::record(
            http::Method::GET,
            URL,
            &[Header::new("Accept", "application/json")],
            None,
            &ConnectionOptions::default(),
        )
        .unwrap();
        assert_eq!(names(&spec), vec!["Accept"]);
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let body = RecordBody::Json(r#"{"short_description":"Hello World"}"#.to_string());
        let headers = vec![Header::new("content-type", "text/plain")];
        let spec = RequestSpec::record(
            http::Method::POST,
            URL,
            &headers,
            Some(&body),
            &ConnectionOptions::default(),
        )
        .unwrap();
        assert_eq!(spec.header("Content-Type"), Some("application/json"));
        assert_eq!(
            spec.body().unwrap(),
            br#"{"short_description":"Hello World"}"#.as_slice()
        );
    }

    #[test]
    fn test_xml_body_sets_content_type() {
        let body = RecordBody::Xml("<request><entry/></request>".to_string());
        let spec = RequestSpec::record(
            http::Method::PATCH,
            URL,
            &[],
            Some(&body),
            &ConnectionOptions::default(),
        )
        .unwrap();
        assert_eq!(spec.header("content-type"), Some("application/xml"));
    }

    #[test]
    fn test_encode_body_uses_declared_charset() {
        let mut headers = HeaderList::default();
        headers.insert("content-type", "text/plain; charset=iso-8859-1".to_string());
        assert_eq!(encode_body("ä", &headers).unwrap(), vec![0xE4]);

        let utf8 = HeaderList::default();
        assert_eq!(encode_body("ä", &utf8).unwrap(), vec![0xC3, 0xA4]);
    }

    #[test]
    fn test_encode_body_unknown_charset() {
        let mut headers = HeaderList::default();
        headers.insert("Content-Type", "text/plain; charset=klingon".to_string());
        assert!(matches!(encode_body("x", &headers), Err(Error::Config(_))));
    }

    #[test]
    fn test_caller_charset_kept_on_format_content_type() {
        let body = RecordBody::Json(r#"{"short_description":"ä"}"#.to_string());
        let headers = vec![Header::new("content-type", "text/plain; charset=iso-8859-1")];
        let spec = RequestSpec::record(
            http::Method::POST,
            URL,
            &headers,
            Some(&body),
            &ConnectionOptions::default(),
        )
        .unwrap();

        assert_eq!(
            spec.header("Content-Type"),
            Some("application/json; charset=iso-8859-1")
        );
        assert_eq!(
            spec.body().unwrap(),
            b"{\"short_description\":\"\xE4\"}".as_slice()
        );
    }

    #[test]
    fn test_unknown_caller_charset_fails_record() {
        let body = RecordBody::Xml("<request/>".to_string());
        let headers = vec![Header::new("Content-Type", "application/xml; charset=klingon")];
        let err = RequestSpec::record(
            http::Method::PUT,
            URL,
            &headers,
            Some(&body),
            &ConnectionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_url_fails_fast() {
        let err = RequestSpec::record(http::Method::GET, "", &[], None, &ConnectionOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_password_grant_form() {
        let input = FetchAccessTokenInput::password(
            "https://dev123456.service-now.com/",
            "client",
            "s3cret",
            "oauth.user",
            "p w",
        );
        let spec = RequestSpec::token(&input).unwrap();
        assert_eq!(*spec.method(), http::Method::POST);
        assert_eq!(
            spec.url().as_str(),
            "https://dev123456.service-now.com/oauth_token.do"
        );
        assert_eq!(
            spec.header("content-type"),
            Some("application/x-www-form-urlencoded")
        );
        assert_eq!(
            std::str::from_utf8(spec.body().unwrap()).unwrap(),
            "grant_type=password&client_id=client&client_secret=s3cret&username=oauth.user&password=p+w"
        );
    }

    #[test]
    fn test_refresh_grant_with_missing_secret() {
        let input = FetchAccessTokenInput {
            url: "https://dev123456.service-now.com".to_string(),
            grant_type: GrantType::RefreshToken,
            client_id: "client".to_string(),
            refresh_token: secrecy::SecretString::new("rt".to_string()),
            ..Default::default()
        };
        let spec = RequestSpec::token(&input).unwrap();
        assert_eq!(
            std::str::from_utf8(spec.body().unwrap()).unwrap(),
            "grant_type=refresh_token&client_id=client&refresh_token=rt&client_secret="
        );
    }

    #[test]
    fn test_custom_grant_form() {
        let input = FetchAccessTokenInput::custom(
            "https://dev123456.service-now.com",
            vec![
                CustomProperty::new("grant_type", "client_credentials"),
                CustomProperty::new("scope", "useraccount admin"),
            ],
        );
        let spec = RequestSpec::token(&input).unwrap();
        assert_eq!(
            std::str::from_utf8(spec.body().unwrap()).unwrap(),
            "grant_type=client_credentials&scope=useraccount+admin"
        );
    }

    #[test]
    fn test_token_requires_url() {
        let input = FetchAccessTokenInput::default();
        assert!(matches!(RequestSpec::token(&input), Err(Error::Config(_))));
    }

    #[test]
    fn test_debug_hides_header_values() {
        let spec = RequestSpec::record(
            http::Method::GET,
            URL,
            &[],
            None,
            &ConnectionOptions::oauth("very-secret"),
        )
        .unwrap();
        assert!(!format!("{:?}", spec).contains("very-secret"));
    }
}
