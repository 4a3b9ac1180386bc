//! ServiceNow task host
//!
//! [`Client`] exposes the five task operations. Each one builds a
//! [`RequestSpec`], borrows a configured HTTP client from the shared
//! [`ClientCache`], sends once and normalizes the response.
//!
//! # Architecture
//!
//! - **Client cache**: one `reqwest::Client` per distinct connection
//!   configuration, evicted after an idle period
//! - **Request builder**: header merge, Authorization synthesis, body encoding
//! - **Send routine**: single attempt, cancellable, timeout mapped to its own error
//! - **Response normalizer**: JSON body, flat headers, status code
//!
//! # Example
//!
//! ```no_run
//! use servicenow_connector::{
//!     CancellationToken, ClientBuilder, ConnectionOptions, CreateRecordInput,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ClientBuilder::new().build()?;
//! let options = ConnectionOptions::basic("admin", "password").with_throw_on_error_response(true);
//!
//! let input = CreateRecordInput::json(
//!     "https://dev123456.service-now.com/api/now/table/incident",
//!     r#"{"short_description":"Printer on fire"}"#,
//! );
//! let result = client
//!     .create_record(&input, &options, &CancellationToken::new())
//!     .await?;
//! println!("created: {:?}", result.record());
//! # Ok(())
//! # }
//! ```

use crate::{
    cache::{CacheStats, ClientCache},
    config::{ClientConfig, ConnectionOptions},
    errors::{Error, Result},
    models::*,
    request::RequestSpec,
    response::{self, Normalized},
    transport,
};

#[cfg(feature = "metrics")]
use crate::telemetry;
use reqwest::Method;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// ServiceNow connector client
///
/// Cheap to clone; clones share the client cache.
#[derive(Clone)]
pub struct Client {
    pub(crate) config: ClientConfig,
    cache: ClientCache,
    #[cfg(feature = "metrics")]
    metrics: std::sync::Arc<telemetry::Metrics>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("user_agent_suffix", &self.config.user_agent_suffix)
            .field("cached_clients", &self.cache.entry_count())
            .field("client_idle_secs", &self.cache.config().idle_timeout_secs)
            .finish()
    }
}

impl Client {
    pub(crate) fn new(config: ClientConfig, cache: ClientCache) -> Self {
        #[cfg(feature = "metrics")]
        let metrics = if config.telemetry_config.enabled {
            telemetry::init_telemetry(config.telemetry_config.clone())
        } else {
            std::sync::Arc::new(telemetry::Metrics::new(&config.telemetry_config))
        };

        Self {
            config,
            cache,
            #[cfg(feature = "metrics")]
            metrics,
        }
    }

    /// Client cache statistics
    pub fn cache_stats(&self) -> &CacheStats {
        self.cache.stats()
    }

    /// The client cache backing this client
    pub fn client_cache(&self) -> &ClientCache {
        &self.cache
    }

    /// Create a record with `POST`
    ///
    /// # Errors
    ///
    /// * `Error::Config` for a blank or invalid URL
    /// * `Error::Upstream` for a non-2xx status when the options opt in
    pub async fn create_record(
        &self,
        input: &CreateRecordInput,
        options: &ConnectionOptions,
        cancel: &CancellationToken,
    ) -> Result<RecordResult> {
        let spec = RequestSpec::record(
            Method::POST,
            &input.url,
            &input.headers,
            Some(&input.body),
            options,
        )?;
        self.execute("create_record", &spec, options, cancel)
            .await
            .map(Normalized::into_record)
    }

    /// Read records with `GET`
    pub async fn get_record(
        &self,
        input: &GetRecordInput,
        options: &ConnectionOptions,
        cancel: &CancellationToken,
    ) -> Result<RecordResult> {
        let spec = RequestSpec::record(Method::GET, &input.url, &input.headers, None, options)?;
        self.execute("get_record", &spec, options, cancel)
            .await
            .map(Normalized::into_record)
    }

    /// Update a record with `PATCH`, or `PUT` when the input selects it
    pub async fn update_record(
        &self,
        input: &UpdateRecordInput,
        options: &ConnectionOptions,
        cancel: &CancellationToken,
    ) -> Result<RecordResult> {
        let spec = RequestSpec::record(
            input.method.as_method(),
            &input.url,
            &input.headers,
            Some(&input.body),
            options,
        )?;
        self.execute("update_record", &spec, options, cancel)
            .await
            .map(Normalized::into_record)
    }

    /// Delete a record with `DELETE`
    pub async fn delete_record(
        &self,
        input: &DeleteRecordInput,
        options: &ConnectionOptions,
        cancel: &CancellationToken,
    ) -> Result<RecordResult> {
        let spec = RequestSpec::record(Method::DELETE, &input.url, &input.headers, None, options)?;
        self.execute("delete_record", &spec, options, cancel)
            .await
            .map(Normalized::into_record)
    }

    /// Request an OAuth access token from the instance's token endpoint
    ///
    /// Only the connection-level settings of `options` are used; no
    /// Authorization header is sent.
    pub async fn fetch_access_token(
        &self,
        input: &FetchAccessTokenInput,
        options: &ConnectionOptions,
        cancel: &CancellationToken,
    ) -> Result<TokenResult> {
        let spec = RequestSpec::token(input)?;
        let options = options.without_credentials();
        self.execute("fetch_access_token", &spec, &options, cancel)
            .await
            .map(|normalized| TokenResult {
                body: normalized.body,
                status_code: normalized.status,
            })
    }

    async fn execute(
        &self,
        operation: &'static str,
        spec: &RequestSpec,
        options: &ConnectionOptions,
        cancel: &CancellationToken,
    ) -> Result<Normalized> {
        let correlation_id = Uuid::new_v4();
        let result = self
            .dispatch(operation, correlation_id, spec, options, cancel)
            .await;

        if let Err(error) = &result {
            debug!(%correlation_id, operation, kind = ?error.kind(), "Operation failed");
            #[cfg(feature = "metrics")]
            self.metrics.record_error(operation, error.kind());
        }

        result
    }

    async fn dispatch(
        &self,
        operation: &'static str,
        correlation_id: Uuid,
        spec: &RequestSpec,
        options: &ConnectionOptions,
        cancel: &CancellationToken,
    ) -> Result<Normalized> {
        let (client, cached) = self.cache.lookup(options).await?;
        #[cfg(feature = "metrics")]
        self.metrics.record_client_cache(cached);

        debug!(
            %correlation_id,
            operation,
            method = %spec.method(),
            url = %spec.url(),
            cached_client = cached,
            "Sending request"
        );

        let start = Instant::now();
        let response = transport::send(client.http(), spec, cancel).await?;
        let normalized = response::normalize(
            response,
            options.allow_invalid_response_content_type_charset,
            cancel,
        )
        .await?;
        let elapsed = start.elapsed();

        debug!(
            %correlation_id,
            operation,
            status = normalized.status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Received response"
        );

        #[cfg(feature = "metrics")]
        self.metrics.record_request(
            operation,
            spec.method().as_str(),
            normalized.status,
            elapsed.as_secs_f64(),
        );

        if options.throw_exception_on_error_response && !is_success(normalized.status) {
            return Err(Error::Upstream {
                url: spec.url().to_string(),
                status: normalized.status,
                body: normalized.body,
            });
        }

        Ok(normalized)
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

impl Normalized {
    fn into_record(self) -> RecordResult {
        RecordResult {
            body: self.body,
            headers: self.headers,
            status_code: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientBuilder;
    use serde_json::json;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_client() -> Client {
        ClientBuilder::new().build().unwrap()
    }

    fn incident_url(server: &MockServer) -> String {
        format!("{}/api/now/table/incident", server.uri())
    }

    #[test]
    fn test_client_creation() {
        let client = ClientBuilder::new().user_agent_extra("tests").build();
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_create_record_success() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/now/table/incident"))
            .and(header("Authorization", "Basic YWRtaW46c2VjcmV0"))
            .and(header("Content-Type", "application/json"))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({"result": {"sys_id": "abc", "number": "INC0010001"}}))
                    .insert_header("location", "/api/now/table/incident/abc"),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client();
        let input = CreateRecordInput::json(incident_url(&mock_server), r#"{"short_description":"x"}"#);
        let result = client
            .create_record(
                &input,
                &ConnectionOptions::basic("admin", "secret"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.status_code, 201);
        assert_eq!(result.record().unwrap()["number"], "INC0010001");
        assert_eq!(result.header("Location"), Some("/api/now/table/incident/abc"));
    }

    #[tokio::test]
    async fn test_get_record_error_status_without_throw() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/now/table/incident"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({"error": {"message": "User Not Authenticated"}})),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client();
        let result = client
            .get_record(
                &GetRecordInput::new(incident_url(&mock_server)),
                &ConnectionOptions::oauth("expired"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.status_code, 401);
        assert!(!result.is_success());
    }

    #[tokio::test]
    async fn test_update_record_error_status_with_throw() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PATCH"))
            .and(path("/api/now/table/incident/abc"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"error": {"message": "denied"}})),
            )
            .mount(&mock_server)
            .await;

        let client = create_test_client();
        let input = UpdateRecordInput::json(
            format!("{}/abc", incident_url(&mock_server)),
            r#"{"state":"2"}"#,
        );
        let err = client
            .update_record(
                &input,
                &ConnectionOptions::oauth("t").with_throw_on_error_response(true),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.kind(), crate::ErrorKind::Auth);
        match err {
            Error::Upstream { body, .. } => assert_eq!(body["error"]["message"], "denied"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_access_token_sends_no_authorization() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/oauth_token.do"))
            .and(body_string(
                "grant_type=refresh_token&client_id=id&refresh_token=rt&client_secret=cs",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "new-token",
                "refresh_token": "rt",
                "expires_in": 1799
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = create_test_client();
        let input = FetchAccessTokenInput::refresh_token(mock_server.uri(), "id", "cs", "rt");
        let result = client
            .fetch_access_token(
                &input,
                &ConnectionOptions::basic("admin", "secret"),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(result.access_token(), Some("new-token"));
        assert_eq!(result.expires_in(), Some(1799));

        let requests = mock_server.received_requests().await.unwrap();
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_client_reused_across_calls() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
            .mount(&mock_server)
            .await;

        let client = create_test_client();
        let input = GetRecordInput::new(incident_url(&mock_server));
        let cancel = CancellationToken::new();

        for token in ["one", "two", "three"] {
            let _ = client
                .get_record(&input, &ConnectionOptions::oauth(token), &cancel)
                .await
                .unwrap();
        }

        assert_eq!(client.cache_stats().misses(), 1);
        assert_eq!(client.cache_stats().hits(), 2);
    }
}
