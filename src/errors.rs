//! Error types and handling for the ServiceNow connector
//!
//! Every task operation returns [`Result`]. Errors are surfaced to the
//! immediate caller and are never retried internally.
//!
//! # Error Categories
//!
//! - **Configuration**: missing/invalid URL, invalid timeout, unknown charset
//! - **Cancelled**: the caller's cancellation token fired
//! - **Timeout**: the client's own timeout elapsed while the call was in flight
//! - **Malformed body**: the response body is not blank and not valid JSON
//! - **Upstream**: non-success status, raised only when the caller opted in
//!
//! # Example
//!
//! ```no_run
//! # use servicenow_connector::{Client, ConnectionOptions, DeleteRecordInput, Error};
//! # use tokio_util::sync::CancellationToken;
//! # async fn example(client: &Client, input: &DeleteRecordInput, options: &ConnectionOptions) -> Result<(), Box<dyn std::error::Error>> {
//! match client.delete_record(input, options, &CancellationToken::new()).await {
//!     Ok(result) => println!("deleted, status {}", result.status_code),
//!     Err(Error::Upstream { status: 404, .. }) => println!("Record not found"),
//!     Err(Error::Timeout) => println!("Request timed out"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

/// Result type alias for the connector
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the connector
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input or client configuration, raised before any network activity
    #[error("config: {0}")]
    Config(String),

    /// The caller's cancellation token was triggered
    #[error("operation was cancelled by the caller")]
    Cancelled,

    /// The request was aborted by the client's own timeout
    #[error("timeout: http request was canceled, most likely due to a timeout")]
    Timeout,

    /// Response body was not blank and could not be parsed as JSON
    #[error("unable to read response message as json: {body}")]
    MalformedBody {
        /// Raw response text
        body: String,
        /// Parser error message
        message: String,
    },

    /// Non-success HTTP status with `throw_exception_on_error_response` enabled
    #[error("request to '{url}' failed with status code {status}. Response body: {body}")]
    Upstream {
        /// Request URL
        url: String,
        /// HTTP status code
        status: u16,
        /// Normalized response body
        body: serde_json::Value,
    },

    /// Connection-level failure
    #[error("network: {0}")]
    Network(String),

    /// Response body could not be decoded to text
    #[error("decode: {0}")]
    Decode(String),

    /// Other errors
    #[error("other: {0}")]
    Other(String),
}

/// Coarse error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Configuration or input error
    Config,
    /// Caller cancellation
    Cancelled,
    /// Internal timeout
    Timeout,
    /// Response body was not valid JSON
    MalformedBody,
    /// Authentication/authorization failure (401/403)
    Auth,
    /// Record or endpoint not found (404)
    NotFound,
    /// Any other non-success HTTP status
    Upstream,
    /// Transport failure
    Network,
    /// Other/unknown error
    Other,
}

impl Error {
    /// Get the error kind for categorization
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Timeout => ErrorKind::Timeout,
            Error::MalformedBody { .. } => ErrorKind::MalformedBody,
            Error::Upstream { status, .. } => match status {
                401 | 403 => ErrorKind::Auth,
                404 => ErrorKind::NotFound,
                _ => ErrorKind::Upstream,
            },
            Error::Network(_) => ErrorKind::Network,
            Error::Decode(_) | Error::Other(_) => ErrorKind::Other,
        }
    }

    /// Get the HTTP status code if this is an upstream error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True when the caller's token cancelled the call
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// True when the call stalled and the client timeout fired
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_builder() {
            Error::Config(err.to_string())
        } else if err.is_connect() || err.is_request() || err.is_redirect() {
            Error::Network(err.to_string())
        } else if err.is_decode() || err.is_body() {
            Error::Decode(err.to_string())
        } else {
            Error::Other(err.to_string())
        }
    }
}
