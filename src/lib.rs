//! ServiceNow connector tasks for Rust
//!
//! Five operations against a ServiceNow instance (create, read, update and
//! delete a table record, fetch an OAuth access token) sharing one request
//! pipeline and one normalized result shape.
//!
//! # Features
//!
//! - Async/await support with tokio runtime
//! - HTTP clients cached per connection configuration with sliding idle expiry
//! - Basic and OAuth bearer authentication
//! - JSON and XML record bodies
//! - Cooperative cancellation via [`CancellationToken`]
//! - Opt-in error for non-success status codes
//! - Secure credential handling with zeroization
//!
//! # Example
//!
//! ```no_run
//! use servicenow_connector::{CancellationToken, ClientBuilder, ConnectionOptions, GetRecordInput};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new().build()?;
//!     let options = ConnectionOptions::oauth("your-access-token");
//!
//!     let input = GetRecordInput::new(
//!         "https://dev123456.service-now.com/api/now/table/incident?sysparm_limit=1",
//!     );
//!     let result = client.get_record(&input, &options, &CancellationToken::new()).await?;
//!     println!("status {}: {}", result.status_code, result.body);
//!
//!     Ok(())
//! }
//! ```

#![deny(
    missing_docs,
    missing_debug_implementations,
    unsafe_code,
    unused_results
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

mod auth;
mod cache;
mod client;
mod config;
mod endpoints;
mod errors;
mod models;
mod request;
mod response;
/// Telemetry and observability support
#[cfg(feature = "metrics")]
pub mod telemetry;

#[cfg(not(feature = "metrics"))]
mod telemetry;
mod transport;
mod util;

pub use auth::Authentication;
pub use cache::{CacheConfig, CacheStats, CachedClient, ClientCache, HttpClientFactory, ReqwestClientFactory};
pub use client::Client;
pub use config::{ClientBuilder, ClientConfig, ConnectionOptions};
pub use endpoints::Endpoints;
pub use errors::{Error, ErrorKind, Result};
pub use models::*;
pub use request::RequestSpec;
pub use telemetry::TelemetryConfig;

// Re-export commonly used types
pub use secrecy::SecretString;
pub use tokio_util::sync::CancellationToken;

/// Crate version, matches Cargo.toml version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default connection timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default sliding idle timeout for cached HTTP clients in seconds
pub const DEFAULT_CLIENT_IDLE_SECS: u64 = 3_600;

/// Maximum cached HTTP clients
pub const DEFAULT_CLIENT_CACHE_MAX_ENTRIES: u64 = 1_000;
