//! Sending built requests
//!
//! A request is sent once. The caller's cancellation token is checked before
//! dispatch and raced against the in-flight call; the HTTP client's own
//! timeout surfaces as [`Error::Timeout`].

use crate::errors::{Error, Result};
use crate::request::{HeaderList, RequestSpec};
use http::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Send a request on the given client
pub(crate) async fn send(
    http: &reqwest::Client,
    spec: &RequestSpec,
    cancel: &CancellationToken,
) -> Result<reqwest::Response> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let mut builder = http
        .request(spec.method().clone(), spec.url().clone())
        .headers(to_header_map(spec.header_list()));
    if let Some(body) = spec.body() {
        builder = builder.body(body.to_vec());
    }
    let request = builder.build()?;

    trace!(method = %spec.method(), url = %spec.url(), "Dispatching request");

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = http.execute(request) => result.map_err(Error::from),
    }
}

/// Convert merged headers into a wire header map
///
/// Entries whose name or value the HTTP stack rejects are skipped with a
/// warning naming only the header.
pub(crate) fn to_header_map(headers: &HeaderList) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers.iter() {
        let header_name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(header_name) => header_name,
            Err(_) => {
                warn!(header = %name, "Skipping header with invalid name");
                continue;
            }
        };
        let header_value = match HeaderValue::from_str(value) {
            Ok(header_value) => header_value,
            Err(_) => {
                warn!(header = %name, "Skipping header with invalid value");
                continue;
            }
        };
        let _ = map.insert(header_name, header_value);
    }

    map
}
