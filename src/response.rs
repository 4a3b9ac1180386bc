//! Response normalization
//!
//! Every response becomes a JSON body, a flat header map and a status code.
//! A blank body normalizes to an empty JSON string; anything else must parse
//! as JSON.

use crate::errors::{Error, Result};
use crate::util::media_type_charset;
use serde_json::Value;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Normalized response parts
#[derive(Debug)]
pub(crate) struct Normalized {
    pub(crate) body: Value,
    pub(crate) headers: HashMap<String, String>,
    pub(crate) status: u16,
}

/// Read and normalize a response
///
/// With `allow_invalid_charset` the body is decoded as UTF-8 regardless of
/// the declared charset. Otherwise the declared charset is honored and an
/// unknown one is a decode error.
pub(crate) async fn normalize(
    response: reqwest::Response,
    allow_invalid_charset: bool,
    cancel: &CancellationToken,
) -> Result<Normalized> {
    let status = response.status().as_u16();
    let headers = flatten_headers(response.headers());
    let charset = headers
        .get(http::header::CONTENT_TYPE.as_str())
        .and_then(|ct| media_type_charset(ct));

    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        bytes = response.bytes() => bytes?,
    };

    let text = decode_text(&bytes, charset.as_deref(), allow_invalid_charset)?;
    let body = parse_body(&text)?;

    Ok(Normalized {
        body,
        headers,
        status,
    })
}

/// Flatten headers, joining repeated values with `;`
pub(crate) fn flatten_headers(headers: &http::HeaderMap) -> HashMap<String, String> {
    let mut flat = HashMap::with_capacity(headers.keys_len());
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(";");
        let _ = flat.insert(name.as_str().to_string(), joined);
    }
    flat
}

pub(crate) fn decode_text(
    bytes: &[u8],
    charset: Option<&str>,
    allow_invalid_charset: bool,
) -> Result<String> {
    if allow_invalid_charset {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    }

    let encoding = match charset {
        Some(label) => encoding_rs::Encoding::for_label(label.trim_matches('"').as_bytes())
            .ok_or_else(|| Error::Decode(format!("Unsupported response charset '{}'", label)))?,
        None => encoding_rs::UTF_8,
    };

    let (text, _, _) = encoding.decode(bytes);
    Ok(text.into_owned())
}

/// Parse response text into JSON
pub(crate) fn parse_body(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::String(String::new()));
    }

    serde_json::from_str(text).map_err(|e| Error::MalformedBody {
        body: text.to_string(),
        message: e.to_string(),
    })
}
