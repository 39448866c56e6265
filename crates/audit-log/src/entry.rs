use std::borrow::Cow;
use std::collections::BTreeMap;
use std::io::Read;

use audit_policy::Verbosity;
use chrono::{DateTime, Utc};
use flate2::read::{GzDecoder, ZlibDecoder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key of the object substituted for a body that could not be decoded.
pub const AUDIT_LOG_ERROR_KEY: &str = "auditLogError";

/// Header name to values, as captured off the wire.
pub type Headers = BTreeMap<String, Vec<String>>;

/// The authenticated caller, as resolved by the authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, rename = "group", skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Vec<String>>,
}

/// One audited request/response exchange.
///
/// Raw bodies are filled in by the capture layer; [`prepare`](Self::prepare)
/// decodes them into the JSON trees that redaction works on and that end up
/// in the serialized record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    #[serde(rename = "auditID")]
    pub audit_id: String,
    #[serde(rename = "requestURI", default, skip_serializing_if = "String::is_empty")]
    pub request_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub remote_addr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub response_code: u16,
    #[serde(rename = "requestHeader", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub request_headers: Headers,
    #[serde(rename = "responseHeader", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub response_headers: Headers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user_login_name: String,

    #[serde(skip)]
    pub raw_request_body: Option<Vec<u8>>,
    #[serde(skip)]
    pub raw_response_body: Option<Vec<u8>>,
    #[serde(skip)]
    prepared: bool,
}

fn is_zero(code: &u16) -> bool {
    *code == 0
}

impl LogEntry {
    /// Start an entry for a request, stamping a fresh audit ID and the
    /// current time as the request timestamp.
    pub fn new(method: impl Into<String>, request_uri: impl Into<String>) -> Self {
        Self {
            audit_id: uuid::Uuid::new_v4().to_string(),
            request_uri: request_uri.into(),
            method: method.into(),
            request_timestamp: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Decode the raw bodies into JSON trees. Runs at most once per entry.
    ///
    /// Bodies are decompressed per their side's `Content-Encoding` first. A
    /// body that cannot be decoded is replaced by an
    /// `{"auditLogError": "..."}` object rather than failing.
    pub fn prepare(&mut self) {
        if self.prepared {
            return;
        }
        self.prepared = true;

        if let Some(raw) = self.raw_request_body.take() {
            self.request_body = decode_body(&raw, &self.request_headers, "request");
        }
        if let Some(raw) = self.raw_response_body.take() {
            self.response_body = decode_body(&raw, &self.response_headers, "response");
        }
    }

    /// Drop every header set and body the verbosity does not keep.
    ///
    /// Kept bodies are decoded before any header is cleared, since decoding
    /// reads `Content-Type` and `Content-Encoding`.
    pub fn apply_verbosity(&mut self, verbosity: &Verbosity) {
        if !verbosity.request.body {
            self.raw_request_body = None;
            self.request_body = None;
        }
        if !verbosity.response.body {
            self.raw_response_body = None;
            self.response_body = None;
        }

        self.prepare();

        if !verbosity.request.headers {
            self.request_headers.clear();
        }
        if !verbosity.response.headers {
            self.response_headers.clear();
        }
    }

    /// Both parsed bodies, for redactors that treat them alike.
    pub fn bodies_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.request_body
            .iter_mut()
            .chain(self.response_body.iter_mut())
    }

    /// Both header sets.
    pub fn headers_mut(&mut self) -> [&mut Headers; 2] {
        [&mut self.request_headers, &mut self.response_headers]
    }
}

/// Case-insensitive lookup of the first value of a header.
pub fn header_value<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .and_then(|(_, values)| values.first())
        .map(String::as_str)
}

// ---------------------------------------------------------------------------
// Body decoding
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
enum DecodeError {
    #[error("unsupported content encoding '{0}'")]
    UnsupportedEncoding(String),

    #[error("failed to decompress {encoding} body: {source}")]
    Decompress {
        encoding: &'static str,
        source: std::io::Error,
    },
}

fn decode_body(raw: &[u8], headers: &Headers, side: &str) -> Option<Value> {
    if raw.is_empty() {
        return None;
    }
    if let Some(content_type) = header_value(headers, "content-type") {
        if !content_type.to_ascii_lowercase().contains("json") {
            tracing::trace!(side, content_type, "skipping non-JSON body");
            return None;
        }
    }

    let decoded = match decompress(raw, header_value(headers, "content-encoding")) {
        Ok(decoded) => decoded,
        Err(err) => return Some(error_marker(side, &err)),
    };
    if decoded.is_empty() {
        return None;
    }

    match serde_json::from_slice(&decoded) {
        Ok(value) => Some(value),
        Err(err) => Some(error_marker(side, &err)),
    }
}

fn decompress<'a>(raw: &'a [u8], encoding: Option<&str>) -> Result<Cow<'a, [u8]>, DecodeError> {
    let encoding = encoding.map(|e| e.trim().to_ascii_lowercase());
    match encoding.as_deref() {
        None | Some("" | "none" | "identity") => Ok(Cow::Borrowed(raw)),
        Some("gzip" | "x-gzip") => read_all(GzDecoder::new(raw), "gzip"),
        Some("deflate") => read_all(ZlibDecoder::new(raw), "deflate"),
        Some(other) => Err(DecodeError::UnsupportedEncoding(other.to_string())),
    }
}

fn read_all(mut reader: impl Read, encoding: &'static str) -> Result<Cow<'static, [u8]>, DecodeError> {
    let mut out = Vec::new();
    reader
        .read_to_end(&mut out)
        .map_err(|source| DecodeError::Decompress { encoding, source })?;
    Ok(Cow::Owned(out))
}

fn error_marker(side: &str, err: &dyn std::fmt::Display) -> Value {
    let mut marker = serde_json::Map::new();
    marker.insert(
        AUDIT_LOG_ERROR_KEY.to_string(),
        Value::String(format!("failed to unmarshal {side} body: {err}")),
    );
    Value::Object(marker)
}
