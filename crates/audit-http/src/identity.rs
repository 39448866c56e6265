//! Caller identity and request metadata extraction.

use std::net::SocketAddr;

use audit_log::{Headers, User};
use axum::extract::ConnectInfo;
use http::{Extensions, HeaderMap, Uri};
use serde_json::Value;

/// Header carrying the audit ID; reused from the request when present and
/// always set on the response.
pub const AUDIT_ID_HEADER: &str = "audit-id";

const LOGIN_ACTION: &str = "action=login";
const PUBLIC_LOGIN_PATH: &str = "/v1-public/login";

/// Whether `uri` is a login call whose body carries the caller's username.
pub fn is_login(uri: &Uri) -> bool {
    let by_action = uri
        .query()
        .is_some_and(|query| query.split('&').any(|pair| pair == LOGIN_ACTION));
    by_action || uri.path().ends_with(PUBLIC_LOGIN_PATH)
}

/// The `username` field of a login request body.
pub fn login_name(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    value
        .get("username")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// The authenticated user an upstream layer stored in the extensions.
pub fn user(extensions: &Extensions) -> Option<User> {
    extensions.get::<User>().cloned()
}

pub fn remote_addr(extensions: &Extensions) -> String {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default()
}

/// Copy a header map into the entry representation. Names are lowercase as
/// the `http` crate stores them; non-UTF-8 values are converted lossily.
pub fn header_map(headers: &HeaderMap) -> Headers {
    let mut out = Headers::new();
    for (name, value) in headers {
        out.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    out
}
