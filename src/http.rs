//! Shared plumbing for the outbound HTTP clients.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use uuid::Uuid;

pub(crate) const CORRELATION_HEADER: &str = "x-correlation-id";

const BODY_PREVIEW_LIMIT: usize = 256;
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// JSON client with bounded connect and request timeouts.
pub(crate) fn json_client(
    extra_headers: HeaderMap,
    timeout: Duration,
    connect_timeout: Duration,
) -> reqwest::Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.extend(extra_headers);

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .user_agent(concat!("alertbridge/", env!("CARGO_PKG_VERSION")))
        .pool_idle_timeout(POOL_IDLE_TIMEOUT)
        .build()
}

pub(crate) fn correlation_id() -> String {
    Uuid::now_v7().to_string()
}

/// First bytes of a response body, single-line, for error messages.
pub(crate) fn body_preview(body: &[u8]) -> String {
    if body.is_empty() {
        return "<empty>".to_string();
    }
    let end = body.len().min(BODY_PREVIEW_LIMIT);
    let mut preview = String::from_utf8_lossy(&body[..end]).to_string();
    if body.len() > BODY_PREVIEW_LIMIT {
        preview.push_str("...");
    }
    preview.replace('\n', "\\n")
}
