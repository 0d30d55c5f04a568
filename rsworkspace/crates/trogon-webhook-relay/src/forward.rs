//! Outbound call to a destination.
//!
//! Exactly one request per inbound webhook, no retries. The send and the full
//! response body read run inside one `tokio::time::timeout`; when the
//! deadline fires the in-flight future is dropped, which cancels the request
//! and releases its connection. The timer is owned by that same future, so
//! every exit path disarms it.

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, HOST, USER_AGENT};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use thiserror::Error;

/// Stamped on every outbound request so downstreams can spot relay traffic.
pub const RELAY_HEADER: HeaderName = HeaderName::from_static("x-trogon-relay");
pub const RELAY_ID: &str = "trogon-webhook-relay";

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

const WEBHOOKS_PATH: &str = "/webhooks";
const AGENT_HOOK_PATH: &str = "/hooks/agent";

#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("upstream did not respond within {}ms", .after.as_millis())]
    Timeout { after: Duration },

    #[error("{0}")]
    Transport(String),
}

#[derive(Debug)]
pub struct OutboundRequest {
    pub url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub timeout: Duration,
}

/// Downstream answer, passed back to the caller as-is.
#[derive(Debug)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl IntoResponse for ForwardedResponse {
    fn into_response(self) -> Response {
        let mut resp = Response::new(Body::from(self.body));
        *resp.status_mut() = self.status;
        if let Some(content_type) = self.content_type {
            resp.headers_mut().insert(CONTENT_TYPE, content_type);
        }
        resp
    }
}

/// Owns the outbound HTTP client. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    /// Client without a global timeout; deadlines are per destination.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }

    pub async fn execute(&self, request: OutboundRequest) -> Result<ForwardedResponse, ForwardError> {
        let OutboundRequest {
            url,
            headers,
            body,
            timeout,
        } = request;

        let call = async {
            let upstream = self.client.post(&url).headers(headers).body(body).send().await?;
            let status = upstream.status();
            let content_type = upstream.headers().get(CONTENT_TYPE).cloned();
            let body = upstream.bytes().await?;
            Ok::<_, reqwest::Error>(ForwardedResponse {
                status,
                content_type,
                body,
            })
        };

        match tokio::time::timeout(timeout, call).await {
            Ok(Ok(resp)) => Ok(resp),
            Ok(Err(e)) if e.is_timeout() => Err(ForwardError::Timeout { after: timeout }),
            Ok(Err(e)) => Err(ForwardError::Transport(error_chain(&e))),
            Err(_) => Err(ForwardError::Timeout { after: timeout }),
        }
    }
}

/// `reqwest` hides the root cause (refused, DNS, TLS) in its source chain.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// `<base>/webhooks/<topic>[?query]`.
pub fn webhook_url(base_url: &str, topic: &str, query: Option<&str>) -> String {
    let root = base_url.trim_end_matches('/');
    let topic = urlencoding::encode(topic);
    match query.filter(|q| !q.is_empty()) {
        Some(query) => format!("{root}{WEBHOOKS_PATH}/{topic}?{query}"),
        None => format!("{root}{WEBHOOKS_PATH}/{topic}"),
    }
}

/// `<base>/hooks/agent`.
pub fn agent_hook_url(base_url: &str) -> String {
    format!("{}{AGENT_HOOK_PATH}", base_url.trim_end_matches('/'))
}

fn is_forwardable(name: &HeaderName) -> bool {
    if name == HOST || name == CONTENT_LENGTH {
        return false;
    }
    name.as_str().starts_with("x-") || name == CONTENT_TYPE || name == USER_AGENT || name == AUTHORIZATION
}

/// Headers for a raw passthrough forward.
///
/// Keeps `x-*`, `content-type`, `user-agent` and `authorization`. A caller
/// supplied `x-forwarded-for` chain is kept as is; otherwise the peer address
/// starts one.
pub fn passthrough_headers(inbound: &HeaderMap, remote: Option<IpAddr>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in inbound.iter().filter(|(name, _)| is_forwardable(name)) {
        headers.append(name.clone(), value.clone());
    }

    if !headers.contains_key(&X_FORWARDED_FOR) {
        if let Some(value) = remote.and_then(|ip| HeaderValue::from_str(&ip.to_string()).ok()) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }
    if let Some(host) = inbound.get(HOST) {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
    headers.insert(RELAY_HEADER, HeaderValue::from_static(RELAY_ID));
    headers
}

/// Headers for an enveloped forward. Inbound headers describe the original
/// body, so none of them are carried over.
pub fn envelope_headers(token: &str) -> Result<HeaderMap, axum::http::header::InvalidHeaderValue> {
    let mut authorization = HeaderValue::from_str(&format!("Bearer {token}"))?;
    authorization.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, authorization);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(RELAY_HEADER, HeaderValue::from_static(RELAY_ID));
    Ok(headers)
}
