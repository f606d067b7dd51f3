//! Upstream forwarding.
//!
//! Resolves `ProxyTarget`s against the configured upstream base and relays
//! one request per call. Only a fixed set of headers goes upstream; the
//! response comes back with status and body untouched.

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, HeaderName, HeaderValue, Method, header},
    response::Response,
};
use thiserror::Error;
use url::Url;

use crate::config::Config;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("invalid proxy path")]
    InvalidTarget,

    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{0}")]
    Transport(#[source] reqwest::Error),
}

/// Upstream URL for one inbound request: base + remaining path + original query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    url: Url,
}

impl ProxyTarget {
    /// `rest` is the raw (still percent-encoded) path after the proxy prefix.
    /// Dot segments are refused so a request cannot climb above the base path.
    pub fn resolve(base: &Url, rest: &str, query: Option<&str>) -> Result<Self, ProxyError> {
        let rest = rest.trim_start_matches('/');

        if rest.split('/').any(is_dot_segment) {
            return Err(ProxyError::InvalidTarget);
        }

        let base_str = base.as_str().trim_end_matches('/');
        let mut raw = if rest.is_empty() {
            base_str.to_string()
        } else {
            format!("{base_str}/{rest}")
        };
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            raw.push('?');
            raw.push_str(q);
        }

        let url = Url::parse(&raw).map_err(|_| ProxyError::InvalidTarget)?;
        if url.origin() != base.origin() {
            return Err(ProxyError::InvalidTarget);
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

fn is_dot_segment(segment: &str) -> bool {
    let normalized = segment.to_ascii_lowercase().replace("%2e", ".");
    normalized == "." || normalized == ".."
}

// Hop-by-hop or recomputed; the CORS layer owns `access-control-*`.
const DROPPED_RESPONSE_HEADERS: [HeaderName; 8] = [
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::TE,
    header::TRAILER,
    header::UPGRADE,
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::CONTENT_LENGTH,
];

fn is_relayed_response_header(name: &HeaderName) -> bool {
    !DROPPED_RESPONSE_HEADERS.contains(name)
        && name.as_str() != "keep-alive"
        && !name.as_str().starts_with("access-control-")
}

fn has_body(method: &Method) -> bool {
    *method != Method::GET && *method != Method::HEAD
}

#[derive(Clone, Debug)]
pub struct Forwarder {
    client: reqwest::Client,
    base: Url,
}

impl Forwarder {
    pub fn new(config: &Config) -> Result<Self, ProxyError> {
        // The frontend decides navigation: 3xx must reach it as-is.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(config.upstream_timeout)
            .user_agent(concat!("fleet-gateway/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ProxyError::Client)?;

        Ok(Self {
            client,
            base: config.upstream_base_url.clone(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn target(&self, rest: &str, query: Option<&str>) -> Result<ProxyTarget, ProxyError> {
        ProxyTarget::resolve(&self.base, rest, query)
    }

    /// Build the upstream header set from the inbound one.
    pub fn upstream_headers(method: &Method, inbound: &HeaderMap) -> HeaderMap {
        let mut out = HeaderMap::new();

        if let Some(auth) = inbound.get(header::AUTHORIZATION) {
            out.insert(header::AUTHORIZATION, auth.clone());
        }

        match inbound.get(header::CONTENT_TYPE) {
            Some(ct) => {
                out.insert(header::CONTENT_TYPE, ct.clone());
            }
            None if has_body(method) => {
                out.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
            }
            None => {}
        }

        out.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        out.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );

        out
    }

    pub async fn forward(
        &self,
        target: &ProxyTarget,
        method: Method,
        inbound: &HeaderMap,
        body: Bytes,
    ) -> Result<Response, ProxyError> {
        let headers = Self::upstream_headers(&method, inbound);
        let send_body = has_body(&method);

        let mut request = self
            .client
            .request(method, target.url().clone())
            .headers(headers);
        if send_body {
            request = request.body(body);
        }

        let upstream = request.send().await.map_err(ProxyError::Transport)?;

        let status = upstream.status();
        let upstream_headers = upstream.headers().clone();
        let bytes = upstream.bytes().await.map_err(ProxyError::Transport)?;

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        for (name, value) in upstream_headers.iter() {
            if is_relayed_response_header(name) {
                response.headers_mut().append(name.clone(), value.clone());
            }
        }

        Ok(response)
    }
}
