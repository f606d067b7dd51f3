use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};

/// Whether the caller expects a JSON API response rather than a page.
///
/// True when `Accept` names JSON (`application/json` or any `+json` type) or
/// the request is an XHR (`X-Requested-With: XMLHttpRequest`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceptsJson(pub bool);

impl AcceptsJson {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let xhr = headers
            .get("x-requested-with")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("XMLHttpRequest"));

        let accept_json = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .map(|media| media.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .any(|media| media == "application/json" || media.ends_with("+json"));

        Self(xhr || accept_json)
    }
}

impl<S> FromRequestParts<S> for AcceptsJson
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn with(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn browser_navigation_is_not_json() {
        let headers = with(
            "accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        );
        assert!(!AcceptsJson::from_headers(&headers).0);
        assert!(!AcceptsJson::from_headers(&HeaderMap::new()).0);
    }

    #[test]
    fn json_accept_or_xhr_is_json() {
        assert!(AcceptsJson::from_headers(&with("accept", "application/json")).0);
        assert!(AcceptsJson::from_headers(&with("accept", "application/problem+json; q=1")).0);
        assert!(AcceptsJson::from_headers(&with("x-requested-with", "XMLHttpRequest")).0);
    }
}
