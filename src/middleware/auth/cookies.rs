//! Minimal cookie handling for the session and XSRF cookies.

use axum::http::{HeaderMap, HeaderValue, header};

use crate::config::{Config, SameSite};
use crate::error::AppError;

pub const XSRF_COOKIE_NAME: &str = "XSRF-TOKEN";

/// First value of cookie `name` across all `Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy)]
pub struct CookieAttrs {
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// `None`: session cookie. `Some(0)`: delete.
    pub max_age: Option<u64>,
}

impl CookieAttrs {
    pub fn from_config(config: &Config, http_only: bool) -> Self {
        Self {
            http_only,
            // Browsers drop SameSite=None cookies that are not Secure.
            secure: config.app_env.is_production() || config.session_same_site == SameSite::None,
            same_site: config.session_same_site,
            max_age: Some(config.session_ttl_seconds),
        }
    }

    #[must_use]
    pub fn expired(mut self) -> Self {
        self.max_age = Some(0);
        self
    }
}

pub fn set_cookie(name: &str, value: &str, attrs: CookieAttrs) -> Result<HeaderValue, AppError> {
    let mut raw = format!("{name}={value}; Path=/; SameSite={}", attrs.same_site.as_str());
    if let Some(max_age) = attrs.max_age {
        raw.push_str(&format!("; Max-Age={max_age}"));
    }
    if attrs.http_only {
        raw.push_str("; HttpOnly");
    }
    if attrs.secure {
        raw.push_str("; Secure");
    }

    HeaderValue::from_str(&raw).map_err(|_| AppError::Internal)
}
