//! Origin allowlist for browser clients.
//!
//! Pure decision over the `Origin` request header: exact, case-sensitive match
//! against the configured literal origins, or admit-all when the development
//! override is on. Malformed values are denied.

use axum::http::HeaderValue;

use crate::config::Config;

#[derive(Debug, Clone, Default)]
pub struct OriginAllowlist {
    origins: Vec<String>,
    allow_all: bool,
}

impl OriginAllowlist {
    pub fn new(origins: impl IntoIterator<Item = impl Into<String>>, allow_all: bool) -> Self {
        Self {
            origins: origins.into_iter().map(Into::into).collect(),
            allow_all,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.cors_allowed_origins.iter().cloned(),
            config.cors_allow_all_origins,
        )
    }

    pub fn allows_any(&self) -> bool {
        self.allow_all
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        if !is_well_formed(origin) {
            return false;
        }
        self.allow_all || self.origins.iter().any(|o| o == origin)
    }

    /// Header-level entry point: non-UTF-8 values are denied.
    pub fn admits(&self, origin: &HeaderValue) -> bool {
        origin.to_str().map(|o| self.is_allowed(o)).unwrap_or(false)
    }
}

// scheme "://" host [":" port], nothing after the authority.
fn is_well_formed(origin: &str) -> bool {
    let Some((scheme, authority)) = origin.split_once("://") else {
        return false;
    };

    let scheme_ok = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    scheme_ok
        && !authority.is_empty()
        && !authority.contains(['/', '?', '#', '@'])
        && !authority.chars().any(|c| c.is_whitespace() || c.is_control())
}
