/*
 * Responsibility
 * - Load settings from the environment (upstream origin, CORS allowlist, CSRF exemptions, session cookie)
 * - Validate them once at startup (missing or inconsistent values abort the process)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        Self::parse(&std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()))
    }

    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
    /// Allow-all CORS cannot be combined with credentialed responses in production.
    WildcardInProduction,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
            ConfigError::WildcardInProduction => write!(
                f,
                "invalid configuration: CORS_ALLOW_ALL_ORIGINS is not allowed when APP_ENV=production"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub upstream_base_url: Url,
    pub upstream_timeout: Duration,
    pub request_body_limit_bytes: usize,

    pub cors_allowed_origins: Vec<String>,
    pub cors_allow_all_origins: bool,

    pub csrf_exempt_prefixes: Vec<String>,
    pub login_url: String,
    pub session_cookie_name: String,
    pub session_ttl_seconds: u64,
    pub session_same_site: SameSite,

    /// Identity store; required in production, in-memory fallback otherwise.
    pub valkey_url: Option<String>,
}

/// `SameSite` attribute of the session and XSRF cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Lax,
    Strict,
    None,
}

impl SameSite {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "lax" => Some(Self::Lax),
            "strict" => Some(Self::Strict),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Lax => "Lax",
            SameSite::Strict => "Strict",
            SameSite::None => "None",
        }
    }
}

const DEFAULT_CSRF_EXEMPT_PREFIXES: &str = "/api/proxy/,/api/v1/auth/";

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let upstream_base_url = std::env::var("UPSTREAM_BASE_URL")
            .map_err(|_| ConfigError::Missing("UPSTREAM_BASE_URL"))?;
        let upstream_base_url = parse_upstream_base(&upstream_base_url)?;

        let upstream_timeout = Duration::from_secs(
            std::env::var("UPSTREAM_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        );

        let request_body_limit_bytes = std::env::var("REQUEST_BODY_LIMIT_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(10 * 1024 * 1024);

        let cors_allowed_origins =
            split_list(&std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default());

        let cors_allow_all_origins = std::env::var("CORS_ALLOW_ALL_ORIGINS")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let csrf_exempt_prefixes = split_list(
            &std::env::var("CSRF_EXEMPT_PREFIXES")
                .unwrap_or_else(|_| DEFAULT_CSRF_EXEMPT_PREFIXES.to_string()),
        );

        let login_url = std::env::var("LOGIN_URL").unwrap_or_else(|_| "/login".to_string());

        let session_cookie_name =
            std::env::var("SESSION_COOKIE_NAME").unwrap_or_else(|_| "fleet_session".to_string());
        if session_cookie_name.is_empty()
            || !session_cookie_name
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(ConfigError::Invalid("SESSION_COOKIE_NAME"));
        }

        let session_ttl_seconds = std::env::var("SESSION_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(2 * 60 * 60);

        let session_same_site = match std::env::var("SESSION_SAME_SITE") {
            Ok(v) => SameSite::parse(&v).ok_or(ConfigError::Invalid("SESSION_SAME_SITE"))?,
            Err(_) => SameSite::Lax,
        };

        let valkey_url = std::env::var("VALKEY_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());

        let config = Self {
            addr,
            app_env,
            upstream_base_url,
            upstream_timeout,
            request_body_limit_bytes,
            cors_allowed_origins,
            cors_allow_all_origins,
            csrf_exempt_prefixes,
            login_url,
            session_cookie_name,
            session_ttl_seconds,
            session_same_site,
            valkey_url,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_env.is_production() && self.cors_allow_all_origins {
            return Err(ConfigError::WildcardInProduction);
        }
        if self.app_env.is_production() && self.valkey_url.is_none() {
            return Err(ConfigError::Missing("VALKEY_URL"));
        }
        Ok(())
    }
}

/// The upstream base must be an absolute http(s) URL. A trailing slash is
/// dropped so forwarded paths can be appended verbatim.
pub fn parse_upstream_base(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|_| ConfigError::Invalid("UPSTREAM_BASE_URL"))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Invalid("UPSTREAM_BASE_URL"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(ConfigError::Invalid("UPSTREAM_BASE_URL"));
    }

    let mut url = url;
    let trimmed = url.path().trim_end_matches('/').to_string();
    url.set_path(&trimmed);
    Ok(url)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
impl Config {
    /// Strict allowlist, development env, upstream pointed at `upstream`.
    pub fn for_tests(upstream: &str, allowed_origins: &[&str]) -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            app_env: AppEnv::Development,
            upstream_base_url: parse_upstream_base(upstream).expect("valid upstream"),
            upstream_timeout: Duration::from_secs(5),
            request_body_limit_bytes: 1024 * 1024,
            cors_allowed_origins: allowed_origins.iter().map(|s| s.to_string()).collect(),
            cors_allow_all_origins: false,
            csrf_exempt_prefixes: split_list(DEFAULT_CSRF_EXEMPT_PREFIXES),
            login_url: "/login".to_string(),
            session_cookie_name: "fleet_session".to_string(),
            session_ttl_seconds: 3600,
            session_same_site: SameSite::Lax,
            valkey_url: None,
        }
    }
}
