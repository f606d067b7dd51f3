//! Identity store: session and API-token records.
//!
//! Sessions are keyed by the opaque session-cookie value. API tokens are keyed
//! by the hex SHA-256 of the bearer secret, so the secret itself is never
//! stored. Login and token issuance belong to the upstream application; this
//! side reads the records and maintains the CSRF token of a session.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::services::auth::principal::Principal;
use crate::services::cache::{CacheClient, CacheError};

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("corrupt identity record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// A browser session. `principal` is `None` until the user logs in; the
/// CSRF token exists from the first `csrf-cookie` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    #[serde(default)]
    pub principal: Option<Principal>,
    #[serde(default)]
    pub csrf_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn anonymous() -> Self {
        Self {
            principal: None,
            csrf_token: None,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub principal: Principal,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenRecord {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_session(&self, session_id: &str) -> Result<Option<SessionRecord>, IdentityError>;

    async fn put_session(
        &self,
        session_id: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), IdentityError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), IdentityError>;

    /// Resolve a bearer secret. Expired tokens resolve to `None`.
    async fn find_token(&self, token: &str) -> Result<Option<Principal>, IdentityError>;
}

/// `IdentityStore` over any `CacheClient` (Valkey in production, memory in dev/tests).
#[derive(Clone)]
pub struct CacheIdentityStore<C: CacheClient> {
    cache: C,
    // Key prefix to avoid collisions across environments
    prefix: String,
}

impl<C: CacheClient> CacheIdentityStore<C> {
    pub fn new(cache: C) -> Self {
        Self::new_with_prefix(cache, "fleet:identity")
    }

    pub fn new_with_prefix(cache: C, prefix: impl Into<String>) -> Self {
        Self {
            cache,
            prefix: prefix.into(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.cache.backend_name()
    }

    fn session_key(&self, session_id: &str) -> String {
        format!("{}:session:{}", self.prefix, session_id)
    }

    fn token_key(&self, token: &str) -> String {
        format!("{}:token:{}", self.prefix, hex::encode(Sha256::digest(token.as_bytes())))
    }
}

#[async_trait]
impl<C: CacheClient> IdentityStore for CacheIdentityStore<C> {
    async fn find_session(&self, session_id: &str) -> Result<Option<SessionRecord>, IdentityError> {
        let raw = self.cache.get_string(&self.session_key(session_id)).await?;
        raw.map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(IdentityError::from)
    }

    async fn put_session(
        &self,
        session_id: &str,
        record: &SessionRecord,
        ttl: Duration,
    ) -> Result<(), IdentityError> {
        let raw = serde_json::to_string(record)?;
        self.cache
            .set_with_ttl(&self.session_key(session_id), &raw, ttl)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), IdentityError> {
        self.cache.del(&self.session_key(session_id)).await?;
        Ok(())
    }

    async fn find_token(&self, token: &str) -> Result<Option<Principal>, IdentityError> {
        let Some(raw) = self.cache.get_string(&self.token_key(token)).await? else {
            return Ok(None);
        };

        let record: TokenRecord = serde_json::from_str(&raw)?;
        if record.is_expired_at(Utc::now()) {
            return Ok(None);
        }

        Ok(Some(record.principal))
    }
}

// Tokens are minted by the upstream application; the gateway only reads them.
#[cfg(test)]
impl<C: CacheClient> CacheIdentityStore<C> {
    pub async fn put_token(
        &self,
        token: &str,
        record: &TokenRecord,
        ttl: Duration,
    ) -> Result<(), IdentityError> {
        let raw = serde_json::to_string(record)?;
        self.cache
            .set_with_ttl(&self.token_key(token), &raw, ttl)
            .await?;
        Ok(())
    }
}
