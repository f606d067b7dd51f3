//! CSRF and session secrets.
//!
//! Tokens are 32 random bytes, URL-safe base64 without padding. Comparison
//! goes through SHA-256 digests and a length-independent fold so timing does
//! not reveal a matching prefix.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use sha2::{Digest, Sha256};

use crate::error::AppError;

pub fn generate_token() -> Result<String, AppError> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes).map_err(|e| {
        tracing::error!(error = %e, "os random source unavailable");
        AppError::Internal
    })?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

pub fn tokens_match(expected: &str, presented: &str) -> bool {
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(presented.as_bytes());

    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
