//! Environment-driven configuration for the sync engine.
//!
//! Both values are mandatory: a missing or malformed encryption key or
//! webhook secret is a startup failure, never a silently skipped check.

use secrecy::SecretString;
use thiserror::Error;

pub const TOKEN_KEY_ENV: &str = "PINBOARD_TOKEN_KEY";
pub const WEBHOOK_SECRET_ENV: &str = "PINBOARD_WEBHOOK_SECRET";

/// AES-256 key length in bytes; the env var carries it hex-encoded.
pub const TOKEN_KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{0} must be exactly {1} hex characters")]
    InvalidKey(&'static str, usize),
}

#[derive(Clone)]
pub struct SyncConfig {
    pub token_key: [u8; TOKEN_KEY_LEN],
    pub webhook_secret: SecretString,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let key_hex =
            std::env::var(TOKEN_KEY_ENV).map_err(|_| ConfigError::Missing(TOKEN_KEY_ENV))?;
        let secret = std::env::var(WEBHOOK_SECRET_ENV)
            .map_err(|_| ConfigError::Missing(WEBHOOK_SECRET_ENV))?;
        Self::from_parts(&key_hex, &secret)
    }

    pub fn from_parts(key_hex: &str, webhook_secret: &str) -> Result<Self, ConfigError> {
        let token_key = parse_token_key(key_hex)?;
        if webhook_secret.trim().is_empty() {
            return Err(ConfigError::Missing(WEBHOOK_SECRET_ENV));
        }
        Ok(Self {
            token_key,
            webhook_secret: SecretString::from(webhook_secret.to_string()),
        })
    }
}

fn parse_token_key(key_hex: &str) -> Result<[u8; TOKEN_KEY_LEN], ConfigError> {
    let bytes = hex::decode(key_hex.trim())
        .map_err(|_| ConfigError::InvalidKey(TOKEN_KEY_ENV, TOKEN_KEY_LEN * 2))?;
    bytes
        .try_into()
        .map_err(|_| ConfigError::InvalidKey(TOKEN_KEY_ENV, TOKEN_KEY_LEN * 2))
}
