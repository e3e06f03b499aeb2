//! Encryption at rest for per-board GitHub access tokens.
//!
//! Tokens are sealed with AES-256-GCM under a random per-call nonce and
//! stored as `nonce_hex:ciphertext_hex`, so decryption is self-contained.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::Rng;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::services::config::TOKEN_KEY_LEN;

/// AES-GCM standard nonce length.
const NONCE_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encrypt,
    #[error("malformed ciphertext")]
    Malformed,
    #[error("decryption failed")]
    Decrypt,
    #[error("decrypted value is not a valid token")]
    InvalidToken,
}

#[derive(Clone)]
pub struct TokenVault {
    key: Key<Aes256Gcm>,
}

impl TokenVault {
    pub fn new(key: [u8; TOKEN_KEY_LEN]) -> Self {
        Self {
            key: Key::<Aes256Gcm>::from(key),
        }
    }

    pub fn encrypt(&self, token: &SecretString) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new(&self.key);
        let nonce_bytes: [u8; NONCE_LEN] = rand::rng().random();
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, token.expose_secret().as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;
        Ok(format!(
            "{}:{}",
            hex::encode(nonce_bytes),
            hex::encode(ciphertext)
        ))
    }

    pub fn decrypt(&self, stored: &str) -> Result<SecretString, CryptoError> {
        let (nonce_hex, ciphertext_hex) = stored.split_once(':').ok_or(CryptoError::Malformed)?;
        let nonce_bytes = hex::decode(nonce_hex).map_err(|_| CryptoError::Malformed)?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(CryptoError::Malformed);
        }
        let ciphertext = hex::decode(ciphertext_hex).map_err(|_| CryptoError::Malformed)?;

        let cipher = Aes256Gcm::new(&self.key);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| CryptoError::Decrypt)?;

        let token = String::from_utf8(plaintext).map_err(|_| CryptoError::InvalidToken)?;
        if token.is_empty() || !token.chars().all(|c| c.is_ascii_graphic()) {
            return Err(CryptoError::InvalidToken);
        }
        Ok(SecretString::from(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_vault() -> TokenVault {
        TokenVault::new([7u8; TOKEN_KEY_LEN])
    }

    #[test]
    fn test_round_trip() {
        let vault = test_vault();
        let token = SecretString::from("ghp_abcDEF123456".to_string());

        let stored = vault.encrypt(&token).unwrap();
        assert!(stored.contains(':'));

        let recovered = vault.decrypt(&stored).unwrap();
        assert_eq!(recovered.expose_secret(), "ghp_abcDEF123456");
    }

    #[test]
    fn test_nonce_is_random_per_call() {
        let vault = test_vault();
        let token = SecretString::from("ghp_abcDEF123456".to_string());

        let first = vault.encrypt(&token).unwrap();
        let second = vault.encrypt(&token).unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn test_wrong_key_fails() {
        let token = SecretString::from("ghp_abcDEF123456".to_string());
        let stored = test_vault().encrypt(&token).unwrap();

        let other = TokenVault::new([8u8; TOKEN_KEY_LEN]);
        assert!(matches!(other.decrypt(&stored), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let vault = test_vault();
        let token = SecretString::from("ghp_abcDEF123456".to_string());
        let stored = vault.encrypt(&token).unwrap();

        // Flip the last hex digit of the ciphertext.
        let mut tampered = stored.clone();
        let last = tampered.pop().unwrap();
        tampered.push(if last == '0' { '1' } else { '0' });

        assert!(matches!(
            vault.decrypt(&tampered),
            Err(CryptoError::Decrypt)
        ));
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        let vault = test_vault();
        for input in ["", "nocolon", "xyz:abc", "aabb:zz", "aabb:ccdd"] {
            assert!(matches!(
                vault.decrypt(input),
                Err(CryptoError::Malformed) | Err(CryptoError::Decrypt)
            ));
        }
    }
}
