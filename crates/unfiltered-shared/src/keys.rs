//! Asymmetric key material for end-to-end message encryption.
//!
//! Every identity owns one X25519 key pair. The public half is published so
//! that peers can encrypt to it; the secret half stays with the identity and
//! is never persisted by the server.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use x25519_dalek::StaticSecret;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{PUBKEY_SIZE, SECRET_KEY_SIZE};
use crate::error::EncodingError;

/// X25519 public key. Safe to disclose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey(pub [u8; PUBKEY_SIZE]);

/// X25519 secret key. Zeroized on drop and redacted in `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_SIZE]);

/// A user's key pair, created once per identity.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub public_key: PublicKey,
    pub secret_key: SecretKey,
}

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBKEY_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encode(&self.0)
    }

    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        Ok(Self(decode_fixed::<PUBKEY_SIZE>(text)?))
    }
}

impl SecretKey {
    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encode(&self.0)
    }

    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        Ok(Self(decode_fixed::<SECRET_KEY_SIZE>(text)?))
    }

    /// Derive the matching public key.
    pub fn public_key(&self) -> PublicKey {
        let secret = StaticSecret::from(self.0);
        PublicKey(x25519_dalek::PublicKey::from(&secret).to_bytes())
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(<redacted>)")
    }
}

impl KeyPair {
    /// Generate a fresh key pair from OS entropy.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = x25519_dalek::PublicKey::from(&secret);
        Self {
            public_key: PublicKey(public.to_bytes()),
            secret_key: SecretKey(secret.to_bytes()),
        }
    }

    /// Restore a key pair from its secret half.
    pub fn from_secret(secret_key: SecretKey) -> Self {
        Self {
            public_key: secret_key.public_key(),
            secret_key,
        }
    }
}

/// Encode raw key (or blob) bytes for storage and transport.
pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode text produced by [`encode`].
pub fn decode(text: &str) -> Result<Vec<u8>, EncodingError> {
    Ok(STANDARD.decode(text.trim())?)
}

fn decode_fixed<const N: usize>(text: &str) -> Result<[u8; N], EncodingError> {
    let bytes = decode(text)?;
    if bytes.len() != N {
        return Err(EncodingError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_distinct_pairs() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        assert_ne!(a.public_key, b.public_key);
        assert_ne!(a.secret_key.as_bytes(), b.secret_key.as_bytes());
    }

    #[test]
    fn test_public_key_matches_secret() {
        let pair = KeyPair::generate();
        assert_eq!(pair.secret_key.public_key(), pair.public_key);

        let restored = KeyPair::from_secret(pair.secret_key.clone());
        assert_eq!(restored.public_key, pair.public_key);
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let pair = KeyPair::generate();
        let text = pair.public_key.to_base64();
        assert_eq!(PublicKey::from_base64(&text).unwrap(), pair.public_key);

        let secret_text = pair.secret_key.to_base64();
        let secret = SecretKey::from_base64(&secret_text).unwrap();
        assert_eq!(secret.as_bytes(), pair.secret_key.as_bytes());
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(decode("not base64!!"), Err(EncodingError::Base64(_))));
    }

    #[test]
    fn test_decode_wrong_length() {
        let short = encode(&[1u8; 16]);
        assert_eq!(
            PublicKey::from_base64(&short),
            Err(EncodingError::InvalidLength {
                expected: 32,
                actual: 16
            })
        );
    }

    #[test]
    fn test_secret_debug_redacted() {
        let pair = KeyPair::generate();
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains(&pair.secret_key.to_base64()));
    }
}
