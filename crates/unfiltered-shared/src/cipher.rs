//! Authenticated public-key encryption of message bodies.
//!
//! The message key is the BLAKE3-derived X25519 shared secret between the
//! sender's secret key and the recipient's public key, so decryption proves
//! both confidentiality and the sender's identity. Plaintext is compressed
//! before sealing with XChaCha20-Poly1305.
//!
//! Blob layout: `nonce (24) || ciphertext || tag (16)`.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use crate::compression;
use crate::constants::{
    KDF_CONTEXT_MESSAGE_KEY, MAX_PLAINTEXT_SIZE, MIN_BLOB_SIZE, NONCE_SIZE, SYMMETRIC_KEY_SIZE,
};
use crate::error::{CryptoError, EncodingError};
use crate::keys::{PublicKey, SecretKey};

type MessageKey = Zeroizing<[u8; SYMMETRIC_KEY_SIZE]>;

/// `nonce || ciphertext`. Opaque to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedBlob(Vec<u8>);

impl EncryptedBlob {
    /// Wrap received bytes, checking only the structural minimum.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, EncodingError> {
        if bytes.len() < MIN_BLOB_SIZE {
            return Err(EncodingError::TooShort {
                actual: bytes.len(),
                min: MIN_BLOB_SIZE,
            });
        }
        Ok(Self(bytes))
    }

    pub fn from_base64(text: &str) -> Result<Self, EncodingError> {
        let bytes = STANDARD.decode(text.trim())?;
        Self::from_bytes(bytes)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn nonce(&self) -> &[u8] {
        &self.0[..NONCE_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    nonce
}

// Same key from either side: DH(a, B) == DH(b, A).
fn message_key(their_public: &PublicKey, my_secret: &SecretKey) -> Option<MessageKey> {
    let secret = StaticSecret::from(*my_secret.as_bytes());
    let shared = secret.diffie_hellman(&x25519_dalek::PublicKey::from(their_public.0));
    if !shared.was_contributory() {
        return None;
    }

    let mut hasher = blake3::Hasher::new_derive_key(KDF_CONTEXT_MESSAGE_KEY);
    hasher.update(shared.as_bytes());
    let hash = hasher.finalize();
    let mut key = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    key.copy_from_slice(&hash.as_bytes()[..SYMMETRIC_KEY_SIZE]);
    Some(key)
}

/// Compress and seal `plaintext` for `recipient`, authenticated as `sender`.
pub fn encrypt(
    plaintext: &[u8],
    recipient: &PublicKey,
    sender: &SecretKey,
) -> Result<EncryptedBlob, CryptoError> {
    if plaintext.len() > MAX_PLAINTEXT_SIZE {
        return Err(CryptoError::PlaintextTooLarge {
            max: MAX_PLAINTEXT_SIZE,
        });
    }

    let key = message_key(recipient, sender).ok_or(CryptoError::InvalidPublicKey)?;
    let compressed =
        compression::compress(plaintext).map_err(|_| CryptoError::EncryptionFailed)?;

    let cipher = XChaCha20Poly1305::new((&*key).into());
    let nonce_bytes = generate_nonce();
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, compressed.as_slice())
        .map_err(|_| CryptoError::EncryptionFailed)?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.extend_from_slice(&ciphertext);
    Ok(EncryptedBlob(output))
}

/// Open a blob from `sender` addressed to `recipient`.
///
/// Every failure (truncated blob, wrong keys, any modified bit, malformed
/// compressed body) is reported as [`CryptoError::DecryptionFailed`].
pub fn decrypt(
    blob: &[u8],
    sender: &PublicKey,
    recipient: &SecretKey,
) -> Result<Vec<u8>, CryptoError> {
    if blob.len() < MIN_BLOB_SIZE {
        return Err(CryptoError::DecryptionFailed);
    }

    let key = message_key(sender, recipient).ok_or(CryptoError::DecryptionFailed)?;
    let (nonce_bytes, ciphertext) = blob.split_at(NONCE_SIZE);
    let cipher = XChaCha20Poly1305::new((&*key).into());
    let nonce = XNonce::from_slice(nonce_bytes);

    let compressed = Zeroizing::new(
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptionFailed)?,
    );

    compression::decompress(&compressed, MAX_PLAINTEXT_SIZE)
        .map_err(|_| CryptoError::DecryptionFailed)
}
