//! Public key enrollment and lookup.
//!
//! Clients generate their own key pair and enroll only the public half.
//! [`KeyRegistry::issue`] remains for clients that cannot generate keys
//! locally: the server creates the pair, keeps the public half and hands
//! both halves back exactly once.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use unfiltered_shared::{KeyPair, PublicKey, UserId};

use crate::error::{AccessError, Result};
use crate::store::KeyDirectory;

/// Both halves of a freshly issued key pair, base64 encoded.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedKeys {
    pub public_key: String,
    pub secret_key: String,
}

impl fmt::Debug for IssuedKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedKeys")
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

pub struct KeyRegistry {
    directory: Arc<dyn KeyDirectory>,
}

impl KeyRegistry {
    pub fn new(directory: Arc<dyn KeyDirectory>) -> Self {
        Self { directory }
    }

    /// Register a client-generated public key.
    pub async fn enroll(&self, user_id: &UserId, public_key: &str) -> Result<PublicKey> {
        let key = PublicKey::from_base64(public_key)?;
        self.directory.save_public_key(user_id, key).await?;
        info!(user = %user_id, "Enrolled public key");
        Ok(key)
    }

    /// Generate a key pair for `user_id`. Only the public half is stored.
    pub async fn issue(&self, user_id: &UserId) -> Result<IssuedKeys> {
        let pair = KeyPair::generate();
        self.directory
            .save_public_key(user_id, pair.public_key)
            .await?;
        info!(user = %user_id, "Issued key pair");
        Ok(IssuedKeys {
            public_key: pair.public_key.to_base64(),
            secret_key: pair.secret_key.to_base64(),
        })
    }

    /// The encoded public key peers encrypt to.
    pub async fn public_key(&self, user_id: &UserId) -> Result<String> {
        self.directory
            .public_key(user_id)
            .await?
            .map(|key| key.to_base64())
            .ok_or_else(|| AccessError::UnknownUser.into())
    }
}

#[cfg(test)]
mod tests {
    use unfiltered_shared::{decrypt, encrypt, EncodingError, SecretKey};

    use super::*;
    use crate::error::ServerError;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn test_enroll_and_lookup() {
        let registry = KeyRegistry::new(Arc::new(InMemoryStore::new()));
        let user = UserId::new("user:1");
        let pair = KeyPair::generate();

        registry
            .enroll(&user, &pair.public_key.to_base64())
            .await
            .unwrap();
        assert_eq!(
            registry.public_key(&user).await.unwrap(),
            pair.public_key.to_base64()
        );
    }

    #[tokio::test]
    async fn test_enroll_rejects_malformed_key() {
        let registry = KeyRegistry::new(Arc::new(InMemoryStore::new()));
        let user = UserId::new("user:1");

        let err = registry.enroll(&user, "AAAA").await.unwrap_err();
        assert!(matches!(
            err,
            ServerError::Encoding(EncodingError::InvalidLength { .. })
        ));
        assert!(registry.enroll(&user, "%%%").await.is_err());
        assert!(matches!(
            registry.public_key(&user).await.unwrap_err(),
            ServerError::Access(AccessError::UnknownUser)
        ));
    }

    #[tokio::test]
    async fn test_issue_stores_public_half_only() {
        let store = Arc::new(InMemoryStore::new());
        let registry = KeyRegistry::new(store.clone());
        let user = UserId::new("user:1");

        let issued = registry.issue(&user).await.unwrap();
        let stored = store.public_key(&user).await.unwrap().unwrap();
        assert_eq!(stored.to_base64(), issued.public_key);

        let secret = SecretKey::from_base64(&issued.secret_key).unwrap();
        assert_eq!(secret.public_key(), stored);

        let peer = KeyPair::generate();
        let blob = encrypt(b"issued", &stored, &peer.secret_key).unwrap();
        assert_eq!(
            decrypt(blob.as_bytes(), &peer.public_key, &secret).unwrap(),
            b"issued"
        );

        assert!(!format!("{:?}", issued).contains(&issued.secret_key));
    }
}
