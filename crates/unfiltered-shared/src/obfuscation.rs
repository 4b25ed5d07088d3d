//! Deterministic, one-way obfuscation of internal identifiers.
//!
//! Every identifier that leaves the server (user, channel and message ids) is
//! replaced by `hex(HMAC-SHA256(secret, real_id))`. The mapping is stable for
//! as long as the secret is, and cannot be reversed without it. The server
//! resolves an inbound token by [`IdentifierObfuscator::verify`]ing it against
//! the candidate ids the caller is authorized for.
//!
//! # Rotation
//!
//! The secret is fixed for the lifetime of an obfuscator. To rotate it, build
//! the replacement with [`IdentifierObfuscator::rotate`] (or restart the
//! server with a new `ID_DERIVE_SECRET`) and swap it in. Every token issued
//! under the old secret stops verifying, so clients must refetch ids after a
//! rotation.

use std::fmt;

use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::OBFUSCATED_ID_LEN;
use crate::error::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Secret bytes for identifier derivation. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ObfuscationSecret(Vec<u8>);

impl ObfuscationSecret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for ObfuscationSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObfuscationSecret(<{} bytes redacted>)", self.0.len())
    }
}

impl From<&str> for ObfuscationSecret {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for ObfuscationSecret {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

/// Externally visible stand-in for an internal id: 64 lower-case hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObfuscatedId(String);

impl ObfuscatedId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ObfuscatedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObfuscatedId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Keyed identifier obfuscator. Immutable after construction, so a single
/// instance can be shared by any number of concurrent readers.
#[derive(Clone)]
pub struct IdentifierObfuscator {
    // Keyed HMAC state; cloned per call so the raw secret is not retained.
    mac: HmacSha256,
}

impl fmt::Debug for IdentifierObfuscator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("IdentifierObfuscator")
    }
}

impl IdentifierObfuscator {
    /// Fails with [`ConfigError::MissingSecret`] when the secret is empty.
    pub fn new(secret: impl Into<ObfuscationSecret>) -> Result<Self, ConfigError> {
        let secret = secret.into();
        if secret.is_empty() {
            return Err(ConfigError::MissingSecret("ID_DERIVE_SECRET"));
        }
        let mac = HmacSha256::new_from_slice(&secret.0)
            .map_err(|_| ConfigError::MissingSecret("ID_DERIVE_SECRET"))?;
        Ok(Self { mac })
    }

    /// Build the obfuscator that replaces this one after a secret rotation.
    pub fn rotate(&self, new_secret: impl Into<ObfuscationSecret>) -> Result<Self, ConfigError> {
        Self::new(new_secret)
    }

    pub fn obfuscate(&self, real_id: impl AsRef<str>) -> ObfuscatedId {
        let mut mac = self.mac.clone();
        mac.update(real_id.as_ref().as_bytes());
        ObfuscatedId(hex::encode(mac.finalize().into_bytes()))
    }

    /// Constant-time check that `candidate` is the token for `real_id`.
    pub fn verify(&self, real_id: impl AsRef<str>, candidate: &str) -> bool {
        let expected = self.obfuscate(real_id);
        let expected = expected.as_str().as_bytes();
        let candidate = candidate.as_bytes();

        // Token length is public (always 64), so the early return leaks nothing.
        if candidate.len() != OBFUSCATED_ID_LEN {
            return false;
        }
        expected.ct_eq(candidate).into()
    }

    /// Find the id among `candidates` whose token is `token`.
    pub fn resolve<'a, T: AsRef<str>>(
        &self,
        token: &str,
        candidates: impl IntoIterator<Item = &'a T>,
    ) -> Option<&'a T>
    where
        T: 'a,
    {
        candidates
            .into_iter()
            .find(|candidate| self.verify(candidate.as_ref(), token))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::RngCore;

    use super::*;

    #[test]
    fn test_fixed_secret_is_stable() {
        let s1 = IdentifierObfuscator::new("s1").unwrap();
        let token = s1.obfuscate("user:42");

        assert_eq!(token.as_str().len(), OBFUSCATED_ID_LEN);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
        assert_eq!(s1.obfuscate("user:42"), token);
        assert_eq!(IdentifierObfuscator::new("s1").unwrap().obfuscate("user:42"), token);
    }

    #[test]
    fn test_secret_changes_token() {
        let s1 = IdentifierObfuscator::new("s1").unwrap();
        let s2 = IdentifierObfuscator::new("s2").unwrap();
        let token = s1.obfuscate("user:42");

        assert_ne!(s2.obfuscate("user:42"), token);
        assert!(s1.verify("user:42", token.as_str()));
        assert!(!s2.verify("user:42", token.as_str()));
    }

    #[test]
    fn test_known_vector() {
        // Published HMAC-SHA256 vector for key "key".
        let obf = IdentifierObfuscator::new("key").unwrap();
        assert_eq!(
            obf.obfuscate("The quick brown fox jumps over the lazy dog").as_str(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert_eq!(
            IdentifierObfuscator::new("").unwrap_err(),
            ConfigError::MissingSecret("ID_DERIVE_SECRET")
        );
    }

    #[test]
    fn test_no_collisions_across_random_ids() {
        let obf = IdentifierObfuscator::new("collision-check").unwrap();
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let mut raw = [0u8; 12];
            rand::rngs::OsRng.fill_bytes(&mut raw);
            let id = hex::encode(raw);
            seen.insert((id.clone(), obf.obfuscate(&id)));
        }
        let tokens: HashSet<_> = seen.iter().map(|(_, token)| token.clone()).collect();
        let ids: HashSet<_> = seen.iter().map(|(id, _)| id.clone()).collect();
        assert_eq!(tokens.len(), ids.len());
    }

    #[test]
    fn test_rotation_changes_every_id() {
        let old = IdentifierObfuscator::new("before").unwrap();
        let new = old.rotate("after").unwrap();
        for i in 0..500 {
            let id = format!("message:{i}");
            let token = old.obfuscate(&id);
            assert_ne!(new.obfuscate(&id), token);
            assert!(!new.verify(&id, token.as_str()));
        }
    }

    #[test]
    fn test_verify_rejects_near_misses() {
        let obf = IdentifierObfuscator::new("s1").unwrap();
        let token = obf.obfuscate("channel:7").into_string();

        let mut first = token.clone().into_bytes();
        first[0] = if first[0] == b'0' { b'1' } else { b'0' };
        let mut last = token.clone().into_bytes();
        last[63] = if last[63] == b'0' { b'1' } else { b'0' };

        assert!(!obf.verify("channel:7", std::str::from_utf8(&first).unwrap()));
        assert!(!obf.verify("channel:7", std::str::from_utf8(&last).unwrap()));
        assert!(!obf.verify("channel:7", &token[..32]));
        assert!(!obf.verify("channel:7", ""));
        assert!(obf.verify("channel:7", &token));
    }

    // Wall-clock timing is too noisy to assert in a unit test. What can be
    // checked is that every full-width candidate reaches the `ct_eq` over all
    // 64 bytes, wherever the first differing byte sits.
    #[test]
    fn test_verify_mismatch_at_every_position() {
        let obf = IdentifierObfuscator::new("s1").unwrap();
        let token = obf.obfuscate("user:42").into_string();

        for position in 0..OBFUSCATED_ID_LEN {
            let mut candidate = token.clone().into_bytes();
            candidate[position] = if candidate[position] == b'a' { b'b' } else { b'a' };
            let candidate = String::from_utf8(candidate).unwrap();

            assert_eq!(candidate.len(), OBFUSCATED_ID_LEN);
            assert!(!obf.verify("user:42", &candidate), "position {position}");
        }
        assert!(obf.verify("user:42", &token));
    }

    #[test]
    fn test_resolve_among_candidates() {
        let obf = IdentifierObfuscator::new("s1").unwrap();
        let channels = vec!["general".to_string(), "random".to_string()];
        let token = obf.obfuscate("random");

        assert_eq!(obf.resolve(token.as_str(), &channels), Some(&channels[1]));
        assert_eq!(obf.resolve("deadbeef", &channels), None);
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let secret = ObfuscationSecret::from("super-secret");
        assert!(!format!("{:?}", secret).contains("super-secret"));
    }
}
