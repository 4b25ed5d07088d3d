use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::constants::RAW_ID_BYTES;

// Internal identifiers. These never cross the wire un-obfuscated.
macro_rules! internal_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Fresh random identifier (hex, 24 chars).
            pub fn generate() -> Self {
                Self(random_hex_id())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

internal_id!(
    /// Stable internal identity resolved by the authentication layer.
    UserId
);
internal_id!(ChannelId);
internal_id!(MessageId);

fn random_hex_id() -> String {
    let mut bytes = [0u8; RAW_ID_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_hex_and_distinct() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_eq!(a.as_str().len(), RAW_ID_BYTES * 2);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde_transparent() {
        let id = ChannelId::new("chan-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"chan-1\"");
    }
}
