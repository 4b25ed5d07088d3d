//! # unfiltered-shared
//!
//! Confidentiality and identity primitives shared by the Unfiltered server
//! and its clients: X25519 key pairs, the compressed authenticated message
//! cipher, identifier obfuscation, and the real-time wire protocol.

pub mod cipher;
pub mod compression;
pub mod constants;
pub mod error;
pub mod keys;
pub mod obfuscation;
pub mod protocol;
pub mod types;

pub use cipher::{decrypt, encrypt, EncryptedBlob};
pub use error::{CompressionError, ConfigError, CryptoError, EncodingError, UnfilteredError};
pub use keys::{KeyPair, PublicKey, SecretKey};
pub use obfuscation::{IdentifierObfuscator, ObfuscatedId, ObfuscationSecret};
pub use types::{ChannelId, MessageId, UserId};
