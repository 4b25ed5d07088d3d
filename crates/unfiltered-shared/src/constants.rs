/// XChaCha20-Poly1305 nonce size in bytes
pub const NONCE_SIZE: usize = 24;

/// Poly1305 authentication tag size in bytes
pub const TAG_SIZE: usize = 16;

/// X25519 public key size in bytes
pub const PUBKEY_SIZE: usize = 32;

/// X25519 secret key size in bytes
pub const SECRET_KEY_SIZE: usize = 32;

/// Symmetric key size in bytes (for XChaCha20-Poly1305)
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// Smallest well-formed encrypted blob: nonce, compression marker, tag
pub const MIN_BLOB_SIZE: usize = NONCE_SIZE + 1 + TAG_SIZE;

/// Maximum message size in bytes (256 KiB)
pub const MAX_MESSAGE_SIZE: usize = 262_144;

/// Largest plaintext accepted by the message cipher (16 MiB)
pub const MAX_PLAINTEXT_SIZE: usize = 16 * 1024 * 1024;

/// Length of an obfuscated identifier (hex-encoded HMAC-SHA256)
pub const OBFUSCATED_ID_LEN: usize = 64;

/// Random bytes in a generated internal identifier
pub const RAW_ID_BYTES: usize = 12;

/// Number of messages returned by a history fetch when none is requested
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Key derivation contexts (BLAKE3)
pub const KDF_CONTEXT_MESSAGE_KEY: &str = "unfiltered-message-key-v1";
