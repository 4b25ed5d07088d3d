use thiserror::Error;

#[derive(Error, Debug)]
pub enum UnfilteredError {
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Encoding error: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Compression error: {0}")]
    Compression(#[from] CompressionError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Authentication failed: tampered blob, wrong keys or truncated input.
    /// Callers treat this as "undeliverable to this recipient".
    #[error("Decryption failed: invalid ciphertext or wrong key")]
    DecryptionFailed,

    #[error("Plaintext too large (max {max} bytes)")]
    PlaintextTooLarge { max: usize },

    #[error("Invalid public key: low-order point")]
    InvalidPublicKey,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Payload too short: {actual} bytes (min {min})")]
    TooShort { actual: usize, min: usize },

    #[error("Payload too large: {actual} bytes (max {max})")]
    TooLarge { actual: usize, max: usize },

    #[error("Empty payload")]
    Empty,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompressionError {
    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Decompressed payload exceeds {max} bytes")]
    TooLarge { max: usize },
}

/// Startup-time failures. Never produced per call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required secret: {0}")]
    MissingSecret(&'static str),
}
