use thiserror::Error;

use unfiltered_shared::EncodingError;

/// Failures reported by the persistence collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The durable write did not complete. Nothing was published; the
    /// whole send may be retried.
    #[error("Durable write failed: {0}")]
    WriteFailed(String),

    #[error("Record not found")]
    NotFound,
}

/// Failures reported at the authorization boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Unknown channel token, or a channel the identity may not use. The
    /// client cannot tell the two apart.
    #[error("Channel not found")]
    ChannelNotFound,

    #[error("Unknown reply target")]
    ReplyTargetNotFound,

    #[error("No public key registered for this user")]
    UnknownUser,
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Access denied: {0}")]
    Access(#[from] AccessError),

    #[error("Invalid payload: {0}")]
    Encoding(#[from] EncodingError),

    #[error("Connection closed")]
    ConnectionClosed,
}

impl ServerError {
    /// Reason safe to show to the client. Internal detail stays in the logs.
    pub fn client_message(&self) -> String {
        match self {
            ServerError::Persistence(_) => "Message could not be saved, please retry".to_string(),
            ServerError::Access(e) => e.to_string(),
            ServerError::Encoding(e) => format!("Invalid payload: {e}"),
            ServerError::ConnectionClosed => "Connection closed".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_hides_store_detail() {
        let err = ServerError::from(StoreError::WriteFailed("disk /var/db full".into()));
        assert!(!err.client_message().contains("/var/db"));
    }

    #[test]
    fn test_access_errors_are_shown() {
        let err = ServerError::from(AccessError::ChannelNotFound);
        assert_eq!(err.client_message(), "Channel not found");
    }
}
