use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cipher::EncryptedBlob;
use crate::error::EncodingError;
use crate::obfuscation::ObfuscatedId;

/// Emoji -> obfuscated ids of the users who reacted with it.
pub type Reactions = BTreeMap<String, Vec<ObfuscatedId>>;

/// Events a connected client sends to the server.
///
/// Every id is the obfuscated token the client was given, never a raw id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    Join { channel_id: String },

    #[serde(rename_all = "camelCase")]
    Leave { channel_id: String },

    #[serde(rename_all = "camelCase")]
    Send {
        channel_id: String,
        content: String,
        #[serde(default)]
        reply_to: Option<String>,
    },
}

/// Body of a send, `{ content, replyTo? }`. `content` is the client-side
/// encrypted blob in base64; the server stores it verbatim and never
/// decrypts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPayload {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl SendPayload {
    /// Structural check only: non-empty base64 sized like an encrypted blob.
    pub fn validate(&self, max_size: usize) -> Result<(), EncodingError> {
        if self.content.trim().is_empty() {
            return Err(EncodingError::Empty);
        }
        let blob = EncryptedBlob::from_base64(&self.content)?;
        if blob.len() > max_size {
            return Err(EncodingError::TooLarge {
                actual: blob.len(),
                max: max_size,
            });
        }
        Ok(())
    }
}

/// Events the server pushes to a connected client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    Message(MessageEvent),

    #[serde(rename_all = "camelCase")]
    Joined { channel_id: ObfuscatedId },

    #[serde(rename_all = "camelCase")]
    Left { channel_id: ObfuscatedId },

    Error { reason: String },
}

/// A persisted message as broadcast to channel members and returned by
/// history fetches. Every id is obfuscated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub id: ObfuscatedId,
    pub channel_id: ObfuscatedId,
    pub sender_id: ObfuscatedId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ObfuscatedId>,
    #[serde(default)]
    pub reactions: Reactions,
}

impl ClientEvent {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl ServerEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
