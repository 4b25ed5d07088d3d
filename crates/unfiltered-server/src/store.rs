//! Persistence collaborator.
//!
//! The core never owns durable storage; it drives whatever implements
//! [`MessageStore`] and [`KeyDirectory`]. [`InMemoryStore`] backs development
//! runs and tests. A production deployment plugs in a database-backed
//! implementation with the same contract: a call returns `Ok` only once the
//! write is durable.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use unfiltered_shared::{ChannelId, MessageId, PublicKey, UserId};

use crate::error::StoreError;

/// A message as recorded by the store. Ids are internal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub sender_id: UserId,
    /// Client-encrypted content, base64, stored verbatim.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub reply_to: Option<MessageId>,
    /// Emoji -> users who reacted.
    pub reactions: BTreeMap<String, Vec<UserId>>,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Durably record a new message and return it with its assigned id and
    /// timestamp.
    async fn create_message(
        &self,
        channel_id: &ChannelId,
        sender_id: &UserId,
        content: &str,
        reply_to: Option<&MessageId>,
    ) -> Result<StoredMessage, StoreError>;

    /// Durably link a created message into its channel's timeline.
    async fn append_to_channel(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<(), StoreError>;

    /// The channel's latest `limit` messages, newest first.
    async fn recent_messages(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError>;

    /// Every message id in the channel's timeline, oldest first.
    async fn channel_message_ids(&self, channel_id: &ChannelId)
        -> Result<Vec<MessageId>, StoreError>;
}

/// Public halves of user key pairs. Secret halves are never stored.
#[async_trait]
pub trait KeyDirectory: Send + Sync {
    async fn save_public_key(&self, user_id: &UserId, key: PublicKey) -> Result<(), StoreError>;

    async fn public_key(&self, user_id: &UserId) -> Result<Option<PublicKey>, StoreError>;
}

/// Process-local store. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    messages: RwLock<HashMap<MessageId, StoredMessage>>,
    timelines: RwLock<HashMap<ChannelId, Vec<MessageId>>>,
    public_keys: RwLock<HashMap<UserId, PublicKey>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn message_count(&self) -> usize {
        self.messages.read().await.len()
    }
}

#[async_trait]
impl MessageStore for InMemoryStore {
    async fn create_message(
        &self,
        channel_id: &ChannelId,
        sender_id: &UserId,
        content: &str,
        reply_to: Option<&MessageId>,
    ) -> Result<StoredMessage, StoreError> {
        let message = StoredMessage {
            id: MessageId::generate(),
            channel_id: channel_id.clone(),
            sender_id: sender_id.clone(),
            content: content.to_string(),
            created_at: Utc::now(),
            reply_to: reply_to.cloned(),
            reactions: BTreeMap::new(),
        };

        self.messages
            .write()
            .await
            .insert(message.id.clone(), message.clone());

        debug!(message = %message.id, channel = %channel_id, "Stored message");
        Ok(message)
    }

    async fn append_to_channel(
        &self,
        channel_id: &ChannelId,
        message_id: &MessageId,
    ) -> Result<(), StoreError> {
        if !self.messages.read().await.contains_key(message_id) {
            return Err(StoreError::NotFound);
        }
        self.timelines
            .write()
            .await
            .entry(channel_id.clone())
            .or_default()
            .push(message_id.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<StoredMessage>, StoreError> {
        let timelines = self.timelines.read().await;
        let Some(timeline) = timelines.get(channel_id) else {
            return Ok(Vec::new());
        };

        let messages = self.messages.read().await;
        Ok(timeline
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| messages.get(id).cloned())
            .collect())
    }

    async fn channel_message_ids(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<MessageId>, StoreError> {
        Ok(self
            .timelines
            .read()
            .await
            .get(channel_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl KeyDirectory for InMemoryStore {
    async fn save_public_key(&self, user_id: &UserId, key: PublicKey) -> Result<(), StoreError> {
        self.public_keys.write().await.insert(user_id.clone(), key);
        Ok(())
    }

    async fn public_key(&self, user_id: &UserId) -> Result<Option<PublicKey>, StoreError> {
        Ok(self.public_keys.read().await.get(user_id).copied())
    }
}
