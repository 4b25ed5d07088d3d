//! Send pipeline and history.
//!
//! A message is published to its channel room only after the store has
//! durably recorded it and linked it into the channel timeline. Sends to the
//! same channel are serialized by a per-channel gate held across persist and
//! publish, so every member observes messages in persistence order.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use unfiltered_shared::protocol::{MessageEvent, Reactions, SendPayload, ServerEvent};
use unfiltered_shared::{ChannelId, IdentifierObfuscator, MessageId, UserId};

use crate::error::{AccessError, Result};
use crate::rooms::{ChannelRooms, DeliveryReport};
use crate::store::{MessageStore, StoredMessage};

pub struct MessageService {
    store: Arc<dyn MessageStore>,
    rooms: Arc<ChannelRooms>,
    obfuscator: Arc<IdentifierObfuscator>,
    history_limit: usize,
    max_content_size: usize,
    send_gates: DashMap<ChannelId, Arc<Mutex<()>>>,
}

/// Result of a successful send.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub event: MessageEvent,
    pub delivery: DeliveryReport,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        rooms: Arc<ChannelRooms>,
        obfuscator: Arc<IdentifierObfuscator>,
        history_limit: usize,
        max_content_size: usize,
    ) -> Self {
        Self {
            store,
            rooms,
            obfuscator,
            history_limit,
            max_content_size,
            send_gates: DashMap::new(),
        }
    }

    /// Persist a message, then publish it to the channel's room.
    ///
    /// `channel_id` must already be authorized for `sender_id`. On a store
    /// failure nothing is published and the error is returned so the client
    /// can retry the whole send.
    pub async fn send(
        &self,
        sender_id: &UserId,
        channel_id: &ChannelId,
        payload: &SendPayload,
    ) -> Result<SendReceipt> {
        payload.validate(self.max_content_size)?;

        let gate = SendGate::acquire(&self.send_gates, channel_id);
        let _guard = gate.lock().await;

        self.persist_and_publish(sender_id, channel_id, payload).await
    }

    async fn persist_and_publish(
        &self,
        sender_id: &UserId,
        channel_id: &ChannelId,
        payload: &SendPayload,
    ) -> Result<SendReceipt> {
        let reply_to = match payload.reply_to.as_deref() {
            Some(token) => Some(self.resolve_reply(channel_id, token).await?),
            None => None,
        };

        let message = self
            .store
            .create_message(channel_id, sender_id, &payload.content, reply_to.as_ref())
            .await
            .map_err(|e| {
                warn!(channel = %channel_id, error = %e, "Failed to store message");
                e
            })?;

        self.store
            .append_to_channel(channel_id, &message.id)
            .await
            .map_err(|e| {
                warn!(
                    channel = %channel_id,
                    message = %message.id,
                    error = %e,
                    "Failed to link message into channel"
                );
                e
            })?;

        let event = self.to_event(&message);
        let delivery = self
            .rooms
            .publish(channel_id, ServerEvent::Message(event.clone()));

        debug!(
            channel = %channel_id,
            message = %message.id,
            delivered = delivery.delivered,
            "Message sent"
        );
        Ok(SendReceipt { event, delivery })
    }

    /// Replies may only target the channel's latest `history_limit` messages.
    async fn resolve_reply(&self, channel_id: &ChannelId, token: &str) -> Result<MessageId> {
        let recent = self
            .store
            .recent_messages(channel_id, self.history_limit)
            .await?;
        recent
            .into_iter()
            .map(|message| message.id)
            .find(|id| self.obfuscator.verify(id, token))
            .ok_or_else(|| AccessError::ReplyTargetNotFound.into())
    }

    /// The channel's latest messages, newest first, with obfuscated ids.
    ///
    /// `limit` is capped by the configured history limit; `None` uses it.
    pub async fn history(
        &self,
        channel_id: &ChannelId,
        limit: Option<usize>,
    ) -> Result<Vec<MessageEvent>> {
        let limit = limit
            .unwrap_or(self.history_limit)
            .min(self.history_limit);
        let messages = self.store.recent_messages(channel_id, limit).await?;
        Ok(messages.iter().map(|m| self.to_event(m)).collect())
    }

    /// Outward form of a stored message. No raw id leaves through here.
    pub fn to_event(&self, message: &StoredMessage) -> MessageEvent {
        let obf = &self.obfuscator;
        let reactions: Reactions = message
            .reactions
            .iter()
            .map(|(emoji, users)| {
                (
                    emoji.clone(),
                    users.iter().map(|u| obf.obfuscate(u)).collect(),
                )
            })
            .collect();

        MessageEvent {
            id: obf.obfuscate(&message.id),
            channel_id: obf.obfuscate(&message.channel_id),
            sender_id: obf.obfuscate(&message.sender_id),
            content: message.content.clone(),
            created_at: message.created_at,
            reply_to: message.reply_to.as_ref().map(|id| obf.obfuscate(id)),
            reactions,
        }
    }

    pub fn open_gates(&self) -> usize {
        self.send_gates.len()
    }
}

/// A share of one channel's send gate. Dropping the last share removes the
/// gate from the map, including when the send future is cancelled.
struct SendGate<'a> {
    gates: &'a DashMap<ChannelId, Arc<Mutex<()>>>,
    channel_id: &'a ChannelId,
    gate: Arc<Mutex<()>>,
}

impl<'a> SendGate<'a> {
    fn acquire(gates: &'a DashMap<ChannelId, Arc<Mutex<()>>>, channel_id: &'a ChannelId) -> Self {
        let gate = Arc::clone(&gates.entry(channel_id.clone()).or_default());
        Self {
            gates,
            channel_id,
            gate,
        }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }
}

impl Drop for SendGate<'_> {
    fn drop(&mut self) {
        // Ours plus the map's.
        self.gates.remove_if(self.channel_id, |_, gate| {
            Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(gate) == 2
        });
    }
}
