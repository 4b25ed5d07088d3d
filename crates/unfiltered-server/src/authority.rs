//! Authorization collaborator.
//!
//! The core makes no membership decisions. Before a connection may join,
//! send to or read a channel, the session asks the [`ChannelAuthority`] which
//! channels the identity may use and resolves the client's channel token
//! against that list only.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;

use unfiltered_shared::{ChannelId, IdentifierObfuscator, UserId};

use crate::error::{AccessError, StoreError};

#[async_trait]
pub trait ChannelAuthority: Send + Sync {
    /// Channels `user_id` is a member of.
    async fn channels_for(&self, user_id: &UserId) -> Result<Vec<ChannelId>, StoreError>;
}

/// Resolve an obfuscated channel token to a channel the user belongs to.
pub async fn authorize_channel(
    authority: &dyn ChannelAuthority,
    obfuscator: &IdentifierObfuscator,
    user_id: &UserId,
    token: &str,
) -> Result<ChannelId, AccessError> {
    let channels = authority.channels_for(user_id).await.map_err(|e| {
        tracing::warn!(error = %e, "Membership lookup failed");
        AccessError::ChannelNotFound
    })?;

    obfuscator
        .resolve(token, &channels)
        .cloned()
        .ok_or(AccessError::ChannelNotFound)
}

/// Fixed membership table for development and tests.
#[derive(Default)]
pub struct StaticMembership {
    members: RwLock<HashMap<UserId, HashSet<ChannelId>>>,
}

impl StaticMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn grant(&self, user_id: &UserId, channel_id: &ChannelId) {
        self.members
            .write()
            .await
            .entry(user_id.clone())
            .or_default()
            .insert(channel_id.clone());
    }

    pub async fn revoke(&self, user_id: &UserId, channel_id: &ChannelId) {
        if let Some(channels) = self.members.write().await.get_mut(user_id) {
            channels.remove(channel_id);
        }
    }
}

#[async_trait]
impl ChannelAuthority for StaticMembership {
    async fn channels_for(&self, user_id: &UserId) -> Result<Vec<ChannelId>, StoreError> {
        let mut channels: Vec<ChannelId> = self
            .members
            .read()
            .await
            .get(user_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort();
        Ok(channels)
    }
}
