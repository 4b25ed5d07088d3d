use std::sync::Arc;

use unfiltered_shared::protocol::MessageEvent;
use unfiltered_shared::{ConfigError, IdentifierObfuscator, UserId};

use crate::authority::{authorize_channel, ChannelAuthority};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::keys::KeyRegistry;
use crate::messaging::MessageService;
use crate::rooms::ChannelRooms;
use crate::session::{spawn_session, SessionHandle};
use crate::store::{KeyDirectory, MessageStore};

/// Shared application state handed to every session.
pub struct AppState {
    pub config: ServerConfig,
    pub obfuscator: Arc<IdentifierObfuscator>,
    pub rooms: Arc<ChannelRooms>,
    pub messages: MessageService,
    pub keys: KeyRegistry,
    pub authority: Arc<dyn ChannelAuthority>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn MessageStore>,
        directory: Arc<dyn KeyDirectory>,
        authority: Arc<dyn ChannelAuthority>,
    ) -> std::result::Result<Self, ConfigError> {
        let obfuscator = Arc::new(IdentifierObfuscator::new(config.id_derive_secret.clone())?);
        let rooms = Arc::new(ChannelRooms::new());
        let messages = MessageService::new(
            store,
            Arc::clone(&rooms),
            Arc::clone(&obfuscator),
            config.history_limit,
            config.max_content_size,
        );

        Ok(Self {
            config,
            obfuscator,
            rooms,
            messages,
            keys: KeyRegistry::new(directory),
            authority,
        })
    }

    /// Open a session for a connection already authenticated as `user_id`.
    pub fn connect(self: &Arc<Self>, user_id: UserId) -> SessionHandle {
        spawn_session(Arc::clone(self), user_id)
    }

    /// Recent history of the channel behind `channel_token`, newest first.
    pub async fn history(
        &self,
        user_id: &UserId,
        channel_token: &str,
        limit: Option<usize>,
    ) -> Result<Vec<MessageEvent>> {
        let channel = authorize_channel(
            self.authority.as_ref(),
            &self.obfuscator,
            user_id,
            channel_token,
        )
        .await?;
        self.messages.history(&channel, limit).await
    }
}
