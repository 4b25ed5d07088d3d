//! Per-connection session actor.
//!
//! A transport adapter (WebSocket, test harness) owns a [`SessionHandle`]:
//! it feeds decoded [`ClientEvent`]s in and drains [`ServerEvent`]s out. The
//! actor exits when either side goes away and purges the connection from
//! every room on the way out.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use unfiltered_shared::protocol::{ClientEvent, SendPayload, ServerEvent};
use unfiltered_shared::UserId;

use crate::authority::authorize_channel;
use crate::error::{AccessError, Result, ServerError};
use crate::rooms::{Connection, ConnectionId};
use crate::state::AppState;

const INBOUND_BUFFER: usize = 32;

pub struct SessionHandle {
    pub connection_id: ConnectionId,
    inbound: mpsc::Sender<ClientEvent>,
    outbound: mpsc::Receiver<Arc<ServerEvent>>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    /// Queue an event from the client. Fails once the session has ended.
    pub async fn submit(&self, event: ClientEvent) -> Result<()> {
        self.inbound
            .send(event)
            .await
            .map_err(|_| ServerError::ConnectionClosed)
    }

    /// Next event for the client, or `None` once the session has ended.
    pub async fn next_event(&mut self) -> Option<Arc<ServerEvent>> {
        self.outbound.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<Arc<ServerEvent>> {
        self.outbound.try_recv().ok()
    }

    /// Close the inbound side and wait for the actor to clean up.
    pub async fn close(self) {
        let SessionHandle {
            inbound,
            outbound,
            task,
            ..
        } = self;
        drop(inbound);
        let _ = task.await;
        drop(outbound);
    }

    /// Split into the raw channel ends and the actor task.
    pub fn into_parts(
        self,
    ) -> (
        mpsc::Sender<ClientEvent>,
        mpsc::Receiver<Arc<ServerEvent>>,
        JoinHandle<()>,
    ) {
        (self.inbound, self.outbound, self.task)
    }
}

/// Start the actor for a connection authenticated as `user_id`.
pub fn spawn_session(state: Arc<AppState>, user_id: UserId) -> SessionHandle {
    let (conn, outbound) = Connection::open(user_id, state.config.connection_buffer);
    let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
    let connection_id = conn.id;

    let session = Session { state, conn };
    let task = tokio::spawn(session.run(inbound_rx));

    SessionHandle {
        connection_id,
        inbound: inbound_tx,
        outbound,
        task,
    }
}

struct Session {
    state: Arc<AppState>,
    conn: Connection,
}

impl Session {
    async fn run(self, mut inbound: mpsc::Receiver<ClientEvent>) {
        info!(connection = %self.conn.id, user = %self.conn.user_id, "Session opened");

        loop {
            tokio::select! {
                event = inbound.recv() => match event {
                    Some(event) => self.dispatch(event).await,
                    None => break,
                },
                _ = self.conn.closed() => break,
            }
        }

        let rooms = self.state.rooms.leave_all(&self.conn.id);
        info!(connection = %self.conn.id, rooms, "Session closed");
    }

    async fn dispatch(&self, event: ClientEvent) {
        if let Err(e) = self.handle(event).await {
            debug!(connection = %self.conn.id, error = %e, "Request rejected");
            self.reply(ServerEvent::Error {
                reason: e.client_message(),
            });
        }
    }

    /// Direct reply to this connection. Unlike messages, a dropped reply
    /// cannot be recovered from history, so it is logged.
    fn reply(&self, event: ServerEvent) -> bool {
        let kind = match &event {
            ServerEvent::Message(_) => "message",
            ServerEvent::Joined { .. } => "joined",
            ServerEvent::Left { .. } => "left",
            ServerEvent::Error { .. } => "error",
        };
        let queued = self.conn.notify(event);
        if !queued {
            warn!(
                connection = %self.conn.id,
                event = kind,
                "Outbound queue full or closed, reply dropped"
            );
        }
        queued
    }

    async fn handle(&self, event: ClientEvent) -> Result<()> {
        let state = &self.state;
        match event {
            ClientEvent::Join { channel_id } => {
                let channel = authorize_channel(
                    state.authority.as_ref(),
                    &state.obfuscator,
                    &self.conn.user_id,
                    &channel_id,
                )
                .await?;
                state.rooms.join(&self.conn, &channel);
                self.reply(ServerEvent::Joined {
                    channel_id: state.obfuscator.obfuscate(&channel),
                });
            }
            ClientEvent::Leave { channel_id } => {
                // Resolved against current rooms so a revoked member can still leave.
                let joined = state.rooms.channels_of(&self.conn.id);
                let channel = state
                    .obfuscator
                    .resolve(&channel_id, &joined)
                    .ok_or(AccessError::ChannelNotFound)?;
                state.rooms.leave(&self.conn.id, channel);
                self.reply(ServerEvent::Left {
                    channel_id: state.obfuscator.obfuscate(channel),
                });
            }
            ClientEvent::Send {
                channel_id,
                content,
                reply_to,
            } => {
                let channel = authorize_channel(
                    state.authority.as_ref(),
                    &state.obfuscator,
                    &self.conn.user_id,
                    &channel_id,
                )
                .await?;
                let payload = SendPayload { content, reply_to };
                state
                    .messages
                    .send(&self.conn.user_id, &channel, &payload)
                    .await?;
            }
        }
        Ok(())
    }
}
