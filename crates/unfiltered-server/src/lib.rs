//! # unfiltered-server
//!
//! Real-time core of the Unfiltered chat server. Clients encrypt message
//! content end-to-end before it arrives here; the server stores and relays
//! opaque blobs, addresses everything by obfuscated ids, and fans messages
//! out to channel rooms only after they are durably stored.
//!
//! Transports (WebSocket, HTTP) live outside this crate and attach through
//! [`state::AppState::connect`].

pub mod authority;
pub mod config;
pub mod error;
pub mod keys;
pub mod messaging;
pub mod rooms;
pub mod session;
pub mod state;
pub mod store;

pub use error::{AccessError, Result, ServerError, StoreError};
pub use state::AppState;
