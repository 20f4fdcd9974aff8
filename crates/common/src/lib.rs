//! Upstream WebSocket plumbing shared by the derby stats services.
//!
//! The [`WsManager`] owns the socket lifecycle (handshake, ping/pong,
//! reconnection with backoff, runtime control commands) and delegates every
//! event to a [`WsHandler`] implementation that knows the feed's dialect.

pub mod error;
pub mod messages;
pub mod ws_handler;
pub mod ws_manager;

pub use error::Error;
pub use messages::ControlCommand;
pub use ws_handler::WsHandler;
pub use ws_manager::{WsManager, WsManagerConfig};
