//! Gateway service relaying derived scoreboard views to WebSocket clients.
//!
//! This service:
//! - Keeps one upstream connection to the scoreboard (via [`common::WsManager`])
//! - Recomputes aggregate views as relevant keys change ([`stats::StatsEngine`])
//! - Accepts WebSocket subscriptions per view and game
//! - Pushes every new summary to the subscribers of its view and game
//!
//! ## Architecture
//!
//! ```text
//! Scoreboard WS ({"state": …})
//!         ↓
//! ScoreboardHandler (merge + interest dispatch under one lock)
//!         ↓
//! StatsEngine derivers → SummaryCache
//!         ↓ Update (unbounded mpsc, ordered)
//! UpdateRouter
//!         ↓
//! ClientRegistry (DashMap groups keyed by view + game)
//!         ↓
//! WebSocket clients (bounded channel each)
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod router;
pub mod ws_server;

pub use client::{BroadcastStats, ClientId, ClientRegistry, ClientState};
pub use config::GatewayConfig;
pub use error::{GatewayError, Result};
pub use protocol::{ClientMessage, ViewPush};
pub use router::UpdateRouter;
pub use ws_server::{create_router, ApiError, AppState};
