//! WebSocket protocol message types.
//!
//! Client → server: `{"messageType": "Subscribe", "dataType": "<view>", "gameId": "<id>"}`
//! Server → client: `{"dataType": "<view>", "body": <summary or null>}`

use serde::{Deserialize, Serialize};
use stats::Summary;

// ============================================================================
// Client → Server Messages
// ============================================================================

/// Message sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "messageType")]
pub enum ClientMessage {
    /// Subscribe to a view. The current summary is pushed immediately.
    Subscribe {
        #[serde(rename = "dataType")]
        data_type: String,
        /// Absent, empty or `*` means the current game.
        #[serde(rename = "gameId", default)]
        game_id: Option<String>,
    },
    /// Stop receiving a view.
    Unsubscribe {
        #[serde(rename = "dataType")]
        data_type: String,
        #[serde(rename = "gameId", default)]
        game_id: Option<String>,
    },
}

// ============================================================================
// Server → Client Messages
// ============================================================================

/// A view push. `body` is `null` for a view no deriver publishes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewPush<'a> {
    pub data_type: &'a str,
    pub body: Option<&'a Summary>,
}

impl<'a> ViewPush<'a> {
    pub fn new(data_type: &'a str, body: Option<&'a Summary>) -> Self {
        Self { data_type, body }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
