//! Scoreboard WebSocket wire format.
//!
//! Outbound: `{"action": "Register", "paths": [...]}`
//! Inbound:  `{"state": {"<path key>": <value>, ...}}`

use crate::error::Result;
use crate::snapshot::ChangeSet;
use crate::value::StateValue;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Scoreboard WebSocket path, appended to a bare `host:port` endpoint.
pub const WS_PATH: &str = "/WS/";

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    action: &'static str,
    paths: &'a [String],
}

#[derive(Debug, Deserialize)]
struct StateUpdate {
    #[serde(default)]
    state: Option<Map<String, Value>>,
}

/// Build a topic registration message.
pub fn build_register_message(paths: &[String]) -> Result<String> {
    let msg = RegisterRequest {
        action: "Register",
        paths,
    };
    Ok(serde_json::to_string(&msg)?)
}

/// Parse an inbound message into a change-set.
///
/// Returns `Ok(None)` for valid JSON without a `state` object (acknowledgements,
/// heartbeats). Entries whose value is not a scalar are skipped.
pub fn parse_state_update(text: &str) -> Result<Option<ChangeSet>> {
    let update: StateUpdate = serde_json::from_str(text)?;
    let Some(state) = update.state else {
        return Ok(None);
    };

    let mut changes = ChangeSet::new();
    for (key, value) in state {
        match StateValue::from_json(&value) {
            Some(v) => changes.push(key, v),
            None => warn!("Skipping non-scalar value for {}", key),
        }
    }

    Ok(Some(changes))
}

/// Normalise a configured endpoint into a WebSocket URL.
///
/// `192.168.86.33:8000` becomes `ws://192.168.86.33:8000/WS/`; URLs that
/// already carry a scheme are returned unchanged.
pub fn endpoint_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.starts_with("ws://") || endpoint.starts_with("wss://") {
        endpoint.to_string()
    } else {
        format!("ws://{}{}", endpoint.trim_end_matches('/'), WS_PATH)
    }
}
