//! Scoreboard WebSocket handler.
//!
//! Adapts the [`ScoreboardConnector`] to the [`WsHandler`] lifecycle:
//! - connect: mark open, send registration for every known topic
//! - message: parse `{"state": …}` from text or UTF-8 binary frames, merge,
//!   dispatch (all under one lock)
//! - disconnect: mark closed; everything else is kept for the next connect

use crate::connector::{ApplyOutcome, ScoreboardConnector};
use crate::error::Error;
use crate::protocol::{endpoint_url, parse_state_update};
use async_trait::async_trait;
use common::error::Result;
use common::{ControlCommand, WsHandler};
use metrics::{counter, gauge};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

/// Upstream handler owning the shared connector.
pub struct ScoreboardHandler {
    url: String,
    connector: Arc<Mutex<ScoreboardConnector>>,
}

impl ScoreboardHandler {
    pub fn new(connector: ScoreboardConnector) -> Self {
        let url = endpoint_url(connector.endpoint());
        Self {
            url,
            connector: Arc::new(Mutex::new(connector)),
        }
    }

    /// Lock the connector. A handler that panicked mid-dispatch does not
    /// invalidate the snapshot, so a poisoned lock is recovered.
    pub fn connector(&self) -> MutexGuard<'_, ScoreboardConnector> {
        self.connector.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_open(&self) -> bool {
        self.connector().is_open()
    }

    pub fn snapshot_len(&self) -> usize {
        self.connector().snapshot().len()
    }

    /// Process one inbound text message. `Ok(None)` when it carried no state.
    pub fn handle_text(&self, msg: &str) -> crate::error::Result<Option<ApplyOutcome>> {
        counter!("derby_upstream_messages_total").increment(1);
        let Some(changes) = parse_state_update(msg)? else {
            debug!("Ignoring scoreboard message without state");
            return Ok(None);
        };

        counter!("derby_upstream_changes_total").increment(changes.len() as u64);

        let mut connector = self.connector();
        let outcome = connector.apply(&changes);
        gauge!("derby_snapshot_keys").set(connector.snapshot().len() as f64);

        Ok(Some(outcome))
    }

    /// Process one inbound binary frame carrying the same JSON as a text frame.
    pub fn handle_binary(&self, data: &[u8]) -> crate::error::Result<Option<ApplyOutcome>> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::MalformedMessage(format!("binary frame is not UTF-8: {}", e)))?;
        self.handle_text(text)
    }

    fn report(result: crate::error::Result<Option<ApplyOutcome>>) {
        match result {
            Ok(Some(outcome)) => debug!(
                "Scoreboard update applied: v{}, {} keys changed, {} interests fired",
                outcome.version,
                outcome.changed_keys,
                outcome.fired.len()
            ),
            Ok(None) => {}
            Err(e) => {
                // Malformed input is dropped; the connection stays up
                warn!("Discarding malformed scoreboard message: {}", e);
                counter!("derby_upstream_malformed_total").increment(1);
            }
        }
    }
}

#[async_trait]
impl WsHandler for ScoreboardHandler {
    fn url(&self) -> &str {
        &self.url
    }

    fn on_connect_message(&self) -> Option<String> {
        let mut connector = self.connector();
        connector.mark_open();
        match connector.registration_message() {
            Ok(msg) => msg,
            Err(e) => {
                error!("Failed to build registration message: {}", e);
                None
            }
        }
    }

    async fn on_message(&self, msg: &str) -> Result<()> {
        Self::report(self.handle_text(msg));
        Ok(())
    }

    async fn on_binary_message(&self, data: &[u8]) -> Result<()> {
        Self::report(self.handle_binary(data));
        Ok(())
    }

    async fn on_disconnect(&self) {
        self.connector().mark_closed();
        warn!("Scoreboard connection lost");
    }

    async fn on_reconnect(&self) {
        info!("Scoreboard connected, {} topics registered", self.connector().topics().len());
    }

    async fn handle_command(&self, cmd: ControlCommand) -> Option<String> {
        match cmd {
            ControlCommand::Register(topics) => match self.connector().register_topics(topics) {
                Ok(msg) => msg,
                Err(e) => {
                    error!("Failed to build registration message: {}", e);
                    None
                }
            },
            ControlCommand::Shutdown => None,
        }
    }

    fn topics(&self) -> Vec<String> {
        self.connector().topics().to_vec()
    }
}
