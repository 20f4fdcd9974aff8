//! Update router: stats engine → WebSocket fan-out.
//!
//! Consumes [`Update`]s from the engine's channel in order and pushes each to
//! the subscribers of its summary key. Also answers subscriptions with the
//! current summary.

use crate::client::{ClientRegistry, ClientState};
use crate::error::{GatewayError, Result};
use crate::protocol::ViewPush;
use metrics::counter;
use stats::{StatsEngine, SummaryKey, Update, UpdateReceiver, ViewName};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Routes derived summaries to WebSocket clients.
pub struct UpdateRouter {
    registry: Arc<ClientRegistry>,
    engine: Arc<StatsEngine>,
}

impl UpdateRouter {
    pub fn new(registry: Arc<ClientRegistry>, engine: Arc<StatsEngine>) -> Self {
        Self { registry, engine }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub fn engine(&self) -> &Arc<StatsEngine> {
        &self.engine
    }

    /// Run until shutdown or until every update sender is gone.
    pub async fn run(
        self: Arc<Self>,
        mut updates: UpdateReceiver,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        info!("UpdateRouter running");

        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("UpdateRouter received shutdown signal");
                    break;
                }

                update = updates.recv() => {
                    match update {
                        Some(update) => {
                            if let Err(e) = self.publish(&update) {
                                warn!("Failed to publish {}: {:?}", update.key, e);
                                counter!("gateway_routing_errors_total").increment(1);
                            }
                        }
                        None => {
                            warn!("Update channel closed");
                            break;
                        }
                    }
                }
            }
        }

        info!("UpdateRouter stopped");
        Ok(())
    }

    /// Serialize once and push to every subscriber of the update's key.
    ///
    /// An update older than the cached summary is skipped: a client that
    /// subscribed while it was queued already got the newer one, and the
    /// newer update follows it in the queue.
    pub fn publish(&self, update: &Update) -> Result<usize> {
        let view = update.key.view;
        if self.engine.is_superseded(update) {
            debug!("Skipping superseded {} at v{}", update.key, update.version);
            counter!("derby_updates_superseded_total", "view" => view.as_str()).increment(1);
            return Ok(0);
        }
        let json = ViewPush::new(view.as_str(), Some(&update.summary)).to_json()?;

        let stats = self.registry.broadcast(&update.key, &json);
        counter!("derby_updates_published_total", "view" => view.as_str()).increment(1);
        if stats.dropped > 0 {
            counter!("gateway_dropped_pushes_total").increment(stats.dropped as u64);
        }

        debug!(
            "Published {} to {} clients ({} dropped, {} closed)",
            update.key, stats.sent, stats.dropped, stats.closed
        );
        Ok(stats.sent)
    }

    /// Subscribe `client` to `data_type` and push the current summary.
    ///
    /// The client joins the group before the cache is read, so an update
    /// racing with this call is seen either here or via [`Self::publish`].
    /// An unknown view gets a `null` body and no subscription.
    pub fn subscribe(&self, client: &ClientState, data_type: &str, game_id: Option<&str>) -> Result<()> {
        let Ok(view) = data_type.parse::<ViewName>() else {
            warn!("Client {} subscribed to unknown view '{}'", client.id, data_type);
            return client.send_text(ViewPush::new(data_type, None).to_json()?);
        };

        let key = SummaryKey::for_request(view, game_id);
        self.registry.subscribe(&client.id, key.clone())?;
        counter!("gateway_subscriptions_total").increment(1);

        let summary = self.engine.current(&key);
        client.send_text(ViewPush::new(view.as_str(), summary.as_ref()).to_json()?)?;
        debug!("Sent current {} to client {}", key, client.id);
        Ok(())
    }

    pub fn unsubscribe(&self, client: &ClientState, data_type: &str, game_id: Option<&str>) -> Result<()> {
        let view = data_type
            .parse::<ViewName>()
            .map_err(|_| GatewayError::UnknownView(data_type.to_string()))?;
        self.registry
            .unsubscribe(&client.id, &SummaryKey::for_request(view, game_id))
    }
}
