//! Client state and registry management.
//!
//! Uses DashMap so subscribe, unsubscribe and broadcast never contend on a
//! single lock. Clients are grouped by [`SummaryKey`]: one group per view and game.

use crate::error::{GatewayError, Result};
use axum::extract::ws::Message;
use chrono::Utc;
use dashmap::{DashMap, DashSet};
use stats::SummaryKey;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique client identifier.
pub type ClientId = Uuid;

/// Outbound buffer per client. Summaries are small and replace each other,
/// so a client this far behind only loses stale pushes.
pub const CLIENT_CHANNEL_BUFFER_SIZE: usize = 256;

/// State for a single connected client.
pub struct ClientState {
    /// Unique client identifier.
    pub id: ClientId,
    /// Channel to the client's socket writer task.
    pub tx: mpsc::Sender<Message>,
    /// Current subscriptions.
    pub subscriptions: DashSet<SummaryKey>,
    /// Timestamp when client connected.
    pub connected_at: i64,
    /// Timestamp of last ping or pong received.
    pub last_ping: AtomicI64,
}

impl ClientState {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            id: Uuid::new_v4(),
            tx,
            subscriptions: DashSet::new(),
            connected_at: now,
            last_ping: AtomicI64::new(now),
        }
    }

    /// Queue a text frame without waiting.
    pub fn send_text(&self, text: String) -> Result<()> {
        self.tx.try_send(Message::Text(text.into()))?;
        Ok(())
    }

    /// Queue a raw frame. Returns false if the buffer is full or closed.
    pub fn try_send_raw(&self, msg: Message) -> bool {
        self.tx.try_send(msg).is_ok()
    }

    pub fn update_ping(&self) {
        self.last_ping
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_ping_time(&self) -> i64 {
        self.last_ping.load(Ordering::Relaxed)
    }

    pub fn is_subscribed(&self, key: &SummaryKey) -> bool {
        self.subscriptions.contains(key)
    }
}

/// Per-client results of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    pub sent: usize,
    /// Buffer full; the push was dropped for that client only.
    pub dropped: usize,
    /// Channel closed; the client was unregistered.
    pub closed: usize,
}

/// Registry of connected clients and their subscription groups.
pub struct ClientRegistry {
    /// Client ID → Client State.
    clients: DashMap<ClientId, Arc<ClientState>>,
    /// Summary key → subscribed client IDs.
    groups: DashMap<SummaryKey, DashSet<ClientId>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    /// Register a new client.
    pub fn register(&self, client: Arc<ClientState>) -> ClientId {
        let id = client.id;
        self.clients.insert(id, client);
        info!("Client {} registered", id);
        id
    }

    /// Unregister a client and remove it from every group.
    pub fn unregister(&self, client_id: &ClientId) {
        if let Some((_, client)) = self.clients.remove(client_id) {
            for key in client.subscriptions.iter() {
                if let Some(group) = self.groups.get(&*key) {
                    group.remove(client_id);
                }
            }
            self.groups.retain(|_, members| !members.is_empty());
            info!("Client {} unregistered", client_id);
        }
    }

    pub fn get(&self, client_id: &ClientId) -> Option<Arc<ClientState>> {
        self.clients.get(client_id).map(|r| r.clone())
    }

    /// Add a client to the group for `key`, creating the group if needed.
    pub fn subscribe(&self, client_id: &ClientId, key: SummaryKey) -> Result<()> {
        let client = self
            .get(client_id)
            .ok_or_else(|| GatewayError::ClientNotFound(client_id.to_string()))?;

        client.subscriptions.insert(key.clone());
        self.join_group(client_id, key)
    }

    /// Add `client_id` to the group for `key`. An `unregister` may have run
    /// since the caller looked the client up; its id is then taken back out
    /// so no group keeps a member that is gone.
    fn join_group(&self, client_id: &ClientId, key: SummaryKey) -> Result<()> {
        self.groups.entry(key.clone()).or_default().insert(*client_id);

        if !self.clients.contains_key(client_id) {
            if let Some(group) = self.groups.get(&key) {
                group.remove(client_id);
            }
            self.groups.remove_if(&key, |_, members| members.is_empty());
            return Err(GatewayError::ClientNotFound(client_id.to_string()));
        }

        debug!("Client {} subscribed to {}", client_id, key);
        Ok(())
    }

    /// Remove a client from the group for `key`.
    pub fn unsubscribe(&self, client_id: &ClientId, key: &SummaryKey) -> Result<()> {
        let client = self
            .get(client_id)
            .ok_or_else(|| GatewayError::ClientNotFound(client_id.to_string()))?;

        client.subscriptions.remove(key);
        if let Some(group) = self.groups.get(key) {
            group.remove(client_id);
        }
        self.groups.remove_if(key, |_, members| members.is_empty());

        debug!("Client {} unsubscribed from {}", client_id, key);
        Ok(())
    }

    /// Clients currently in the group for `key`.
    pub fn subscribers(&self, key: &SummaryKey) -> Vec<Arc<ClientState>> {
        let Some(ids) = self.groups.get(key) else {
            return Vec::new();
        };
        let ids: Vec<ClientId> = ids.iter().map(|id| *id).collect();
        ids.into_iter()
            .filter_map(|id| self.get(&id))
            .collect()
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Total (client, key) subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.groups.iter().map(|g| g.value().len()).sum()
    }

    /// Send pre-serialized `json` to every subscriber of `key`.
    ///
    /// A full buffer drops the push for that client; a closed channel
    /// unregisters the client. Neither affects delivery to the others.
    pub fn broadcast(&self, key: &SummaryKey, json: &str) -> BroadcastStats {
        let mut stats = BroadcastStats::default();
        let mut gone = Vec::new();

        for client in self.subscribers(key) {
            match client.tx.try_send(Message::Text(json.to_string().into())) {
                Ok(()) => stats.sent += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("Client {} buffer full, dropping {} push", client.id, key);
                    stats.dropped += 1;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("Client {} channel closed", client.id);
                    stats.closed += 1;
                    gone.push(client.id);
                }
            }
        }

        for id in gone {
            self.unregister(&id);
        }

        stats
    }

    /// Remove clients that haven't pinged in `max_idle_ms`.
    pub fn cleanup_stale_clients(&self, max_idle_ms: i64) -> usize {
        let now = Utc::now().timestamp_millis();
        let stale_ids: Vec<ClientId> = self
            .clients
            .iter()
            .filter(|entry| now - entry.value().last_ping_time() > max_idle_ms)
            .map(|entry| *entry.key())
            .collect();

        for id in &stale_ids {
            warn!("Removing stale client {}", id);
            self.unregister(id);
        }
        stale_ids.len()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}
