//! Scoreboard connector: topic registry, merged snapshot, and change dispatch.
//!
//! The connector is transport-agnostic. [`crate::ScoreboardHandler`] drives it
//! from a live socket; tests drive it directly.

use crate::error::Result;
use crate::pattern::Predicate;
use crate::protocol::build_register_message;
use crate::snapshot::{ChangeSet, Snapshot};
use tracing::{debug, info};

/// Receives the full post-merge snapshot whenever a change-set satisfies its predicate.
pub trait StateHandler: Send + 'static {
    fn on_state_change(&mut self, snapshot: &Snapshot, changes: &ChangeSet);
}

impl<F> StateHandler for F
where
    F: FnMut(&Snapshot, &ChangeSet) + Send + 'static,
{
    fn on_state_change(&mut self, snapshot: &Snapshot, changes: &ChangeSet) {
        self(snapshot, changes)
    }
}

/// Runs on every successful connect; returns topics to register.
type ConnectHandler = Box<dyn FnMut() -> Vec<String> + Send>;

/// Position of an interest in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterestId(pub usize);

struct Interest {
    predicate: Predicate,
    handler: Box<dyn StateHandler>,
}

/// Result of applying one change-set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Snapshot version after the merge.
    pub version: u64,
    /// Keys inserted or changed by the merge.
    pub changed_keys: usize,
    /// Interests invoked, in registration order.
    pub fired: Vec<InterestId>,
}

/// Owns the snapshot and the interests registered against it.
pub struct ScoreboardConnector {
    endpoint: String,
    open: bool,
    snapshot: Snapshot,
    topics: Vec<String>,
    interests: Vec<Interest>,
    connect_handlers: Vec<ConnectHandler>,
}

impl ScoreboardConnector {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            open: false,
            snapshot: Snapshot::new(),
            topics: Vec::new(),
            interests: Vec::new(),
            connect_handlers: Vec::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Every topic registered so far, in first-registration order.
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Transition to open and run the connect handlers.
    ///
    /// Topics returned by the handlers are recorded; callers send
    /// [`Self::registration_message`] afterwards.
    pub fn mark_open(&mut self) {
        self.open = true;
        info!("Connection to scoreboard opened ({})", self.endpoint);

        let mut requested = Vec::new();
        for handler in self.connect_handlers.iter_mut() {
            requested.extend(handler());
        }
        self.record_topics(requested);
    }

    /// Transition to closed. Interests, topics and the snapshot are kept.
    pub fn mark_closed(&mut self) {
        if self.open {
            info!("Connection to scoreboard closed ({})", self.endpoint);
        }
        self.open = false;
    }

    /// Register a connect handler. Handlers survive reconnects.
    pub fn on_connect<F>(&mut self, handler: F)
    where
        F: FnMut() -> Vec<String> + Send + 'static,
    {
        self.connect_handlers.push(Box::new(handler));
    }

    /// Register interest in change-sets containing a key that satisfies `predicate`.
    pub fn on_change<H: StateHandler>(&mut self, predicate: Predicate, handler: H) -> InterestId {
        let id = InterestId(self.interests.len());
        self.interests.push(Interest {
            predicate,
            handler: Box::new(handler),
        });
        id
    }

    /// Record topics and build the registration message for the new ones.
    ///
    /// Returns `None` when every topic was already registered, or while the
    /// connection is closed (recorded topics go out with the next connect).
    pub fn register_topics<I, S>(&mut self, topics: I) -> Result<Option<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let added = self.record_topics(topics);
        if added.is_empty() || !self.open {
            return Ok(None);
        }

        for topic in &added {
            info!("Registering topic '{}'", topic);
        }
        build_register_message(&added).map(Some)
    }

    /// Registration message for every known topic (sent on connect).
    pub fn registration_message(&self) -> Result<Option<String>> {
        if self.topics.is_empty() {
            return Ok(None);
        }
        build_register_message(&self.topics).map(Some)
    }

    fn record_topics<I, S>(&mut self, topics: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut added = Vec::new();
        for topic in topics {
            let topic = topic.into();
            if !self.topics.contains(&topic) {
                self.topics.push(topic.clone());
                added.push(topic);
            }
        }
        added
    }

    /// Merge a change-set, then invoke every interest whose predicate matches
    /// at least one key of this change-set. Each interest fires at most once.
    pub fn apply(&mut self, changes: &ChangeSet) -> ApplyOutcome {
        let changed = self.snapshot.merge(changes);

        let mut fired = Vec::new();
        for (i, interest) in self.interests.iter_mut().enumerate() {
            if changes.paths().any(|p| interest.predicate.matches(p)) {
                interest.handler.on_state_change(&self.snapshot, changes);
                fired.push(InterestId(i));
            }
        }

        debug!(
            "Applied {} changes (snapshot v{}), {} interests fired",
            changes.len(),
            self.snapshot.version(),
            fired.len()
        );

        ApplyOutcome {
            version: self.snapshot.version(),
            changed_keys: changed.len(),
            fired,
        }
    }
}
