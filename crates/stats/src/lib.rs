//! Aggregate views derived from the scoreboard snapshot.
//!
//! Each view has a [`Deriver`]: a set of path patterns it cares about and a
//! pure function from the full snapshot to a small, client-ready [`Summary`].
//! The [`StatsEngine`] registers every deriver with the connector, recomputes a
//! view only when a change-set touches one of its patterns, caches the result
//! per game, and emits an [`Update`] for the fan-out hub.
//!
//! Every derivation rescans the whole snapshot: O(keys) per relevant update,
//! which is a few hundred keys for a live bout.

pub mod cache;
pub mod cumulative_score;
pub mod deriver;
pub mod engine;
pub mod error;
pub mod games;
pub mod jammer_stats;
pub mod penalties_by_type;
pub mod rosters;
pub mod view;

pub use cache::SummaryCache;
pub use deriver::Deriver;
pub use engine::{affected_keys, StatsEngine, Update, UpdateReceiver, UpdateSender};
pub use error::{Error, Result};
pub use view::{Summary, SummaryKey, UnknownView, ViewName, ViewScope};
