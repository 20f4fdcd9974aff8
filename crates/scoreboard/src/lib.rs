//! Scoreboard feed model.
//!
//! The scoreboard publishes its state as a flat tree of path keys such as
//! `ScoreBoard.CurrentGame.Period(1).Jam(3).TeamJam(1).TotalScore`. This crate:
//! - Parses path keys into structured segments ([`PathKey`])
//! - Matches keys against declarative shapes with `(*)` wildcards ([`PathPattern`])
//! - Merges incoming change-sets into a versioned [`Snapshot`]
//! - Dispatches each change-set to the interests whose predicate it satisfies
//!   ([`ScoreboardConnector`])
//! - Speaks the upstream wire dialect over a [`common::WsManager`] ([`ScoreboardHandler`])
//!
//! ## Processing order
//!
//! ```text
//! {"state": {...}}  →  ChangeSet  →  Snapshot::merge  →  matching interests (registration order)
//! ```

pub mod connector;
pub mod error;
pub mod handler;
pub mod path;
pub mod pattern;
pub mod protocol;
pub mod snapshot;
pub mod value;

pub use connector::{ApplyOutcome, InterestId, ScoreboardConnector, StateHandler};
pub use error::{Error, Result};
pub use handler::ScoreboardHandler;
pub use path::{GameScope, PathError, PathKey, Segment};
pub use pattern::{GamePattern, PathPattern, PatternError, Predicate};
pub use snapshot::{ChangeEntry, ChangeSet, Snapshot};
pub use value::StateValue;
