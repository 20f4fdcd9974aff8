//! The deriver interface shared by every view.

use crate::view::{Summary, ViewName, ViewScope};
use scoreboard::{GamePattern, GameScope, PathPattern, Predicate, Snapshot};

/// Computes one view from the full snapshot.
///
/// Implementations are pure: the same snapshot always yields the same summary,
/// and nothing is carried between calls.
pub trait Deriver: Send + Sync + 'static {
    /// The view this deriver publishes.
    fn view(&self) -> ViewName;

    fn scope(&self) -> ViewScope {
        self.view().scope()
    }

    /// Absolute path patterns whose changes invalidate this view.
    fn patterns(&self) -> &[PathPattern];

    /// Predicate registered with the connector.
    fn predicate(&self) -> Predicate {
        self.patterns().iter().cloned().collect()
    }

    /// Topics to register upstream (the pattern strings).
    fn topics(&self) -> Vec<String> {
        self.patterns().iter().map(|p| p.to_string()).collect()
    }

    /// Derive the summary for `game`. Per-game views read `None` as the
    /// current game; global views ignore it.
    fn derive(&self, snapshot: &Snapshot, game: Option<&GameScope>) -> Summary;

    /// Summary before any relevant key has been seen.
    fn empty(&self, game: Option<&GameScope>) -> Summary {
        self.derive(&Snapshot::new(), game)
    }
}

/// Both absolute forms of every game-relative pattern, flattened.
pub(crate) fn absolute_patterns<'a>(patterns: impl IntoIterator<Item = &'a GamePattern>) -> Vec<PathPattern> {
    patterns
        .into_iter()
        .flat_map(|p| p.patterns().map(|abs| abs.clone()))
        .collect()
}

/// Parse a numeric index capture; junk reads as `None`.
pub(crate) fn parse_index<T: std::str::FromStr>(capture: Option<&&str>) -> Option<T> {
    capture.and_then(|c| c.parse().ok())
}
