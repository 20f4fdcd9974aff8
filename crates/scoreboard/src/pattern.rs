//! Declarative path patterns with `(*)` index wildcards.
//!
//! Patterns use the same textual form as scoreboard topic registrations:
//! - `Team(*)` matches any index on a `Team` segment
//! - `Team(1)` matches only index `1`
//! - `Name` matches a segment without an index
//!
//! A pattern matches a key when both have the same number of segments and each
//! segment matches. There is no multi-segment wildcard.

use crate::path::{split_segments, GameScope, PathError, PathKey, ROOT_SEGMENT};
use std::fmt;
use thiserror::Error;

/// Pattern parse error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("{0}")]
    Path(#[from] PathError),
    #[error("wildcard must be a whole index: {0}")]
    PartialWildcard(String),
    #[error("segment names cannot be wildcards: {0}")]
    NameWildcard(String),
}

/// How a segment's index is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexMatch {
    /// Segment must have no index.
    None,
    /// `(*)`: any index.
    Any,
    /// Exact index text.
    Exact(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SegmentPattern {
    name: String,
    index: IndexMatch,
}

/// A parsed path shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    source: String,
    segments: Vec<SegmentPattern>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        let segments = split_segments(pattern)?
            .into_iter()
            .map(|(name, index)| {
                if name.contains('*') {
                    return Err(PatternError::NameWildcard(pattern.to_string()));
                }
                let index = match index {
                    None => IndexMatch::None,
                    Some(i) if i == "*" => IndexMatch::Any,
                    Some(i) if i.contains('*') => {
                        return Err(PatternError::PartialWildcard(pattern.to_string()))
                    }
                    Some(i) => IndexMatch::Exact(i),
                };
                Ok(SegmentPattern { name, index })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            source: pattern.to_string(),
            segments,
        })
    }

    /// The pattern as written (also its topic string).
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn wildcard_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| s.index == IndexMatch::Any)
            .count()
    }

    pub fn matches(&self, key: &PathKey) -> bool {
        self.captures(key).is_some()
    }

    /// Wildcard index values of `key`, in pattern order, when it matches.
    pub fn captures<'k>(&self, key: &'k PathKey) -> Option<Vec<&'k str>> {
        let segments = key.segments();
        if segments.len() != self.segments.len() {
            return None;
        }

        let mut captured = Vec::with_capacity(self.wildcard_count());
        for (pattern, segment) in self.segments.iter().zip(segments) {
            if pattern.name != segment.name {
                return None;
            }
            match (&pattern.index, segment.index.as_deref()) {
                (IndexMatch::None, None) => {}
                (IndexMatch::Any, Some(index)) => captured.push(index),
                (IndexMatch::Exact(expected), Some(index)) if expected == index => {}
                _ => return None,
            }
        }

        Some(captured)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// A game-relative shape, matched under both `ScoreBoard.CurrentGame` and
/// `ScoreBoard.Game(*)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePattern {
    current: PathPattern,
    any_game: PathPattern,
}

impl GamePattern {
    /// `relative` is the part after the game segment, e.g. `Period(*).Jam(*).TeamJam(*).TotalScore`.
    pub fn parse(relative: &str) -> Result<Self, PatternError> {
        let current = PathPattern::parse(&format!("{}.CurrentGame.{}", ROOT_SEGMENT, relative))?;
        let any_game = PathPattern::parse(&format!("{}.Game(*).{}", ROOT_SEGMENT, relative))?;
        Ok(Self {
            current,
            any_game,
        })
    }

    /// Both absolute forms: current game first.
    pub fn patterns(&self) -> [&PathPattern; 2] {
        [&self.current, &self.any_game]
    }

    pub fn matches(&self, key: &PathKey) -> bool {
        self.current.matches(key) || self.any_game.matches(key)
    }

    /// Game-relative wildcard captures, when `key` matches and belongs to `scope`.
    pub fn captures_in<'k>(&self, key: &'k PathKey, scope: &GameScope) -> Option<Vec<&'k str>> {
        match scope {
            GameScope::Current => self.current.captures(key),
            GameScope::Id(id) => {
                let mut captured = self.any_game.captures(key)?;
                if captured.first() != Some(&id.as_str()) {
                    return None;
                }
                captured.remove(0);
                Some(captured)
            }
        }
    }
}

/// Any-of predicate over path patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    patterns: Vec<PathPattern>,
}

impl Predicate {
    pub fn any_of(patterns: impl IntoIterator<Item = PathPattern>) -> Self {
        Self {
            patterns: patterns.into_iter().collect(),
        }
    }

    pub fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    pub fn matches(&self, key: &PathKey) -> bool {
        self.patterns.iter().any(|p| p.matches(key))
    }
}

impl FromIterator<PathPattern> for Predicate {
    fn from_iter<T: IntoIterator<Item = PathPattern>>(iter: T) -> Self {
        Self::any_of(iter)
    }
}
