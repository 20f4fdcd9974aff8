//! Structured scoreboard path keys.
//!
//! A key is a `.`-separated list of segments, each a name with an optional
//! parenthesised index: `ScoreBoard.Game(2024-03-02_abc).Team(1).Skater(9f1e).Name`.
//! Indexes may contain dots and balanced parentheses, so splitting on `.` alone
//! is not enough.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Root segment every scoreboard key starts with.
pub const ROOT_SEGMENT: &str = "ScoreBoard";

/// Path parse error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("empty segment at byte {0}")]
    EmptySegment(usize),
    #[error("unbalanced parenthesis at byte {0}")]
    Unbalanced(usize),
    #[error("unexpected text after index at byte {0}")]
    TrailingText(usize),
}

/// One segment of a path key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Segment {
    pub name: String,
    pub index: Option<String>,
}

impl Segment {
    pub fn new(name: impl Into<String>, index: Option<&str>) -> Self {
        Self {
            name: name.into(),
            index: index.map(str::to_string),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.index {
            Some(index) => write!(f, "{}({})", self.name, index),
            None => f.write_str(&self.name),
        }
    }
}

/// Which game a key belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GameScope {
    /// `ScoreBoard.CurrentGame.…`
    Current,
    /// `ScoreBoard.Game(<id>).…`
    Id(String),
}

impl GameScope {
    /// Scope requested by a client. Absent, empty, `*` and `current` all mean the current game.
    pub fn from_request(game_id: Option<&str>) -> Self {
        match game_id.map(str::trim) {
            None | Some("") | Some("*") => GameScope::Current,
            Some(id) if id.eq_ignore_ascii_case("current") => GameScope::Current,
            Some(id) => GameScope::Id(id.to_string()),
        }
    }

    /// Key prefix addressing this game.
    pub fn prefix(&self) -> String {
        match self {
            GameScope::Current => format!("{}.CurrentGame", ROOT_SEGMENT),
            GameScope::Id(id) => format!("{}.Game({})", ROOT_SEGMENT, id),
        }
    }
}

impl fmt::Display for GameScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameScope::Current => f.write_str("current"),
            GameScope::Id(id) => f.write_str(id),
        }
    }
}

/// A parsed path key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathKey {
    segments: Vec<Segment>,
}

impl PathKey {
    pub fn parse(key: &str) -> Result<Self, PathError> {
        let segments = split_segments(key)?
            .into_iter()
            .map(|(name, index)| Segment { name, index })
            .collect();
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Name of the last segment (the field).
    pub fn field(&self) -> &str {
        self.segments.last().map(|s| s.name.as_str()).unwrap_or_default()
    }

    /// Index of the first segment called `name`.
    pub fn index_of(&self, name: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.index.as_deref())
    }

    /// Game this key belongs to, if it lives under `ScoreBoard.CurrentGame` or `ScoreBoard.Game(id)`.
    pub fn game_scope(&self) -> Option<GameScope> {
        let root = self.segments.first()?;
        if root.name != ROOT_SEGMENT || root.index.is_some() {
            return None;
        }

        let game = self.segments.get(1)?;
        match (game.name.as_str(), &game.index) {
            ("CurrentGame", None) => Some(GameScope::Current),
            ("Game", Some(id)) => Some(GameScope::Id(id.clone())),
            _ => None,
        }
    }
}

impl FromStr for PathKey {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Split a key into `(name, index)` pairs. Shared with pattern parsing.
pub(crate) fn split_segments(input: &str) -> Result<Vec<(String, Option<String>)>, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    let mut segments = Vec::new();
    let mut name = String::new();
    let mut index: Option<String> = None;
    let mut chars = input.char_indices();

    while let Some((pos, c)) = chars.next() {
        match c {
            '.' => {
                if name.is_empty() {
                    return Err(PathError::EmptySegment(pos));
                }
                segments.push((std::mem::take(&mut name), index.take()));
            }
            '(' if index.is_none() => {
                let mut depth = 1;
                let mut buf = String::new();
                for (_, inner) in chars.by_ref() {
                    match inner {
                        '(' => depth += 1,
                        ')' => {
                            depth -= 1;
                            if depth == 0 {
                                break;
                            }
                        }
                        _ => {}
                    }
                    buf.push(inner);
                }
                if depth != 0 {
                    return Err(PathError::Unbalanced(pos));
                }
                index = Some(buf);
            }
            ')' => return Err(PathError::Unbalanced(pos)),
            _ if index.is_some() => return Err(PathError::TrailingText(pos)),
            _ => name.push(c),
        }
    }

    if name.is_empty() {
        return Err(PathError::EmptySegment(input.len()));
    }
    segments.push((name, index));

    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_total_score_key() {
        let key = PathKey::parse("ScoreBoard.CurrentGame.Period(1).Jam(3).TeamJam(2).TotalScore").unwrap();
        assert_eq!(key.len(), 6);
        assert_eq!(key.index_of("Period"), Some("1"));
        assert_eq!(key.index_of("Jam"), Some("3"));
        assert_eq!(key.index_of("TeamJam"), Some("2"));
        assert_eq!(key.field(), "TotalScore");
        assert_eq!(key.game_scope(), Some(GameScope::Current));
    }

    #[test]
    fn test_index_with_dots_and_parens() {
        let key = PathKey::parse("ScoreBoard.Game(2024-03-02 Bout (A) v1.2).Team(1).Name").unwrap();
        assert_eq!(
            key.game_scope(),
            Some(GameScope::Id("2024-03-02 Bout (A) v1.2".to_string()))
        );
        assert_eq!(key.field(), "Name");
        assert_eq!(key.to_string(), "ScoreBoard.Game(2024-03-02 Bout (A) v1.2).Team(1).Name");
    }

    #[test]
    fn test_non_game_keys_have_no_scope() {
        let key = PathKey::parse("ScoreBoard.Version(release)").unwrap();
        assert_eq!(key.game_scope(), None);

        let key = PathKey::parse("ScoreBoard.Game.Team(1)").unwrap();
        assert_eq!(key.game_scope(), None);
    }

    #[test]
    fn test_malformed_keys() {
        assert_eq!(PathKey::parse(""), Err(PathError::Empty));
        assert_eq!(PathKey::parse("ScoreBoard..Jam"), Err(PathError::EmptySegment(11)));
        assert_eq!(PathKey::parse("ScoreBoard."), Err(PathError::EmptySegment(11)));
        assert_eq!(PathKey::parse("Jam(1"), Err(PathError::Unbalanced(3)));
        assert_eq!(PathKey::parse("Jam)1"), Err(PathError::Unbalanced(3)));
        assert_eq!(PathKey::parse("Jam(1)x.Team"), Err(PathError::TrailingText(6)));
    }

    #[test]
    fn test_game_scope_from_request() {
        assert_eq!(GameScope::from_request(None), GameScope::Current);
        assert_eq!(GameScope::from_request(Some("*")), GameScope::Current);
        assert_eq!(GameScope::from_request(Some("")), GameScope::Current);
        assert_eq!(
            GameScope::from_request(Some("g1")),
            GameScope::Id("g1".to_string())
        );
        assert_eq!(GameScope::Id("g1".into()).prefix(), "ScoreBoard.Game(g1)");
    }
}
