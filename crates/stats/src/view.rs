//! View names, summary keys, and the closed set of summary shapes.

use crate::cumulative_score::CumulativeScore;
use crate::games::GameInfo;
use crate::jammer_stats::JammerStats;
use crate::penalties_by_type::PenaltyStats;
use crate::rosters::Rosters;
use scoreboard::GameScope;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Whether a view is computed per game or once for the whole scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewScope {
    PerGame,
    Global,
}

/// Published views. The wire name equals the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViewName {
    CumulativeScore,
    PenaltiesByType,
    JammerStats,
    Rosters,
    Games,
}

impl ViewName {
    pub const ALL: [ViewName; 5] = [
        ViewName::CumulativeScore,
        ViewName::PenaltiesByType,
        ViewName::JammerStats,
        ViewName::Rosters,
        ViewName::Games,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewName::CumulativeScore => "CumulativeScore",
            ViewName::PenaltiesByType => "PenaltiesByType",
            ViewName::JammerStats => "JammerStats",
            ViewName::Rosters => "Rosters",
            ViewName::Games => "Games",
        }
    }

    pub fn scope(&self) -> ViewScope {
        match self {
            ViewName::Games => ViewScope::Global,
            _ => ViewScope::PerGame,
        }
    }
}

impl fmt::Display for ViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A view name no deriver publishes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown view: {0}")]
pub struct UnknownView(pub String);

impl FromStr for ViewName {
    type Err = UnknownView;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ViewName::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| UnknownView(s.to_string()))
    }
}

/// Identifies one cached summary: a view, and the game for per-game views.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SummaryKey {
    pub view: ViewName,
    pub game: Option<GameScope>,
}

impl SummaryKey {
    pub fn new(view: ViewName, game: Option<GameScope>) -> Self {
        match view.scope() {
            ViewScope::PerGame => Self {
                view,
                game: Some(game.unwrap_or(GameScope::Current)),
            },
            ViewScope::Global => Self { view, game: None },
        }
    }

    /// Key for a client request carrying an optional `gameId`.
    pub fn for_request(view: ViewName, game_id: Option<&str>) -> Self {
        Self::new(view, Some(GameScope::from_request(game_id)))
    }
}

impl fmt::Display for SummaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.game {
            Some(game) => write!(f, "{}[{}]", self.view, game),
            None => write!(f, "{}", self.view),
        }
    }
}

/// A derived summary. Serialised as the bare inner shape (the push `body`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Summary {
    CumulativeScore(CumulativeScore),
    PenaltiesByType(PenaltyStats),
    JammerStats(JammerStats),
    Rosters(Rosters),
    Games(Vec<GameInfo>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_names_round_trip_through_wire_names() {
        for view in ViewName::ALL {
            assert_eq!(view.as_str().parse::<ViewName>(), Ok(view));
        }
        assert_eq!(
            "Scores".parse::<ViewName>(),
            Err(UnknownView("Scores".to_string()))
        );
    }

    #[test]
    fn test_summary_key_scoping() {
        let key = SummaryKey::for_request(ViewName::CumulativeScore, None);
        assert_eq!(key.game, Some(GameScope::Current));

        let key = SummaryKey::for_request(ViewName::JammerStats, Some("g1"));
        assert_eq!(key.game, Some(GameScope::Id("g1".into())));

        let key = SummaryKey::for_request(ViewName::Games, Some("g1"));
        assert_eq!(key.game, None);
    }

    #[test]
    fn test_empty_cumulative_score_body() {
        let summary = Summary::CumulativeScore(CumulativeScore::default());
        assert_eq!(serde_json::to_value(&summary).unwrap(), serde_json::json!({"jamScores": []}));
    }
}
