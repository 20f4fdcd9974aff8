//! Per-jam running totals for both teams.

use crate::deriver::{absolute_patterns, parse_index, Deriver};
use crate::error::Result;
use crate::view::{Summary, ViewName};
use scoreboard::{GamePattern, GameScope, PathPattern, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

const TOTAL_SCORE: &str = "Period(*).Jam(*).TeamJam(*).TotalScore";

/// Cumulative score of both teams at the end of one jam.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JamScore {
    pub period_number: u32,
    pub jam_number: u32,
    pub team1_score: i64,
    pub team2_score: i64,
}

impl JamScore {
    fn new(period_number: u32, jam_number: u32) -> Self {
        Self {
            period_number,
            jam_number,
            team1_score: 0,
            team2_score: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeScore {
    /// Sorted by `(period_number, jam_number)`.
    pub jam_scores: Vec<JamScore>,
}

pub struct CumulativeScoreDeriver {
    total_score: GamePattern,
    patterns: Vec<PathPattern>,
}

impl CumulativeScoreDeriver {
    pub fn new() -> Result<Self> {
        let total_score = GamePattern::parse(TOTAL_SCORE)?;
        let patterns = absolute_patterns([&total_score]);
        Ok(Self {
            total_score,
            patterns,
        })
    }

    pub fn compute(&self, snapshot: &Snapshot, game: &GameScope) -> CumulativeScore {
        let mut jams: BTreeMap<(u32, u32), JamScore> = BTreeMap::new();

        for (path, value) in snapshot.paths() {
            let Some(captures) = self.total_score.captures_in(path, game) else {
                continue;
            };
            let (Some(period), Some(jam)) = (
                parse_index::<u32>(captures.first()),
                parse_index::<u32>(captures.get(1)),
            ) else {
                debug!("Skipping total score with non-numeric period/jam: {}", path);
                continue;
            };

            let score = value.as_i64().unwrap_or(0);
            let record = jams
                .entry((period, jam))
                .or_insert_with(|| JamScore::new(period, jam));
            match captures.get(2).copied() {
                Some("1") => record.team1_score = score,
                Some("2") => record.team2_score = score,
                other => debug!("Ignoring total score for team {:?}", other),
            }
        }

        CumulativeScore {
            jam_scores: jams.into_values().collect(),
        }
    }
}

impl Deriver for CumulativeScoreDeriver {
    fn view(&self) -> ViewName {
        ViewName::CumulativeScore
    }

    fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    fn derive(&self, snapshot: &Snapshot, game: Option<&GameScope>) -> Summary {
        Summary::CumulativeScore(self.compute(snapshot, game.unwrap_or(&GameScope::Current)))
    }
}
