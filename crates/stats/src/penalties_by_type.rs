//! Penalty counts per team and code, and per jam.

use crate::deriver::{absolute_patterns, parse_index, Deriver};
use crate::error::Result;
use crate::view::{Summary, ViewName};
use scoreboard::{GamePattern, GameScope, PathPattern, Snapshot, StateValue};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

/// Penalty codes counted per team, in display order.
pub const PENALTY_CODES: [&str; 14] = [
    "A", "B", "C", "D", "E", "F", "G", "I", "L", "M", "O", "P", "X", "Z",
];

pub const TEAMS: [u8; 2] = [1, 2];

const CODE: &str = "Team(*).Skater(*).Penalty(*).Code";
const PERIOD: &str = "Team(*).Skater(*).Penalty(*).PeriodNumber";
const JAM: &str = "Team(*).Skater(*).Penalty(*).JamNumber";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JamPenaltyCounts {
    pub home_team_count: u32,
    pub away_team_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PenaltyStats {
    /// team -> code -> count. Both teams and every known code are always present.
    pub penalty_counts_by_type_by_team: BTreeMap<u8, BTreeMap<String, u32>>,
    /// period -> jam -> counts, for penalties with a known period and jam.
    pub penalty_counts_by_jam_by_team: BTreeMap<u32, BTreeMap<u32, JamPenaltyCounts>>,
}

impl Default for PenaltyStats {
    fn default() -> Self {
        let zeroes: BTreeMap<String, u32> = PENALTY_CODES.iter().map(|c| (c.to_string(), 0)).collect();
        Self {
            penalty_counts_by_type_by_team: TEAMS.iter().map(|t| (*t, zeroes.clone())).collect(),
            penalty_counts_by_jam_by_team: BTreeMap::new(),
        }
    }
}

/// One penalty slot assembled from its separate keys.
#[derive(Debug, Default)]
struct PenaltyRecord {
    code: Option<String>,
    period: Option<u32>,
    jam: Option<u32>,
}

pub struct PenaltiesByTypeDeriver {
    code: GamePattern,
    period: GamePattern,
    jam: GamePattern,
    patterns: Vec<PathPattern>,
}

impl PenaltiesByTypeDeriver {
    pub fn new() -> Result<Self> {
        let code = GamePattern::parse(CODE)?;
        let period = GamePattern::parse(PERIOD)?;
        let jam = GamePattern::parse(JAM)?;
        let patterns = absolute_patterns([&code, &period, &jam]);
        Ok(Self {
            code,
            period,
            jam,
            patterns,
        })
    }

    pub fn compute(&self, snapshot: &Snapshot, game: &GameScope) -> PenaltyStats {
        let mut records: HashMap<(u8, &str, &str), PenaltyRecord> = HashMap::new();

        for (path, value) in snapshot.paths() {
            let (captures, field) = if let Some(c) = self.code.captures_in(path, game) {
                (c, Field::Code)
            } else if let Some(c) = self.period.captures_in(path, game) {
                (c, Field::Period)
            } else if let Some(c) = self.jam.captures_in(path, game) {
                (c, Field::Jam)
            } else {
                continue;
            };

            let Some(team) = parse_index::<u8>(captures.first()).filter(|t| TEAMS.contains(t)) else {
                continue;
            };
            let (Some(skater), Some(penalty)) = (captures.get(1), captures.get(2)) else {
                continue;
            };

            let record = records.entry((team, *skater, *penalty)).or_default();
            match field {
                Field::Code => record.code = penalty_code(value),
                Field::Period => record.period = positive(value),
                Field::Jam => record.jam = positive(value),
            }
        }

        let mut stats = PenaltyStats::default();
        for ((team, _, _), record) in records {
            let Some(code) = record.code else {
                continue;
            };
            let Some(count) = stats
                .penalty_counts_by_type_by_team
                .get_mut(&team)
                .and_then(|codes| codes.get_mut(&code))
            else {
                warn!("Unknown penalty code '{}' for team {}", code, team);
                continue;
            };
            *count += 1;

            if let (Some(period), Some(jam)) = (record.period, record.jam) {
                let counts = stats
                    .penalty_counts_by_jam_by_team
                    .entry(period)
                    .or_default()
                    .entry(jam)
                    .or_default();
                if team == 1 {
                    counts.home_team_count += 1;
                } else {
                    counts.away_team_count += 1;
                }
            }
        }

        stats
    }
}

enum Field {
    Code,
    Period,
    Jam,
}

/// Upper-cased code; empty or null means the slot holds no penalty.
fn penalty_code(value: &StateValue) -> Option<String> {
    value
        .as_str()
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
}

fn positive(value: &StateValue) -> Option<u32> {
    value
        .as_i64()
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

impl Deriver for PenaltiesByTypeDeriver {
    fn view(&self) -> ViewName {
        ViewName::PenaltiesByType
    }

    fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    fn derive(&self, snapshot: &Snapshot, game: Option<&GameScope>) -> Summary {
        Summary::PenaltiesByType(self.compute(snapshot, game.unwrap_or(&GameScope::Current)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreboard::ChangeSet;

    fn make_snapshot(changes: Vec<(&str, StateValue)>) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.merge(&changes.into_iter().collect::<ChangeSet>());
        snapshot
    }

    fn penalty(team: u8, skater: &str, n: u32, code: &str, period: i64, jam: i64) -> Vec<(String, StateValue)> {
        let prefix = format!("ScoreBoard.CurrentGame.Team({}).Skater({}).Penalty({})", team, skater, n);
        vec![
            (format!("{}.Code", prefix), code.into()),
            (format!("{}.PeriodNumber", prefix), period.into()),
            (format!("{}.JamNumber", prefix), jam.into()),
        ]
    }

    #[test]
    fn test_empty_has_every_code_for_both_teams() {
        let deriver = PenaltiesByTypeDeriver::new().unwrap();
        let stats = deriver.compute(&Snapshot::new(), &GameScope::Current);

        for team in TEAMS {
            let codes = &stats.penalty_counts_by_type_by_team[&team];
            assert_eq!(codes.len(), PENALTY_CODES.len());
            assert!(codes.values().all(|c| *c == 0));
        }
        assert!(stats.penalty_counts_by_jam_by_team.is_empty());
    }

    #[test]
    fn test_counts_by_type_and_jam() {
        let deriver = PenaltiesByTypeDeriver::new().unwrap();
        let mut changes = penalty(1, "s1", 1, "X", 1, 3);
        changes.extend(penalty(1, "s1", 2, "x", 1, 5));
        changes.extend(penalty(1, "s2", 1, "B", 1, 3));
        changes.extend(penalty(2, "s9", 1, "X", 1, 3));

        let mut snapshot = Snapshot::new();
        snapshot.merge(&changes.into_iter().collect::<ChangeSet>());
        let stats = deriver.compute(&snapshot, &GameScope::Current);

        assert_eq!(stats.penalty_counts_by_type_by_team[&1]["X"], 2);
        assert_eq!(stats.penalty_counts_by_type_by_team[&1]["B"], 1);
        assert_eq!(stats.penalty_counts_by_type_by_team[&2]["X"], 1);
        assert_eq!(stats.penalty_counts_by_type_by_team[&2]["B"], 0);

        assert_eq!(
            stats.penalty_counts_by_jam_by_team[&1][&3],
            JamPenaltyCounts {
                home_team_count: 2,
                away_team_count: 1
            }
        );
        assert_eq!(stats.penalty_counts_by_jam_by_team[&1][&5].home_team_count, 1);
    }

    #[test]
    fn test_unknown_code_and_missing_jam() {
        let deriver = PenaltiesByTypeDeriver::new().unwrap();
        let snapshot = make_snapshot(vec![
            ("ScoreBoard.CurrentGame.Team(1).Skater(s1).Penalty(1).Code", "Q".into()),
            ("ScoreBoard.CurrentGame.Team(2).Skater(s2).Penalty(1).Code", "G".into()),
            ("ScoreBoard.CurrentGame.Team(2).Skater(s2).Penalty(1).PeriodNumber", 2i64.into()),
            ("ScoreBoard.CurrentGame.Team(2).Skater(s3).Penalty(1).Code", "".into()),
        ]);

        let stats = deriver.compute(&snapshot, &GameScope::Current);
        let total: u32 = stats
            .penalty_counts_by_type_by_team
            .values()
            .flat_map(|codes| codes.values())
            .sum();
        assert_eq!(total, 1);
        assert_eq!(stats.penalty_counts_by_type_by_team[&2]["G"], 1);
        assert!(stats.penalty_counts_by_jam_by_team.is_empty());
    }

    #[test]
    fn test_body_uses_string_keys() {
        let deriver = PenaltiesByTypeDeriver::new().unwrap();
        let snapshot = make_snapshot(
            penalty(2, "s1", 1, "P", 1, 4)
                .iter()
                .map(|(k, v)| (k.as_str(), v.clone()))
                .collect(),
        );

        let body = serde_json::to_value(deriver.derive(&snapshot, None)).unwrap();
        assert_eq!(body["penaltyCountsByTypeByTeam"]["2"]["P"], 1);
        assert_eq!(body["penaltyCountsByTypeByTeam"]["1"]["P"], 0);
        assert_eq!(
            body["penaltyCountsByJamByTeam"]["1"]["4"],
            serde_json::json!({"homeTeamCount": 0, "awayTeamCount": 1})
        );
    }
}
