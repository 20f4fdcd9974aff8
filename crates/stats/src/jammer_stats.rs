//! Per-jammer scoring and lead statistics.

use crate::deriver::{absolute_patterns, parse_index, Deriver};
use crate::error::Result;
use crate::view::{Summary, ViewName};
use scoreboard::{GamePattern, GameScope, PathPattern, Snapshot};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

const JAM_SCORE: &str = "Period(*).Jam(*).TeamJam(*).JamScore";
const LEAD: &str = "Period(*).Jam(*).TeamJam(*).Lead";
const JAMMER: &str = "Period(*).Jam(*).TeamJam(*).Fielding(Jammer).Skater";
const SKATER_NAME: &str = "Team(*).Skater(*).Name";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JammerSummary {
    pub name: String,
    pub team: u8,
    pub jam_count: u32,
    pub total_score: i64,
    /// Own jam points minus the opponent's in the same jams.
    pub net_score: i64,
    pub mean_net_per_jam: f64,
    pub lead_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JammerStats {
    /// Sorted by team, then name.
    pub jammers: Vec<JammerSummary>,
}

#[derive(Debug, Default)]
struct TeamJam<'a> {
    score: i64,
    lead: bool,
    jammer: Option<&'a str>,
}

#[derive(Debug, Default)]
struct Totals {
    jam_count: u32,
    total_score: i64,
    net_score: i64,
    lead_count: u32,
}

pub struct JammerStatsDeriver {
    jam_score: GamePattern,
    lead: GamePattern,
    jammer: GamePattern,
    skater_name: GamePattern,
    patterns: Vec<PathPattern>,
}

impl JammerStatsDeriver {
    pub fn new() -> Result<Self> {
        let jam_score = GamePattern::parse(JAM_SCORE)?;
        let lead = GamePattern::parse(LEAD)?;
        let jammer = GamePattern::parse(JAMMER)?;
        let skater_name = GamePattern::parse(SKATER_NAME)?;
        let patterns = absolute_patterns([&jam_score, &lead, &jammer, &skater_name]);
        Ok(Self {
            jam_score,
            lead,
            jammer,
            skater_name,
            patterns,
        })
    }

    pub fn compute(&self, snapshot: &Snapshot, game: &GameScope) -> JammerStats {
        // (period, jam, team) -> what happened for that team in that jam
        let mut team_jams: HashMap<(u32, u32, u8), TeamJam<'_>> = HashMap::new();
        // (team, skater id) -> name
        let mut names: HashMap<(u8, &str), &str> = HashMap::new();

        for (path, value) in snapshot.paths() {
            if let Some(captures) = self.skater_name.captures_in(path, game) {
                if let (Some(team), Some(skater), Some(name)) =
                    (parse_index::<u8>(captures.first()), captures.get(1), value.as_str())
                {
                    names.insert((team, *skater), name);
                }
                continue;
            }

            let (captures, field) = if let Some(c) = self.jam_score.captures_in(path, game) {
                (c, Field::JamScore)
            } else if let Some(c) = self.lead.captures_in(path, game) {
                (c, Field::Lead)
            } else if let Some(c) = self.jammer.captures_in(path, game) {
                (c, Field::Jammer)
            } else {
                continue;
            };

            let (Some(period), Some(jam), Some(team)) = (
                parse_index::<u32>(captures.first()),
                parse_index::<u32>(captures.get(1)),
                parse_index::<u8>(captures.get(2)),
            ) else {
                continue;
            };

            let entry = team_jams.entry((period, jam, team)).or_default();
            match field {
                Field::JamScore => entry.score = value.as_i64().unwrap_or(0),
                Field::Lead => entry.lead = value.as_bool().unwrap_or(false),
                Field::Jammer => entry.jammer = value.as_str().filter(|s| !s.is_empty()),
            }
        }

        let mut totals: BTreeMap<(u8, &str), Totals> = BTreeMap::new();
        for (&(period, jam, team), team_jam) in &team_jams {
            let Some(skater) = team_jam.jammer else {
                continue;
            };
            let opponent = team_jams
                .get(&(period, jam, opponent_of(team)))
                .map(|t| t.score)
                .unwrap_or(0);

            let t = totals.entry((team, skater)).or_default();
            t.jam_count += 1;
            t.total_score += team_jam.score;
            t.net_score += team_jam.score - opponent;
            if team_jam.lead {
                t.lead_count += 1;
            }
        }

        let mut jammers: Vec<JammerSummary> = totals
            .into_iter()
            .map(|((team, skater), t)| JammerSummary {
                name: names.get(&(team, skater)).copied().unwrap_or(skater).to_string(),
                team,
                jam_count: t.jam_count,
                total_score: t.total_score,
                net_score: t.net_score,
                mean_net_per_jam: t.net_score as f64 / t.jam_count as f64,
                lead_count: t.lead_count,
            })
            .collect();
        jammers.sort_by(|a, b| a.team.cmp(&b.team).then_with(|| a.name.cmp(&b.name)));

        JammerStats { jammers }
    }
}

enum Field {
    JamScore,
    Lead,
    Jammer,
}

fn opponent_of(team: u8) -> u8 {
    if team == 1 {
        2
    } else {
        1
    }
}

impl Deriver for JammerStatsDeriver {
    fn view(&self) -> ViewName {
        ViewName::JammerStats
    }

    fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    fn derive(&self, snapshot: &Snapshot, game: Option<&GameScope>) -> Summary {
        Summary::JammerStats(self.compute(snapshot, game.unwrap_or(&GameScope::Current)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreboard::{ChangeSet, StateValue};

    fn team_jam(period: u32, jam: u32, team: u8, jammer: &str, score: i64, lead: bool) -> Vec<(String, StateValue)> {
        let prefix = format!(
            "ScoreBoard.CurrentGame.Period({}).Jam({}).TeamJam({})",
            period, jam, team
        );
        vec![
            (format!("{}.Fielding(Jammer).Skater", prefix), jammer.into()),
            (format!("{}.JamScore", prefix), score.into()),
            (format!("{}.Lead", prefix), lead.into()),
        ]
    }

    fn name(team: u8, skater: &str, name: &str) -> (String, StateValue) {
        (
            format!("ScoreBoard.CurrentGame.Team({}).Skater({}).Name", team, skater),
            name.into(),
        )
    }

    fn make_snapshot(changes: Vec<(String, StateValue)>) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.merge(&changes.into_iter().collect::<ChangeSet>());
        snapshot
    }

    #[test]
    fn test_jammer_totals_and_net() {
        let deriver = JammerStatsDeriver::new().unwrap();
        let mut changes = Vec::new();
        changes.extend(team_jam(1, 1, 1, "h1", 4, true));
        changes.extend(team_jam(1, 1, 2, "a1", 0, false));
        changes.extend(team_jam(1, 2, 1, "h1", 0, false));
        changes.extend(team_jam(1, 2, 2, "a2", 9, true));
        changes.push(name(1, "h1", "Hitty"));
        changes.push(name(2, "a1", "Zed"));
        changes.push(name(2, "a2", "Ace"));

        let stats = deriver.compute(&make_snapshot(changes), &GameScope::Current);
        let names: Vec<&str> = stats.jammers.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names, vec!["Hitty", "Ace", "Zed"]);

        let hitty = &stats.jammers[0];
        assert_eq!(hitty.jam_count, 2);
        assert_eq!(hitty.total_score, 4);
        assert_eq!(hitty.net_score, 4 - 9);
        assert_eq!(hitty.lead_count, 1);
        assert_eq!(hitty.mean_net_per_jam, -2.5);

        let ace = &stats.jammers[1];
        assert_eq!((ace.team, ace.jam_count, ace.net_score, ace.lead_count), (2, 1, 9, 1));
    }

    #[test]
    fn test_unnamed_jammer_uses_skater_id() {
        let deriver = JammerStatsDeriver::new().unwrap();
        let stats = deriver.compute(
            &make_snapshot(team_jam(1, 1, 2, "skater-7", 3, false)),
            &GameScope::Current,
        );

        assert_eq!(stats.jammers.len(), 1);
        assert_eq!(stats.jammers[0].name, "skater-7");
        assert_eq!(stats.jammers[0].net_score, 3);
    }

    #[test]
    fn test_empty_jammer_slot_is_skipped() {
        let deriver = JammerStatsDeriver::new().unwrap();
        let stats = deriver.compute(&make_snapshot(team_jam(1, 1, 1, "", 2, false)), &GameScope::Current);
        assert!(stats.jammers.is_empty());
        assert_eq!(
            serde_json::to_value(deriver.empty(None)).unwrap(),
            serde_json::json!({"jammers": []})
        );
    }
}
