//! Team rosters for one game: team names and skaters with roster numbers.

use crate::deriver::{absolute_patterns, Deriver};
use crate::error::Result;
use crate::view::{Summary, ViewName};
use scoreboard::{GamePattern, GameScope, PathPattern, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

const TEAM_NAME: &str = "Team(*).Name";
const SKATER_NAME: &str = "Team(*).Skater(*).Name";
const SKATER_NUMBER: &str = "Team(*).Skater(*).RosterNumber";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterSkater {
    pub id: String,
    pub name: String,
    pub number: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RosterTeam {
    pub name: String,
    /// Sorted by roster number, then name.
    pub skaters: Vec<RosterSkater>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rosters {
    pub home_team: RosterTeam,
    pub away_team: RosterTeam,
}

enum Field {
    TeamName,
    SkaterName,
    SkaterNumber,
}

pub struct RostersDeriver {
    team_name: GamePattern,
    skater_name: GamePattern,
    skater_number: GamePattern,
    patterns: Vec<PathPattern>,
}

impl RostersDeriver {
    pub fn new() -> Result<Self> {
        let team_name = GamePattern::parse(TEAM_NAME)?;
        let skater_name = GamePattern::parse(SKATER_NAME)?;
        let skater_number = GamePattern::parse(SKATER_NUMBER)?;
        let patterns = absolute_patterns([&team_name, &skater_name, &skater_number]);
        Ok(Self {
            team_name,
            skater_name,
            skater_number,
            patterns,
        })
    }

    pub fn compute(&self, snapshot: &Snapshot, game: &GameScope) -> Rosters {
        let mut rosters = Rosters::default();
        let mut skaters: [BTreeMap<&str, RosterSkater>; 2] = [BTreeMap::new(), BTreeMap::new()];

        for (path, value) in snapshot.paths() {
            let (captures, field) = if let Some(c) = self.team_name.captures_in(path, game) {
                (c, Field::TeamName)
            } else if let Some(c) = self.skater_name.captures_in(path, game) {
                (c, Field::SkaterName)
            } else if let Some(c) = self.skater_number.captures_in(path, game) {
                (c, Field::SkaterNumber)
            } else {
                continue;
            };

            let (team, slot) = match captures.first().copied() {
                Some("1") => (&mut rosters.home_team, 0),
                Some("2") => (&mut rosters.away_team, 1),
                _ => continue,
            };
            let text = value.as_str().unwrap_or_default().to_string();

            if let Field::TeamName = field {
                team.name = text;
                continue;
            }
            let Some(id) = captures.get(1).copied() else {
                continue;
            };
            let skater = skaters[slot].entry(id).or_insert_with(|| RosterSkater {
                id: id.to_string(),
                ..RosterSkater::default()
            });
            match field {
                Field::SkaterName => skater.name = text,
                Field::SkaterNumber => skater.number = text,
                Field::TeamName => {}
            }
        }

        let [home, away] = skaters;
        rosters.home_team.skaters = sorted(home);
        rosters.away_team.skaters = sorted(away);
        rosters
    }
}

fn sorted(skaters: BTreeMap<&str, RosterSkater>) -> Vec<RosterSkater> {
    let mut list: Vec<RosterSkater> = skaters.into_values().collect();
    list.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.name.cmp(&b.name)));
    list
}

impl Deriver for RostersDeriver {
    fn view(&self) -> ViewName {
        ViewName::Rosters
    }

    fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    fn derive(&self, snapshot: &Snapshot, game: Option<&GameScope>) -> Summary {
        Summary::Rosters(self.compute(snapshot, game.unwrap_or(&GameScope::Current)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreboard::ChangeSet;

    fn make_snapshot(changes: &[(&str, &str)]) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.merge(&ChangeSet::from_iter(changes.iter().copied()));
        snapshot
    }

    #[test]
    fn test_rosters_for_both_teams() {
        let deriver = RostersDeriver::new().unwrap();
        let snapshot = make_snapshot(&[
            ("ScoreBoard.CurrentGame.Team(1).Name", "Rollers"),
            ("ScoreBoard.CurrentGame.Team(1).Skater(s2).Name", "Bea"),
            ("ScoreBoard.CurrentGame.Team(1).Skater(s2).RosterNumber", "21"),
            ("ScoreBoard.CurrentGame.Team(1).Skater(s1).Name", "Ann"),
            ("ScoreBoard.CurrentGame.Team(1).Skater(s1).RosterNumber", "07"),
            ("ScoreBoard.CurrentGame.Team(2).Name", "Blockers"),
            ("ScoreBoard.CurrentGame.Team(2).Skater(s9).RosterNumber", "99"),
        ]);

        let rosters = deriver.compute(&snapshot, &GameScope::Current);
        assert_eq!(rosters.home_team.name, "Rollers");
        let home: Vec<(&str, &str)> = rosters
            .home_team
            .skaters
            .iter()
            .map(|s| (s.name.as_str(), s.number.as_str()))
            .collect();
        assert_eq!(home, vec![("Ann", "07"), ("Bea", "21")]);

        assert_eq!(rosters.away_team.name, "Blockers");
        assert_eq!(
            rosters.away_team.skaters,
            vec![RosterSkater {
                id: "s9".into(),
                name: String::new(),
                number: "99".into(),
            }]
        );
    }

    #[test]
    fn test_game_scope_selects_rosters() {
        let deriver = RostersDeriver::new().unwrap();
        let snapshot = make_snapshot(&[
            ("ScoreBoard.CurrentGame.Team(1).Name", "Current"),
            ("ScoreBoard.Game(g1).Team(1).Name", "Other"),
            ("ScoreBoard.Game(g1).Team(3).Name", "Nobody"),
        ]);

        let other = deriver.compute(&snapshot, &GameScope::Id("g1".into()));
        assert_eq!(other.home_team.name, "Other");
        assert!(other.away_team.name.is_empty());
    }

    #[test]
    fn test_empty_body() {
        let deriver = RostersDeriver::new().unwrap();
        assert_eq!(
            serde_json::to_value(deriver.empty(None)).unwrap(),
            serde_json::json!({
                "homeTeam": {"name": "", "skaters": []},
                "awayTeam": {"name": "", "skaters": []}
            })
        );
    }
}
