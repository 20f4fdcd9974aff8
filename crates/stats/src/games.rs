//! Known games with their teams, and which one is current.

use crate::deriver::Deriver;
use crate::error::Result;
use crate::view::{Summary, ViewName};
use scoreboard::{GameScope, PathPattern, Snapshot};
use serde::Serialize;
use std::collections::BTreeMap;

const CURRENT_GAME: &str = "ScoreBoard.CurrentGame.Game";
const TEAM_NAME: &str = "ScoreBoard.Game(*).Team(*).Name";
const TEAM_COLOR: &str = "ScoreBoard.Game(*).Team(*).UniformColor";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeamInfo {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameInfo {
    pub id: String,
    pub is_current: bool,
    pub home_team: TeamInfo,
    pub away_team: TeamInfo,
}

impl GameInfo {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            is_current: false,
            home_team: TeamInfo::default(),
            away_team: TeamInfo::default(),
        }
    }
}

/// The global `Games` view. Not scoped to a game.
pub struct GamesDeriver {
    current_game: PathPattern,
    team_name: PathPattern,
    team_color: PathPattern,
    patterns: Vec<PathPattern>,
}

impl GamesDeriver {
    pub fn new() -> Result<Self> {
        let current_game = PathPattern::parse(CURRENT_GAME)?;
        let team_name = PathPattern::parse(TEAM_NAME)?;
        let team_color = PathPattern::parse(TEAM_COLOR)?;
        let patterns = vec![current_game.clone(), team_name.clone(), team_color.clone()];
        Ok(Self {
            current_game,
            team_name,
            team_color,
            patterns,
        })
    }

    /// Current game first, the rest by id.
    pub fn compute(&self, snapshot: &Snapshot) -> Vec<GameInfo> {
        let mut games: BTreeMap<&str, GameInfo> = BTreeMap::new();
        let mut current = None;

        for (path, value) in snapshot.paths() {
            if self.current_game.matches(path) {
                current = value.as_str().filter(|id| !id.is_empty());
                continue;
            }

            let (captures, is_name) = if let Some(c) = self.team_name.captures(path) {
                (c, true)
            } else if let Some(c) = self.team_color.captures(path) {
                (c, false)
            } else {
                continue;
            };
            let (Some(id), Some(team)) = (captures.first().copied(), captures.get(1).copied()) else {
                continue;
            };

            let game = games.entry(id).or_insert_with(|| GameInfo::new(id));
            let team = match team {
                "1" => &mut game.home_team,
                "2" => &mut game.away_team,
                _ => continue,
            };
            let text = value.as_str().unwrap_or_default().to_string();
            if is_name {
                team.name = text;
            } else {
                team.color = text;
            }
        }

        if let Some(id) = current {
            games.entry(id).or_insert_with(|| GameInfo::new(id)).is_current = true;
        }

        let mut list: Vec<GameInfo> = games.into_values().collect();
        list.sort_by(|a, b| b.is_current.cmp(&a.is_current).then_with(|| a.id.cmp(&b.id)));
        list
    }
}

impl Deriver for GamesDeriver {
    fn view(&self) -> ViewName {
        ViewName::Games
    }

    fn patterns(&self) -> &[PathPattern] {
        &self.patterns
    }

    fn derive(&self, snapshot: &Snapshot, _game: Option<&GameScope>) -> Summary {
        Summary::Games(self.compute(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreboard::ChangeSet;

    #[test]
    fn test_games_list() {
        let deriver = GamesDeriver::new().unwrap();
        let mut snapshot = Snapshot::new();
        snapshot.merge(&ChangeSet::from_iter([
            ("ScoreBoard.Game(a-1).Team(1).Name", "Rollers"),
            ("ScoreBoard.Game(a-1).Team(2).Name", "Blockers"),
            ("ScoreBoard.Game(b-2).Team(1).Name", "Home"),
            ("ScoreBoard.Game(b-2).Team(1).UniformColor", "Red"),
            ("ScoreBoard.CurrentGame.Game", "b-2"),
        ]));

        let games = deriver.compute(&snapshot);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].id, "b-2");
        assert!(games[0].is_current);
        assert_eq!(
            games[0].home_team,
            TeamInfo {
                name: "Home".into(),
                color: "Red".into()
            }
        );
        assert_eq!(games[1].id, "a-1");
        assert!(!games[1].is_current);
        assert_eq!(games[1].away_team.name, "Blockers");
    }

    #[test]
    fn test_current_game_without_teams_is_listed() {
        let deriver = GamesDeriver::new().unwrap();
        let mut snapshot = Snapshot::new();
        snapshot.merge(&ChangeSet::from_iter([("ScoreBoard.CurrentGame.Game", "g9")]));

        let body = serde_json::to_value(deriver.derive(&snapshot, None)).unwrap();
        assert_eq!(
            body,
            serde_json::json!([{
                "id": "g9",
                "isCurrent": true,
                "homeTeam": {"name": "", "color": ""},
                "awayTeam": {"name": "", "color": ""}
            }])
        );
        assert_eq!(serde_json::to_value(deriver.empty(None)).unwrap(), serde_json::json!([]));
    }

    #[test]
    fn test_topics_are_global() {
        let deriver = GamesDeriver::new().unwrap();
        assert_eq!(
            deriver.topics(),
            vec![
                "ScoreBoard.CurrentGame.Game".to_string(),
                "ScoreBoard.Game(*).Team(*).Name".to_string(),
                "ScoreBoard.Game(*).Team(*).UniformColor".to_string(),
            ]
        );
    }
}
