//! Wires derivers to the connector and keeps the summary cache current.

use crate::cache::SummaryCache;
use crate::cumulative_score::CumulativeScoreDeriver;
use crate::deriver::Deriver;
use crate::error::Result;
use crate::games::GamesDeriver;
use crate::jammer_stats::JammerStatsDeriver;
use crate::penalties_by_type::PenaltiesByTypeDeriver;
use crate::rosters::RostersDeriver;
use crate::view::{Summary, SummaryKey, ViewName, ViewScope};
use metrics::counter;
use scoreboard::{ChangeSet, GameScope, Predicate, ScoreboardConnector, Snapshot};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// A freshly derived summary on its way to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub key: SummaryKey,
    /// Snapshot version the summary was derived from.
    pub version: u64,
    pub summary: Summary,
}

pub type UpdateSender = mpsc::UnboundedSender<Update>;
pub type UpdateReceiver = mpsc::UnboundedReceiver<Update>;

pub struct StatsEngine {
    derivers: Vec<Arc<dyn Deriver>>,
    cache: Arc<SummaryCache>,
}

impl StatsEngine {
    pub fn new() -> Self {
        Self {
            derivers: Vec::new(),
            cache: Arc::new(SummaryCache::new()),
        }
    }

    /// Engine with every built-in view.
    pub fn with_default_derivers() -> Result<Self> {
        let mut engine = Self::new();
        engine.register(Arc::new(CumulativeScoreDeriver::new()?));
        engine.register(Arc::new(PenaltiesByTypeDeriver::new()?));
        engine.register(Arc::new(JammerStatsDeriver::new()?));
        engine.register(Arc::new(RostersDeriver::new()?));
        engine.register(Arc::new(GamesDeriver::new()?));
        Ok(engine)
    }

    /// Add a deriver. A later deriver for the same view replaces the earlier one.
    pub fn register(&mut self, deriver: Arc<dyn Deriver>) {
        self.derivers.retain(|d| d.view() != deriver.view());
        self.derivers.push(deriver);
    }

    pub fn views(&self) -> Vec<ViewName> {
        self.derivers.iter().map(|d| d.view()).collect()
    }

    pub fn cache(&self) -> &Arc<SummaryCache> {
        &self.cache
    }

    fn deriver(&self, view: ViewName) -> Option<&Arc<dyn Deriver>> {
        self.derivers.iter().find(|d| d.view() == view)
    }

    /// Register every deriver's topics and interest with the connector.
    ///
    /// Call before the upstream connection starts; topics recorded here go out
    /// with the registration message on connect.
    pub fn install(&self, connector: &mut ScoreboardConnector, updates: UpdateSender) -> Result<()> {
        for deriver in &self.derivers {
            let view = deriver.view();
            let topics = deriver.topics();
            info!("Installing {} deriver ({} topics)", view, topics.len());
            connector.register_topics(topics)?;

            let predicate = deriver.predicate();
            let gate = predicate.clone();
            let deriver = deriver.clone();
            let cache = self.cache.clone();
            let updates = updates.clone();

            connector.on_change(predicate, move |snapshot: &Snapshot, changes: &ChangeSet| {
                for key in affected_keys(view, &gate, changes) {
                    let summary = deriver.derive(snapshot, key.game.as_ref());
                    let version = snapshot.version();
                    counter!("derby_derivations_total", "view" => view.as_str()).increment(1);
                    debug!("Derived {} at snapshot v{}", key, version);

                    cache.insert(key.clone(), version, summary.clone());
                    if updates.send(Update { key, version, summary }).is_err() {
                        warn!("Update channel closed, dropping {} update", view);
                    }
                }
            });
        }
        Ok(())
    }

    /// True when the cache already holds a summary for the update's key from a
    /// newer snapshot. Anyone who reads the cache has seen something newer.
    pub fn is_superseded(&self, update: &Update) -> bool {
        self.cache
            .version(&update.key)
            .is_some_and(|cached| cached > update.version)
    }

    /// Latest summary for `key`; the empty summary if nothing was derived yet.
    /// `None` when no deriver publishes the view.
    pub fn current(&self, key: &SummaryKey) -> Option<Summary> {
        let deriver = self.deriver(key.view)?;
        Some(
            self.cache
                .get(key)
                .unwrap_or_else(|| deriver.empty(key.game.as_ref())),
        )
    }
}

impl Default for StatsEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary keys a change-set invalidates for `view`: one per game scope among
/// the matching keys, or the single global key.
pub fn affected_keys(view: ViewName, predicate: &Predicate, changes: &ChangeSet) -> Vec<SummaryKey> {
    let mut matching = changes.paths().filter(|p| predicate.matches(p)).peekable();

    match view.scope() {
        ViewScope::Global => match matching.peek() {
            Some(_) => vec![SummaryKey::new(view, None)],
            None => Vec::new(),
        },
        ViewScope::PerGame => {
            let mut scopes: Vec<GameScope> = Vec::new();
            for path in matching {
                if let Some(scope) = path.game_scope() {
                    if !scopes.contains(&scope) {
                        scopes.push(scope);
                    }
                }
            }
            scopes
                .into_iter()
                .map(|scope| SummaryKey::new(view, Some(scope)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cumulative_score::JamScore;

    fn make_engine() -> (StatsEngine, ScoreboardConnector, UpdateReceiver) {
        let engine = StatsEngine::with_default_derivers().unwrap();
        let mut connector = ScoreboardConnector::new("localhost:8000");
        let (tx, rx) = mpsc::unbounded_channel();
        engine.install(&mut connector, tx).unwrap();
        (engine, connector, rx)
    }

    fn drain(rx: &mut UpdateReceiver) -> Vec<Update> {
        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        updates
    }

    #[test]
    fn test_install_registers_all_topics() {
        let (_engine, connector, _rx) = make_engine();
        assert!(connector
            .topics()
            .iter()
            .any(|t| t == "ScoreBoard.Game(*).Period(*).Jam(*).TeamJam(*).TotalScore"));
        assert!(connector
            .topics()
            .iter()
            .any(|t| t == "ScoreBoard.CurrentGame.Team(*).Skater(*).Penalty(*).Code"));
        assert!(connector.topics().iter().any(|t| t == "ScoreBoard.CurrentGame.Game"));
    }

    #[test]
    fn test_two_change_sets_build_cumulative_score() {
        let (engine, mut connector, mut rx) = make_engine();

        connector.apply(&ChangeSet::from_iter([(
            "ScoreBoard.CurrentGame.Period(1).Jam(1).TeamJam(1).TotalScore",
            4i64,
        )]));
        connector.apply(&ChangeSet::from_iter([(
            "ScoreBoard.CurrentGame.Period(1).Jam(1).TeamJam(2).TotalScore",
            7i64,
        )]));

        let updates = drain(&mut rx);
        assert_eq!(updates.len(), 2);
        assert!(updates.iter().all(|u| u.key.view == ViewName::CumulativeScore));

        let key = SummaryKey::for_request(ViewName::CumulativeScore, None);
        let expected = Summary::CumulativeScore(crate::cumulative_score::CumulativeScore {
            jam_scores: vec![JamScore {
                period_number: 1,
                jam_number: 1,
                team1_score: 4,
                team2_score: 7,
            }],
        });
        assert_eq!(engine.current(&key), Some(expected.clone()));
        assert_eq!(updates[1].summary, expected);
    }

    #[test]
    fn test_queued_update_is_superseded_by_newer_derivation() {
        let (engine, mut connector, mut rx) = make_engine();
        for score in [4i64, 10] {
            connector.apply(&ChangeSet::from_iter([(
                "ScoreBoard.CurrentGame.Period(1).Jam(1).TeamJam(1).TotalScore",
                score,
            )]));
        }

        let updates = drain(&mut rx);
        assert_eq!(updates.iter().map(|u| u.version).collect::<Vec<_>>(), vec![1, 2]);
        assert!(engine.is_superseded(&updates[0]));
        assert!(!engine.is_superseded(&updates[1]));
    }

    #[test]
    fn test_current_before_any_update_is_empty() {
        let (engine, _connector, _rx) = make_engine();
        let key = SummaryKey::for_request(ViewName::CumulativeScore, Some("*"));
        assert_eq!(
            serde_json::to_value(engine.current(&key).unwrap()).unwrap(),
            serde_json::json!({"jamScores": []})
        );
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_unrelated_change_triggers_nothing() {
        let (engine, mut connector, mut rx) = make_engine();
        connector.apply(&ChangeSet::from_iter([("ScoreBoard.CurrentGame.Clock(Jam).Time", 12000i64)]));
        assert!(drain(&mut rx).is_empty());
        assert!(engine.cache().is_empty());
    }

    #[test]
    fn test_one_update_per_affected_game() {
        let (engine, mut connector, mut rx) = make_engine();
        connector.apply(&ChangeSet::from_iter([
            ("ScoreBoard.CurrentGame.Period(1).Jam(1).TeamJam(1).TotalScore", 4i64),
            ("ScoreBoard.Game(g1).Period(1).Jam(1).TeamJam(1).TotalScore", 4i64),
            ("ScoreBoard.Game(g1).Period(1).Jam(2).TeamJam(1).TotalScore", 9i64),
        ]));

        let keys: Vec<SummaryKey> = drain(&mut rx).into_iter().map(|u| u.key).collect();
        assert_eq!(
            keys,
            vec![
                SummaryKey::new(ViewName::CumulativeScore, Some(GameScope::Current)),
                SummaryKey::new(ViewName::CumulativeScore, Some(GameScope::Id("g1".into()))),
            ]
        );

        match engine.current(&SummaryKey::for_request(ViewName::CumulativeScore, Some("g1"))) {
            Some(Summary::CumulativeScore(s)) => assert_eq!(s.jam_scores.len(), 2),
            other => panic!("unexpected summary: {:?}", other),
        }
    }

    #[test]
    fn test_games_view_is_global() {
        let (engine, mut connector, mut rx) = make_engine();
        connector.apply(&ChangeSet::from_iter([
            ("ScoreBoard.CurrentGame.Game", "g1"),
            ("ScoreBoard.Game(g1).Team(1).Name", "Home"),
        ]));

        let keys: Vec<SummaryKey> = drain(&mut rx).into_iter().map(|u| u.key).collect();
        assert_eq!(
            keys,
            vec![
                SummaryKey::new(ViewName::Rosters, Some(GameScope::Id("g1".into()))),
                SummaryKey::new(ViewName::Games, None),
            ]
        );
        assert!(engine
            .current(&SummaryKey::for_request(ViewName::Games, Some("g1")))
            .is_some());
    }

    #[test]
    fn test_rosters_view_per_game() {
        let (engine, mut connector, _rx) = make_engine();
        connector.apply(&ChangeSet::from_iter([
            ("ScoreBoard.CurrentGame.Team(2).Skater(s1).Name", "Ann"),
            ("ScoreBoard.CurrentGame.Team(2).Skater(s1).RosterNumber", "12"),
        ]));

        let body = serde_json::to_value(
            engine
                .current(&SummaryKey::for_request(ViewName::Rosters, None))
                .unwrap(),
        )
        .unwrap();
        assert_eq!(body["awayTeam"]["skaters"][0]["name"], "Ann");
        assert_eq!(body["awayTeam"]["skaters"][0]["number"], "12");
    }

    #[test]
    fn test_closed_update_channel_still_caches() {
        let (engine, mut connector, rx) = make_engine();
        drop(rx);
        connector.apply(&ChangeSet::from_iter([(
            "ScoreBoard.CurrentGame.Period(1).Jam(1).TeamJam(1).TotalScore",
            4i64,
        )]));
        assert_eq!(engine.cache().len(), 1);
    }

    #[test]
    fn test_unregistered_view_has_no_summary() {
        let engine = StatsEngine::new();
        assert!(engine
            .current(&SummaryKey::for_request(ViewName::JammerStats, None))
            .is_none());
    }
}
