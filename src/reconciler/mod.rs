//! Drives grading and rescoring when games finish.
//!
//! A game moves `AwaitingCompletion → FinalPendingGrading → Graded`. Grading
//! writes every pick on the game as one batch, then each touched
//! (user, season, week) is rescored from its full pick set and written
//! together with its season record. Everything is recomputed from stored
//! inputs, so replays and administrative recomputes are safe to run at any
//! time.

pub mod locks;
pub mod retry;

pub use locks::KeyedLocks;
pub use retry::{with_retry, RetryPolicy};

use crate::error::{Result, ScoringError};
use crate::models::{
    Game, GameFinal, GameState, ParlaySeasonRecord, ParlayWeekScore, Pick, SeasonKey, WeekKey,
};
use crate::store::{GameStore, PickStore, ScoreStore, UserDirectory};
use crate::utils::grader::{grade_picks, validate_final};
use crate::utils::parlay::{score_week, ScoringRules, WeekScoring};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

/// Outcome of an administrative batch recompute
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<WeekKey>,
    pub failed: Vec<(WeekKey, ScoringError)>,
    /// Picks that were left out of otherwise successful weeks
    pub anomalies: Vec<(WeekKey, ScoringError)>,
    /// Set when the batch stopped early on request
    pub aborted: bool,
}

/// Counters for a finished event stream
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub graded: usize,
    pub failed: usize,
}

/// One row of a season leaderboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub user_id: String,
    pub display_name: String,
    pub total: u64,
    pub weeks_scored: usize,
}

#[derive(Clone)]
pub struct ResultReconciler {
    games: Arc<dyn GameStore>,
    picks: Arc<dyn PickStore>,
    scores: Arc<dyn ScoreStore>,
    rules: ScoringRules,
    retry: RetryPolicy,
    week_locks: Arc<KeyedLocks<WeekKey>>,
    season_locks: Arc<KeyedLocks<SeasonKey>>,
    /// Last known state per game id. Holds one small entry per game ever
    /// seen; never pruned.
    states: Arc<DashMap<String, GameState>>,
}

impl ResultReconciler {
    /// Build a reconciler over a single store that serves all three roles
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: GameStore + PickStore + ScoreStore + 'static,
    {
        Self::from_parts(store.clone(), store.clone(), store)
    }

    pub fn from_parts(
        games: Arc<dyn GameStore>,
        picks: Arc<dyn PickStore>,
        scores: Arc<dyn ScoreStore>,
    ) -> Self {
        Self {
            games,
            picks,
            scores,
            rules: ScoringRules::default(),
            retry: RetryPolicy::default(),
            week_locks: Arc::new(KeyedLocks::new()),
            season_locks: Arc::new(KeyedLocks::new()),
            states: Arc::new(DashMap::new()),
        }
    }

    pub fn with_rules(mut self, rules: ScoringRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn rules(&self) -> &ScoringRules {
        &self.rules
    }

    pub fn game_state(&self, game_id: &str) -> GameState {
        self.states
            .get(game_id)
            .map(|state| *state)
            .unwrap_or(GameState::AwaitingCompletion)
    }

    fn set_state(&self, game_id: &str, state: GameState) {
        debug!("Game {} -> {:?}", game_id, state);
        self.states.insert(game_id.to_string(), state);
    }

    /// Grade a finished game and rescore every week it touches.
    ///
    /// Returns the (user, season, week) keys that were rescored.
    pub async fn grade_game(&self, game_id: &str) -> Result<BTreeSet<WeekKey>> {
        let game = with_retry(&self.retry, "game", || self.games.game(game_id))
            .await?
            .ok_or_else(|| ScoringError::GameNotFound(game_id.to_string()))?;
        self.grade_final(game).await
    }

    /// Subscription entry point: grade against the snapshot in the event
    pub async fn handle_final(&self, event: GameFinal) -> Result<BTreeSet<WeekKey>> {
        self.grade_final(event.game).await
    }

    async fn grade_final(&self, game: Game) -> Result<BTreeSet<WeekKey>> {
        if let Err(e) = validate_final(&game) {
            match e {
                ScoringError::MalformedFinalScore { .. } => {
                    error!("Refusing to grade game {}: {}", game.id, e)
                }
                _ => warn!("Skipping game {}: {}", game.id, e),
            }
            return Err(e);
        }

        self.set_state(&game.id, GameState::FinalPendingGrading);

        let picks = with_retry(&self.retry, "picks_for_game", || {
            self.picks.picks_for_game(&game.id)
        })
        .await?;
        let updates = grade_picks(&picks, &game)?;

        if !updates.is_empty() {
            let batch = updates.as_slice();
            with_retry(&self.retry, "update_results", || {
                self.picks.update_results(batch)
            })
            .await?;
        }

        let keys: BTreeSet<WeekKey> = picks
            .iter()
            .filter(|p| p.game_id == game.id)
            .map(Pick::week_key)
            .collect();
        self.recompute_keys(&keys).await?;

        self.set_state(&game.id, GameState::Graded);
        info!(
            "Graded game {} ({} @ {}, {:?}-{:?}): {} pick(s), {} week(s) rescored",
            game.id,
            game.away_team,
            game.home_team,
            game.away_score,
            game.home_score,
            updates.len(),
            keys.len()
        );

        Ok(keys)
    }

    async fn recompute_keys(&self, keys: &BTreeSet<WeekKey>) -> Result<()> {
        let mut tasks = JoinSet::new();
        for key in keys.iter().cloned() {
            let this = self.clone();
            tasks.spawn(async move {
                let result = this.recompute_week_key(&key).await;
                (key, result)
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(_))) => {}
                Ok((key, Err(e))) => {
                    error!("Failed to rescore {}: {}", key, e);
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    error!("Rescore task failed: {}", e);
                    first_error.get_or_insert(ScoringError::persistence("recompute_week", e));
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn recompute_week(
        &self,
        user_id: &str,
        season: i32,
        week: u32,
    ) -> Result<WeekScoring> {
        self.recompute_week_key(&WeekKey::new(user_id, season, week))
            .await
    }

    /// Reload the full week, rescore it and upsert it with its season record.
    ///
    /// Picks that could not be scored come back in `anomalies`.
    async fn recompute_week_key(&self, key: &WeekKey) -> Result<WeekScoring> {
        let _week_guard = self.week_locks.lock(key).await;

        let picks = with_retry(&self.retry, "picks_for_week", || {
            self.picks.picks_for_week(key)
        })
        .await?;
        let games = self.load_games(key, &picks).await?;
        let WeekScoring { score, anomalies } = score_week(key, &picks, &games, &self.rules);

        // Week lock is always taken before the season lock
        let season_key = key.season_key();
        let _season_guard = self.season_locks.lock(&season_key).await;

        let mut record = with_retry(&self.retry, "season_record", || {
            self.scores.season_record(&season_key)
        })
        .await?
        .unwrap_or_else(|| ParlaySeasonRecord::new(&season_key));
        record.upsert_week(score.clone());

        let (week_ref, record_ref) = (&score, &record);
        with_retry(&self.retry, "upsert_scores", || {
            self.scores.upsert_scores(week_ref, record_ref)
        })
        .await?;

        debug!(
            "Rescored {}: {} point(s), season total {}",
            key, score.total, record.total
        );
        Ok(WeekScoring { score, anomalies })
    }

    /// Games referenced by a week's picks. Unknown ids are simply absent.
    async fn load_games(&self, key: &WeekKey, picks: &[Pick]) -> Result<HashMap<String, Game>> {
        let mut games: HashMap<String, Game> = with_retry(&self.retry, "games_for_week", || {
            self.games.games_for_week(key.season, key.week)
        })
        .await?
        .into_iter()
        .map(|g| (g.id.clone(), g))
        .collect();

        // Picks can point at games scheduled under another week number
        let missing: HashSet<&str> = picks
            .iter()
            .map(|p| p.game_id.as_str())
            .filter(|id| !games.contains_key(*id))
            .collect();
        for game_id in missing {
            if let Some(game) =
                with_retry(&self.retry, "game", || self.games.game(game_id)).await?
            {
                games.insert(game.id.clone(), game);
            }
        }

        Ok(games)
    }

    /// Rescore every week of one user's season and return the stored record
    pub async fn recompute_season(&self, user_id: &str, season: i32) -> Result<ParlaySeasonRecord> {
        let season_key = SeasonKey::new(user_id, season);

        let mut weeks: BTreeSet<u32> = with_retry(&self.retry, "week_keys", || {
            self.picks.week_keys(season)
        })
        .await?
        .into_iter()
        .filter(|k| k.user_id == user_id)
        .map(|k| k.week)
        .collect();

        // Weeks scored earlier but since emptied still need rewriting
        if let Some(existing) = self.season_record(&season_key).await? {
            weeks.extend(existing.weeks.keys().copied());
        }

        for week in weeks {
            self.recompute_week(user_id, season, week).await?;
        }

        Ok(self
            .season_record(&season_key)
            .await?
            .unwrap_or_else(|| ParlaySeasonRecord::new(&season_key)))
    }

    /// Re-grade every final game that has picks in `season`.
    ///
    /// Games are found through the picks themselves, so a game filed under a
    /// different week number than its picks is still covered. Grading only;
    /// pair with `recompute_all` to refresh scores.
    pub async fn regrade_season(&self, season: i32) -> Result<usize> {
        let keys = with_retry(&self.retry, "week_keys", || self.picks.week_keys(season)).await?;

        let mut game_ids = BTreeSet::new();
        for key in &keys {
            let picks = with_retry(&self.retry, "picks_for_week", || {
                self.picks.picks_for_week(key)
            })
            .await?;
            game_ids.extend(picks.into_iter().map(|p| p.game_id));
        }

        let mut graded = 0;
        for game_id in &game_ids {
            let game = match with_retry(&self.retry, "game", || self.games.game(game_id)).await? {
                Some(game) if game.is_final => game,
                Some(_) => continue,
                None => {
                    warn!("Picks reference unknown game {}; not regrading", game_id);
                    continue;
                }
            };

            let picks = with_retry(&self.retry, "picks_for_game", || {
                self.picks.picks_for_game(&game.id)
            })
            .await?;

            let updates = match grade_picks(&picks, &game) {
                Ok(updates) => updates,
                Err(e) => {
                    warn!("Not regrading game {}: {}", game.id, e);
                    continue;
                }
            };
            if !updates.is_empty() {
                let batch = updates.as_slice();
                with_retry(&self.retry, "update_results", || {
                    self.picks.update_results(batch)
                })
                .await?;
            }
            self.set_state(&game.id, GameState::Graded);
            graded += 1;
        }

        info!("Regraded {} final game(s) for season {}", graded, season);
        Ok(graded)
    }

    /// Rescore every (user, week) in `season` that has picks or a stored score.
    ///
    /// `cancel` is checked between weeks. Each week is written atomically, so
    /// stopping early leaves only completed weeks changed.
    pub async fn recompute_all(&self, season: i32, cancel: &AtomicBool) -> Result<BatchReport> {
        let mut keys: BTreeSet<WeekKey> =
            with_retry(&self.retry, "week_keys", || self.picks.week_keys(season))
                .await?
                .into_iter()
                .collect();

        // Weeks scored earlier but since emptied still need rewriting
        let records = with_retry(&self.retry, "season_records", || {
            self.scores.season_records(season)
        })
        .await?;
        for record in &records {
            keys.extend(
                record
                    .weeks
                    .keys()
                    .map(|week| WeekKey::new(&record.user_id, season, *week)),
            );
        }

        let mut report = BatchReport::default();

        info!("Recomputing {} week(s) for season {}", keys.len(), season);
        for key in keys {
            if cancel.load(Ordering::SeqCst) {
                warn!(
                    "Recompute for season {} cancelled after {} week(s)",
                    season,
                    report.completed.len()
                );
                report.aborted = true;
                break;
            }

            match self.recompute_week_key(&key).await {
                Ok(scoring) => {
                    report
                        .anomalies
                        .extend(scoring.anomalies.into_iter().map(|e| (key.clone(), e)));
                    report.completed.push(key);
                }
                Err(e) => {
                    error!("Failed to recompute {}: {}", key, e);
                    report.failed.push((key, e));
                }
            }
        }

        Ok(report)
    }

    /// Consume final notifications until the stream ends
    pub async fn run<S>(&self, mut events: S) -> RunSummary
    where
        S: Stream<Item = GameFinal> + Unpin,
    {
        let mut summary = RunSummary::default();

        while let Some(event) = events.next().await {
            let game_id = event.game.id.clone();
            match self.handle_final(event).await {
                Ok(keys) => {
                    summary.graded += 1;
                    info!("Game {} final; {} week(s) updated", game_id, keys.len());
                }
                Err(e) => {
                    summary.failed += 1;
                    error!("Could not process final for game {}: {}", game_id, e);
                }
            }
        }

        summary
    }

    pub async fn week_score(&self, key: &WeekKey) -> Result<Option<ParlayWeekScore>> {
        with_retry(&self.retry, "week_score", || self.scores.week_score(key)).await
    }

    pub async fn season_record(&self, key: &SeasonKey) -> Result<Option<ParlaySeasonRecord>> {
        with_retry(&self.retry, "season_record", || self.scores.season_record(key)).await
    }

    /// Season leaderboard, highest total first
    pub async fn standings(
        &self,
        season: i32,
        users: &dyn UserDirectory,
    ) -> Result<Vec<Standing>> {
        let records = with_retry(&self.retry, "season_records", || {
            self.scores.season_records(season)
        })
        .await?;

        let mut standings = Vec::with_capacity(records.len());
        for record in records {
            let display_name = users
                .display_name(&record.user_id)
                .await?
                .unwrap_or_else(|| record.user_id.clone());
            standings.push(Standing {
                user_id: record.user_id,
                display_name,
                total: record.total,
                weeks_scored: record.weeks.len(),
            });
        }

        standings.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.user_id.cmp(&b.user_id)));
        Ok(standings)
    }
}
