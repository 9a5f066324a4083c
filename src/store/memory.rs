use crate::error::{Result, ScoringError};
use crate::models::{
    Game, ParlaySeasonRecord, ParlayWeekScore, Pick, PickResultUpdate, SeasonKey, WeekKey,
};
use crate::store::{GameStore, PickStore, ScoreStore, UserDirectory};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

/// Everything the store holds, in a serializable shape
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeagueSnapshot {
    #[serde(default)]
    pub users: HashMap<String, String>,
    #[serde(default)]
    pub games: Vec<Game>,
    #[serde(default)]
    pub picks: Vec<Pick>,
    #[serde(default)]
    pub seasons: Vec<ParlaySeasonRecord>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, String>,
    games: HashMap<String, Game>,
    picks: HashMap<String, Pick>,
    seasons: HashMap<SeasonKey, ParlaySeasonRecord>,
}

/// In-process store backed by hash maps
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: LeagueSnapshot) -> Self {
        let inner = Inner {
            users: snapshot.users,
            games: snapshot
                .games
                .into_iter()
                .map(|g| (g.id.clone(), g))
                .collect(),
            picks: snapshot
                .picks
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            seasons: snapshot
                .seasons
                .into_iter()
                .map(|s| (s.key(), s))
                .collect(),
        };
        Self {
            inner: RwLock::new(inner),
        }
    }

    pub async fn snapshot(&self) -> LeagueSnapshot {
        let inner = self.inner.read().await;

        let mut games: Vec<Game> = inner.games.values().cloned().collect();
        games.sort_by(|a, b| a.kickoff.cmp(&b.kickoff).then_with(|| a.id.cmp(&b.id)));

        let mut picks: Vec<Pick> = inner.picks.values().cloned().collect();
        picks.sort_by(|a, b| a.id.cmp(&b.id));

        let mut seasons: Vec<ParlaySeasonRecord> = inner.seasons.values().cloned().collect();
        seasons.sort_by_key(|s| s.key());

        LeagueSnapshot {
            users: inner.users.clone(),
            games,
            picks,
            seasons,
        }
    }

    /// Insert or replace a game, as the score feed would
    pub async fn put_game(&self, game: Game) {
        self.inner.write().await.games.insert(game.id.clone(), game);
    }

    pub async fn remove_game(&self, game_id: &str) -> Option<Game> {
        self.inner.write().await.games.remove(game_id)
    }

    pub async fn put_pick(&self, pick: Pick) {
        self.inner.write().await.picks.insert(pick.id.clone(), pick);
    }

    pub async fn pick(&self, pick_id: &str) -> Option<Pick> {
        self.inner.read().await.picks.get(pick_id).cloned()
    }

    pub async fn put_user(&self, user_id: &str, display_name: &str) {
        self.inner
            .write()
            .await
            .users
            .insert(user_id.to_string(), display_name.to_string());
    }
}

#[async_trait]
impl GameStore for MemoryStore {
    async fn game(&self, game_id: &str) -> Result<Option<Game>> {
        Ok(self.inner.read().await.games.get(game_id).cloned())
    }

    async fn games_for_week(&self, season: i32, week: u32) -> Result<Vec<Game>> {
        let inner = self.inner.read().await;
        Ok(inner
            .games
            .values()
            .filter(|g| g.season == season && g.week == week)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl PickStore for MemoryStore {
    async fn picks_for_game(&self, game_id: &str) -> Result<Vec<Pick>> {
        let inner = self.inner.read().await;
        let mut picks: Vec<Pick> = inner
            .picks
            .values()
            .filter(|p| p.game_id == game_id)
            .cloned()
            .collect();
        picks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(picks)
    }

    async fn picks_for_week(&self, key: &WeekKey) -> Result<Vec<Pick>> {
        let inner = self.inner.read().await;
        let mut picks: Vec<Pick> = inner
            .picks
            .values()
            .filter(|p| p.week_key() == *key)
            .cloned()
            .collect();
        picks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(picks)
    }

    async fn week_keys(&self, season: i32) -> Result<Vec<WeekKey>> {
        let inner = self.inner.read().await;
        let keys: BTreeSet<WeekKey> = inner
            .picks
            .values()
            .filter(|p| p.season == season)
            .map(|p| p.week_key())
            .collect();
        Ok(keys.into_iter().collect())
    }

    async fn update_results(&self, updates: &[PickResultUpdate]) -> Result<()> {
        let mut inner = self.inner.write().await;

        // Validate the whole batch before touching anything
        if let Some(missing) = updates
            .iter()
            .find(|u| !inner.picks.contains_key(&u.pick_id))
        {
            return Err(ScoringError::persistence(
                "update_results",
                format!("pick {} does not exist", missing.pick_id),
            ));
        }

        for update in updates {
            if let Some(pick) = inner.picks.get_mut(&update.pick_id) {
                pick.result = update.result;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    async fn upsert_scores(
        &self,
        week: &ParlayWeekScore,
        season: &ParlaySeasonRecord,
    ) -> Result<()> {
        if week.key().season_key() != season.key() {
            return Err(ScoringError::persistence(
                "upsert_scores",
                format!("week {} does not belong to season {}", week.key(), season.key()),
            ));
        }

        let mut record = season.clone();
        record.upsert_week(week.clone());
        self.inner.write().await.seasons.insert(record.key(), record);
        Ok(())
    }

    async fn week_score(&self, key: &WeekKey) -> Result<Option<ParlayWeekScore>> {
        let inner = self.inner.read().await;
        Ok(inner
            .seasons
            .get(&key.season_key())
            .and_then(|s| s.weeks.get(&key.week))
            .cloned())
    }

    async fn season_record(&self, key: &SeasonKey) -> Result<Option<ParlaySeasonRecord>> {
        Ok(self.inner.read().await.seasons.get(key).cloned())
    }

    async fn season_records(&self, season: i32) -> Result<Vec<ParlaySeasonRecord>> {
        let inner = self.inner.read().await;
        let mut records: Vec<ParlaySeasonRecord> = inner
            .seasons
            .values()
            .filter(|s| s.season == season)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(records)
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>> {
        Ok(self.inner.read().await.users.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PickResult, TotalSide, Wager};

    fn pick(id: &str, user: &str, week: u32, game_id: &str) -> Pick {
        Pick {
            id: id.to_string(),
            user_id: user.to_string(),
            season: 2024,
            week,
            game_id: game_id.to_string(),
            wager: Wager::Total {
                side: TotalSide::Over,
                line: 41.5,
            },
            result: PickResult::Pending,
        }
    }

    #[tokio::test]
    async fn test_batch_update_is_all_or_nothing() {
        let store = MemoryStore::new();
        store.put_pick(pick("p1", "alice", 1, "g1")).await;

        let batch = vec![
            PickResultUpdate {
                pick_id: "p1".to_string(),
                result: PickResult::Win,
            },
            PickResultUpdate {
                pick_id: "missing".to_string(),
                result: PickResult::Loss,
            },
        ];
        assert!(store.update_results(&batch).await.is_err());
        assert_eq!(store.pick("p1").await.unwrap().result, PickResult::Pending);

        store.update_results(&batch[..1]).await.unwrap();
        assert_eq!(store.pick("p1").await.unwrap().result, PickResult::Win);
    }

    #[tokio::test]
    async fn test_week_keys_are_distinct_and_sorted() {
        let store = MemoryStore::new();
        store.put_pick(pick("p1", "bob", 2, "g1")).await;
        store.put_pick(pick("p2", "alice", 1, "g2")).await;
        store.put_pick(pick("p3", "alice", 1, "g3")).await;

        let keys = store.week_keys(2024).await.unwrap();
        assert_eq!(
            keys,
            vec![WeekKey::new("alice", 2024, 1), WeekKey::new("bob", 2024, 2)]
        );
        assert!(store.week_keys(2025).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_keeps_week_inside_season() {
        let store = MemoryStore::new();
        let key = WeekKey::new("alice", 2024, 3);
        let mut week = ParlayWeekScore::empty(&key);
        week.total = 6;
        let season = ParlaySeasonRecord::new(&key.season_key());

        store.upsert_scores(&week, &season).await.unwrap();
        assert_eq!(store.week_score(&key).await.unwrap(), Some(week.clone()));
        let record = store.season_record(&key.season_key()).await.unwrap().unwrap();
        assert_eq!(record.total, 6);

        let other = ParlaySeasonRecord::new(&SeasonKey::new("bob", 2024));
        assert!(store.upsert_scores(&week, &other).await.is_err());
    }

    #[tokio::test]
    async fn test_snapshot_round_trips_through_json() {
        let store = MemoryStore::new();
        store.put_user("alice", "Alice A.").await;
        store.put_pick(pick("p1", "alice", 1, "g1")).await;

        let json = serde_json::to_string(&store.snapshot().await).unwrap();
        let restored = MemoryStore::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.pick("p1").await, store.pick("p1").await);
        assert_eq!(
            restored.display_name("alice").await.unwrap(),
            Some("Alice A.".to_string())
        );
    }
}
