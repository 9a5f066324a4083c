//! Interfaces to the storage collaborators.
//!
//! The engine never owns persistence; it reads games and picks and writes
//! results and scores through these traits. `MemoryStore` implements all of
//! them for the CLI, the web server and tests.

pub mod memory;

pub use memory::{LeagueSnapshot, MemoryStore};

use crate::error::Result;
use crate::models::{
    Game, ParlaySeasonRecord, ParlayWeekScore, Pick, PickResultUpdate, SeasonKey, WeekKey,
};
use async_trait::async_trait;

#[async_trait]
pub trait GameStore: Send + Sync {
    async fn game(&self, game_id: &str) -> Result<Option<Game>>;

    async fn games_for_week(&self, season: i32, week: u32) -> Result<Vec<Game>>;
}

#[async_trait]
pub trait PickStore: Send + Sync {
    async fn picks_for_game(&self, game_id: &str) -> Result<Vec<Pick>>;

    async fn picks_for_week(&self, key: &WeekKey) -> Result<Vec<Pick>>;

    /// Every (user, week) in a season that has at least one pick
    async fn week_keys(&self, season: i32) -> Result<Vec<WeekKey>>;

    /// Apply all updates or none of them
    async fn update_results(&self, updates: &[PickResultUpdate]) -> Result<()>;
}

#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Write a week score and its owning season record as one unit
    async fn upsert_scores(
        &self,
        week: &ParlayWeekScore,
        season: &ParlaySeasonRecord,
    ) -> Result<()>;

    async fn week_score(&self, key: &WeekKey) -> Result<Option<ParlayWeekScore>>;

    async fn season_record(&self, key: &SeasonKey) -> Result<Option<ParlaySeasonRecord>>;

    async fn season_records(&self, season: i32) -> Result<Vec<ParlaySeasonRecord>>;
}

/// Display names, for presentation only
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn display_name(&self, user_id: &str) -> Result<Option<String>>;
}
