use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scheduled game, as supplied by the score feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: String,
    pub home_team: String,
    pub away_team: String,
    pub kickoff: DateTime<FixedOffset>,
    pub season: i32,
    pub week: u32,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub home_score: Option<i32>,
    #[serde(default)]
    pub away_score: Option<i32>,
    /// Closing spread from the home team's perspective (negative = home favored)
    #[serde(default)]
    pub spread: Option<f64>,
    #[serde(default)]
    pub total: Option<f64>,
}

impl Game {
    /// Final (home, away) score, if both halves are present
    pub fn final_score(&self) -> Option<(i32, i32)> {
        match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => Some((home, away)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamSide {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalSide {
    Over,
    Under,
}

/// The bet itself. Lines are captured when the pick is submitted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Wager {
    /// `line` is from the chosen side's perspective: "Away +7" is `line: 7.0`
    Spread { side: TeamSide, line: f64 },
    Total { side: TotalSide, line: f64 },
}

impl Wager {
    pub fn line(&self) -> f64 {
        match self {
            Wager::Spread { line, .. } | Wager::Total { line, .. } => *line,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickResult {
    #[default]
    Pending,
    Win,
    Loss,
    Push,
}

impl PickResult {
    pub fn is_graded(&self) -> bool {
        !matches!(self, PickResult::Pending)
    }
}

impl fmt::Display for PickResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PickResult::Pending => "pending",
            PickResult::Win => "win",
            PickResult::Loss => "loss",
            PickResult::Push => "push",
        };
        f.write_str(label)
    }
}

/// A user's wager on one game
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub id: String,
    pub user_id: String,
    pub season: i32,
    pub week: u32,
    pub game_id: String,
    pub wager: Wager,
    #[serde(default)]
    pub result: PickResult,
}

impl Pick {
    /// Convert a home-perspective spread into the line for `side`
    pub fn capture_spread(home_spread: f64, side: TeamSide) -> f64 {
        match side {
            TeamSide::Home => home_spread,
            TeamSide::Away => -home_spread,
        }
    }

    pub fn week_key(&self) -> WeekKey {
        WeekKey::new(&self.user_id, self.season, self.week)
    }
}

/// New result for one pick, written as part of a grading batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickResultUpdate {
    pub pick_id: String,
    pub result: PickResult,
}

/// (user, season, week)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WeekKey {
    pub user_id: String,
    pub season: i32,
    pub week: u32,
}

impl WeekKey {
    pub fn new(user_id: &str, season: i32, week: u32) -> Self {
        Self {
            user_id: user_id.to_string(),
            season,
            week,
        }
    }

    pub fn season_key(&self) -> SeasonKey {
        SeasonKey::new(&self.user_id, self.season)
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/wk{}", self.user_id, self.season, self.week)
    }
}

/// (user, season)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeasonKey {
    pub user_id: String,
    pub season: i32,
}

impl SeasonKey {
    pub fn new(user_id: &str, season: i32) -> Self {
        Self {
            user_id: user_id.to_string(),
            season,
        }
    }
}

impl fmt::Display for SeasonKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.season)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketStatus {
    /// Every decisive leg won and there were at least two of them
    Won,
    /// At least one decisive leg lost
    Lost,
    /// Fewer than two decisive legs
    NoParlay,
    /// Some games in the bucket have not been graded yet
    Unresolved,
}

/// Scoring breakdown for one day bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketScore {
    pub points: u64,
    pub wins: u32,
    pub losses: u32,
    pub pushes: u32,
    pub pending: u32,
    pub status: BucketStatus,
}

/// Parlay points for one (user, season, week)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParlayWeekScore {
    pub user_id: String,
    pub season: i32,
    pub week: u32,
    /// Keyed by bucket label
    pub buckets: BTreeMap<String, BucketScore>,
    pub total: u64,
}

impl ParlayWeekScore {
    pub fn empty(key: &WeekKey) -> Self {
        Self {
            user_id: key.user_id.clone(),
            season: key.season,
            week: key.week,
            buckets: BTreeMap::new(),
            total: 0,
        }
    }

    pub fn key(&self) -> WeekKey {
        WeekKey::new(&self.user_id, self.season, self.week)
    }
}

/// Every scored week for one (user, season)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParlaySeasonRecord {
    pub user_id: String,
    pub season: i32,
    pub weeks: BTreeMap<u32, ParlayWeekScore>,
    pub total: u64,
}

impl ParlaySeasonRecord {
    pub fn new(key: &SeasonKey) -> Self {
        Self {
            user_id: key.user_id.clone(),
            season: key.season,
            weeks: BTreeMap::new(),
            total: 0,
        }
    }

    pub fn key(&self) -> SeasonKey {
        SeasonKey::new(&self.user_id, self.season)
    }

    /// Replace a week's score and rebuild the season total from the weeks
    pub fn upsert_week(&mut self, score: ParlayWeekScore) {
        self.weeks.insert(score.week, score);
        self.recompute_total();
    }

    pub fn recompute_total(&mut self) {
        self.total = self
            .weeks
            .values()
            .fold(0u64, |acc, week| acc.saturating_add(week.total));
    }
}

/// Notification that a game reached its final state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameFinal {
    pub game: Game,
}

/// Grading lifecycle of a single game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameState {
    AwaitingCompletion,
    FinalPendingGrading,
    Graded,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(user: &str, week: u32, total: u64) -> ParlayWeekScore {
        let mut score = ParlayWeekScore::empty(&WeekKey::new(user, 2024, week));
        score.total = total;
        score
    }

    #[test]
    fn test_season_total_tracks_replaced_weeks() {
        let mut record = ParlaySeasonRecord::new(&SeasonKey::new("alice", 2024));
        record.upsert_week(week("alice", 1, 3));
        record.upsert_week(week("alice", 2, 10));
        assert_eq!(record.total, 13);

        // Re-scoring a week replaces it instead of adding to it
        record.upsert_week(week("alice", 1, 6));
        assert_eq!(record.total, 16);
        assert_eq!(
            record.total,
            record.weeks.values().map(|w| w.total).sum::<u64>()
        );
    }

    #[test]
    fn test_capture_spread_flips_for_away() {
        assert_eq!(Pick::capture_spread(-7.5, TeamSide::Home), -7.5);
        assert_eq!(Pick::capture_spread(-7.5, TeamSide::Away), 7.5);
    }

    #[test]
    fn test_wager_json_shape() {
        let wager: Wager =
            serde_json::from_str(r#"{"type":"total","side":"under","line":44.5}"#).unwrap();
        assert_eq!(
            wager,
            Wager::Total {
                side: TotalSide::Under,
                line: 44.5
            }
        );
        assert_eq!(wager.line(), 44.5);
    }

    #[test]
    fn test_final_score_requires_both_sides() {
        let mut game: Game = serde_json::from_str(
            r#"{"id":"g1","home_team":"A","away_team":"B",
                "kickoff":"2024-09-08T13:00:00-07:00","season":2024,"week":1}"#,
        )
        .unwrap();
        assert!(!game.is_final);
        assert_eq!(game.final_score(), None);
        game.home_score = Some(21);
        assert_eq!(game.final_score(), None);
        game.away_score = Some(17);
        assert_eq!(game.final_score(), Some((21, 17)));
    }
}
