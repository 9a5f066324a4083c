use crate::error::ScoringError;
use crate::models::{
    BucketScore, BucketStatus, Game, ParlayWeekScore, Pick, PickResult, WeekKey,
};
use crate::utils::day_bucket::{classify, DayBucket, DEFAULT_MODERN_CUTOFF_SEASON};
use crate::utils::payout::{bucket_payout, MIN_PARLAY_LEGS};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Season-level knobs for scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub modern_cutoff_season: i32,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            modern_cutoff_season: DEFAULT_MODERN_CUTOFF_SEASON,
        }
    }
}

impl ScoringRules {
    pub fn bucket_for(&self, game: &Game) -> DayBucket {
        classify(&game.kickoff, game.season, self.modern_cutoff_season)
    }
}

/// Result of scoring one weekly pick set
#[derive(Debug, Clone, PartialEq)]
pub struct WeekScoring {
    pub score: ParlayWeekScore,
    /// Picks left out of scoring, e.g. orphaned from their game
    pub anomalies: Vec<ScoringError>,
}

#[derive(Debug, Default)]
struct Tally {
    wins: u32,
    losses: u32,
    pushes: u32,
    pending: u32,
}

impl Tally {
    fn add(&mut self, result: PickResult) {
        match result {
            PickResult::Win => self.wins += 1,
            PickResult::Loss => self.losses += 1,
            PickResult::Push => self.pushes += 1,
            PickResult::Pending => self.pending += 1,
        }
    }

    fn score(&self) -> BucketScore {
        // No speculative credit while any game in the bucket is unsettled
        let (status, points) = if self.pending > 0 {
            (BucketStatus::Unresolved, 0)
        } else if self.losses > 0 {
            (BucketStatus::Lost, 0)
        } else if self.wins < MIN_PARLAY_LEGS {
            (BucketStatus::NoParlay, 0)
        } else {
            (BucketStatus::Won, bucket_payout(self.wins, self.losses))
        };

        BucketScore {
            points,
            wins: self.wins,
            losses: self.losses,
            pushes: self.pushes,
            pending: self.pending,
            status,
        }
    }
}

/// Score one user's week.
///
/// `picks` should all belong to `key`; strays are ignored. Each pick is
/// bucketed by its game's kickoff, and every pick on a game counts as its own
/// leg, so a spread and a total on the same game are two legs.
pub fn score_week(
    key: &WeekKey,
    picks: &[Pick],
    games: &HashMap<String, Game>,
    rules: &ScoringRules,
) -> WeekScoring {
    let mut tallies: BTreeMap<DayBucket, Tally> = BTreeMap::new();
    let mut anomalies = Vec::new();

    for pick in picks {
        if pick.week_key() != *key {
            debug!("Pick {} is not part of week {}; ignoring", pick.id, key);
            continue;
        }

        let game = match games.get(&pick.game_id) {
            Some(game) => game,
            None => {
                warn!(
                    "Pick {} for {} references unknown game {}",
                    pick.id, key, pick.game_id
                );
                anomalies.push(ScoringError::UnknownGameReference {
                    pick_id: pick.id.clone(),
                    game_id: pick.game_id.clone(),
                });
                continue;
            }
        };

        tallies
            .entry(rules.bucket_for(game))
            .or_default()
            .add(pick.result);
    }

    let mut score = ParlayWeekScore::empty(key);
    for (bucket, tally) in tallies {
        let bucket_score = tally.score();
        score.total = score.total.saturating_add(bucket_score.points);
        score.buckets.insert(bucket.label(), bucket_score);
    }

    WeekScoring { score, anomalies }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TeamSide, Wager};
    use chrono::DateTime;

    const THURSDAY: &str = "2024-09-05T17:20:00-07:00";
    const FRIDAY: &str = "2024-09-06T17:15:00-07:00";
    const SUNDAY: &str = "2024-09-08T10:00:00-07:00";
    const MONDAY: &str = "2024-09-09T17:15:00-07:00";

    fn game(id: &str, kickoff: &str, season: i32) -> Game {
        Game {
            id: id.to_string(),
            home_team: format!("{} home", id),
            away_team: format!("{} away", id),
            kickoff: DateTime::parse_from_rfc3339(kickoff).unwrap(),
            season,
            week: 1,
            is_final: true,
            home_score: Some(20),
            away_score: Some(10),
            spread: Some(-3.0),
            total: Some(40.5),
        }
    }

    fn pick(id: &str, game_id: &str, season: i32, result: PickResult) -> Pick {
        Pick {
            id: id.to_string(),
            user_id: "alice".to_string(),
            season,
            week: 1,
            game_id: game_id.to_string(),
            wager: Wager::Spread {
                side: TeamSide::Home,
                line: -3.0,
            },
            result,
        }
    }

    fn games(list: Vec<Game>) -> HashMap<String, Game> {
        list.into_iter().map(|g| (g.id.clone(), g)).collect()
    }

    fn key(season: i32) -> WeekKey {
        WeekKey::new("alice", season, 1)
    }

    #[test]
    fn test_thursday_parlay_and_split_friday() {
        let games = games(vec![
            game("t1", THURSDAY, 2024),
            game("t2", THURSDAY, 2024),
            game("f1", FRIDAY, 2024),
            game("f2", FRIDAY, 2024),
        ]);
        let picks = vec![
            pick("p1", "t1", 2024, PickResult::Win),
            pick("p2", "t2", 2024, PickResult::Win),
            pick("p3", "f1", 2024, PickResult::Win),
            pick("p4", "f2", 2024, PickResult::Loss),
        ];

        let scoring = score_week(&key(2024), &picks, &games, &ScoringRules::default());
        let score = scoring.score;
        assert_eq!(score.buckets["Thursday"].points, 3);
        assert_eq!(score.buckets["Thursday"].status, BucketStatus::Won);
        assert_eq!(score.buckets["Friday"].points, 0);
        assert_eq!(score.buckets["Friday"].status, BucketStatus::Lost);
        assert_eq!(score.total, 3);
        assert!(scoring.anomalies.is_empty());
    }

    #[test]
    fn test_pushes_do_not_count_as_legs() {
        let games = games(vec![
            game("t1", THURSDAY, 2024),
            game("t2", THURSDAY, 2024),
            game("t3", THURSDAY, 2024),
            game("f1", FRIDAY, 2024),
            game("f2", FRIDAY, 2024),
        ]);
        let picks = vec![
            pick("p1", "t1", 2024, PickResult::Win),
            pick("p2", "t2", 2024, PickResult::Win),
            pick("p3", "t3", 2024, PickResult::Push),
            pick("p4", "f1", 2024, PickResult::Win),
            pick("p5", "f2", 2024, PickResult::Push),
        ];

        let score = score_week(&key(2024), &picks, &games, &ScoringRules::default()).score;
        assert_eq!(score.buckets["Thursday"].points, 3);
        assert_eq!(score.buckets["Thursday"].pushes, 1);
        assert_eq!(score.buckets["Friday"].points, 0);
        assert_eq!(score.buckets["Friday"].status, BucketStatus::NoParlay);
        assert_eq!(score.total, 3);
    }

    #[test]
    fn test_loss_voids_bucket_regardless_of_wins() {
        let mut list = Vec::new();
        let mut picks = Vec::new();
        for i in 0..9 {
            let id = format!("s{}", i);
            list.push(game(&id, SUNDAY, 2024));
            picks.push(pick(&format!("p{}", i), &id, 2024, PickResult::Win));
        }
        list.push(game("m1", MONDAY, 2024));
        picks.push(pick("loser", "m1", 2024, PickResult::Loss));

        let score = score_week(&key(2024), &picks, &games(list), &ScoringRules::default()).score;
        let bucket = &score.buckets["SundayMonday"];
        assert_eq!(bucket.wins, 9);
        assert_eq!(bucket.losses, 1);
        assert_eq!(bucket.points, 0);
        assert_eq!(score.total, 0);
    }

    #[test]
    fn test_pending_pick_leaves_bucket_unresolved() {
        let games = games(vec![
            game("t1", THURSDAY, 2024),
            game("t2", THURSDAY, 2024),
            game("t3", THURSDAY, 2024),
        ]);
        let picks = vec![
            pick("p1", "t1", 2024, PickResult::Win),
            pick("p2", "t2", 2024, PickResult::Win),
            pick("p3", "t3", 2024, PickResult::Pending),
        ];

        let score = score_week(&key(2024), &picks, &games, &ScoringRules::default()).score;
        assert_eq!(score.buckets["Thursday"].status, BucketStatus::Unresolved);
        assert_eq!(score.total, 0);
    }

    #[test]
    fn test_modern_regime_splits_sunday_and_monday() {
        let games = games(vec![
            game("s1", "2025-09-07T10:00:00-07:00", 2025),
            game("s2", "2025-09-07T13:25:00-07:00", 2025),
            game("m1", "2025-09-08T17:15:00-07:00", 2025),
            game("m2", "2025-09-08T19:00:00-07:00", 2025),
        ]);
        let picks = vec![
            pick("p1", "s1", 2025, PickResult::Win),
            pick("p2", "s2", 2025, PickResult::Win),
            pick("p3", "m1", 2025, PickResult::Win),
            pick("p4", "m2", 2025, PickResult::Win),
        ];

        let score = score_week(&key(2025), &picks, &games, &ScoringRules::default()).score;
        assert_eq!(score.buckets.len(), 2);
        assert_eq!(score.buckets["2025-09-07"].points, 3);
        assert_eq!(score.buckets["2025-09-08"].points, 3);
        assert_eq!(score.total, 6);

        // The same four wins under the legacy rules form one 4-leg parlay
        let legacy = ScoringRules {
            modern_cutoff_season: 2026,
        };
        let score = score_week(&key(2025), &picks, &games, &legacy).score;
        assert_eq!(score.buckets["SundayMonday"].points, 10);
        assert_eq!(score.total, 10);
    }

    #[test]
    fn test_two_wagers_on_one_game_are_two_legs() {
        let games = games(vec![game("t1", THURSDAY, 2024)]);
        let mut over = pick("p2", "t1", 2024, PickResult::Win);
        over.wager = Wager::Total {
            side: crate::models::TotalSide::Over,
            line: 24.5,
        };
        let picks = vec![pick("p1", "t1", 2024, PickResult::Win), over];

        let score = score_week(&key(2024), &picks, &games, &ScoringRules::default()).score;
        assert_eq!(score.buckets["Thursday"].wins, 2);
        assert_eq!(score.total, 3);
    }

    #[test]
    fn test_orphaned_pick_is_reported_and_skipped() {
        let games = games(vec![game("t1", THURSDAY, 2024), game("t2", THURSDAY, 2024)]);
        let picks = vec![
            pick("p1", "t1", 2024, PickResult::Win),
            pick("p2", "t2", 2024, PickResult::Win),
            pick("ghost", "deleted-game", 2024, PickResult::Loss),
        ];

        let scoring = score_week(&key(2024), &picks, &games, &ScoringRules::default());
        assert_eq!(scoring.score.total, 3);
        assert_eq!(
            scoring.anomalies,
            vec![ScoringError::UnknownGameReference {
                pick_id: "ghost".to_string(),
                game_id: "deleted-game".to_string()
            }]
        );
    }

    #[test]
    fn test_empty_week_scores_zero() {
        let scoring = score_week(&key(2024), &[], &HashMap::new(), &ScoringRules::default());
        assert!(scoring.score.buckets.is_empty());
        assert_eq!(scoring.score.total, 0);
    }
}
