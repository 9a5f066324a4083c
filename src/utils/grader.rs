use crate::error::{Result, ScoringError};
use crate::models::{Game, Pick, PickResult, PickResultUpdate, TeamSide, TotalSide, Wager};
use std::cmp::Ordering;
use tracing::warn;

/// Check that a game is final and carries a usable score
pub fn validate_final(game: &Game) -> Result<(i32, i32)> {
    if !game.is_final {
        return Err(ScoringError::IncompleteGame {
            game_id: game.id.clone(),
        });
    }

    let (home, away) = game
        .final_score()
        .ok_or_else(|| ScoringError::MalformedFinalScore {
            game_id: game.id.clone(),
            reason: match (game.home_score, game.away_score) {
                (None, None) => "missing both scores".to_string(),
                (None, _) => "missing home score".to_string(),
                _ => "missing away score".to_string(),
            },
        })?;

    if home < 0 || away < 0 {
        return Err(ScoringError::MalformedFinalScore {
            game_id: game.id.clone(),
            reason: format!("negative score {}-{}", home, away),
        });
    }

    Ok((home, away))
}

/// Grade one pick against its final game.
///
/// Spread: the chosen side's score plus its captured line, minus the other
/// side's score. Total: combined points against the captured line. Zero
/// margin is a push.
pub fn grade_pick(pick: &Pick, game: &Game) -> Result<PickResult> {
    let (home, away) = validate_final(game)?;

    let line = pick.wager.line();
    if !line.is_finite() {
        return Err(ScoringError::MalformedLine {
            pick_id: pick.id.clone(),
            line,
        });
    }

    let margin = match pick.wager {
        Wager::Spread { side, line } => {
            let (chosen, other) = match side {
                TeamSide::Home => (home, away),
                TeamSide::Away => (away, home),
            };
            chosen as f64 + line - other as f64
        }
        Wager::Total { side, line } => {
            let total_points = home as f64 + away as f64;
            match side {
                TotalSide::Over => total_points - line,
                TotalSide::Under => line - total_points,
            }
        }
    };

    Ok(match margin.partial_cmp(&0.0) {
        Some(Ordering::Greater) => PickResult::Win,
        Some(Ordering::Less) => PickResult::Loss,
        _ => PickResult::Push,
    })
}

/// Grade every pick on one game.
///
/// A pick that fails to grade is logged and left out of the batch so the
/// rest still go through. A game-level problem (not final, bad score) is
/// returned as an error before any pick is graded.
pub fn grade_picks(picks: &[Pick], game: &Game) -> Result<Vec<PickResultUpdate>> {
    validate_final(game)?;

    let mut updates = Vec::with_capacity(picks.len());
    for pick in picks {
        if pick.game_id != game.id {
            warn!(
                "Pick {} belongs to game {}, not {}; skipping",
                pick.id, pick.game_id, game.id
            );
            continue;
        }

        match grade_pick(pick, game) {
            Ok(result) => updates.push(PickResultUpdate {
                pick_id: pick.id.clone(),
                result,
            }),
            Err(e) => warn!("Skipping pick {}: {}", pick.id, e),
        }
    }

    Ok(updates)
}
