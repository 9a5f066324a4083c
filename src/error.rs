use thiserror::Error;

/// Errors raised while grading picks and scoring parlays
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScoringError {
    /// Grading was attempted before the game went final
    #[error("Game {game_id} is not final yet")]
    IncompleteGame { game_id: String },

    /// A pick points at a game the store does not know about
    #[error("Pick {pick_id} references unknown game {game_id}")]
    UnknownGameReference { pick_id: String, game_id: String },

    #[error("Game {game_id} is final but has a malformed score: {reason}")]
    MalformedFinalScore { game_id: String, reason: String },

    #[error("Pick {pick_id} has a malformed line: {line}")]
    MalformedLine { pick_id: String, line: f64 },

    #[error("Game not found: {0}")]
    GameNotFound(String),

    /// Transient storage failure; the whole unit of work is retried
    #[error("Persistence failure during {operation}: {reason}")]
    PersistenceFailure { operation: String, reason: String },

    #[error("Store call timed out: {0}")]
    StoreTimeout(String),
}

impl ScoringError {
    pub fn persistence(operation: &str, reason: impl ToString) -> Self {
        ScoringError::PersistenceFailure {
            operation: operation.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Only storage hiccups are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScoringError::PersistenceFailure { .. } | ScoringError::StoreTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScoringError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_errors_retry() {
        assert!(ScoringError::persistence("upsert_scores", "disk full").is_retryable());
        assert!(ScoringError::StoreTimeout("picks_for_game".into()).is_retryable());
        assert!(!ScoringError::IncompleteGame {
            game_id: "g1".into()
        }
        .is_retryable());
        assert!(!ScoringError::MalformedFinalScore {
            game_id: "g1".into(),
            reason: "missing away score".into()
        }
        .is_retryable());
    }
}
