use crate::models::{Game, GameFinal};
use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

/// Sending half of the "game reached final state" subscription.
///
/// The score feed publishes here; the reconciler consumes the stream.
#[derive(Debug, Clone)]
pub struct GameFinalFeed {
    tx: mpsc::Sender<GameFinal>,
}

impl GameFinalFeed {
    pub fn channel() -> (Self, ReceiverStream<GameFinal>) {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, ReceiverStream<GameFinal>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, ReceiverStream::new(rx))
    }

    pub async fn publish(&self, game: Game) -> Result<()> {
        debug!("Publishing final for game {}", game.id);
        self.tx
            .send(GameFinal { game })
            .await
            .context("Game final subscriber has gone away")
    }
}

/// Parse recorded final notifications, one JSON `Game` per line.
///
/// Blank lines are skipped and unparseable lines are logged and dropped.
pub fn parse_final_events(contents: &str) -> Vec<Game> {
    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match serde_json::from_str::<Game>(line) {
            Ok(game) => Some(game),
            Err(e) => {
                warn!("Skipping event on line {}: {}", i + 1, e);
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;

    const LINE: &str = r#"{"id":"g1","home_team":"A","away_team":"B","kickoff":"2024-09-05T17:20:00-07:00","season":2024,"week":1,"is_final":true,"home_score":27,"away_score":20}"#;

    #[test]
    fn test_parse_skips_garbage_lines() {
        let contents = format!("{}\n\nnot json\n{}\n", LINE, LINE);
        let games = parse_final_events(&contents);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].home_score, Some(27));
    }

    #[tokio::test]
    async fn test_published_finals_reach_the_stream() {
        let (feed, mut stream) = GameFinalFeed::with_capacity(4);
        for game in parse_final_events(LINE) {
            feed.publish(game).await.unwrap();
        }
        drop(feed);

        let event = stream.next().await.unwrap();
        assert_eq!(event.game.id, "g1");
        assert!(stream.next().await.is_none());
    }
}
