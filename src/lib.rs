pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod reconciler;
pub mod store;
pub mod utils;

pub use error::{Result, ScoringError};
pub use models::*;
pub use reconciler::ResultReconciler;
pub use utils::*;

use anyhow::Context;
use config::Config;
use std::sync::Arc;
use store::MemoryStore;
use tracing::info;
use utils::data::{load_snapshot, save_snapshot};

/// Open the league data file named in `config`, or start empty if it is missing
pub fn open_store(config: &Config) -> anyhow::Result<Arc<MemoryStore>> {
    let snapshot = if config.data_file.exists() {
        let snapshot = load_snapshot(&config.data_file)?;
        info!(
            "Loaded {} game(s), {} pick(s) from {}",
            snapshot.games.len(),
            snapshot.picks.len(),
            config.data_file.display()
        );
        snapshot
    } else {
        info!(
            "No data file at {}; starting empty",
            config.data_file.display()
        );
        Default::default()
    };
    Ok(Arc::new(MemoryStore::from_snapshot(snapshot)))
}

/// Write the store back to the data file named in `config`.
///
/// Callers that persist concurrently must serialize calls themselves, or an
/// older snapshot can land on disk last.
pub async fn persist_store(config: &Config, store: &MemoryStore) -> anyhow::Result<()> {
    let snapshot = store.snapshot().await;
    let path = config.data_file.clone();
    tokio::task::spawn_blocking(move || save_snapshot(&snapshot, &path))
        .await
        .context("Snapshot writer task failed")?
        .with_context(|| format!("Failed to persist league to {}", config.data_file.display()))
}

/// Reconciler wired up with the configured scoring rules and retry policy
pub fn build_reconciler(config: &Config, store: Arc<MemoryStore>) -> ResultReconciler {
    ResultReconciler::new(store)
        .with_rules(config.rules)
        .with_retry(config.retry)
}
