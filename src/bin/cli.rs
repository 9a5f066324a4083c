use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parlay_picks::config::Config;
use parlay_picks::data::{save_standings_to_csv, write_standings_csv};
use parlay_picks::feed::{parse_final_events, GameFinalFeed};
use parlay_picks::models::ParlayWeekScore;
use parlay_picks::reconciler::BatchReport;
use parlay_picks::{build_reconciler, open_store, persist_store};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parlay-picks", about = "Grade picks and score weekly parlays")]
struct Cli {
    /// League data file (overrides PARLAY_DATA_FILE)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grade a finished game and rescore the weeks it touches
    Grade { game_id: String },
    /// Rescore one user's week
    RecomputeWeek {
        user_id: String,
        season: i32,
        week: u32,
    },
    /// Rescore every week of one user's season
    RecomputeSeason { user_id: String, season: i32 },
    /// Rescore every user and week in a season
    RecomputeAll {
        season: i32,
        /// Re-grade final games before rescoring
        #[arg(long)]
        regrade: bool,
    },
    /// Feed recorded final events (one JSON game per line) through the reconciler
    Replay { events: PathBuf },
    /// Print the season leaderboard
    Standings {
        season: i32,
        /// Also write the leaderboard to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
    },
}

fn print_week(score: &ParlayWeekScore) {
    println!(
        "{} - season {} week {}: {} point(s)",
        score.user_id, score.season, score.week, score.total
    );
    for (bucket, detail) in &score.buckets {
        println!(
            "  {:<14} {:>4} pts  {}W {}L {}P {} pending ({:?})",
            bucket,
            detail.points,
            detail.wins,
            detail.losses,
            detail.pushes,
            detail.pending,
            detail.status
        );
    }
}

/// Non-zero exit when any week of a batch failed
fn ensure_all_completed(report: &BatchReport) -> Result<()> {
    if !report.failed.is_empty() {
        anyhow::bail!("{} week(s) failed to recompute", report.failed.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env()?;
    if let Some(data) = cli.data {
        config.data_file = data;
    }

    let store = open_store(&config)?;
    let reconciler = build_reconciler(&config, store.clone());

    match cli.command {
        Command::Grade { game_id } => {
            let keys = reconciler
                .grade_game(&game_id)
                .await
                .with_context(|| format!("Failed to grade game {}", game_id))?;
            println!("Graded {}; rescored {} week(s)", game_id, keys.len());
            for key in keys {
                println!("  {}", key);
            }
        }
        Command::RecomputeWeek {
            user_id,
            season,
            week,
        } => {
            let scoring = reconciler.recompute_week(&user_id, season, week).await?;
            print_week(&scoring.score);
            for anomaly in &scoring.anomalies {
                eprintln!("  skipped: {}", anomaly);
            }
        }
        Command::RecomputeSeason { user_id, season } => {
            let record = reconciler.recompute_season(&user_id, season).await?;
            for week in record.weeks.values() {
                print_week(week);
            }
            println!("Season total: {}", record.total);
        }
        Command::RecomputeAll { season, regrade } => {
            if regrade {
                let graded = reconciler.regrade_season(season).await?;
                println!("Regraded {} final game(s)", graded);
            }

            // Stop between weeks on Ctrl+C
            let cancel = Arc::new(AtomicBool::new(false));
            let flag = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    flag.store(true, Ordering::SeqCst);
                }
            });

            let report = reconciler.recompute_all(season, &cancel).await?;
            println!(
                "Recomputed {} week(s), {} failed{}",
                report.completed.len(),
                report.failed.len(),
                if report.aborted { " (cancelled)" } else { "" }
            );
            for (key, e) in &report.anomalies {
                eprintln!("  {} skipped: {}", key, e);
            }
            for (key, e) in &report.failed {
                eprintln!("  {}: {}", key, e);
            }
            if !report.failed.is_empty() {
                // Keep the weeks that did complete
                persist_store(&config, &store).await?;
            }
            ensure_all_completed(&report)?;
        }
        Command::Replay { events } => {
            let contents = std::fs::read_to_string(&events)
                .with_context(|| format!("Failed to read {}", events.display()))?;
            let games = parse_final_events(&contents);

            let (feed, stream) = GameFinalFeed::channel();
            let worker = {
                let reconciler = reconciler.clone();
                tokio::spawn(async move { reconciler.run(stream).await })
            };
            for game in games {
                feed.publish(game).await?;
            }
            drop(feed);

            let summary = worker.await.context("Replay worker failed")?;
            println!(
                "Replayed {} event(s): {} graded, {} failed",
                summary.graded + summary.failed,
                summary.graded,
                summary.failed
            );
        }
        Command::Standings { season, csv } => {
            let standings = reconciler.standings(season, &*store).await?;
            if standings.is_empty() {
                println!("No scores recorded for season {}", season);
            } else {
                write_standings_csv(&standings, std::io::stdout())?;
            }

            if let Some(path) = csv {
                save_standings_to_csv(&standings, &path)?;
                println!("\nSaved standings to {}", path.display());
            }
            return Ok(());
        }
    }

    persist_store(&config, &store).await?;
    Ok(())
}
