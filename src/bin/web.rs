use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use parlay_picks::config::Config;
use parlay_picks::models::{SeasonKey, WeekKey};
use parlay_picks::store::MemoryStore;
use parlay_picks::{build_reconciler, open_store, persist_store, ResultReconciler, ScoringError};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    store: Arc<MemoryStore>,
    reconciler: ResultReconciler,
    /// Serializes snapshot-and-write so disk never goes backwards
    persist_lock: Arc<Mutex<()>>,
}

/// Maps engine errors onto HTTP status codes
struct ApiError(ScoringError);

impl From<ScoringError> for ApiError {
    fn from(e: ScoringError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ScoringError::GameNotFound(_) => StatusCode::NOT_FOUND,
            ScoringError::IncompleteGame { .. } => StatusCode::CONFLICT,
            ScoringError::MalformedFinalScore { .. }
            | ScoringError::MalformedLine { .. }
            | ScoringError::UnknownGameReference { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ScoringError::PersistenceFailure { .. } | ScoringError::StoreTimeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

fn not_found(what: String) -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": what }))).into_response()
}

/// Flush the store to disk after a write
async fn persist(state: &AppState) -> Result<(), ApiError> {
    let _guard = state.persist_lock.lock().await;
    persist_store(&state.config, &state.store)
        .await
        .map_err(|e| {
            error!("Failed to persist league data: {:#}", e);
            ApiError(ScoringError::persistence("save_snapshot", format!("{:#}", e)))
        })
}

async fn grade_game(
    State(state): State<AppState>,
    Path(game_id): Path<String>,
) -> Result<Json<Vec<WeekKey>>, ApiError> {
    let keys = state.reconciler.grade_game(&game_id).await?;
    persist(&state).await?;
    Ok(Json(keys.into_iter().collect()))
}

async fn week_score(
    State(state): State<AppState>,
    Path((season, user_id, week)): Path<(i32, String, u32)>,
) -> Result<Response, ApiError> {
    let key = WeekKey::new(&user_id, season, week);
    Ok(match state.reconciler.week_score(&key).await? {
        Some(score) => Json(score).into_response(),
        None => not_found(format!("No score for {}", key)),
    })
}

async fn recompute_week(
    State(state): State<AppState>,
    Path((season, user_id, week)): Path<(i32, String, u32)>,
) -> Result<Response, ApiError> {
    let scoring = state
        .reconciler
        .recompute_week(&user_id, season, week)
        .await?;
    persist(&state).await?;
    let skipped: Vec<String> = scoring.anomalies.iter().map(|e| e.to_string()).collect();
    Ok(Json(json!({ "score": scoring.score, "skipped": skipped })).into_response())
}

async fn season_record(
    State(state): State<AppState>,
    Path((season, user_id)): Path<(i32, String)>,
) -> Result<Response, ApiError> {
    let key = SeasonKey::new(&user_id, season);
    Ok(match state.reconciler.season_record(&key).await? {
        Some(record) => Json(record).into_response(),
        None => not_found(format!("No season record for {}", key)),
    })
}

async fn recompute_season(
    State(state): State<AppState>,
    Path((season, user_id)): Path<(i32, String)>,
) -> Result<Response, ApiError> {
    let record = state.reconciler.recompute_season(&user_id, season).await?;
    persist(&state).await?;
    Ok(Json(record).into_response())
}

async fn standings(
    State(state): State<AppState>,
    Path(season): Path<i32>,
) -> Result<Response, ApiError> {
    let standings = state.reconciler.standings(season, &*state.store).await?;
    Ok(Json(standings).into_response())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    let store = open_store(&config)?;
    let reconciler = build_reconciler(&config, store.clone());
    let addr = config.web_addr.clone();

    let state = AppState {
        config: Arc::new(config),
        store,
        reconciler,
        persist_lock: Arc::new(Mutex::new(())),
    };

    let app = Router::new()
        .route("/games/:game_id/grade", post(grade_game))
        .route("/seasons/:season/standings", get(standings))
        .route("/seasons/:season/users/:user_id", get(season_record))
        .route(
            "/seasons/:season/users/:user_id/recompute",
            post(recompute_season),
        )
        .route("/seasons/:season/users/:user_id/weeks/:week", get(week_score))
        .route(
            "/seasons/:season/users/:user_id/weeks/:week/recompute",
            post(recompute_week),
        )
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state);

    info!("Starting web server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
