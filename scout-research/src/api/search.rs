//! Research search API handlers
//!
//! POST /search, GET /search/:id, GET /search/:id/results,
//! POST /search/:id/cancel, POST /search/:id/retry

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{candidates::load_candidates, sessions},
    error::{ApiError, ApiResult},
    models::{ContactCandidate, ResearchRequest, SearchSession, SearchState, ValidationError},
    services::RunGuard,
    AppState,
};

/// POST /search response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitSearchResponse {
    pub search_id: Uuid,
    pub status: SearchState,
    /// Rough estimate in seconds
    pub estimated_duration: u64,
}

/// GET /search/:id/results response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultsResponse {
    pub search_id: Uuid,
    pub state: SearchState,
    pub candidates: Vec<ContactCandidate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<serde_json::Value>,
}

/// POST /search/:id/cancel response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelSearchResponse {
    pub search_id: Uuid,
    /// `cancelling` while the run winds down, `cancelled` when no run was active
    pub status: &'static str,
}

/// POST /search/:id/retry response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySearchResponse {
    pub search_id: Uuid,
    pub status: SearchState,
    pub attempt: u32,
    pub estimated_duration: u64,
}

/// POST /search
///
/// Validates before any collaborator call; returns 202 with the search id.
pub async fn submit_search(
    State(state): State<AppState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SubmitSearchResponse>)> {
    let Json(request) =
        payload.map_err(|e| ValidationError::single("body", e.body_text()))?;
    request.validate()?;

    let session = SearchSession::new(request);
    let guard = state.orchestrator.registry().register(session.search_id)?;
    let plan = state.orchestrator.plan(&session.request);
    let response = SubmitSearchResponse {
        search_id: session.search_id,
        status: session.state,
        estimated_duration: session.estimated_duration_secs(plan.max_queries),
    };

    sessions::save_session(&state.db, &session).await?;

    tracing::info!(
        search_id = %session.search_id,
        topic = session.request.topic(),
        mode = ?session.request.mode,
        "Search submitted"
    );

    spawn_run(&state, guard, session);

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// GET /search/:id
pub async fn get_search(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> ApiResult<Json<SearchSession>> {
    let session = load_or_404(&state, search_id).await?;
    tracing::debug!(search_id = %search_id, state = %session.state, "Status query");
    Ok(Json(session))
}

/// GET /search/:id/results
pub async fn get_results(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> ApiResult<Json<SearchResultsResponse>> {
    let session = load_or_404(&state, search_id).await?;
    let candidates = load_candidates(&state.db, search_id).await?;

    Ok(Json(SearchResultsResponse {
        search_id,
        state: session.state,
        candidates,
        stats: session.stats,
    }))
}

/// POST /search/:id/cancel
///
/// Signals the active run; a non-terminal session without a run (e.g. lost to
/// a restart) is marked cancelled directly. The id is claimed while the
/// stored session is rewritten, so no run can start underneath it.
pub async fn cancel_search(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<CancelSearchResponse>)> {
    let registry = state.orchestrator.registry();
    let _guard = loop {
        match registry.register(search_id) {
            Ok(guard) => break guard,
            Err(_) if registry.cancel(search_id) => {
                tracing::info!(search_id = %search_id, "Cancellation signalled");
                return Ok((
                    StatusCode::ACCEPTED,
                    Json(CancelSearchResponse {
                        search_id,
                        status: "cancelling",
                    }),
                ));
            }
            // Run released between the two calls
            Err(_) => continue,
        }
    };

    let mut session = load_or_404(&state, search_id).await?;

    if session.is_terminal() {
        return Err(ApiError::BadRequest(format!(
            "Search already in terminal state: {}",
            session.state
        )));
    }

    session.skip_unfinished_stages();
    session.message = "Cancelled".to_string();
    session.transition_to(SearchState::Cancelled);
    sessions::save_session(&state.db, &session).await?;
    state.publisher().progress(search_id, session.snapshot());
    state.publisher().cancelled(search_id, session.stats.clone().unwrap_or_default());

    tracing::info!(search_id = %search_id, "Search without active run cancelled");

    Ok((
        StatusCode::OK,
        Json(CancelSearchResponse {
            search_id,
            status: "cancelled",
        }),
    ))
}

/// POST /search/:id/retry
///
/// Restarts a failed or cancelled run with the stored request. The id is
/// claimed before the session is read, so a concurrent retry is rejected
/// without touching the stored row.
pub async fn retry_search(
    State(state): State<AppState>,
    Path(search_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<RetrySearchResponse>)> {
    let guard = state.orchestrator.registry().register(search_id)?;
    let mut session = load_or_404(&state, search_id).await?;

    if !session.can_retry() {
        return Err(ApiError::Conflict(format!(
            "Search in state {} cannot be retried",
            session.state
        )));
    }
    if let Some(error) = &session.error {
        if !error.retryable {
            return Err(ApiError::Conflict(format!(
                "Search failed with non-retryable {} error",
                error.category
            )));
        }
    }

    session.restart();
    sessions::save_session(&state.db, &session).await?;

    let plan = state.orchestrator.plan(&session.request);
    let response = RetrySearchResponse {
        search_id,
        status: session.state,
        attempt: session.attempt,
        estimated_duration: session.estimated_duration_secs(plan.max_queries),
    };

    tracing::info!(search_id = %search_id, attempt = session.attempt, "Search retried");

    spawn_run(&state, guard, session);

    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn load_or_404(state: &AppState, search_id: Uuid) -> ApiResult<SearchSession> {
    sessions::load_session(&state.db, search_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Search not found: {}", search_id)))
}

/// Launch the run under `guard` and record its failure for `/health`
fn spawn_run(state: &AppState, guard: RunGuard, session: SearchSession) {
    let search_id = session.search_id;
    let handle = state.orchestrator.launch_claimed(guard, session);
    let last_error = state.last_error.clone();

    tokio::spawn(async move {
        let message = match handle.await {
            Ok(Ok(_)) => return,
            Ok(Err(e)) => e.to_string(),
            Err(join_error) => format!("Search task panicked: {}", join_error),
        };
        tracing::error!(search_id = %search_id, error = %message, "Search task failed");
        *last_error.write().await = Some(message);
    });
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/search", post(submit_search))
        .route("/search/:id", get(get_search))
        .route("/search/:id/results", get(get_results))
        .route("/search/:id/cancel", post(cancel_search))
        .route("/search/:id/retry", post(retry_search))
}
