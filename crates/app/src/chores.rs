use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::{counter, histogram};
use serde::Deserialize;
use tracing::info;

use hearth_core::form::ChoreForm;
use hearth_core::{IdentityResolver, SubmissionOutcome};
use hearth_storage::ChoreError;

use crate::problem::ProblemResponse;
use crate::router::{parse_body, AppState};

/// Handles a chore form submission.
///
/// Every outcome answers with its JSON summary; the status code tells the
/// form whether anything was stored.
pub async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    let session = state.session(&headers).await?;
    let form: ChoreForm = parse_body(&body)?;

    let started = Instant::now();
    let outcome = state.submission().handle_submit(&session, form).await;
    histogram!("chore_submission_seconds").record(started.elapsed().as_secs_f64());
    counter!("chore_submissions_total", "result" => outcome.as_str()).increment(1);
    counter!("chore_instances_persisted_total").increment(outcome.stored() as u64);

    Ok((outcome_status(&outcome), Json(outcome.summary())).into_response())
}

fn outcome_status(outcome: &SubmissionOutcome) -> StatusCode {
    match outcome {
        SubmissionOutcome::Persisted { .. } => StatusCode::CREATED,
        SubmissionOutcome::Invalid(_)
        | SubmissionOutcome::Rejected(_)
        | SubmissionOutcome::Unexpandable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SubmissionOutcome::IdentityUnresolved(err) | SubmissionOutcome::Halted { error: err, .. } => {
            ProblemResponse::from(err.clone()).status()
        }
    }
}

/// Lists the caller's apartment chores in due-date order.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ProblemResponse> {
    let session = state.session(&headers).await?;
    let apartment = session.resolve_apartment().await?;
    let chores = state
        .storage()
        .chores()
        .list_for_apartment(apartment.id.as_str())
        .await
        .map_err(chore_problem)?;
    Ok(Json(chores).into_response())
}

#[derive(Debug, Deserialize)]
struct CompletionRequest {
    completed: bool,
}

/// Marks a chore done or not done.
pub async fn set_completion(
    State(state): State<AppState>,
    Path(chore_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    let session = state.session(&headers).await?;
    let request: CompletionRequest = parse_body(&body)?;
    let apartment = session.resolve_apartment().await?;

    let result = state
        .storage()
        .chores()
        .set_completed(apartment.id.as_str(), &chore_id, request.completed)
        .await;
    let label = if result.is_ok() { "updated" } else { "failed" };
    counter!("chore_completion_updates_total", "result" => label).increment(1);

    let chore = result.map_err(chore_problem)?;
    info!(stage = "complete", chore_id = %chore.id, completed = request.completed, "chore completion updated");
    Ok(Json(chore).into_response())
}

fn chore_problem(err: ChoreError) -> ProblemResponse {
    match err {
        ChoreError::NotFound => {
            ProblemResponse::new(StatusCode::NOT_FOUND, "chore_not_found", err.to_string())
        }
        ChoreError::UnknownReference => {
            ProblemResponse::new(StatusCode::CONFLICT, "unknown_reference", err.to_string())
        }
        ChoreError::Database(_) => ProblemResponse::internal(err.to_string()),
    }
}
