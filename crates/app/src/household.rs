use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;

use hearth_core::IdentityResolver;
use hearth_storage::ApartmentError;

use crate::problem::ProblemResponse;
use crate::router::{parse_body, AppState};

/// Body of `POST /api/apartments`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApartmentRequest {
    Join { apartment_id: String },
    Create { name: String },
}

/// Creates a new apartment or joins an existing one.
///
/// A user belongs to at most one apartment.
pub async fn create_or_join(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    let session = state.session(&headers).await?;
    let request: ApartmentRequest = parse_body(&body)?;
    let apartments = state.storage().apartments();

    match request {
        ApartmentRequest::Create { name } => {
            let name = name.trim();
            if name.is_empty() {
                return Err(ProblemResponse::new(
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "invalid_apartment",
                    "apartment name must not be empty",
                ));
            }
            let apartment = apartments
                .create(name, session.user_id(), state.now())
                .await
                .map_err(membership_problem)?;
            info!(stage = "household", apartment = %apartment.id, user = session.user_id(), "apartment created");
            Ok((StatusCode::CREATED, Json(apartment)).into_response())
        }
        ApartmentRequest::Join { apartment_id } => {
            apartments
                .add_tenant(&apartment_id, session.user_id(), state.now())
                .await
                .map_err(membership_problem)?;
            let apartment = session.resolve_apartment().await?;
            info!(stage = "household", apartment = %apartment.id, user = session.user_id(), "tenant joined");
            Ok((StatusCode::OK, Json(apartment)).into_response())
        }
    }
}

fn membership_problem(err: ApartmentError) -> ProblemResponse {
    match err {
        ApartmentError::AlreadyTenant => {
            ProblemResponse::new(StatusCode::CONFLICT, "already_tenant", err.to_string())
        }
        ApartmentError::UnknownReference => {
            ProblemResponse::new(StatusCode::NOT_FOUND, "unknown_apartment", err.to_string())
        }
        ApartmentError::Database(_) => ProblemResponse::internal(err.to_string()),
    }
}
