use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use metrics::counter;

use hearth_core::payment::{PaymentError, PaymentForm};
use hearth_core::IdentityResolver;

use crate::problem::ProblemResponse;
use crate::router::{parse_body, AppState};

pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    let session = state.session(&headers).await?;
    let form: PaymentForm = parse_body(&body)?;

    match state.payments().create_payment(&session, form).await {
        Ok(draft) => {
            counter!("payments_created_total", "result" => "created").increment(1);
            Ok((StatusCode::CREATED, Json(draft)).into_response())
        }
        Err(err) => {
            counter!("payments_created_total", "result" => "failed").increment(1);
            Err(payment_problem(err))
        }
    }
}

/// Lists the caller's apartment payments by due date.
pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ProblemResponse> {
    let session = state.session(&headers).await?;
    let apartment = session.resolve_apartment().await?;
    let payments = state
        .storage()
        .payments()
        .list_for_apartment(apartment.id.as_str())
        .await
        .map_err(|err| ProblemResponse::internal(err.to_string()))?;
    Ok(Json(payments).into_response())
}

fn payment_problem(err: PaymentError) -> ProblemResponse {
    match err {
        PaymentError::Identity(store) | PaymentError::Store(store) => ProblemResponse::from(store),
        PaymentError::Form(_) | PaymentError::DueInPast(_) | PaymentError::NotATenant(_) => {
            ProblemResponse::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_payment",
                err.to_string(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::router::app_router;
    use crate::router::test_support::*;

    use super::*;

    async fn shared_household(state: &AppState) -> String {
        let alex = token_for(state, "user-1", "Alex");
        let sam = token_for(state, "user-2", "Sam");
        let created = read_json(
            app_router(state.clone())
                .oneshot(json_request(
                    "POST",
                    "/api/apartments",
                    &alex,
                    json!({ "name": "Maple St" }),
                ))
                .await
                .unwrap(),
        )
        .await;
        let response = app_router(state.clone())
            .oneshot(json_request(
                "POST",
                "/api/apartments",
                &sam,
                json!({ "apartment_id": created["id"] }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        alex
    }

    fn rent(loanee: &str, due: &str) -> Value {
        json!({
            "paymentAmount": "450.00",
            "loaner": "user-1",
            "loanee": loanee,
            "dueDate": due,
            "paymentDescription": "January rent",
            "paymentCategory": "rent",
            "recurringPeriod": "monthly",
        })
    }

    #[tokio::test]
    async fn creates_and_lists_payment() {
        let state = setup_state().await;
        let token = shared_household(&state).await;

        let response = app_router(state.clone())
            .oneshot(json_request("POST", "/api/payments", &token, rent("user-2", "2024-01-31")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = read_json(response).await;
        assert_eq!(created["amount_cents"], 45000);

        let listed = read_json(
            app_router(state)
                .oneshot(get_request("/api/payments", &token))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["loanee"], "user-2");
    }

    #[tokio::test]
    async fn stranger_cannot_be_loanee() {
        let state = setup_state().await;
        let token = shared_household(&state).await;

        let response = app_router(state)
            .oneshot(json_request("POST", "/api/payments", &token, rent("user-9", "2024-01-31")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
