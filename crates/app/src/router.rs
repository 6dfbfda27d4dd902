use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::de::DeserializeOwned;
use tracing::warn;

use hearth_core::payment::PaymentService;
use hearth_core::{ChoreSubmission, Clock, DueDateAnchor, HouseholdCalendar};
use hearth_storage::{Database, HouseholdSession};

use crate::auth::SessionTokenValidator;
use crate::problem::ProblemResponse;
use crate::{chores, household, payments, telemetry};

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    calendar: HouseholdCalendar,
    submission: Arc<ChoreSubmission>,
    payments: Arc<PaymentService>,
    token_validator: SessionTokenValidator,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        calendar: HouseholdCalendar,
        anchor: DueDateAnchor,
        token_secret: &[u8],
    ) -> Self {
        Self {
            metrics,
            storage,
            submission: Arc::new(ChoreSubmission::new(calendar.clone(), anchor)),
            payments: Arc::new(PaymentService::new(calendar.clone())),
            calendar,
            token_validator: SessionTokenValidator::new(token_secret),
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.calendar.now()
    }

    pub fn submission(&self) -> &ChoreSubmission {
        &self.submission
    }

    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }

    /// Authenticates the caller and returns a store session scoped to them.
    ///
    /// The user row is refreshed from the token's `name` claim on every call.
    pub async fn session(&self, headers: &HeaderMap) -> Result<HouseholdSession, ProblemResponse> {
        let now = self.now();
        let claims = self
            .token_validator
            .authenticate(headers, now)
            .map_err(|err| {
                counter!("auth_rejected_total").increment(1);
                warn!(stage = "auth", error = %err, "request rejected");
                ProblemResponse::from(err)
            })?;

        self.storage
            .users()
            .upsert(&claims.sub, claims.display_name(), now)
            .await
            .map_err(|err| ProblemResponse::internal(err.to_string()))?;

        let calendar = self.calendar.clone();
        let clock: Clock = Arc::new(move || calendar.now());
        Ok(HouseholdSession::with_clock(
            self.storage.clone(),
            claims.sub,
            clock,
        ))
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/apartments", post(household::create_or_join))
        .route("/api/chores", get(chores::list).post(chores::submit))
        .route("/api/chores/:id/completion", post(chores::set_completion))
        .route("/api/payments", get(payments::list).post(payments::create))
        .with_state(state)
}

/// Decodes a JSON request body, reporting failures as problem responses.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ProblemResponse> {
    serde_json::from_slice(body).map_err(|err| {
        ProblemResponse::new(StatusCode::BAD_REQUEST, "invalid_body", err.to_string())
    })
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> Response {
    let body = telemetry::render_metrics(state.metrics());
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        Body::from(body),
    )
        .into_response()
}
