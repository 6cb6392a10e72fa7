mod reports;
mod research;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use compintel_pipeline::{ErrorClass, Pipeline, PipelineError, Rejection};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// `None` when the pipeline runs over in-memory stores.
    pub pool: Option<PgPool>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(data: T, req_id: RequestId) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(req_id.0),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" | "cooldown_active" | "budget_exhausted" => {
                StatusCode::TOO_MANY_REQUESTS
            }
            "service_unavailable" => StatusCode::SERVICE_UNAVAILABLE,
            "stage_failed" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps a pipeline error to the envelope by its class, never by message text.
pub(super) fn map_pipeline_error(request_id: String, error: &PipelineError) -> ApiError {
    let code = match error {
        PipelineError::Rejected(Rejection::UnknownSubject(_)) => "not_found",
        PipelineError::Rejected(Rejection::Cooldown { .. }) => "cooldown_active",
        PipelineError::Rejected(Rejection::BudgetExhausted { .. }) => "budget_exhausted",
        PipelineError::Rejected(Rejection::InvalidInput(_)) => "validation_error",
        _ => match error.class() {
            ErrorClass::NotFound => "not_found",
            ErrorClass::InvalidState => "conflict",
            ErrorClass::Retryable => "service_unavailable",
            ErrorClass::Fatal => "stage_failed",
            ErrorClass::Precondition => "bad_request",
        },
    };
    match error.class() {
        ErrorClass::Retryable | ErrorClass::Fatal => {
            tracing::error!(error = %error, "pipeline call failed");
        }
        _ => tracing::debug!(error = %error, "pipeline call refused"),
    }
    ApiError::new(request_id, code, error.to_string())
}

pub(super) fn parse_report_id(request_id: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        ApiError::new(
            request_id,
            "validation_error",
            format!("'{raw}' is not a valid report id"),
        )
    })
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/research", post(research::start_research))
        .route(
            "/api/v1/reports/{report_id}/urls",
            post(research::confirm_urls),
        )
        .route(
            "/api/v1/reports/{report_id}/analyze/{url_index}",
            post(research::analyze_url),
        )
        .route(
            "/api/v1/reports/{report_id}/finalize",
            post(research::finalize),
        )
        .route(
            "/api/v1/reports/{report_id}/cancel",
            post(research::cancel),
        )
        .route(
            "/api/v1/reports/{report_id}/status",
            get(reports::get_status),
        )
        .route(
            "/api/v1/reports/{report_id}",
            get(reports::get_report).delete(reports::delete_report),
        )
        .route(
            "/api/v1/subjects/{subject_id}/reports",
            get(reports::list_reports),
        )
        .route("/api/v1/usage", get(reports::get_usage))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    let Some(pool) = state.pool.as_ref() else {
        return (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "none",
                },
                meta,
            }),
        );
    };

    match compintel_db::health_check(pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[cfg(test)]
mod test_support;
