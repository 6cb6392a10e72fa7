//! Pipeline stage endpoints, called in order by the client driver.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use compintel_pipeline::{
    AnalyzeUrlResponse, CancelResponse, ConfirmUrlsResponse, FinalizeResponse,
    StartResearchResponse,
};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{map_pipeline_error, parse_report_id, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct StartResearchRequest {
    pub subject_id: String,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ConfirmUrlsRequest {
    pub urls: Vec<String>,
}

pub(super) async fn start_research(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<StartResearchRequest>,
) -> Result<Json<ApiResponse<StartResearchResponse>>, ApiError> {
    let subject_id = body.subject_id.trim();
    if subject_id.is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "subject_id must not be empty",
        ));
    }

    let response = state
        .pipeline
        .start_research(subject_id, body.force_refresh)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(response, req_id))
}

pub(super) async fn confirm_urls(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(report_id): Path<String>,
    Json(body): Json<ConfirmUrlsRequest>,
) -> Result<Json<ApiResponse<ConfirmUrlsResponse>>, ApiError> {
    let report_id = parse_report_id(&req_id.0, &report_id)?;

    let response = state
        .pipeline
        .confirm_urls(report_id, &body.urls)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(response, req_id))
}

pub(super) async fn analyze_url(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((report_id, url_index)): Path<(String, usize)>,
) -> Result<Json<ApiResponse<AnalyzeUrlResponse>>, ApiError> {
    let report_id = parse_report_id(&req_id.0, &report_id)?;

    let response = state
        .pipeline
        .analyze_url(report_id, url_index)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(response, req_id))
}

pub(super) async fn finalize(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(report_id): Path<String>,
) -> Result<Json<ApiResponse<FinalizeResponse>>, ApiError> {
    let report_id = parse_report_id(&req_id.0, &report_id)?;

    let response = state
        .pipeline
        .finalize(report_id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(response, req_id))
}

pub(super) async fn cancel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(report_id): Path<String>,
) -> Result<Json<ApiResponse<CancelResponse>>, ApiError> {
    let report_id = parse_report_id(&req_id.0, &report_id)?;

    let response = state
        .pipeline
        .cancel(report_id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(response, req_id))
}
