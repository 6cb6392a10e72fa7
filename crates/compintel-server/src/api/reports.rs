use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use compintel_pipeline::{ReportListItem, ReportResponse, StatusResponse, UsageResponse};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_pipeline_error, parse_report_id, ApiError, ApiResponse, AppState};

const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Deserialize)]
pub(super) struct ListReportsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct DeletedData {
    deleted: bool,
}

pub(super) async fn get_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(report_id): Path<String>,
) -> Result<Json<ApiResponse<StatusResponse>>, ApiError> {
    let report_id = parse_report_id(&req_id.0, &report_id)?;
    let status = state
        .pipeline
        .status(report_id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(status, req_id))
}

pub(super) async fn get_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(report_id): Path<String>,
) -> Result<Json<ApiResponse<ReportResponse>>, ApiError> {
    let report_id = parse_report_id(&req_id.0, &report_id)?;
    let report = state
        .pipeline
        .report(report_id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(report, req_id))
}

pub(super) async fn delete_report(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(report_id): Path<String>,
) -> Result<Json<ApiResponse<DeletedData>>, ApiError> {
    let report_id = parse_report_id(&req_id.0, &report_id)?;
    state
        .pipeline
        .delete_report(report_id)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(DeletedData { deleted: true }, req_id))
}

pub(super) async fn list_reports(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(subject_id): Path<String>,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<ApiResponse<Vec<ReportListItem>>>, ApiError> {
    let reports = state
        .pipeline
        .list_reports(&subject_id, query.limit.unwrap_or(DEFAULT_LIST_LIMIT))
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(reports, req_id))
}

pub(super) async fn get_usage(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<UsageResponse>>, ApiError> {
    let usage = state
        .pipeline
        .usage()
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(usage, req_id))
}
