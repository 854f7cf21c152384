//! Report handlers

use std::time::Instant;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::IntoResponse;
use bistro_api_types::{ReportQuery, ReportRequestBody, ReportResponse, ValidationIssue};
use time::OffsetDateTime;

use crate::application::reports::ReportRequest;
use crate::domain::reports::Report;
use crate::domain::types::ReportType;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{
    ReportParams, export_result, report_from_body, report_from_query,
};
use crate::infra::http::api::state::ApiState;

pub async fn get_report(
    State(state): State<ApiState>,
    Path(raw_type): Path<String>,
    query: Result<Query<ReportQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let report_type = parse_report_type(&raw_type)?;
    let Query(query) = query.map_err(|rejection| {
        ApiError::invalid_parameters(vec![ValidationIssue::new("query", rejection.body_text())])
    })?;

    let params = report_from_query(&query)?;
    respond(&state, report_type, params, started).await
}

pub async fn post_report(
    State(state): State<ApiState>,
    Path(raw_type): Path<String>,
    body: Result<Json<ReportRequestBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let started = Instant::now();
    let report_type = parse_report_type(&raw_type)?;
    let Json(body) = body.map_err(|rejection| {
        ApiError::invalid_parameters(vec![ValidationIssue::new("body", rejection.body_text())])
    })?;

    let params = report_from_body(&body)?;
    respond(&state, report_type, params, started).await
}

/// CORS pre-flight for the report endpoints.
pub async fn report_preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("GET, POST, OPTIONS"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type, Authorization"),
            ),
            (header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400")),
        ],
    )
}

fn parse_report_type(raw: &str) -> Result<ReportType, ApiError> {
    raw.parse::<ReportType>()
        .map_err(|_| ApiError::invalid_report_type(raw))
}

async fn respond(
    state: &ApiState,
    report_type: ReportType,
    params: ReportParams,
    started: Instant,
) -> Result<Json<ReportResponse<Report>>, ApiError> {
    let request = ReportRequest {
        report_type,
        config: params.config,
        export: params.export,
    };
    let run = state
        .reports
        .run(request, started)
        .await
        .map_err(|err| ApiError::generation(&err, started.elapsed(), state.errors))?;

    let cached = run.cached();
    Ok(Json(ReportResponse {
        success: true,
        data: run.report,
        export: run.export.map(export_result),
        generation_time: run.elapsed.as_secs_f64() * 1000.0,
        cached,
        timestamp: OffsetDateTime::now_utc(),
    }))
}
