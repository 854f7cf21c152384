//! Cache administration handlers

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;
use bistro_api_types::{
    CacheActionRequest, CacheActionResponse, SmartInvalidationRequest, ValidationIssue,
};
use serde::Serialize;
use serde_json::{Value, json};
use time::OffsetDateTime;

use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{invalidation_event, invalidation_target};
use crate::infra::http::api::state::ApiState;

const SOURCE: &str = "infra::http::api::cache";

/// `POST /api/reports/cache`: dispatch on `action`.
pub async fn cache_action(
    State(state): State<ApiState>,
    body: Result<Json<CacheActionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        ApiError::invalid_parameters(vec![ValidationIssue::new("body", rejection.body_text())])
    })?;
    let admin = &state.cache_admin;

    let response = match request.action.as_str() {
        "invalidate" => {
            let (report_type, date) = invalidation_target(&request)?;
            let (scope, removed) = admin
                .invalidate(report_type, date)
                .await
                .map_err(|err| ApiError::internal(SOURCE, &err))?;
            respond(
                format!("Invalidated {removed} cached reports ({scope})"),
                Some(json!({ "scope": scope.label(), "removed": removed })),
            )
        }
        "warm" => {
            admin.warm();
            respond("Cache warming started".to_string(), None)
        }
        "cleanup" => {
            let removed = admin
                .cleanup()
                .await
                .map_err(|err| ApiError::internal(SOURCE, &err))?;
            respond(
                format!("Removed {removed} expired reports"),
                Some(json!({ "removed": removed })),
            )
        }
        "stats" => {
            let stats = admin
                .stats()
                .await
                .map_err(|err| ApiError::internal(SOURCE, &err))?;
            let data = to_value(&stats)?;
            CacheActionResponse {
                success: true,
                message: None,
                data: Some(data),
                timestamp: OffsetDateTime::now_utc(),
            }
        }
        other => return Err(ApiError::unknown_action(other)),
    };

    Ok(Json(response))
}

/// `PUT /api/reports/cache`: smart invalidation for a data change.
pub async fn smart_invalidate(
    State(state): State<ApiState>,
    body: Result<Json<SmartInvalidationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(request) = body.map_err(|rejection| {
        ApiError::invalid_parameters(vec![ValidationIssue::new("body", rejection.body_text())])
    })?;
    let event = invalidation_event(&request)?;

    let removed = state
        .cache_admin
        .smart_invalidate(&event)
        .await
        .map_err(|err| ApiError::internal(SOURCE, &err))?;

    Ok(Json(respond(
        format!(
            "Invalidated {removed} cached reports affected by {} changes",
            event.data_type
        ),
        None,
    )))
}

fn respond(message: String, data: Option<Value>) -> CacheActionResponse<Value> {
    CacheActionResponse {
        success: true,
        message: Some(message),
        data,
        timestamp: OffsetDateTime::now_utc(),
    }
}

fn to_value(value: &impl Serialize) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|err| ApiError::internal(SOURCE, &err))
}
