use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::service::IngestError;
use crate::store::LocationStore;
use crate::utils::{ApiResponse, Claims, error_codes, error_to_api_response,
    success_to_api_response};

use super::model::{
    GroupQuery, MemberLocation, ReportLocationRequest, ReportLocationResponse, UserQuery,
};

/// 队长位置上报：刷新安全区中心，绝不会触发针对队长本人的告警
#[axum::debug_handler]
pub async fn report_leader_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReportLocationRequest>,
) -> impl IntoResponse {
    match state
        .ingest
        .report_leader_location(&req.group_id, &claims.sub, req.to_report())
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            success_to_api_response(ReportLocationResponse {
                stored: outcome.stored,
                is_out_of_range: outcome.out_of_range,
            }),
        ),
        Err(e) => ingest_error_response(e),
    }
}

/// 成员位置上报：越界时响应里直接带出is_out_of_range
#[axum::debug_handler]
pub async fn report_member_location(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ReportLocationRequest>,
) -> impl IntoResponse {
    match state
        .ingest
        .report_member_location(&req.group_id, &claims.sub, req.to_report())
        .await
    {
        Ok(outcome) => (
            StatusCode::OK,
            success_to_api_response(ReportLocationResponse {
                stored: outcome.stored,
                is_out_of_range: outcome.out_of_range,
            }),
        ),
        Err(e) => ingest_error_response(e),
    }
}

#[axum::debug_handler]
pub async fn find_latest(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> impl IntoResponse {
    match state.store.find_latest_location(&query.user_id).await {
        Ok(Some(sample)) => (StatusCode::OK, success_to_api_response(sample)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "No location reported yet".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn group_locations(
    State(state): State<AppState>,
    Query(query): Query<GroupQuery>,
) -> impl IntoResponse {
    match MemberLocation::latest_for_group(&state.pool, &query.group_id).await {
        Ok(locations) => (StatusCode::OK, success_to_api_response(locations)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

/// 核心错误分类到HTTP状态码和业务错误码的映射
fn ingest_error_response(
    err: IngestError,
) -> (StatusCode, Json<ApiResponse<ReportLocationResponse>>) {
    let (status, code) = match &err {
        IngestError::InvalidCoordinate { .. } | IngestError::InvalidSpeed(_) => {
            (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR)
        }
        IngestError::NotLeader { .. } | IngestError::LeaderSelfReport { .. } => {
            (StatusCode::FORBIDDEN, error_codes::PERMISSION_DENIED)
        }
        IngestError::GroupNotFound(_) | IngestError::NotMember { .. } => {
            (StatusCode::NOT_FOUND, error_codes::NOT_FOUND)
        }
        IngestError::Persistence(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, error_codes::INTERNAL_ERROR)
        }
    };

    if status.is_server_error() {
        tracing::error!("Location ingest failed: {}", err);
    }

    (status, error_to_api_response(code, err.to_string()))
}
