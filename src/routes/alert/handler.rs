use axum::{
    Extension,
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;
use crate::store::{GroupStore, StoredAlert};
use crate::utils::{Claims, error_codes, error_to_api_response, success_to_api_response};

use super::model::{AlertInfo, ResolveAlertRequest};

#[derive(Debug, Deserialize)]
pub struct GroupQuery {
    pub group_id: String,
}

#[axum::debug_handler]
pub async fn list_unresolved(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<GroupQuery>,
) -> impl IntoResponse {
    // 只有群组成员能看到告警列表
    match state.store.is_member(&query.group_id, &claims.sub).await {
        Ok(true) => {}
        Ok(false) => {
            return (
                StatusCode::FORBIDDEN,
                error_to_api_response(error_codes::PERMISSION_DENIED, "不在该群组中".to_string()),
            );
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            );
        }
    }

    match StoredAlert::unresolved_for_group(&state.pool, &query.group_id).await {
        Ok(alerts) => {
            let infos = alerts.into_iter().map(AlertInfo::from).collect::<Vec<_>>();
            (StatusCode::OK, success_to_api_response(infos))
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ResolveAlertRequest>,
) -> impl IntoResponse {
    match StoredAlert::resolve(&state.store, &req.alert_id, &claims.sub).await {
        Ok(alert) => (
            StatusCode::OK,
            success_to_api_response(AlertInfo::from(alert)),
        ),
        Err(e) => {
            let status = if e.to_string().contains("Only the leader") {
                StatusCode::FORBIDDEN
            } else if e.to_string().contains("Row not found") {
                StatusCode::NOT_FOUND
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (
                status,
                error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
            )
        }
    }
}
