use axum::{
    Extension,
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use crate::AppState;
use crate::store::{GroupRecord, GroupStore};
use crate::utils::{Claims, error_codes, error_to_api_response, success_to_api_response};

use super::model::{
    CreateGroupRequest, GroupInfo, GroupMember, JoinGroupRequest, UpdateRadiusRequest,
};

#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub group_id: String,
}

#[axum::debug_handler]
pub async fn create_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> impl IntoResponse {
    if req.name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(error_codes::VALIDATION_ERROR, "群组名称不能为空".to_string()),
        );
    }

    // 半径是运营策略参数，创建时收敛到配置区间
    let radius = state.config.clamp_zone_radius(req.radius_meters);

    match GroupRecord::create(&state.pool, req.name.trim(), &claims.sub, radius).await {
        Ok(group) => {
            // 队长上报第一次位置前，安全区中心保持未知
            state
                .registry
                .register_group(&group.group_id, &group.leader_id, group.radius_meters);
            (
                StatusCode::CREATED,
                success_to_api_response(GroupInfo::from(group)),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn find_by_id(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> impl IntoResponse {
    match state.store.get_group(&query.group_id).await {
        Ok(Some(group)) => (
            StatusCode::OK,
            success_to_api_response(GroupInfo::from(group)),
        ),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            error_to_api_response(error_codes::NOT_FOUND, "Group not found".to_string()),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}

#[axum::debug_handler]
pub async fn join_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<JoinGroupRequest>,
) -> impl IntoResponse {
    match GroupRecord::join(&state.store, &req.group_id, &claims.sub).await {
        Ok(_) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "success": true
            })),
        ),
        Err(e) => {
            let status = if e.to_string().contains("not active") {
                StatusCode::BAD_REQUEST
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

#[axum::debug_handler]
pub async fn leave_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<IdQuery>,
) -> impl IntoResponse {
    match GroupRecord::leave(&state.store, &req.group_id, &claims.sub).await {
        Ok(_) => (
            StatusCode::OK,
            success_to_api_response(serde_json::json!({
                "success": true
            })),
        ),
        Err(e) => {
            let status = if e.to_string().contains("User not in group")
                || e.to_string().contains("Leader cannot leave")
            {
                StatusCode::BAD_REQUEST
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

#[axum::debug_handler]
pub async fn update_radius(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateRadiusRequest>,
) -> impl IntoResponse {
    let radius = state.config.clamp_zone_radius(Some(req.radius_meters));

    match GroupRecord::update_radius(&state.store, &req.group_id, &claims.sub, radius).await {
        Ok(group) => {
            // 注册表同步新半径，已知的中心保持不变
            state.registry.update_radius(&group.group_id, group.radius_meters);
            (
                StatusCode::OK,
                success_to_api_response(GroupInfo::from(group)),
            )
        }
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

#[axum::debug_handler]
pub async fn deactivate_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<IdQuery>,
) -> impl IntoResponse {
    match GroupRecord::deactivate(&state.store, &req.group_id, &claims.sub).await {
        Ok(group) => {
            // 行程结束，丢弃安全区
            state.registry.remove_group(&group.group_id);
            (
                StatusCode::OK,
                success_to_api_response(GroupInfo::from(group)),
            )
        }
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

#[axum::debug_handler]
pub async fn get_members(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> impl IntoResponse {
    match GroupRecord::members(&state.pool, &query.group_id).await {
        Ok(members) => (
            StatusCode::OK,
            success_to_api_response::<Vec<GroupMember>>(members),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_to_api_response(error_codes::INTERNAL_ERROR, e.to_string()),
        ),
    }
}
