use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::AppState;
use crate::utils::{error_codes, error_to_api_response, success_to_api_response};

use super::model::{IdentifyPlantRequest, IdentifyPlantResponse};

#[axum::debug_handler]
pub async fn identify_plant(
    State(state): State<AppState>,
    Json(req): Json<IdentifyPlantRequest>,
) -> impl IntoResponse {
    if req.image_base64.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            error_to_api_response(error_codes::VALIDATION_ERROR, "图片内容不能为空".to_string()),
        );
    }

    match state.plants.identify(&req.image_base64).await {
        Ok(matches) => (
            StatusCode::OK,
            success_to_api_response(IdentifyPlantResponse { matches }),
        ),
        Err(e) => {
            tracing::error!("Plant identification request failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_to_api_response(error_codes::INTERNAL_ERROR, "植物识别服务暂不可用".to_string()),
            )
        }
    }
}
