//! Stage submission handlers

use crate::api::rest::auth::AuthUser;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use primm_types::{
    RewardResponse, StageId, StageSubmissionRequest, SubmissionResult, SubmitInvestigateRequest,
    SubmitMakeRequest, SubmitModifyRequest, SubmitPredictRequest, SubmitRunRequest,
};

/// Generic submission for any stage type
pub async fn submit_stage(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
    Json(request): Json<StageSubmissionRequest>,
) -> ApiResult<Json<SubmissionResult>> {
    if request.submission_type.is_none() {
        return Err(ApiError::BadRequest("submission_type is required".to_string()));
    }
    let result = state
        .progress
        .submit_stage(user_id, StageId::new(id), request)
        .await?;
    Ok(Json(result))
}

pub async fn submit_predict(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<SubmitPredictRequest>,
) -> ApiResult<Json<RewardResponse>> {
    Ok(Json(state.progress.submit_predict(user_id, request).await?))
}

pub async fn submit_run(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<SubmitRunRequest>,
) -> ApiResult<Json<RewardResponse>> {
    Ok(Json(state.progress.submit_run(user_id, request).await?))
}

pub async fn submit_investigate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<SubmitInvestigateRequest>,
) -> ApiResult<Json<RewardResponse>> {
    Ok(Json(state.progress.submit_investigate(user_id, request).await?))
}

pub async fn submit_modify(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<SubmitModifyRequest>,
) -> ApiResult<Json<RewardResponse>> {
    Ok(Json(state.progress.submit_modify(user_id, request).await?))
}

pub async fn submit_make(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(request): Json<SubmitMakeRequest>,
) -> ApiResult<Json<RewardResponse>> {
    Ok(Json(state.progress.submit_make(user_id, request).await?))
}
