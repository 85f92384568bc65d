//! Progress and account handlers

use crate::api::rest::auth::AuthUser;
use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{Path, State},
    Json,
};
use primm_types::{
    CourseId, CourseProgress, LessonId, ProgressSummary, StageCompletion, StageId, UserAccount,
};
use serde::Serialize;

/// Account summary response
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    #[serde(flatten)]
    pub account: UserAccount,
    /// XP still needed for the next level
    pub xp_to_next_level: i64,
}

/// The caller's completion record for one stage
pub async fn get_stage_completion(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<StageCompletion>> {
    let completion = state
        .progress
        .stage_completion(user_id, StageId::new(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No submission for stage {} yet", id)))?;
    Ok(Json(completion))
}

pub async fn get_course_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<CourseProgress>> {
    let progress = state
        .progress
        .course_progress(user_id, CourseId::new(id))
        .await?;
    Ok(Json(progress))
}

pub async fn get_lesson_progress(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<ProgressSummary>> {
    let summary = state
        .progress
        .lesson_progress(user_id, LessonId::new(id))
        .await?;
    Ok(Json(summary))
}

pub async fn get_account(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<AccountResponse>> {
    let account = state.progress.account(user_id).await?;
    let next_threshold = i64::from(account.level) * primm_types::XP_PER_LEVEL;
    Ok(Json(AccountResponse {
        xp_to_next_level: (next_threshold - account.experience_points).max(0),
        account,
    }))
}
