//! services/api/src/web/progress.rs
//!
//! Completion tracking for signed-in learners.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::CurrentViewer;
use crate::web::state::AppState;

#[derive(Deserialize, ToSchema)]
pub struct SetProgressRequest {
    pub completed: bool,
}

/// The stored state after the write. Clients display this, not what they sent.
#[derive(Serialize, ToSchema)]
pub struct ProgressResponse {
    pub video_id: Uuid,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct CourseProgressResponse {
    pub course_id: Uuid,
    pub percent: u8,
}

/// POST /videos/{video_id}/progress - Mark a video complete or incomplete
#[utoipa::path(
    post,
    path = "/videos/{video_id}/progress",
    params(("video_id" = Uuid, Path, description = "Video id")),
    request_body = SetProgressRequest,
    responses(
        (status = 200, description = "Stored completion state", body = ProgressResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Video not reachable")
    )
)]
pub async fn set_progress_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(video_id): Path<Uuid>,
    Json(req): Json<SetProgressRequest>,
) -> Result<Json<ProgressResponse>, ApiError> {
    let progress = state
        .catalog
        .set_video_completion(&viewer, video_id, req.completed)
        .await?;
    info!(
        "User {} set video {} completed={}",
        progress.user_id, progress.video_id, progress.is_completed
    );

    Ok(Json(ProgressResponse {
        video_id: progress.video_id,
        is_completed: progress.is_completed,
        completed_at: progress.completed_at,
    }))
}

/// GET /courses/{course_id}/progress - The viewer's completion percentage
#[utoipa::path(
    get,
    path = "/courses/{course_id}/progress",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Completion percentage", body = CourseProgressResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "Unknown or unpublished course")
    )
)]
pub async fn course_progress_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseProgressResponse>, ApiError> {
    let percent = state.catalog.viewer_course_progress(&viewer, course_id).await?;
    Ok(Json(CourseProgressResponse { course_id, percent }))
}
