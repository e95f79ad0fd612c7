//! services/api/src/web/admin.rs
//!
//! Content management for administrators. Every route here sits behind the
//! `require_admin` middleware; the catalog checks the role again.
//!
//! Reads return JSON. Writes take url-encoded forms and answer with a
//! `303 See Other` to the page that shows the result.

use axum::{
    extract::{Path, State},
    response::Redirect,
    Form, Json,
};
use chrono::{DateTime, Utc};
use course_platform_core::catalog::{CourseInput, SectionInput, VideoInput};
use course_platform_core::domain::{CourseSummary, DashboardStats, VideoListing};
use course_platform_core::{youtube, SectionWithVideos, Video};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::courses::CourseView;
use crate::web::middleware::CurrentViewer;
use crate::web::state::AppState;

//=========================================================================================
// Form Payloads
//=========================================================================================

/// HTML checkboxes are absent when unticked and `on` when ticked.
fn checked(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("on" | "true" | "1"))
}

#[derive(Deserialize, ToSchema)]
pub struct CourseForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnail_url: String,
    pub is_published: Option<String>,
}

impl From<CourseForm> for CourseInput {
    fn from(f: CourseForm) -> Self {
        Self {
            is_published: checked(&f.is_published),
            title: f.title,
            description: f.description,
            thumbnail_url: f.thumbnail_url,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SectionForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

impl From<SectionForm> for SectionInput {
    fn from(f: SectionForm) -> Self {
        Self {
            title: f.title,
            description: f.description,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct VideoForm {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub youtube_url: String,
    pub is_preview: Option<String>,
}

impl From<VideoForm> for VideoInput {
    fn from(f: VideoForm) -> Self {
        Self {
            is_preview: checked(&f.is_preview),
            title: f.title,
            description: f.description,
            youtube_url: f.youtube_url,
        }
    }
}

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct DashboardResponse {
    pub courses: i64,
    pub published_courses: i64,
    pub sections: i64,
    pub videos: i64,
    pub preview_videos: i64,
}

impl From<DashboardStats> for DashboardResponse {
    fn from(s: DashboardStats) -> Self {
        Self {
            courses: s.courses,
            published_courses: s.published_courses,
            sections: s.sections,
            videos: s.videos,
            preview_videos: s.preview_videos,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AdminCourseRow {
    pub course: CourseView,
    pub section_count: i64,
    pub video_count: i64,
}

impl From<&CourseSummary> for AdminCourseRow {
    fn from(s: &CourseSummary) -> Self {
        Self {
            course: CourseView::from(&s.course),
            section_count: s.section_count,
            video_count: s.video_count,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AdminVideoView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub youtube_url: String,
    pub youtube_video_id: String,
    pub thumbnail_url: String,
    pub order_index: i32,
    pub is_preview: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Video> for AdminVideoView {
    fn from(v: &Video) -> Self {
        Self {
            id: v.id,
            title: v.title.clone(),
            description: v.description.clone(),
            youtube_url: v.youtube_url.clone(),
            youtube_video_id: v.youtube_video_id.clone(),
            thumbnail_url: youtube::thumbnail_url(&v.youtube_video_id),
            order_index: v.order_index,
            is_preview: v.is_preview,
            created_at: v.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AdminSectionView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub videos: Vec<AdminVideoView>,
}

impl From<&SectionWithVideos> for AdminSectionView {
    fn from(s: &SectionWithVideos) -> Self {
        Self {
            id: s.section.id,
            title: s.section.title.clone(),
            description: s.section.description.clone(),
            order_index: s.section.order_index,
            videos: s.videos.iter().map(AdminVideoView::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AdminCourseResponse {
    pub course: CourseView,
    pub sections: Vec<AdminSectionView>,
}

#[derive(Serialize, ToSchema)]
pub struct AdminSectionResponse {
    pub course: CourseView,
    pub section: AdminSectionView,
}

#[derive(Serialize, ToSchema)]
pub struct AdminVideoRow {
    pub video: AdminVideoView,
    pub section_id: Uuid,
    pub section_title: String,
    pub course_id: Uuid,
    pub course_title: String,
}

impl From<&VideoListing> for AdminVideoRow {
    fn from(l: &VideoListing) -> Self {
        Self {
            video: AdminVideoView::from(&l.video),
            section_id: l.video.section_id,
            section_title: l.section_title.clone(),
            course_id: l.course_id,
            course_title: l.course_title.clone(),
        }
    }
}

//=========================================================================================
// Reads
//=========================================================================================

/// GET /admin - Dashboard counts
#[utoipa::path(
    get,
    path = "/admin",
    responses(
        (status = 200, description = "Content counts", body = DashboardResponse),
        (status = 303, description = "Redirect to /login or the home page")
    )
)]
pub async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
) -> Result<Json<DashboardResponse>, ApiError> {
    let stats = state.catalog.dashboard(&viewer).await?;
    Ok(Json(stats.into()))
}

/// GET /admin/courses - Every course, drafts included
#[utoipa::path(
    get,
    path = "/admin/courses",
    responses((status = 200, description = "All courses", body = Vec<AdminCourseRow>))
)]
pub async fn admin_courses_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
) -> Result<Json<Vec<AdminCourseRow>>, ApiError> {
    let courses = state.catalog.admin_courses(&viewer).await?;
    Ok(Json(courses.iter().map(AdminCourseRow::from).collect()))
}

/// GET /admin/courses/{course_id} - A course tree regardless of publication
#[utoipa::path(
    get,
    path = "/admin/courses/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course with sections and videos", body = AdminCourseResponse),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn admin_course_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(course_id): Path<Uuid>,
) -> Result<Json<AdminCourseResponse>, ApiError> {
    let tree = state.catalog.admin_course(&viewer, course_id).await?;
    Ok(Json(AdminCourseResponse {
        course: CourseView::from(&tree.course),
        sections: tree.sections.iter().map(AdminSectionView::from).collect(),
    }))
}

/// GET /admin/sections/{section_id} - A section with its videos
#[utoipa::path(
    get,
    path = "/admin/sections/{section_id}",
    params(("section_id" = Uuid, Path, description = "Section id")),
    responses(
        (status = 200, description = "Section with videos", body = AdminSectionResponse),
        (status = 404, description = "Unknown section")
    )
)]
pub async fn admin_section_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(section_id): Path<Uuid>,
) -> Result<Json<AdminSectionResponse>, ApiError> {
    let page = state.catalog.admin_section(&viewer, section_id).await?;
    Ok(Json(AdminSectionResponse {
        course: CourseView::from(&page.course),
        section: AdminSectionView::from(&page.section),
    }))
}

/// GET /admin/videos - Every video, newest first
#[utoipa::path(
    get,
    path = "/admin/videos",
    responses((status = 200, description = "All videos", body = Vec<AdminVideoRow>))
)]
pub async fn admin_videos_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
) -> Result<Json<Vec<AdminVideoRow>>, ApiError> {
    let videos = state.catalog.admin_videos(&viewer).await?;
    Ok(Json(videos.iter().map(AdminVideoRow::from).collect()))
}

//=========================================================================================
// Course Mutations
//=========================================================================================

/// POST /admin/courses - Create a course
#[utoipa::path(
    post,
    path = "/admin/courses",
    request_body(content = CourseForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the new course"),
        (status = 400, description = "Missing title or description")
    )
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Form(form): Form<CourseForm>,
) -> Result<Redirect, ApiError> {
    let course = state.catalog.create_course(&viewer, &form.into()).await?;
    info!("Created course {}", course.id);
    Ok(Redirect::to(&format!("/admin/courses/{}", course.id)))
}

/// POST /admin/courses/{course_id} - Update a course, including publication
#[utoipa::path(
    post,
    path = "/admin/courses/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course id")),
    request_body(content = CourseForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the course"),
        (status = 400, description = "Missing title or description"),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn update_course_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(course_id): Path<Uuid>,
    Form(form): Form<CourseForm>,
) -> Result<Redirect, ApiError> {
    state
        .catalog
        .update_course(&viewer, course_id, &form.into())
        .await?;
    Ok(Redirect::to(&format!("/admin/courses/{}", course_id)))
}

/// POST /admin/courses/{course_id}/delete - Delete a course and everything under it
#[utoipa::path(
    post,
    path = "/admin/courses/{course_id}/delete",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 303, description = "Redirect to the course list"),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(course_id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    state.catalog.delete_course(&viewer, course_id).await?;
    info!("Deleted course {}", course_id);
    Ok(Redirect::to("/admin/courses"))
}

//=========================================================================================
// Section Mutations
//=========================================================================================

/// POST /admin/courses/{course_id}/sections - Append a section
#[utoipa::path(
    post,
    path = "/admin/courses/{course_id}/sections",
    params(("course_id" = Uuid, Path, description = "Course id")),
    request_body(content = SectionForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the course"),
        (status = 400, description = "Missing title"),
        (status = 404, description = "Unknown course")
    )
)]
pub async fn create_section_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(course_id): Path<Uuid>,
    Form(form): Form<SectionForm>,
) -> Result<Redirect, ApiError> {
    let section = state
        .catalog
        .create_section(&viewer, course_id, &form.into())
        .await?;
    info!("Created section {} at index {}", section.id, section.order_index);
    Ok(Redirect::to(&format!("/admin/courses/{}", course_id)))
}

/// POST /admin/sections/{section_id} - Update a section
#[utoipa::path(
    post,
    path = "/admin/sections/{section_id}",
    params(("section_id" = Uuid, Path, description = "Section id")),
    request_body(content = SectionForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the owning course"),
        (status = 400, description = "Missing title"),
        (status = 404, description = "Unknown section")
    )
)]
pub async fn update_section_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(section_id): Path<Uuid>,
    Form(form): Form<SectionForm>,
) -> Result<Redirect, ApiError> {
    let section = state
        .catalog
        .update_section(&viewer, section_id, &form.into())
        .await?;
    Ok(Redirect::to(&format!("/admin/courses/{}", section.course_id)))
}

/// POST /admin/sections/{section_id}/delete - Delete a section and its videos
#[utoipa::path(
    post,
    path = "/admin/sections/{section_id}/delete",
    params(("section_id" = Uuid, Path, description = "Section id")),
    responses(
        (status = 303, description = "Redirect to the owning course"),
        (status = 404, description = "Unknown section")
    )
)]
pub async fn delete_section_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(section_id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let section = state.catalog.delete_section(&viewer, section_id).await?;
    info!("Deleted section {}", section_id);
    Ok(Redirect::to(&format!("/admin/courses/{}", section.course_id)))
}

//=========================================================================================
// Video Mutations
//=========================================================================================

/// POST /admin/sections/{section_id}/videos - Append a video
#[utoipa::path(
    post,
    path = "/admin/sections/{section_id}/videos",
    params(("section_id" = Uuid, Path, description = "Section id")),
    request_body(content = VideoForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the section"),
        (status = 400, description = "Missing title or unrecognised YouTube URL"),
        (status = 404, description = "Unknown section")
    )
)]
pub async fn create_video_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(section_id): Path<Uuid>,
    Form(form): Form<VideoForm>,
) -> Result<Redirect, ApiError> {
    let video = state
        .catalog
        .create_video(&viewer, section_id, &form.into())
        .await?;
    info!("Created video {} at index {}", video.id, video.order_index);
    Ok(Redirect::to(&format!("/admin/sections/{}", section_id)))
}

/// POST /admin/videos/{video_id} - Update a video; the URL is parsed again
#[utoipa::path(
    post,
    path = "/admin/videos/{video_id}",
    params(("video_id" = Uuid, Path, description = "Video id")),
    request_body(content = VideoForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Redirect to the owning section"),
        (status = 400, description = "Missing title or unrecognised YouTube URL"),
        (status = 404, description = "Unknown video")
    )
)]
pub async fn update_video_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(video_id): Path<Uuid>,
    Form(form): Form<VideoForm>,
) -> Result<Redirect, ApiError> {
    let video = state
        .catalog
        .update_video(&viewer, video_id, &form.into())
        .await?;
    Ok(Redirect::to(&format!("/admin/sections/{}", video.section_id)))
}

/// POST /admin/videos/{video_id}/delete - Delete a video and its progress rows
#[utoipa::path(
    post,
    path = "/admin/videos/{video_id}/delete",
    params(("video_id" = Uuid, Path, description = "Video id")),
    responses(
        (status = 303, description = "Redirect to the owning section"),
        (status = 404, description = "Unknown video")
    )
)]
pub async fn delete_video_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(video_id): Path<Uuid>,
) -> Result<Redirect, ApiError> {
    let context = state.catalog.delete_video(&viewer, video_id).await?;
    info!("Deleted video {}", video_id);
    Ok(Redirect::to(&format!("/admin/sections/{}", context.section.id)))
}
