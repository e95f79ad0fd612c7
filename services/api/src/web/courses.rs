//! services/api/src/web/courses.rs
//!
//! Learner-facing catalog endpoints: the course list, a course with its
//! playlist, and the video page.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use course_platform_core::catalog::{CoursePage, VideoContent, VideoPage};
use course_platform_core::navigation::NavLink;
use course_platform_core::{youtube, Course};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::middleware::CurrentViewer;
use crate::web::state::AppState;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct CourseView {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Course> for CourseView {
    fn from(c: &Course) -> Self {
        Self {
            id: c.id,
            title: c.title.clone(),
            description: c.description.clone(),
            thumbnail_url: c.thumbnail_url.clone(),
            is_published: c.is_published,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// One entry of a course playlist. Locked entries carry no YouTube identifier.
#[derive(Serialize, ToSchema)]
pub struct PlaylistEntry {
    pub id: Uuid,
    pub title: String,
    pub order_index: i32,
    pub is_preview: bool,
    pub accessible: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub youtube_video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PlaylistSection {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub videos: Vec<PlaylistEntry>,
}

#[derive(Serialize, ToSchema)]
pub struct CourseDetailResponse {
    pub course: CourseView,
    pub total_videos: usize,
    pub preview_videos: usize,
    /// Present only for signed-in viewers.
    pub progress_percent: Option<u8>,
    pub sections: Vec<PlaylistSection>,
}

impl From<CoursePage> for CourseDetailResponse {
    fn from(page: CoursePage) -> Self {
        let sections = page
            .tree
            .sections
            .iter()
            .map(|s| PlaylistSection {
                id: s.section.id,
                title: s.section.title.clone(),
                description: s.section.description.clone(),
                order_index: s.section.order_index,
                videos: s
                    .videos
                    .iter()
                    .map(|v| {
                        let accessible = page.can_play(v);
                        PlaylistEntry {
                            id: v.id,
                            title: v.title.clone(),
                            order_index: v.order_index,
                            is_preview: v.is_preview,
                            accessible,
                            completed: page.completed.contains(&v.id),
                            youtube_video_id: accessible.then(|| v.youtube_video_id.clone()),
                            thumbnail_url: accessible
                                .then(|| youtube::thumbnail_url(&v.youtube_video_id)),
                        }
                    })
                    .collect(),
            })
            .collect();

        Self {
            course: CourseView::from(&page.tree.course),
            total_videos: page.tree.video_count(),
            preview_videos: page.tree.preview_count(),
            progress_percent: page.progress_percent,
            sections,
        }
    }
}

#[derive(Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum VideoContentView {
    Playable {
        youtube_video_id: String,
        embed_url: String,
        description: Option<String>,
        completed: Option<bool>,
    },
    LoginRequired,
}

#[derive(Serialize, ToSchema)]
pub struct NavLinkView {
    pub video_id: Uuid,
    pub title: String,
}

impl From<NavLink> for NavLinkView {
    fn from(link: NavLink) -> Self {
        Self {
            video_id: link.video_id,
            title: link.title,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct NavigationView {
    pub previous: Option<NavLinkView>,
    pub next: Option<NavLinkView>,
    pub position: usize,
    pub total: usize,
}

#[derive(Serialize, ToSchema)]
pub struct VideoPageResponse {
    pub course_id: Uuid,
    pub course_title: String,
    pub section_id: Uuid,
    pub section_title: String,
    pub video_id: Uuid,
    pub title: String,
    pub is_preview: bool,
    pub content: VideoContentView,
    pub navigation: NavigationView,
}

impl From<VideoPage> for VideoPageResponse {
    fn from(page: VideoPage) -> Self {
        let content = match page.content {
            VideoContent::Playable {
                youtube_video_id,
                embed_url,
                description,
                completed,
            } => VideoContentView::Playable {
                youtube_video_id,
                embed_url,
                description,
                completed,
            },
            VideoContent::LoginRequired => VideoContentView::LoginRequired,
        };
        Self {
            course_id: page.course.id,
            course_title: page.course.title,
            section_id: page.section.id,
            section_title: page.section.title,
            video_id: page.video_id,
            title: page.title,
            is_preview: page.is_preview,
            content,
            navigation: NavigationView {
                previous: page.navigation.previous.map(NavLinkView::from),
                next: page.navigation.next.map(NavLinkView::from),
                position: page.navigation.position,
                total: page.navigation.total,
            },
        }
    }
}

#[derive(Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CourseQuery {
    /// Case-insensitive filter on title and description.
    pub q: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /courses - Published courses, newest first
#[utoipa::path(
    get,
    path = "/courses",
    params(CourseQuery),
    responses(
        (status = 200, description = "Published courses", body = Vec<CourseView>),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_courses_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CourseQuery>,
) -> Result<Json<Vec<CourseView>>, ApiError> {
    let courses = state.catalog.published_courses(query.q.as_deref()).await?;
    Ok(Json(courses.iter().map(CourseView::from).collect()))
}

/// GET /courses/{course_id} - A published course with its playlist
#[utoipa::path(
    get,
    path = "/courses/{course_id}",
    params(("course_id" = Uuid, Path, description = "Course id")),
    responses(
        (status = 200, description = "Course detail", body = CourseDetailResponse),
        (status = 404, description = "Unknown or unpublished course")
    )
)]
pub async fn course_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path(course_id): Path<Uuid>,
) -> Result<Json<CourseDetailResponse>, ApiError> {
    let page = state.catalog.course_page(&viewer, course_id).await?;
    Ok(Json(page.into()))
}

/// GET /courses/{course_id}/videos/{video_id} - The video page
#[utoipa::path(
    get,
    path = "/courses/{course_id}/videos/{video_id}",
    params(
        ("course_id" = Uuid, Path, description = "Course id"),
        ("video_id" = Uuid, Path, description = "Video id")
    ),
    responses(
        (status = 200, description = "Playable video or a sign-in prompt", body = VideoPageResponse),
        (status = 404, description = "Video not in a published course")
    )
)]
pub async fn video_handler(
    State(state): State<Arc<AppState>>,
    CurrentViewer(viewer): CurrentViewer,
    Path((course_id, video_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<VideoPageResponse>, ApiError> {
    let page = state.catalog.video_page(&viewer, course_id, video_id).await?;
    Ok(Json(page.into()))
}
