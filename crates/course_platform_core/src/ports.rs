//! crates/course_platform_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or identity
//! providers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AuthUser, Course, CourseDraft, CourseSummary, CourseTree, DashboardStats, Section,
    SectionDraft, SectionWithVideos, UserCredentials, UserProfile, UserProgress, Video,
    VideoContext, VideoDraft, VideoListing, Visibility,
};
use crate::progress::ProgressCounts;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The Course -> Section -> Video hierarchy.
///
/// Every multi-step mutation is atomic: either all rows change or none do.
#[async_trait]
pub trait ContentStore: Send + Sync {
    // --- Courses ---
    /// Courses admitted by `visibility`, newest first.
    async fn list_courses(&self, visibility: Visibility) -> PortResult<Vec<Course>>;

    async fn list_course_summaries(&self) -> PortResult<Vec<CourseSummary>>;

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course>;

    async fn create_course(&self, draft: &CourseDraft) -> PortResult<Course>;

    async fn update_course(&self, course_id: Uuid, draft: &CourseDraft) -> PortResult<Course>;

    /// Removes the course with all of its sections, videos and their progress rows.
    async fn delete_course(&self, course_id: Uuid) -> PortResult<()>;

    /// Course with sections and videos, pre-sorted. A course not admitted by
    /// `visibility` is reported as `NotFound`.
    async fn course_tree(&self, course_id: Uuid, visibility: Visibility) -> PortResult<CourseTree>;

    // --- Sections ---
    async fn get_section(&self, section_id: Uuid) -> PortResult<SectionWithVideos>;

    /// Inserts with the next order index of the course, never reusing one.
    async fn create_section(&self, course_id: Uuid, draft: &SectionDraft) -> PortResult<Section>;

    async fn update_section(&self, section_id: Uuid, draft: &SectionDraft) -> PortResult<Section>;

    /// Removes progress rows of the section's videos, the videos, then the section.
    async fn delete_section(&self, section_id: Uuid) -> PortResult<()>;

    // --- Videos ---
    async fn video_context(&self, video_id: Uuid) -> PortResult<VideoContext>;

    /// Every video with its parent titles, newest first.
    async fn list_videos(&self) -> PortResult<Vec<VideoListing>>;

    /// Inserts with the next order index of the section, never reusing one.
    async fn create_video(&self, section_id: Uuid, draft: &VideoDraft) -> PortResult<Video>;

    async fn update_video(&self, video_id: Uuid, draft: &VideoDraft) -> PortResult<Video>;

    /// Removes the video's progress rows, then the video.
    async fn delete_video(&self, video_id: Uuid) -> PortResult<()>;

    async fn dashboard_stats(&self) -> PortResult<DashboardStats>;
}

#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Upserts the unique `(user_id, video_id)` row. `completed_at` is stamped on the
    /// transition to completed and cleared on the transition back.
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        completed: bool,
    ) -> PortResult<UserProgress>;

    async fn get_progress(&self, user_id: Uuid, video_id: Uuid) -> PortResult<Option<UserProgress>>;

    async fn progress_for_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Vec<UserProgress>>;

    /// Completed and total video counts for the course in a single aggregate read.
    async fn course_progress_counts(&self, user_id: Uuid, course_id: Uuid) -> PortResult<ProgressCounts>;

    async fn course_video_ids(&self, course_id: Uuid) -> PortResult<Vec<Uuid>>;

    /// The subset of `video_ids` the user has completed.
    async fn completed_video_ids(&self, user_id: Uuid, video_ids: &[Uuid]) -> PortResult<Vec<Uuid>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Returns the user's profile, creating a `user`-role profile on first sight.
    async fn ensure_profile(&self, user: &AuthUser) -> PortResult<UserProfile>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<&str>,
    ) -> PortResult<AuthUser>;

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials>;

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// The user behind a live session, or `None` for unknown or expired sessions.
    async fn current_user(&self, session_id: &str) -> PortResult<Option<AuthUser>>;

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()>;
}
