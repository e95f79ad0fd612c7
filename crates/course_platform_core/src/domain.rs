//! crates/course_platform_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

//=========================================================================================
// Content Hierarchy
//=========================================================================================

/// The root of the content hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Course {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named, ordered grouping of videos owned by exactly one course.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A single YouTube-backed lesson owned by exactly one section.
#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    pub id: Uuid,
    pub section_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub youtube_url: String,
    pub youtube_video_id: String,
    pub order_index: i32,
    pub is_preview: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whether a read may see draft courses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    PublishedOnly,
    Any,
}

impl Visibility {
    pub fn admits(self, course: &Course) -> bool {
        match self {
            Visibility::PublishedOnly => course.is_published,
            Visibility::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SectionWithVideos {
    pub section: Section,
    pub videos: Vec<Video>,
}

/// A course with its sections and videos, always in canonical order:
/// sections by `order_index`, and videos by `order_index` within each section.
#[derive(Debug, Clone, PartialEq)]
pub struct CourseTree {
    pub course: Course,
    pub sections: Vec<SectionWithVideos>,
}

impl CourseTree {
    /// Groups flat section and video rows under the course and sorts them.
    /// Videos whose section is not among `sections` are dropped.
    pub fn assemble(course: Course, mut sections: Vec<Section>, videos: Vec<Video>) -> Self {
        sections.sort_by(|a, b| {
            (a.order_index, a.created_at, a.id).cmp(&(b.order_index, b.created_at, b.id))
        });

        let mut by_section: HashMap<Uuid, Vec<Video>> = HashMap::new();
        for video in videos {
            by_section.entry(video.section_id).or_default().push(video);
        }

        let sections = sections
            .into_iter()
            .map(|section| {
                let mut videos = by_section.remove(&section.id).unwrap_or_default();
                videos.sort_by(|a, b| {
                    (a.order_index, a.created_at, a.id).cmp(&(b.order_index, b.created_at, b.id))
                });
                SectionWithVideos { section, videos }
            })
            .collect();

        Self { course, sections }
    }

    /// Every video in the course, section order first, then video order.
    pub fn videos(&self) -> impl Iterator<Item = (&Section, &Video)> {
        self.sections
            .iter()
            .flat_map(|s| s.videos.iter().map(move |v| (&s.section, v)))
    }

    pub fn video_count(&self) -> usize {
        self.sections.iter().map(|s| s.videos.len()).sum()
    }

    pub fn preview_count(&self) -> usize {
        self.videos().filter(|(_, v)| v.is_preview).count()
    }
}

/// A video together with its single parent section and course.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoContext {
    pub video: Video,
    pub section: Section,
    pub course: Course,
}

/// Row for the admin course list.
#[derive(Debug, Clone)]
pub struct CourseSummary {
    pub course: Course,
    pub section_count: i64,
    pub video_count: i64,
}

/// Row for the admin list of every video.
#[derive(Debug, Clone)]
pub struct VideoListing {
    pub video: Video,
    pub section_title: String,
    pub course_id: Uuid,
    pub course_title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardStats {
    pub courses: i64,
    pub published_courses: i64,
    pub sections: i64,
    pub videos: i64,
    pub preview_videos: i64,
}

//=========================================================================================
// Mutation Inputs
//=========================================================================================

#[derive(Debug, Clone)]
pub struct CourseDraft {
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: Option<String>,
    pub is_published: bool,
}

#[derive(Debug, Clone)]
pub struct SectionDraft {
    pub title: String,
    pub description: Option<String>,
}

/// Video fields after validation; `youtube_video_id` is already extracted.
#[derive(Debug, Clone)]
pub struct VideoDraft {
    pub title: String,
    pub description: Option<String>,
    pub youtube_url: String,
    pub youtube_video_id: String,
    pub is_preview: bool,
}

//=========================================================================================
// Progress
//=========================================================================================

/// Per-user, per-video completion state. At most one row per `(user_id, video_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProgress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub video_id: Uuid,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//=========================================================================================
// Users
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Only the exact value `"admin"` grants elevated access.
    pub fn parse(value: &str) -> Self {
        if value == "admin" {
            Role::Admin
        } else {
            Role::User
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user as reported by the identity provider.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl AuthUser {
    /// Full name if present, else the local part of the email.
    pub fn default_display_name(&self) -> String {
        if let Some(name) = self.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match self.email.split('@').next() {
            Some(local) if !local.is_empty() => local.to_string(),
            _ => "User".to_string(),
        }
    }
}

// Only used internally for login/signup - contains sensitive data
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user_id: Uuid,
    pub email: String,
    pub hashed_password: String,
}
