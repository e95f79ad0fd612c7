//! crates/course_platform_core/src/catalog.rs
//!
//! The application service behind every page and form. It validates input,
//! enforces role and visibility rules, and delegates persistence to the ports.
//! Validation and authorization always run before any store mutation.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::access::{self, VideoAccess};
use crate::domain::{
    Course, CourseDraft, CourseSummary, CourseTree, DashboardStats, Section, SectionDraft,
    SectionWithVideos, UserProgress, Video, VideoContext, VideoDraft, VideoListing, Visibility,
};
use crate::identity::Viewer;
use crate::navigation::{self, VideoNavigation};
use crate::ports::{ContentStore, PortError, ProgressStore};
use crate::progress::ProgressCounts;
use crate::youtube;

//=========================================================================================
// Errors
//=========================================================================================

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// A required field is missing or malformed. Nothing was written.
    #[error("{0}")]
    Validation(String),
    /// Unknown id, or an id the viewer may not see. The two are indistinguishable.
    #[error("Not found")]
    NotFound,
    #[error("Authentication required")]
    Authentication,
    #[error("Admin role required")]
    Authorization,
    #[error("Store failure: {0}")]
    Store(#[source] PortError),
}

impl From<PortError> for CatalogError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::NotFound(_) => CatalogError::NotFound,
            PortError::Unauthorized => CatalogError::Authentication,
            other => CatalogError::Store(other),
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

//=========================================================================================
// Raw Form Input
//=========================================================================================

#[derive(Debug, Clone, Default)]
pub struct CourseInput {
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub is_published: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SectionInput {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default)]
pub struct VideoInput {
    pub title: String,
    pub description: String,
    pub youtube_url: String,
    pub is_preview: bool,
}

fn required(value: &str, message: &str) -> CatalogResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CatalogError::Validation(message.to_string()));
    }
    Ok(value.to_string())
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

impl CourseInput {
    pub fn validate(&self) -> CatalogResult<CourseDraft> {
        Ok(CourseDraft {
            title: required(&self.title, "Course title is required")?,
            description: Some(required(&self.description, "Course description is required")?),
            thumbnail_url: optional(&self.thumbnail_url),
            is_published: self.is_published,
        })
    }
}

impl SectionInput {
    pub fn validate(&self) -> CatalogResult<SectionDraft> {
        Ok(SectionDraft {
            title: required(&self.title, "Section title is required")?,
            description: optional(&self.description),
        })
    }
}

impl VideoInput {
    pub fn validate(&self) -> CatalogResult<VideoDraft> {
        let title = required(&self.title, "Video title is required")?;
        let youtube_url = required(&self.youtube_url, "YouTube URL is required")?;
        let youtube_video_id = youtube::extract_video_id(&youtube_url).ok_or_else(|| {
            CatalogError::Validation("Enter a valid YouTube URL".to_string())
        })?;
        Ok(VideoDraft {
            title,
            description: optional(&self.description),
            youtube_url,
            youtube_video_id,
            is_preview: self.is_preview,
        })
    }
}

//=========================================================================================
// Page Models
//=========================================================================================

/// A published course as seen by one viewer.
#[derive(Debug, Clone)]
pub struct CoursePage {
    pub tree: CourseTree,
    pub signed_in: bool,
    pub completed: HashSet<Uuid>,
    pub progress_percent: Option<u8>,
}

impl CoursePage {
    pub fn can_play(&self, video: &Video) -> bool {
        video.is_preview || self.signed_in
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VideoContent {
    Playable {
        youtube_video_id: String,
        embed_url: String,
        description: Option<String>,
        /// `None` for anonymous viewers of a preview video.
        completed: Option<bool>,
    },
    /// The identifier and description are withheld.
    LoginRequired,
}

#[derive(Debug, Clone)]
pub struct VideoPage {
    pub course: Course,
    pub section: Section,
    pub video_id: Uuid,
    pub title: String,
    pub is_preview: bool,
    pub content: VideoContent,
    pub navigation: VideoNavigation,
}

#[derive(Debug, Clone)]
pub struct SectionPage {
    pub course: Course,
    pub section: SectionWithVideos,
}

//=========================================================================================
// The Catalog Service
//=========================================================================================

#[derive(Clone)]
pub struct Catalog {
    content: Arc<dyn ContentStore>,
    progress: Arc<dyn ProgressStore>,
}

impl Catalog {
    pub fn new(content: Arc<dyn ContentStore>, progress: Arc<dyn ProgressStore>) -> Self {
        Self { content, progress }
    }

    // --- Learner reads ---

    /// Published courses, newest first, optionally filtered by a case-insensitive
    /// substring of the title or description.
    pub async fn published_courses(&self, query: Option<&str>) -> CatalogResult<Vec<Course>> {
        let courses = self.content.list_courses(Visibility::PublishedOnly).await?;
        let Some(needle) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return Ok(courses);
        };
        let needle = needle.to_lowercase();
        Ok(courses
            .into_iter()
            .filter(|c| {
                c.title.to_lowercase().contains(&needle)
                    || c
                        .description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&needle))
            })
            .collect())
    }

    pub async fn course_page(&self, viewer: &Viewer, course_id: Uuid) -> CatalogResult<CoursePage> {
        let tree = self.content.course_tree(course_id, Visibility::PublishedOnly).await?;

        let (completed, progress_percent) = match viewer.user_id() {
            Some(user_id) => match self.progress.progress_for_course(user_id, course_id).await {
                Ok(rows) => {
                    let completed: HashSet<Uuid> = rows
                        .into_iter()
                        .filter(|p| p.is_completed)
                        .map(|p| p.video_id)
                        .collect();
                    let counts = ProgressCounts {
                        completed: completed.len() as i64,
                        total: tree.video_count() as i64,
                    };
                    (completed, Some(counts.percent()))
                }
                // The course still renders, just without progress.
                Err(e) => {
                    error!("Failed to load progress for course {}: {:?}", course_id, e);
                    (HashSet::new(), None)
                }
            },
            None => (HashSet::new(), None),
        };

        Ok(CoursePage {
            tree,
            signed_in: viewer.is_authenticated(),
            completed,
            progress_percent,
        })
    }

    /// The video page for `course_id`/`video_id`. A non-preview video requested
    /// without a signed-in user renders as [`VideoContent::LoginRequired`].
    pub async fn video_page(
        &self,
        viewer: &Viewer,
        course_id: Uuid,
        video_id: Uuid,
    ) -> CatalogResult<VideoPage> {
        let VideoContext { video, section, course } = self.content.video_context(video_id).await?;
        if course.id != course_id {
            return Err(CatalogError::NotFound);
        }

        let content = match access::learner_access(&course, &video, viewer.user.as_ref()) {
            VideoAccess::Hidden => return Err(CatalogError::NotFound),
            VideoAccess::LoginRequired => VideoContent::LoginRequired,
            VideoAccess::Playable => {
                let completed = match viewer.user_id() {
                    Some(user_id) => match self.progress.get_progress(user_id, video.id).await {
                        Ok(row) => Some(row.is_some_and(|p| p.is_completed)),
                        Err(e) => {
                            error!("Failed to load progress for video {}: {:?}", video.id, e);
                            None
                        }
                    },
                    None => None,
                };
                VideoContent::Playable {
                    embed_url: youtube::embed_url(&video.youtube_video_id),
                    youtube_video_id: video.youtube_video_id.clone(),
                    description: video.description.clone(),
                    completed,
                }
            }
        };

        let tree = self.content.course_tree(course_id, Visibility::PublishedOnly).await?;
        let navigation = navigation::locate(&tree, video.id).ok_or(CatalogError::NotFound)?;

        Ok(VideoPage {
            course,
            section,
            video_id: video.id,
            title: video.title,
            is_preview: video.is_preview,
            content,
            navigation,
        })
    }

    // --- Progress ---

    pub async fn set_video_completion(
        &self,
        viewer: &Viewer,
        video_id: Uuid,
        completed: bool,
    ) -> CatalogResult<UserProgress> {
        let user = viewer.user.as_ref().ok_or(CatalogError::Authentication)?;
        let context = self.content.video_context(video_id).await?;
        if access::learner_access(&context.course, &context.video, Some(user)) != VideoAccess::Playable {
            return Err(CatalogError::NotFound);
        }
        Ok(self.progress.upsert_progress(user.id, video_id, completed).await?)
    }

    /// The signed-in viewer's completion percentage of a published course.
    pub async fn viewer_course_progress(&self, viewer: &Viewer, course_id: Uuid) -> CatalogResult<u8> {
        let user_id = viewer.user_id().ok_or(CatalogError::Authentication)?;
        let course = self.content.get_course(course_id).await?;
        if !course.is_published {
            return Err(CatalogError::NotFound);
        }
        self.course_progress_percent(user_id, course_id).await
    }

    /// Completion percentage from a single aggregate read.
    pub async fn course_progress_percent(&self, user_id: Uuid, course_id: Uuid) -> CatalogResult<u8> {
        let counts = self.progress.course_progress_counts(user_id, course_id).await?;
        Ok(counts.percent())
    }

    /// Completion percentage from fetching the course's videos, then the user's
    /// completed subset. Agrees with [`Catalog::course_progress_percent`].
    pub async fn course_progress_percent_two_step(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> CatalogResult<u8> {
        let video_ids = self.progress.course_video_ids(course_id).await?;
        if video_ids.is_empty() {
            return Ok(0);
        }
        let completed = self.progress.completed_video_ids(user_id, &video_ids).await?;
        let counts = ProgressCounts {
            completed: completed.len() as i64,
            total: video_ids.len() as i64,
        };
        Ok(counts.percent())
    }

    // --- Admin reads ---

    pub async fn dashboard(&self, viewer: &Viewer) -> CatalogResult<DashboardStats> {
        require_admin(viewer)?;
        Ok(self.content.dashboard_stats().await?)
    }

    pub async fn admin_courses(&self, viewer: &Viewer) -> CatalogResult<Vec<CourseSummary>> {
        require_admin(viewer)?;
        Ok(self.content.list_course_summaries().await?)
    }

    pub async fn admin_course(&self, viewer: &Viewer, course_id: Uuid) -> CatalogResult<CourseTree> {
        require_admin(viewer)?;
        Ok(self.content.course_tree(course_id, Visibility::Any).await?)
    }

    pub async fn admin_section(&self, viewer: &Viewer, section_id: Uuid) -> CatalogResult<SectionPage> {
        require_admin(viewer)?;
        let section = self.content.get_section(section_id).await?;
        let course = self.content.get_course(section.section.course_id).await?;
        Ok(SectionPage { course, section })
    }

    pub async fn admin_videos(&self, viewer: &Viewer) -> CatalogResult<Vec<VideoListing>> {
        require_admin(viewer)?;
        Ok(self.content.list_videos().await?)
    }

    // --- Admin mutations ---

    pub async fn create_course(&self, viewer: &Viewer, input: &CourseInput) -> CatalogResult<Course> {
        require_admin(viewer)?;
        let draft = input.validate()?;
        Ok(self.content.create_course(&draft).await?)
    }

    /// Also toggles `draft <-> published` through `is_published`.
    pub async fn update_course(
        &self,
        viewer: &Viewer,
        course_id: Uuid,
        input: &CourseInput,
    ) -> CatalogResult<Course> {
        require_admin(viewer)?;
        let draft = input.validate()?;
        Ok(self.content.update_course(course_id, &draft).await?)
    }

    pub async fn delete_course(&self, viewer: &Viewer, course_id: Uuid) -> CatalogResult<()> {
        require_admin(viewer)?;
        Ok(self.content.delete_course(course_id).await?)
    }

    pub async fn create_section(
        &self,
        viewer: &Viewer,
        course_id: Uuid,
        input: &SectionInput,
    ) -> CatalogResult<Section> {
        require_admin(viewer)?;
        let draft = input.validate()?;
        Ok(self.content.create_section(course_id, &draft).await?)
    }

    pub async fn update_section(
        &self,
        viewer: &Viewer,
        section_id: Uuid,
        input: &SectionInput,
    ) -> CatalogResult<Section> {
        require_admin(viewer)?;
        let draft = input.validate()?;
        Ok(self.content.update_section(section_id, &draft).await?)
    }

    pub async fn delete_section(&self, viewer: &Viewer, section_id: Uuid) -> CatalogResult<Section> {
        require_admin(viewer)?;
        let section = self.content.get_section(section_id).await?.section;
        self.content.delete_section(section_id).await?;
        Ok(section)
    }

    pub async fn create_video(
        &self,
        viewer: &Viewer,
        section_id: Uuid,
        input: &VideoInput,
    ) -> CatalogResult<Video> {
        require_admin(viewer)?;
        let draft = input.validate()?;
        Ok(self.content.create_video(section_id, &draft).await?)
    }

    pub async fn update_video(
        &self,
        viewer: &Viewer,
        video_id: Uuid,
        input: &VideoInput,
    ) -> CatalogResult<Video> {
        require_admin(viewer)?;
        let draft = input.validate()?;
        Ok(self.content.update_video(video_id, &draft).await?)
    }

    pub async fn delete_video(&self, viewer: &Viewer, video_id: Uuid) -> CatalogResult<VideoContext> {
        require_admin(viewer)?;
        let context = self.content.video_context(video_id).await?;
        self.content.delete_video(video_id).await?;
        Ok(context)
    }
}

/// Authoritative admin check. The advisory `admin_hint` is never consulted.
pub fn require_admin(viewer: &Viewer) -> CatalogResult<()> {
    if !viewer.is_authenticated() {
        return Err(CatalogError::Authentication);
    }
    if !viewer.is_admin {
        return Err(CatalogError::Authorization);
    }
    Ok(())
}
