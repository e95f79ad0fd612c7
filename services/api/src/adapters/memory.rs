//! services/api/src/adapters/memory.rs
//!
//! An in-process implementation of every port, used when no `DATABASE_URL` is
//! configured and by the test suite. All tables sit behind one `RwLock`, so each
//! multi-step mutation runs under a single write guard and is atomic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_platform_core::domain::{
    AuthUser, Course, CourseDraft, CourseSummary, CourseTree, DashboardStats, Role, Section,
    SectionDraft, SectionWithVideos, UserCredentials, UserProfile, UserProgress, Video,
    VideoContext, VideoDraft, VideoListing, Visibility,
};
use course_platform_core::ports::{
    ContentStore, IdentityProvider, PortError, PortResult, ProfileStore, ProgressStore,
};
use course_platform_core::progress::ProgressCounts;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

struct CourseRow {
    course: Course,
    section_seq: i32,
}

struct SectionRow {
    section: Section,
    video_seq: i32,
}

struct UserRow {
    user: AuthUser,
    hashed_password: String,
}

#[derive(Default)]
struct Tables {
    courses: HashMap<Uuid, CourseRow>,
    sections: HashMap<Uuid, SectionRow>,
    videos: HashMap<Uuid, Video>,
    progress: HashMap<(Uuid, Uuid), UserProgress>,
    users: HashMap<Uuid, UserRow>,
    sessions: HashMap<String, (Uuid, DateTime<Utc>)>,
    profiles: HashMap<Uuid, UserProfile>,
}

impl Tables {
    fn course_video_ids(&self, course_id: Uuid) -> Vec<Uuid> {
        self.videos
            .values()
            .filter(|v| {
                self.sections
                    .get(&v.section_id)
                    .is_some_and(|s| s.section.course_id == course_id)
            })
            .map(|v| v.id)
            .collect()
    }

    /// Removes a video and its progress rows.
    fn remove_video(&mut self, video_id: Uuid) {
        self.progress.retain(|(_, v), _| *v != video_id);
        self.videos.remove(&video_id);
    }

    fn remove_section(&mut self, section_id: Uuid) {
        let video_ids: Vec<Uuid> = self
            .videos
            .values()
            .filter(|v| v.section_id == section_id)
            .map(|v| v.id)
            .collect();
        for video_id in video_ids {
            self.remove_video(video_id);
        }
        self.sections.remove(&section_id);
    }

    fn section_with_videos(&self, section: &Section) -> SectionWithVideos {
        let mut videos: Vec<Video> = self
            .videos
            .values()
            .filter(|v| v.section_id == section.id)
            .cloned()
            .collect();
        videos.sort_by(|a, b| {
            (a.order_index, a.created_at, a.id).cmp(&(b.order_index, b.created_at, b.id))
        });
        SectionWithVideos {
            section: section.clone(),
            videos,
        }
    }
}

/// Keeps every table in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Sets a user's profile role, creating the profile if needed. There is no
    /// self-service promotion path; this is an operator hook.
    pub async fn set_role(&self, user_id: Uuid, role: Role) -> PortResult<()> {
        self.check()?;
        let mut t = self.tables.write().await;
        let user = t
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| PortError::NotFound(format!("User {}", user_id)))?;
        let now = Utc::now();
        let profile = t.profiles.entry(user_id).or_insert_with(|| UserProfile {
            id: Uuid::new_v4(),
            user_id,
            display_name: Some(user.default_display_name()),
            avatar_url: user.avatar_url.clone(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        });
        profile.role = role;
        profile.updated_at = now;
        Ok(())
    }

    /// Number of progress rows for `(user_id, video_id)`; at most one.
    pub async fn progress_row_count(&self, user_id: Uuid, video_id: Uuid) -> usize {
        let t = self.tables.read().await;
        t.progress
            .values()
            .filter(|p| p.user_id == user_id && p.video_id == video_id)
            .count()
    }

    pub async fn progress_rows_for_video(&self, video_id: Uuid) -> usize {
        let t = self.tables.read().await;
        t.progress.values().filter(|p| p.video_id == video_id).count()
    }

    /// Stored auth sessions, expired ones included until the next sign-in prunes them.
    pub async fn session_count(&self) -> usize {
        self.tables.read().await.sessions.len()
    }

    fn check(&self) -> PortResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("store unavailable".to_string()));
        }
        Ok(())
    }
}

//=========================================================================================
// `ContentStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn list_courses(&self, visibility: Visibility) -> PortResult<Vec<Course>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut courses: Vec<Course> = t
            .courses
            .values()
            .map(|r| r.course.clone())
            .filter(|c| visibility.admits(c))
            .collect();
        courses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(courses)
    }

    async fn list_course_summaries(&self) -> PortResult<Vec<CourseSummary>> {
        let courses = self.list_courses(Visibility::Any).await?;
        let t = self.tables.read().await;
        Ok(courses
            .into_iter()
            .map(|course| {
                let section_count = t
                    .sections
                    .values()
                    .filter(|s| s.section.course_id == course.id)
                    .count() as i64;
                let video_count = t.course_video_ids(course.id).len() as i64;
                CourseSummary {
                    course,
                    section_count,
                    video_count,
                }
            })
            .collect())
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course> {
        self.check()?;
        let t = self.tables.read().await;
        t.courses
            .get(&course_id)
            .map(|r| r.course.clone())
            .ok_or_else(|| PortError::NotFound(format!("Course {}", course_id)))
    }

    async fn create_course(&self, draft: &CourseDraft) -> PortResult<Course> {
        self.check()?;
        let now = Utc::now();
        let course = Course {
            id: Uuid::new_v4(),
            title: draft.title.clone(),
            description: draft.description.clone(),
            thumbnail_url: draft.thumbnail_url.clone(),
            is_published: draft.is_published,
            created_at: now,
            updated_at: now,
        };
        let mut t = self.tables.write().await;
        t.courses.insert(
            course.id,
            CourseRow {
                course: course.clone(),
                section_seq: 0,
            },
        );
        Ok(course)
    }

    async fn update_course(&self, course_id: Uuid, draft: &CourseDraft) -> PortResult<Course> {
        self.check()?;
        let mut t = self.tables.write().await;
        let row = t
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| PortError::NotFound(format!("Course {}", course_id)))?;
        row.course.title = draft.title.clone();
        row.course.description = draft.description.clone();
        row.course.thumbnail_url = draft.thumbnail_url.clone();
        row.course.is_published = draft.is_published;
        row.course.updated_at = Utc::now();
        Ok(row.course.clone())
    }

    async fn delete_course(&self, course_id: Uuid) -> PortResult<()> {
        self.check()?;
        let mut t = self.tables.write().await;
        if !t.courses.contains_key(&course_id) {
            return Err(PortError::NotFound(format!("Course {}", course_id)));
        }
        let section_ids: Vec<Uuid> = t
            .sections
            .values()
            .filter(|s| s.section.course_id == course_id)
            .map(|s| s.section.id)
            .collect();
        for section_id in section_ids {
            t.remove_section(section_id);
        }
        t.courses.remove(&course_id);
        Ok(())
    }

    async fn course_tree(&self, course_id: Uuid, visibility: Visibility) -> PortResult<CourseTree> {
        self.check()?;
        let t = self.tables.read().await;
        let course = t
            .courses
            .get(&course_id)
            .map(|r| r.course.clone())
            .filter(|c| visibility.admits(c))
            .ok_or_else(|| PortError::NotFound(format!("Course {}", course_id)))?;
        let sections: Vec<Section> = t
            .sections
            .values()
            .filter(|s| s.section.course_id == course_id)
            .map(|s| s.section.clone())
            .collect();
        let section_ids: HashSet<Uuid> = sections.iter().map(|s| s.id).collect();
        let videos: Vec<Video> = t
            .videos
            .values()
            .filter(|v| section_ids.contains(&v.section_id))
            .cloned()
            .collect();
        Ok(CourseTree::assemble(course, sections, videos))
    }

    async fn get_section(&self, section_id: Uuid) -> PortResult<SectionWithVideos> {
        self.check()?;
        let t = self.tables.read().await;
        let row = t
            .sections
            .get(&section_id)
            .ok_or_else(|| PortError::NotFound(format!("Section {}", section_id)))?;
        Ok(t.section_with_videos(&row.section))
    }

    async fn create_section(&self, course_id: Uuid, draft: &SectionDraft) -> PortResult<Section> {
        self.check()?;
        let mut t = self.tables.write().await;
        let course = t
            .courses
            .get_mut(&course_id)
            .ok_or_else(|| PortError::NotFound(format!("Course {}", course_id)))?;
        course.section_seq += 1;
        let now = Utc::now();
        let section = Section {
            id: Uuid::new_v4(),
            course_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            order_index: course.section_seq,
            created_at: now,
            updated_at: now,
        };
        t.sections.insert(
            section.id,
            SectionRow {
                section: section.clone(),
                video_seq: 0,
            },
        );
        Ok(section)
    }

    async fn update_section(&self, section_id: Uuid, draft: &SectionDraft) -> PortResult<Section> {
        self.check()?;
        let mut t = self.tables.write().await;
        let row = t
            .sections
            .get_mut(&section_id)
            .ok_or_else(|| PortError::NotFound(format!("Section {}", section_id)))?;
        row.section.title = draft.title.clone();
        row.section.description = draft.description.clone();
        row.section.updated_at = Utc::now();
        Ok(row.section.clone())
    }

    async fn delete_section(&self, section_id: Uuid) -> PortResult<()> {
        self.check()?;
        let mut t = self.tables.write().await;
        if !t.sections.contains_key(&section_id) {
            return Err(PortError::NotFound(format!("Section {}", section_id)));
        }
        t.remove_section(section_id);
        Ok(())
    }

    async fn video_context(&self, video_id: Uuid) -> PortResult<VideoContext> {
        self.check()?;
        let t = self.tables.read().await;
        let missing = || PortError::NotFound(format!("Video {}", video_id));
        let video = t.videos.get(&video_id).ok_or_else(missing)?;
        let section = t.sections.get(&video.section_id).ok_or_else(missing)?;
        let course = t.courses.get(&section.section.course_id).ok_or_else(missing)?;
        Ok(VideoContext {
            video: video.clone(),
            section: section.section.clone(),
            course: course.course.clone(),
        })
    }

    async fn list_videos(&self) -> PortResult<Vec<VideoListing>> {
        self.check()?;
        let t = self.tables.read().await;
        let mut listings: Vec<VideoListing> = t
            .videos
            .values()
            .filter_map(|video| {
                let section = t.sections.get(&video.section_id)?;
                let course = t.courses.get(&section.section.course_id)?;
                Some(VideoListing {
                    video: video.clone(),
                    section_title: section.section.title.clone(),
                    course_id: course.course.id,
                    course_title: course.course.title.clone(),
                })
            })
            .collect();
        listings.sort_by(|a, b| {
            b.video
                .created_at
                .cmp(&a.video.created_at)
                .then(a.video.id.cmp(&b.video.id))
        });
        Ok(listings)
    }

    async fn create_video(&self, section_id: Uuid, draft: &VideoDraft) -> PortResult<Video> {
        self.check()?;
        let mut t = self.tables.write().await;
        let section = t
            .sections
            .get_mut(&section_id)
            .ok_or_else(|| PortError::NotFound(format!("Section {}", section_id)))?;
        section.video_seq += 1;
        let now = Utc::now();
        let video = Video {
            id: Uuid::new_v4(),
            section_id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            youtube_url: draft.youtube_url.clone(),
            youtube_video_id: draft.youtube_video_id.clone(),
            order_index: section.video_seq,
            is_preview: draft.is_preview,
            created_at: now,
            updated_at: now,
        };
        t.videos.insert(video.id, video.clone());
        Ok(video)
    }

    async fn update_video(&self, video_id: Uuid, draft: &VideoDraft) -> PortResult<Video> {
        self.check()?;
        let mut t = self.tables.write().await;
        let video = t
            .videos
            .get_mut(&video_id)
            .ok_or_else(|| PortError::NotFound(format!("Video {}", video_id)))?;
        video.title = draft.title.clone();
        video.description = draft.description.clone();
        video.youtube_url = draft.youtube_url.clone();
        video.youtube_video_id = draft.youtube_video_id.clone();
        video.is_preview = draft.is_preview;
        video.updated_at = Utc::now();
        Ok(video.clone())
    }

    async fn delete_video(&self, video_id: Uuid) -> PortResult<()> {
        self.check()?;
        let mut t = self.tables.write().await;
        if !t.videos.contains_key(&video_id) {
            return Err(PortError::NotFound(format!("Video {}", video_id)));
        }
        t.remove_video(video_id);
        Ok(())
    }

    async fn dashboard_stats(&self) -> PortResult<DashboardStats> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(DashboardStats {
            courses: t.courses.len() as i64,
            published_courses: t.courses.values().filter(|c| c.course.is_published).count() as i64,
            sections: t.sections.len() as i64,
            videos: t.videos.len() as i64,
            preview_videos: t.videos.values().filter(|v| v.is_preview).count() as i64,
        })
    }
}

//=========================================================================================
// `ProgressStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressStore for InMemoryStore {
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        completed: bool,
    ) -> PortResult<UserProgress> {
        self.check()?;
        let mut t = self.tables.write().await;
        if !t.videos.contains_key(&video_id) {
            return Err(PortError::NotFound(format!("Video {}", video_id)));
        }
        let now = Utc::now();
        let row = t
            .progress
            .entry((user_id, video_id))
            .or_insert_with(|| UserProgress {
                id: Uuid::new_v4(),
                user_id,
                video_id,
                is_completed: false,
                completed_at: None,
                created_at: now,
                updated_at: now,
            });
        row.completed_at = match (completed, row.completed_at) {
            (true, Some(at)) => Some(at),
            (true, None) => Some(now),
            (false, _) => None,
        };
        row.is_completed = completed;
        row.updated_at = now;
        Ok(row.clone())
    }

    async fn get_progress(&self, user_id: Uuid, video_id: Uuid) -> PortResult<Option<UserProgress>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.progress.get(&(user_id, video_id)).cloned())
    }

    async fn progress_for_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Vec<UserProgress>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.course_video_ids(course_id)
            .into_iter()
            .filter_map(|video_id| t.progress.get(&(user_id, video_id)).cloned())
            .collect())
    }

    async fn course_progress_counts(&self, user_id: Uuid, course_id: Uuid) -> PortResult<ProgressCounts> {
        self.check()?;
        let t = self.tables.read().await;
        let mut counts = ProgressCounts::default();
        for (video, section) in t
            .videos
            .values()
            .filter_map(|v| t.sections.get(&v.section_id).map(|s| (v, s)))
        {
            if section.section.course_id != course_id {
                continue;
            }
            counts.total += 1;
            if t.progress.get(&(user_id, video.id)).is_some_and(|p| p.is_completed) {
                counts.completed += 1;
            }
        }
        Ok(counts)
    }

    async fn course_video_ids(&self, course_id: Uuid) -> PortResult<Vec<Uuid>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.course_video_ids(course_id))
    }

    async fn completed_video_ids(&self, user_id: Uuid, video_ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(video_ids
            .iter()
            .copied()
            .filter(|id| t.progress.get(&(user_id, *id)).is_some_and(|p| p.is_completed))
            .collect())
    }
}

//=========================================================================================
// `ProfileStore` and `IdentityProvider` Trait Implementations
//=========================================================================================

#[async_trait]
impl ProfileStore for InMemoryStore {
    async fn ensure_profile(&self, user: &AuthUser) -> PortResult<UserProfile> {
        self.check()?;
        let mut t = self.tables.write().await;
        let now = Utc::now();
        let profile = t.profiles.entry(user.id).or_insert_with(|| UserProfile {
            id: Uuid::new_v4(),
            user_id: user.id,
            display_name: Some(user.default_display_name()),
            avatar_url: user.avatar_url.clone(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        });
        Ok(profile.clone())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryStore {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<&str>,
    ) -> PortResult<AuthUser> {
        self.check()?;
        let mut t = self.tables.write().await;
        if t.users.values().any(|u| u.user.email == email) {
            return Err(PortError::Conflict(format!("Email {} is already registered", email)));
        }
        let user = AuthUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
            full_name: full_name.map(str::to_string),
            avatar_url: None,
        };
        t.users.insert(
            user.id,
            UserRow {
                user: user.clone(),
                hashed_password: hashed_password.to_string(),
            },
        );
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        self.check()?;
        let t = self.tables.read().await;
        t.users
            .values()
            .find(|u| u.user.email == email)
            .map(|u| UserCredentials {
                user_id: u.user.id,
                email: u.user.email.clone(),
                hashed_password: u.hashed_password.clone(),
            })
            .ok_or_else(|| PortError::NotFound("User".to_string()))
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        self.check()?;
        let mut t = self.tables.write().await;
        if !t.users.contains_key(&user_id) {
            return Err(PortError::NotFound(format!("User {}", user_id)));
        }
        let now = Utc::now();
        t.sessions.retain(|_, (_, expires)| *expires > now);
        t.sessions.insert(session_id.to_string(), (user_id, expires_at));
        Ok(())
    }

    async fn current_user(&self, session_id: &str) -> PortResult<Option<AuthUser>> {
        self.check()?;
        let t = self.tables.read().await;
        Ok(t.sessions
            .get(session_id)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .and_then(|(user_id, _)| t.users.get(user_id))
            .map(|u| u.user.clone()))
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        self.check()?;
        let mut t = self.tables.write().await;
        t.sessions.remove(session_id);
        Ok(())
    }
}
