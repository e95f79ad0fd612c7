//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! store and identity ports from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Multi-step writes (cascading deletes, order-index assignment) each run inside a
//! single transaction; dropping an uncommitted `Transaction` rolls it back.

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
use sqlx::{FromRow, PgPool};
use tracing::error;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements every store port plus the identity provider.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Maps a `sqlx` error onto the port error space. `what` names the missing row.
fn port_error(e: sqlx::Error, what: &str) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what.to_string()),
        sqlx::Error::Database(ref db) => match db.code().as_deref() {
            // foreign_key_violation: the referenced parent is gone
            Some("23503") => PortError::NotFound(what.to_string()),
            // unique_violation
            Some("23505") => PortError::Conflict(db.message().to_string()),
            _ => {
                error!("Database error on {}: {:?}", what, e);
                PortError::Unexpected(e.to_string())
            }
        },
        _ => {
            error!("Database error on {}: {:?}", what, e);
            PortError::Unexpected(e.to_string())
        }
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    title: String,
    description: Option<String>,
    thumbnail_url: Option<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            title: self.title,
            description: self.description,
            thumbnail_url: self.thumbnail_url,
            is_published: self.is_published,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct SectionRecord {
    id: Uuid,
    course_id: Uuid,
    title: String,
    description: Option<String>,
    order_index: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl SectionRecord {
    fn to_domain(self) -> Section {
        Section {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            description: self.description,
            order_index: self.order_index,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct VideoRecord {
    id: Uuid,
    section_id: Uuid,
    title: String,
    description: Option<String>,
    youtube_url: String,
    youtube_video_id: String,
    order_index: i32,
    is_preview: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl VideoRecord {
    fn to_domain(self) -> Video {
        Video {
            id: self.id,
            section_id: self.section_id,
            title: self.title,
            description: self.description,
            youtube_url: self.youtube_url,
            youtube_video_id: self.youtube_video_id,
            order_index: self.order_index,
            is_preview: self.is_preview,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CourseSummaryRecord {
    #[sqlx(flatten)]
    course: CourseRecord,
    section_count: i64,
    video_count: i64,
}

#[derive(FromRow)]
struct VideoListingRecord {
    #[sqlx(flatten)]
    video: VideoRecord,
    section_title: String,
    course_id: Uuid,
    course_title: String,
}

/// A video joined with its parents; parent columns carry `s_` / `c_` prefixes.
#[derive(FromRow)]
struct VideoContextRecord {
    #[sqlx(flatten)]
    video: VideoRecord,
    s_id: Uuid,
    s_title: String,
    s_description: Option<String>,
    s_order_index: i32,
    s_created_at: DateTime<Utc>,
    s_updated_at: DateTime<Utc>,
    c_id: Uuid,
    c_title: String,
    c_description: Option<String>,
    c_thumbnail_url: Option<String>,
    c_is_published: bool,
    c_created_at: DateTime<Utc>,
    c_updated_at: DateTime<Utc>,
}
impl VideoContextRecord {
    fn to_domain(self) -> VideoContext {
        VideoContext {
            section: Section {
                id: self.s_id,
                course_id: self.c_id,
                title: self.s_title,
                description: self.s_description,
                order_index: self.s_order_index,
                created_at: self.s_created_at,
                updated_at: self.s_updated_at,
            },
            course: Course {
                id: self.c_id,
                title: self.c_title,
                description: self.c_description,
                thumbnail_url: self.c_thumbnail_url,
                is_published: self.c_is_published,
                created_at: self.c_created_at,
                updated_at: self.c_updated_at,
            },
            video: self.video.to_domain(),
        }
    }
}

#[derive(FromRow)]
struct ProgressRecord {
    id: Uuid,
    user_id: Uuid,
    video_id: Uuid,
    is_completed: bool,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProgressRecord {
    fn to_domain(self) -> UserProgress {
        UserProgress {
            id: self.id,
            user_id: self.user_id,
            video_id: self.video_id,
            is_completed: self.is_completed,
            completed_at: self.completed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CountsRecord {
    completed: i64,
    total: i64,
}

#[derive(FromRow)]
struct StatsRecord {
    courses: i64,
    published_courses: i64,
    sections: i64,
    videos: i64,
    preview_videos: i64,
}

#[derive(FromRow)]
struct UserRecord {
    user_id: Uuid,
    email: String,
    full_name: Option<String>,
    avatar_url: Option<String>,
}
impl UserRecord {
    fn to_domain(self) -> AuthUser {
        AuthUser {
            id: self.user_id,
            email: self.email,
            full_name: self.full_name,
            avatar_url: self.avatar_url,
        }
    }
}

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct ProfileRecord {
    id: Uuid,
    user_id: Uuid,
    display_name: Option<String>,
    avatar_url: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> UserProfile {
        UserProfile {
            id: self.id,
            user_id: self.user_id,
            display_name: self.display_name,
            avatar_url: self.avatar_url,
            role: Role::parse(&self.role),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `ContentStore` Trait Implementation
//=========================================================================================

const VIDEO_CONTEXT_SELECT: &str = "SELECT v.id, v.section_id, v.title, v.description, v.youtube_url, \
     v.youtube_video_id, v.order_index, v.is_preview, v.created_at, v.updated_at, \
     s.id AS s_id, s.title AS s_title, s.description AS s_description, \
     s.order_index AS s_order_index, s.created_at AS s_created_at, s.updated_at AS s_updated_at, \
     c.id AS c_id, c.title AS c_title, c.description AS c_description, \
     c.thumbnail_url AS c_thumbnail_url, c.is_published AS c_is_published, \
     c.created_at AS c_created_at, c.updated_at AS c_updated_at \
     FROM videos v \
     JOIN sections s ON s.id = v.section_id \
     JOIN courses c ON c.id = s.course_id \
     WHERE v.id = $1";

#[async_trait]
impl ContentStore for DbAdapter {
    async fn list_courses(&self, visibility: Visibility) -> PortResult<Vec<Course>> {
        let records = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, title, description, thumbnail_url, is_published, created_at, updated_at \
             FROM courses WHERE is_published OR NOT $1 ORDER BY created_at DESC, id",
        )
        .bind(visibility == Visibility::PublishedOnly)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| port_error(e, "courses"))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn list_course_summaries(&self) -> PortResult<Vec<CourseSummary>> {
        let records = sqlx::query_as::<_, CourseSummaryRecord>(
            "SELECT c.id, c.title, c.description, c.thumbnail_url, c.is_published, c.created_at, c.updated_at, \
                    (SELECT COUNT(*) FROM sections s WHERE s.course_id = c.id) AS section_count, \
                    (SELECT COUNT(*) FROM videos v JOIN sections s ON s.id = v.section_id \
                      WHERE s.course_id = c.id) AS video_count \
             FROM courses c ORDER BY c.created_at DESC, c.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| port_error(e, "courses"))?;
        Ok(records
            .into_iter()
            .map(|r| CourseSummary {
                course: r.course.to_domain(),
                section_count: r.section_count,
                video_count: r.video_count,
            })
            .collect())
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, title, description, thumbnail_url, is_published, created_at, updated_at \
             FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, &format!("Course {}", course_id)))?;
        Ok(record.to_domain())
    }

    async fn create_course(&self, draft: &CourseDraft) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "INSERT INTO courses (title, description, thumbnail_url, is_published) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, title, description, thumbnail_url, is_published, created_at, updated_at",
        )
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.thumbnail_url)
        .bind(draft.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, "course"))?;
        Ok(record.to_domain())
    }

    async fn update_course(&self, course_id: Uuid, draft: &CourseDraft) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(
            "UPDATE courses SET title = $2, description = $3, thumbnail_url = $4, \
                    is_published = $5, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, title, description, thumbnail_url, is_published, created_at, updated_at",
        )
        .bind(course_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.thumbnail_url)
        .bind(draft.is_published)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, &format!("Course {}", course_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_course(&self, course_id: Uuid) -> PortResult<()> {
        let what = format!("Course {}", course_id);
        let mut tx = self.pool.begin().await.map_err(|e| port_error(e, &what))?;

        sqlx::query(
            "DELETE FROM user_progress WHERE video_id IN \
             (SELECT v.id FROM videos v JOIN sections s ON s.id = v.section_id WHERE s.course_id = $1)",
        )
        .bind(course_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?;

        sqlx::query("DELETE FROM videos WHERE section_id IN (SELECT id FROM sections WHERE course_id = $1)")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, &what))?;

        sqlx::query("DELETE FROM sections WHERE course_id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, &what))?;

        let deleted = sqlx::query("DELETE FROM courses WHERE id = $1")
            .bind(course_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, &what))?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(what));
        }

        tx.commit().await.map_err(|e| port_error(e, &what))
    }

    async fn course_tree(&self, course_id: Uuid, visibility: Visibility) -> PortResult<CourseTree> {
        let what = format!("Course {}", course_id);
        let mut tx = self.pool.begin().await.map_err(|e| port_error(e, &what))?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, &what))?;

        let course = sqlx::query_as::<_, CourseRecord>(
            "SELECT id, title, description, thumbnail_url, is_published, created_at, updated_at \
             FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?
        .map(CourseRecord::to_domain)
        .filter(|c| visibility.admits(c))
        .ok_or_else(|| PortError::NotFound(what.clone()))?;

        let sections = sqlx::query_as::<_, SectionRecord>(
            "SELECT id, course_id, title, description, order_index, created_at, updated_at \
             FROM sections WHERE course_id = $1 ORDER BY order_index, created_at, id",
        )
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?;

        let videos = sqlx::query_as::<_, VideoRecord>(
            "SELECT v.id, v.section_id, v.title, v.description, v.youtube_url, v.youtube_video_id, \
                    v.order_index, v.is_preview, v.created_at, v.updated_at \
             FROM videos v JOIN sections s ON s.id = v.section_id \
             WHERE s.course_id = $1 ORDER BY v.order_index, v.created_at, v.id",
        )
        .bind(course_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?;

        tx.commit().await.map_err(|e| port_error(e, &what))?;

        Ok(CourseTree::assemble(
            course,
            sections.into_iter().map(|r| r.to_domain()).collect(),
            videos.into_iter().map(|r| r.to_domain()).collect(),
        ))
    }

    async fn get_section(&self, section_id: Uuid) -> PortResult<SectionWithVideos> {
        let what = format!("Section {}", section_id);
        let section = sqlx::query_as::<_, SectionRecord>(
            "SELECT id, course_id, title, description, order_index, created_at, updated_at \
             FROM sections WHERE id = $1",
        )
        .bind(section_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, &what))?;

        let videos = sqlx::query_as::<_, VideoRecord>(
            "SELECT id, section_id, title, description, youtube_url, youtube_video_id, \
                    order_index, is_preview, created_at, updated_at \
             FROM videos WHERE section_id = $1 ORDER BY order_index, created_at, id",
        )
        .bind(section_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| port_error(e, &what))?;

        Ok(SectionWithVideos {
            section: section.to_domain(),
            videos: videos.into_iter().map(|r| r.to_domain()).collect(),
        })
    }

    async fn create_section(&self, course_id: Uuid, draft: &SectionDraft) -> PortResult<Section> {
        let what = format!("Course {}", course_id);
        let mut tx = self.pool.begin().await.map_err(|e| port_error(e, &what))?;

        let order_index = sqlx::query_scalar::<_, i32>(
            "UPDATE courses SET section_seq = section_seq + 1 WHERE id = $1 RETURNING section_seq",
        )
        .bind(course_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?
        .ok_or_else(|| PortError::NotFound(what.clone()))?;

        let record = sqlx::query_as::<_, SectionRecord>(
            "INSERT INTO sections (course_id, title, description, order_index) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id, course_id, title, description, order_index, created_at, updated_at",
        )
        .bind(course_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(order_index)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?;

        tx.commit().await.map_err(|e| port_error(e, &what))?;
        Ok(record.to_domain())
    }

    async fn update_section(&self, section_id: Uuid, draft: &SectionDraft) -> PortResult<Section> {
        let record = sqlx::query_as::<_, SectionRecord>(
            "UPDATE sections SET title = $2, description = $3, updated_at = now() WHERE id = $1 \
             RETURNING id, course_id, title, description, order_index, created_at, updated_at",
        )
        .bind(section_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, &format!("Section {}", section_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_section(&self, section_id: Uuid) -> PortResult<()> {
        let what = format!("Section {}", section_id);
        let mut tx = self.pool.begin().await.map_err(|e| port_error(e, &what))?;

        sqlx::query(
            "DELETE FROM user_progress WHERE video_id IN (SELECT id FROM videos WHERE section_id = $1)",
        )
        .bind(section_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?;

        sqlx::query("DELETE FROM videos WHERE section_id = $1")
            .bind(section_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, &what))?;

        let deleted = sqlx::query("DELETE FROM sections WHERE id = $1")
            .bind(section_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, &what))?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(what));
        }

        tx.commit().await.map_err(|e| port_error(e, &what))
    }

    async fn video_context(&self, video_id: Uuid) -> PortResult<VideoContext> {
        let record = sqlx::query_as::<_, VideoContextRecord>(VIDEO_CONTEXT_SELECT)
            .bind(video_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| port_error(e, &format!("Video {}", video_id)))?;
        Ok(record.to_domain())
    }

    async fn list_videos(&self) -> PortResult<Vec<VideoListing>> {
        let records = sqlx::query_as::<_, VideoListingRecord>(
            "SELECT v.id, v.section_id, v.title, v.description, v.youtube_url, v.youtube_video_id, \
                    v.order_index, v.is_preview, v.created_at, v.updated_at, \
                    s.title AS section_title, c.id AS course_id, c.title AS course_title \
             FROM videos v \
             JOIN sections s ON s.id = v.section_id \
             JOIN courses c ON c.id = s.course_id \
             ORDER BY v.created_at DESC, v.id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| port_error(e, "videos"))?;
        Ok(records
            .into_iter()
            .map(|r| VideoListing {
                video: r.video.to_domain(),
                section_title: r.section_title,
                course_id: r.course_id,
                course_title: r.course_title,
            })
            .collect())
    }

    async fn create_video(&self, section_id: Uuid, draft: &VideoDraft) -> PortResult<Video> {
        let what = format!("Section {}", section_id);
        let mut tx = self.pool.begin().await.map_err(|e| port_error(e, &what))?;

        let order_index = sqlx::query_scalar::<_, i32>(
            "UPDATE sections SET video_seq = video_seq + 1 WHERE id = $1 RETURNING video_seq",
        )
        .bind(section_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?
        .ok_or_else(|| PortError::NotFound(what.clone()))?;

        let record = sqlx::query_as::<_, VideoRecord>(
            "INSERT INTO videos (section_id, title, description, youtube_url, youtube_video_id, order_index, is_preview) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING id, section_id, title, description, youtube_url, youtube_video_id, \
                       order_index, is_preview, created_at, updated_at",
        )
        .bind(section_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.youtube_url)
        .bind(&draft.youtube_video_id)
        .bind(order_index)
        .bind(draft.is_preview)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| port_error(e, &what))?;

        tx.commit().await.map_err(|e| port_error(e, &what))?;
        Ok(record.to_domain())
    }

    async fn update_video(&self, video_id: Uuid, draft: &VideoDraft) -> PortResult<Video> {
        let record = sqlx::query_as::<_, VideoRecord>(
            "UPDATE videos SET title = $2, description = $3, youtube_url = $4, youtube_video_id = $5, \
                    is_preview = $6, updated_at = now() \
             WHERE id = $1 \
             RETURNING id, section_id, title, description, youtube_url, youtube_video_id, \
                       order_index, is_preview, created_at, updated_at",
        )
        .bind(video_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.youtube_url)
        .bind(&draft.youtube_video_id)
        .bind(draft.is_preview)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, &format!("Video {}", video_id)))?;
        Ok(record.to_domain())
    }

    async fn delete_video(&self, video_id: Uuid) -> PortResult<()> {
        let what = format!("Video {}", video_id);
        let mut tx = self.pool.begin().await.map_err(|e| port_error(e, &what))?;

        sqlx::query("DELETE FROM user_progress WHERE video_id = $1")
            .bind(video_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, &what))?;

        let deleted = sqlx::query("DELETE FROM videos WHERE id = $1")
            .bind(video_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| port_error(e, &what))?;
        if deleted.rows_affected() == 0 {
            return Err(PortError::NotFound(what));
        }

        tx.commit().await.map_err(|e| port_error(e, &what))
    }

    async fn dashboard_stats(&self) -> PortResult<DashboardStats> {
        let r = sqlx::query_as::<_, StatsRecord>(
            "SELECT (SELECT COUNT(*) FROM courses) AS courses, \
                    (SELECT COUNT(*) FROM courses WHERE is_published) AS published_courses, \
                    (SELECT COUNT(*) FROM sections) AS sections, \
                    (SELECT COUNT(*) FROM videos) AS videos, \
                    (SELECT COUNT(*) FROM videos WHERE is_preview) AS preview_videos",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, "dashboard"))?;
        Ok(DashboardStats {
            courses: r.courses,
            published_courses: r.published_courses,
            sections: r.sections,
            videos: r.videos,
            preview_videos: r.preview_videos,
        })
    }
}

//=========================================================================================
// `ProgressStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl ProgressStore for DbAdapter {
    async fn upsert_progress(
        &self,
        user_id: Uuid,
        video_id: Uuid,
        completed: bool,
    ) -> PortResult<UserProgress> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "INSERT INTO user_progress (user_id, video_id, is_completed, completed_at) \
             VALUES ($1, $2, $3, CASE WHEN $3 THEN now() END) \
             ON CONFLICT (user_id, video_id) DO UPDATE SET \
                 is_completed = EXCLUDED.is_completed, \
                 completed_at = CASE WHEN EXCLUDED.is_completed \
                     THEN COALESCE(user_progress.completed_at, EXCLUDED.completed_at) END, \
                 updated_at = now() \
             RETURNING id, user_id, video_id, is_completed, completed_at, created_at, updated_at",
        )
        .bind(user_id)
        .bind(video_id)
        .bind(completed)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, &format!("Video {}", video_id)))?;
        Ok(record.to_domain())
    }

    async fn get_progress(&self, user_id: Uuid, video_id: Uuid) -> PortResult<Option<UserProgress>> {
        let record = sqlx::query_as::<_, ProgressRecord>(
            "SELECT id, user_id, video_id, is_completed, completed_at, created_at, updated_at \
             FROM user_progress WHERE user_id = $1 AND video_id = $2",
        )
        .bind(user_id)
        .bind(video_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| port_error(e, "progress"))?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn progress_for_course(&self, user_id: Uuid, course_id: Uuid) -> PortResult<Vec<UserProgress>> {
        let records = sqlx::query_as::<_, ProgressRecord>(
            "SELECT p.id, p.user_id, p.video_id, p.is_completed, p.completed_at, p.created_at, p.updated_at \
             FROM user_progress p \
             JOIN videos v ON v.id = p.video_id \
             JOIN sections s ON s.id = v.section_id \
             WHERE p.user_id = $1 AND s.course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| port_error(e, "progress"))?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn course_progress_counts(&self, user_id: Uuid, course_id: Uuid) -> PortResult<ProgressCounts> {
        let r = sqlx::query_as::<_, CountsRecord>(
            "SELECT COUNT(p.id) AS completed, COUNT(v.id) AS total \
             FROM videos v \
             JOIN sections s ON s.id = v.section_id \
             LEFT JOIN user_progress p \
                    ON p.video_id = v.id AND p.user_id = $1 AND p.is_completed \
             WHERE s.course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, "progress"))?;
        Ok(ProgressCounts {
            completed: r.completed,
            total: r.total,
        })
    }

    async fn course_video_ids(&self, course_id: Uuid) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT v.id FROM videos v JOIN sections s ON s.id = v.section_id WHERE s.course_id = $1",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| port_error(e, "videos"))
    }

    async fn completed_video_ids(&self, user_id: Uuid, video_ids: &[Uuid]) -> PortResult<Vec<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT video_id FROM user_progress \
             WHERE user_id = $1 AND is_completed AND video_id = ANY($2)",
        )
        .bind(user_id)
        .bind(video_ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| port_error(e, "progress"))
    }
}

//=========================================================================================
// `ProfileStore` and `IdentityProvider` Trait Implementations
//=========================================================================================

#[async_trait]
impl ProfileStore for DbAdapter {
    async fn ensure_profile(&self, user: &AuthUser) -> PortResult<UserProfile> {
        sqlx::query(
            "INSERT INTO user_profiles (user_id, display_name, avatar_url) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id) DO NOTHING",
        )
        .bind(user.id)
        .bind(user.default_display_name())
        .bind(&user.avatar_url)
        .execute(&self.pool)
        .await
        .map_err(|e| port_error(e, &format!("User {}", user.id)))?;

        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT id, user_id, display_name, avatar_url, role, created_at, updated_at \
             FROM user_profiles WHERE user_id = $1",
        )
        .bind(user.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, &format!("Profile for user {}", user.id)))?;
        Ok(record.to_domain())
    }
}

#[async_trait]
impl IdentityProvider for DbAdapter {
    async fn create_user_with_email(
        &self,
        email: &str,
        hashed_password: &str,
        full_name: Option<&str>,
    ) -> PortResult<AuthUser> {
        let record = sqlx::query_as::<_, UserRecord>(
            "INSERT INTO users (email, hashed_password, full_name) VALUES ($1, $2, $3) \
             RETURNING user_id, email, full_name, avatar_url",
        )
        .bind(email)
        .bind(hashed_password)
        .bind(full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, "user"))?;
        Ok(record.to_domain())
    }

    async fn get_user_by_email(&self, email: &str) -> PortResult<UserCredentials> {
        let record = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| port_error(e, "User"))?;
        Ok(UserCredentials {
            user_id: record.user_id,
            email: record.email,
            hashed_password: record.hashed_password,
        })
    }

    async fn create_auth_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        // Expired sessions are only filtered on read, so sign-in sweeps them.
        sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= now()")
            .execute(&self.pool)
            .await
            .map_err(|e| port_error(e, "session"))?;

        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| port_error(e, &format!("User {}", user_id)))?;
        Ok(())
    }

    async fn current_user(&self, session_id: &str) -> PortResult<Option<AuthUser>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT u.user_id, u.email, u.full_name, u.avatar_url \
             FROM auth_sessions a JOIN users u ON u.user_id = a.user_id \
             WHERE a.id = $1 AND a.expires_at > now()",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| port_error(e, "session"))?;
        Ok(record.map(|r| r.to_domain()))
    }

    async fn delete_auth_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| port_error(e, "session"))?;
        Ok(())
    }
}
