//! Content access policy for the learner-facing surface.
//!
//! Admins get no special playback rule here; they are signed-in users like
//! any other. Draft courses are only reachable through the admin surface.

use crate::domain::{AuthUser, Course, Video};

/// Whether the video is playable for this viewer, ignoring its course.
pub fn can_access_video(video: &Video, viewer: Option<&AuthUser>) -> bool {
    video.is_preview || viewer.is_some()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoAccess {
    /// The course is unpublished; render as not found.
    Hidden,
    LoginRequired,
    Playable,
}

pub fn learner_access(course: &Course, video: &Video, viewer: Option<&AuthUser>) -> VideoAccess {
    if !course.is_published {
        VideoAccess::Hidden
    } else if can_access_video(video, viewer) {
        VideoAccess::Playable
    } else {
        VideoAccess::LoginRequired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn course(is_published: bool) -> Course {
        Course {
            id: Uuid::new_v4(),
            title: "c".into(),
            description: None,
            thumbnail_url: None,
            is_published,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn video(is_preview: bool) -> Video {
        Video {
            id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            title: "v".into(),
            description: None,
            youtube_url: "https://youtu.be/abc".into(),
            youtube_video_id: "abc".into(),
            order_index: 1,
            is_preview,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn user() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            email: "learner@example.com".into(),
            full_name: None,
            avatar_url: None,
        }
    }

    #[test]
    fn predicate_is_preview_or_signed_in() {
        let u = user();
        for is_preview in [false, true] {
            for viewer in [None, Some(&u)] {
                assert_eq!(
                    can_access_video(&video(is_preview), viewer),
                    is_preview || viewer.is_some()
                );
            }
        }
    }

    #[test]
    fn unpublished_course_hides_every_video() {
        let u = user();
        let draft = course(false);
        for is_preview in [false, true] {
            for viewer in [None, Some(&u)] {
                assert_eq!(
                    learner_access(&draft, &video(is_preview), viewer),
                    VideoAccess::Hidden
                );
            }
        }
    }

    #[test]
    fn published_course_applies_predicate() {
        let u = user();
        let live = course(true);
        assert_eq!(learner_access(&live, &video(true), None), VideoAccess::Playable);
        assert_eq!(learner_access(&live, &video(false), None), VideoAccess::LoginRequired);
        assert_eq!(learner_access(&live, &video(false), Some(&u)), VideoAccess::Playable);
    }
}
