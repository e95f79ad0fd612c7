//! Previous/next navigation across every video of a course.

use uuid::Uuid;

use crate::domain::CourseTree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub video_id: Uuid,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoNavigation {
    pub previous: Option<NavLink>,
    pub next: Option<NavLink>,
    /// 1-based position in the course playlist.
    pub position: usize,
    pub total: usize,
}

/// Locates `video_id` in the course playlist (section order, then video order).
pub fn locate(tree: &CourseTree, video_id: Uuid) -> Option<VideoNavigation> {
    let playlist: Vec<NavLink> = tree
        .videos()
        .map(|(_, v)| NavLink {
            video_id: v.id,
            title: v.title.clone(),
        })
        .collect();
    let index = playlist.iter().position(|l| l.video_id == video_id)?;

    Some(VideoNavigation {
        previous: index.checked_sub(1).map(|i| playlist[i].clone()),
        next: playlist.get(index + 1).cloned(),
        position: index + 1,
        total: playlist.len(),
    })
}
