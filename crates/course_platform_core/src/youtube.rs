//! YouTube URL parsing and the player/thumbnail endpoints derived from a video id.

use regex::Regex;
use std::sync::LazyLock;

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:https?://)?(?:www\.|m\.)?(?:youtube\.com/(?:watch\?(?:[^#]*&)?v=|embed/)|youtu\.be/)([A-Za-z0-9_-]+)",
    )
    .expect("video id pattern is valid")
});

/// Extracts the video id from the `watch?v=`, `youtu.be/` and `embed/` URL forms.
/// The URL must start at a YouTube host. The id ends at the first character
/// outside `[A-Za-z0-9_-]`, so trailing paths, query parameters and fragments
/// are ignored.
pub fn extract_video_id(url: &str) -> Option<String> {
    VIDEO_ID
        .captures(url.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|id| !id.is_empty())
}

pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{video_id}")
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/mqdefault.jpg")
}
