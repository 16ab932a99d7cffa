use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/// Fixed length of the platform's canonical video identifiers.
pub const VIDEO_ID_LEN: usize = 11;

/// Compile the video id regex once.
///
/// One combined pattern covers the watch-query, short-link, embed and shorts
/// url shapes. The capture is unbounded; `extract_video_id` checks the exact
/// length afterwards, so over-long ids are rejected rather than truncated.
static VIDEO_ID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.)?(?:youtube\.com/watch\?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/shorts/)([A-Za-z0-9_-]+)",
    )
    .expect("Failed to compile video id regex")
});

/// Canonical 11-character video identifier derived from a pasted url.
///
/// Can only be obtained through [`extract_video_id`], so holding one means
/// the pattern matched and the length checked out. It says nothing about
/// whether the video actually exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extract the canonical video id from arbitrary pasted text.
///
/// Returns `None` when no known url shape matches or the captured id is not
/// exactly 11 characters.
pub fn extract_video_id(input: &str) -> Option<VideoId> {
    VIDEO_ID_REGEX
        .captures(input)
        .and_then(|caps| caps.get(1).map(|m| m.as_str()))
        .filter(|id| id.len() == VIDEO_ID_LEN)
        .map(|id| VideoId(id.to_owned()))
}

/// Canonical watch-page url for a resolved id.
pub fn watch_url(id: &VideoId) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}
